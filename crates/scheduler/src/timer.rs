use crate::runner::JobRunner;
use std::sync::Arc;
use tempo_core::{Result, Timestamp};
use tempo_ports::Job;

/// Something the scheduler wakes up periodically
pub trait Timer: Send + Sync {
    fn name(&self) -> &str;

    /// Called at a nominal tick; `Cancelled` retires the timer's thread
    fn wakeup(&self, time: Timestamp) -> Result<()>;
}

/// Timer running one job through its runner
pub struct JobTimer {
    job: Arc<dyn Job>,
    runner: JobRunner,
}

impl JobTimer {
    pub fn new(job: Arc<dyn Job>, runner: JobRunner) -> Self {
        Self { job, runner }
    }

    pub fn runner(&self) -> &JobRunner {
        &self.runner
    }
}

impl Timer for JobTimer {
    fn name(&self) -> &str {
        self.runner.name()
    }

    fn wakeup(&self, time: Timestamp) -> Result<()> {
        self.runner.run_job(time, self.job.as_ref())
    }
}
