use crate::job_config::ViolationStrategy;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tempo_core::{Duration, Error, ErrorStateHandle, Result, Timestamp};
use tempo_ports::{Job, Logger};

/// Runs the three phases of one job and enforces its runtime budget
///
/// A runner that escalated to error state stays cancelled: every later
/// `run_job` returns `Cancelled` without touching the job.
pub struct JobRunner {
    name: String,
    strategy: ViolationStrategy,
    max_runtime: Option<Duration>,
    logger: Arc<dyn Logger>,
    error_state: ErrorStateHandle,
    cancelled: AtomicBool,
    skip_output: AtomicBool,
}

impl JobRunner {
    pub fn new(
        name: impl Into<String>,
        strategy: ViolationStrategy,
        max_runtime: Option<Duration>,
        logger: Arc<dyn Logger>,
        error_state: ErrorStateHandle,
    ) -> Self {
        Self {
            name: name.into(),
            strategy,
            max_runtime,
            logger,
            error_state,
            cancelled: AtomicBool::new(false),
            skip_output: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn run_job(&self, time: Timestamp, job: &dyn Job) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled(format!("job '{}' is cancelled", self.name)));
        }
        self.skip_output.store(false, Ordering::Release);

        if let Err(e) = job.execute_data_in(time) {
            self.warn(&format!("job '{}': data in at {time} failed: {e}", self.name));
        }

        let started = Instant::now();
        let executed = job.execute(time);
        let runtime = Duration::from_std(started.elapsed());
        if let Err(e) = &executed {
            self.warn(&format!("job '{}': execute at {time} failed: {e}", self.name));
        }

        if let Some(max_runtime) = self.max_runtime {
            if runtime > max_runtime {
                self.handle_violation(runtime, max_runtime)?;
            }
        }

        if !self.skip_output.load(Ordering::Acquire) {
            if let Err(e) = job.execute_data_out(time) {
                self.warn(&format!("job '{}': data out at {time} failed: {e}", self.name));
            }
        }
        executed
    }

    fn handle_violation(&self, runtime: Duration, max_runtime: Duration) -> Result<()> {
        match self.strategy {
            ViolationStrategy::Ignore | ViolationStrategy::Unknown => Ok(()),
            ViolationStrategy::Warn => {
                self.warn(&format!(
                    "job '{}' exceeded its runtime: {runtime} > {max_runtime}",
                    self.name
                ));
                Ok(())
            }
            ViolationStrategy::SkipOutput => {
                let _ = self.logger.log_error(&format!(
                    "job '{}' exceeded its runtime: {runtime} > {max_runtime}, output skipped",
                    self.name
                ));
                self.skip_output.store(true, Ordering::Release);
                Ok(())
            }
            ViolationStrategy::SetErrorState => {
                let mut description = format!(
                    "job '{}' exceeded its runtime: {runtime} > {max_runtime}",
                    self.name
                );
                let _ = self.logger.log_fatal(&description);
                if let Err(e) = self.error_state.escalate(&description) {
                    description.push_str(&format!("; entering error state failed: {e}"));
                }
                self.skip_output.store(true, Ordering::Release);
                self.cancelled.store(true, Ordering::Release);
                Err(Error::Failed(description))
            }
        }
    }

    fn warn(&self, message: &str) {
        let _ = self.logger.log_warning(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration as StdDuration;
    use tempo_ports::{LogLevel, MemoryLogger};

    #[derive(Default)]
    struct Phases {
        calls: Mutex<Vec<&'static str>>,
        sleep: Mutex<StdDuration>,
        fail_execute: AtomicBool,
    }

    impl Phases {
        fn take(&self) -> Vec<&'static str> {
            std::mem::take(&mut *self.calls.lock().unwrap())
        }

        fn set_sleep(&self, millis: u64) {
            *self.sleep.lock().unwrap() = StdDuration::from_millis(millis);
        }
    }

    impl Job for Phases {
        fn execute_data_in(&self, _time: Timestamp) -> Result<()> {
            self.calls.lock().unwrap().push("in");
            Err(Error::Failed("no input".into()))
        }

        fn execute(&self, _time: Timestamp) -> Result<()> {
            self.calls.lock().unwrap().push("execute");
            let sleep = *self.sleep.lock().unwrap();
            thread::sleep(sleep);
            if self.fail_execute.load(Ordering::Acquire) {
                return Err(Error::Failed("boom".into()));
            }
            Ok(())
        }

        fn execute_data_out(&self, _time: Timestamp) -> Result<()> {
            self.calls.lock().unwrap().push("out");
            Ok(())
        }
    }

    fn runner(
        strategy: ViolationStrategy,
        max_runtime_ms: i64,
        logger: Arc<MemoryLogger>,
        error_state: ErrorStateHandle,
    ) -> JobRunner {
        JobRunner::new(
            "job",
            strategy,
            Some(Duration::from_millis(max_runtime_ms)),
            logger,
            error_state,
        )
    }

    #[test]
    fn test_phases_run_in_order_and_errors_continue() {
        let logger = Arc::new(MemoryLogger::new());
        let job = Phases::default();
        job.fail_execute.store(true, Ordering::Release);
        let runner = runner(
            ViolationStrategy::Ignore,
            1000,
            logger.clone(),
            ErrorStateHandle::detached(),
        );

        let result = runner.run_job(Timestamp::from_millis(1), &job);

        assert!(matches!(result, Err(Error::Failed(_))));
        assert_eq!(job.take(), vec!["in", "execute", "out"]);
        assert_eq!(logger.messages(LogLevel::Warning).len(), 2);
    }

    #[test]
    fn test_warn_on_violation() {
        let logger = Arc::new(MemoryLogger::new());
        let job = Phases::default();
        job.set_sleep(5);
        let runner = runner(
            ViolationStrategy::Warn,
            1,
            logger.clone(),
            ErrorStateHandle::detached(),
        );

        runner.run_job(Timestamp::ZERO, &job).unwrap();

        let warnings = logger.messages(LogLevel::Warning);
        assert!(warnings.iter().any(|w| w.contains("exceeded its runtime")));
        assert_eq!(job.take(), vec!["in", "execute", "out"]);
    }

    #[test]
    fn test_skip_output_only_while_over_budget() {
        let logger = Arc::new(MemoryLogger::new());
        let job = Phases::default();
        let runner = runner(
            ViolationStrategy::SkipOutput,
            20,
            logger.clone(),
            ErrorStateHandle::detached(),
        );

        job.set_sleep(40);
        runner.run_job(Timestamp::ZERO, &job).unwrap();
        assert_eq!(job.take(), vec!["in", "execute"]);
        assert_eq!(logger.messages(LogLevel::Error).len(), 1);

        job.set_sleep(0);
        runner.run_job(Timestamp::from_millis(100), &job).unwrap();
        assert_eq!(job.take(), vec!["in", "execute", "out"]);
    }

    #[test]
    fn test_set_error_state_cancels_for_good() {
        let logger = Arc::new(MemoryLogger::new());
        let escalations = Arc::new(AtomicUsize::new(0));
        let counter = escalations.clone();
        let error_state = ErrorStateHandle::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let job = Phases::default();
        job.set_sleep(5);
        let runner = runner(
            ViolationStrategy::SetErrorState,
            1,
            logger.clone(),
            error_state.clone(),
        );

        let first = runner.run_job(Timestamp::ZERO, &job);
        match first {
            Err(Error::Failed(description)) => {
                assert!(description.contains("job"));
                assert!(description.contains("exceeded"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert_eq!(job.take(), vec!["in", "execute"]);
        assert_eq!(escalations.load(Ordering::SeqCst), 1);
        assert!(error_state.is_escalated());
        assert_eq!(logger.messages(LogLevel::Fatal).len(), 1);

        let second = runner.run_job(Timestamp::from_millis(100), &job);
        assert!(matches!(second, Err(Error::Cancelled(_))));
        assert!(job.take().is_empty());
        assert_eq!(escalations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failed_escalation_is_chained() {
        let logger = Arc::new(MemoryLogger::new());
        let error_state =
            ErrorStateHandle::new(|_| Err(Error::InvalidState("state machine offline".into())));
        let job = Phases::default();
        job.set_sleep(5);
        let runner = runner(ViolationStrategy::SetErrorState, 1, logger, error_state);

        match runner.run_job(Timestamp::ZERO, &job) {
            Err(Error::Failed(description)) => {
                assert!(description.contains("state machine offline"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(runner.is_cancelled());
    }
}
