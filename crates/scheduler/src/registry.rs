use crate::job_config::JobConfiguration;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tempo_core::{Error, Lifecycle, Result};
use tempo_ports::Job;

/// Name and timing of a registered job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub name: String,
    pub config: JobConfiguration,
}

/// A registered job together with its timing
#[derive(Clone)]
pub struct JobEntry {
    pub job: Arc<dyn Job>,
    pub info: JobInfo,
}

impl fmt::Debug for JobEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEntry").field("info", &self.info).finish()
    }
}

/// Jobs keyed by name, in registration order
pub type Jobs = IndexMap<String, JobEntry>;

/// Timing table of one participant, keyed by job name
pub type TimingTable = IndexMap<String, JobConfiguration>;

/// The participant's named jobs and their timing
///
/// Mutation is only allowed while stopped.
pub struct JobRegistry {
    jobs: RwLock<Jobs>,
    lifecycle: Lifecycle,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(Jobs::new()),
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn add_job(
        &self,
        name: impl Into<String>,
        job: Arc<dyn Job>,
        config: JobConfiguration,
    ) -> Result<()> {
        let name = name.into();
        self.lifecycle.ensure_stopped("adding a job")?;
        config.validate()?;

        let mut jobs = self.jobs.write();
        if jobs.contains_key(&name) {
            return Err(Error::ResourceInUse(format!(
                "job '{name}' already exists"
            )));
        }
        log::debug!("job '{name}' added, cycle {}", config.cycle_time);
        jobs.insert(
            name.clone(),
            JobEntry {
                job,
                info: JobInfo { name, config },
            },
        );
        Ok(())
    }

    pub fn remove_job(&self, name: &str) -> Result<()> {
        self.lifecycle.ensure_stopped("removing a job")?;
        self.jobs
            .write()
            .shift_remove(name)
            .map(|_| log::debug!("job '{name}' removed"))
            .ok_or_else(|| Error::NotFound(format!("job '{name}'")))
    }

    /// Replace the timing of one job
    pub fn reconfigure_job(&self, name: &str, config: JobConfiguration) -> Result<()> {
        self.lifecycle.ensure_stopped("reconfiguring a job")?;
        config.validate()?;
        let mut jobs = self.jobs.write();
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| Error::NotFound(format!("job '{name}'")))?;
        entry.info.config = config;
        Ok(())
    }

    /// Apply a timing table to the registered jobs
    ///
    /// Either every entry is applied or none is: an entry naming an unknown
    /// job or carrying an invalid configuration rejects the whole table.
    pub fn configure_jobs_by_timing_configuration(&self, table: &TimingTable) -> Result<()> {
        self.lifecycle
            .ensure_stopped("applying a timing configuration")?;

        let mut jobs = self.jobs.write();
        for (name, config) in table {
            if !jobs.contains_key(name) {
                return Err(Error::NotFound(format!(
                    "timing configuration names unknown job '{name}'"
                )));
            }
            config.validate().map_err(|e| {
                Error::InvalidArg(format!("timing of job '{name}': {}", e.message()))
            })?;
        }
        for (name, config) in table {
            if let Some(entry) = jobs.get_mut(name) {
                entry.info.config = config.clone();
            }
        }
        log::info!("timing configuration applied to {} job(s)", table.len());
        Ok(())
    }

    pub fn job_infos(&self) -> Vec<JobInfo> {
        self.jobs
            .read()
            .values()
            .map(|entry| entry.info.clone())
            .collect()
    }

    /// Snapshot of the registered jobs
    pub fn jobs(&self) -> Jobs {
        self.jobs.read().clone()
    }

    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    pub fn start(&self) -> Result<()> {
        self.lifecycle.start("job registry")
    }

    pub fn stop(&self) -> Result<()> {
        self.lifecycle.stop("job registry")
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
