use crate::config::{ConfigError, ParticipantConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tempo_clock_service::{ClockService, downgrade_sink};
use tempo_clock_sync::{
    ClockSyncMaster, ClockSyncSlaveService, ContinuousSlaveClock, DiscreteSlaveClock,
    MASTER_SERVICE, MasterConnection, SLAVE_MASTER_ON_DEMAND, SLAVE_MASTER_ON_DEMAND_DISCRETE,
    SLAVE_SERVICE, SyncEventTarget,
};
use tempo_core::{Error, ErrorStateHandle, Lifecycle, Result, Timestamp};
use tempo_ports::{Job, Logger, PropertyStore, RequesterResolver, RpcService, ServiceRegistry};
use tempo_scheduler::{JobConfiguration, JobRegistry, TimerScheduler, TimingConfiguration};

const COMPONENT: &str = "participant";

/// How this participant takes part in clock synchronization
enum SyncRole {
    Master(Arc<ClockSyncMaster>),
    Slave(Arc<ClockSyncSlaveService>),
}

impl SyncRole {
    /// The RPC service exposed for this role
    fn service(&self) -> Arc<dyn RpcService> {
        match self {
            SyncRole::Master(master) => master.clone() as Arc<dyn RpcService>,
            SyncRole::Slave(service) => service.clone() as Arc<dyn RpcService>,
        }
    }
}

/// Components built by `initialize`
struct Wiring {
    sync: SyncRole,
    scheduler: Arc<TimerScheduler>,
}

/// One co-simulation participant's timing core
///
/// Wires the properties into a clock service, joins clock synchronization as
/// timing master or slave, and schedules the registered jobs on the main
/// clock. Jobs are added before `initialize`; `start` and `stop` may then
/// alternate.
pub struct Participant {
    config: ParticipantConfig,
    resolver: Arc<dyn RequesterResolver>,
    services: Arc<dyn ServiceRegistry>,
    logger: Arc<dyn Logger>,
    error_state: ErrorStateHandle,
    clock_service: Arc<ClockService>,
    job_registry: JobRegistry,
    lifecycle: Lifecycle,
    wiring: Mutex<Option<Wiring>>,
}

impl Participant {
    pub fn new(
        name: impl Into<String>,
        properties: &dyn PropertyStore,
        resolver: Arc<dyn RequesterResolver>,
        services: Arc<dyn ServiceRegistry>,
        logger: Arc<dyn Logger>,
    ) -> std::result::Result<Self, ConfigError> {
        let config = ParticipantConfig::from_properties(name, properties)?;
        Ok(Self::with_config(config, resolver, services, logger))
    }

    pub fn with_config(
        config: ParticipantConfig,
        resolver: Arc<dyn RequesterResolver>,
        services: Arc<dyn ServiceRegistry>,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let participant_name = config.name.clone();
        let error_state = ErrorStateHandle::new(move |reason| {
            log::error!("participant '{participant_name}' entered error state: {reason}");
            Ok(())
        });
        Self {
            config,
            resolver,
            services,
            logger,
            error_state,
            clock_service: Arc::new(ClockService::new()),
            job_registry: JobRegistry::new(),
            lifecycle: Lifecycle::new(),
            wiring: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ParticipantConfig {
        &self.config
    }

    pub fn clock_service(&self) -> &Arc<ClockService> {
        &self.clock_service
    }

    pub fn job_registry(&self) -> &JobRegistry {
        &self.job_registry
    }

    pub fn time(&self) -> Timestamp {
        self.clock_service.time()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    pub fn is_initialized(&self) -> bool {
        self.wiring.lock().is_some()
    }

    pub fn is_in_error_state(&self) -> bool {
        self.error_state.is_escalated()
    }

    pub fn error_reason(&self) -> Option<String> {
        self.error_state.reason()
    }

    /// The sync master, when this participant is the timing master
    pub fn clock_sync_master(&self) -> Option<Arc<ClockSyncMaster>> {
        match self.wiring.lock().as_ref().map(|wiring| &wiring.sync) {
            Some(SyncRole::Master(master)) => Some(master.clone()),
            _ => None,
        }
    }

    /// The slave RPC service, when this participant follows a timing master
    pub fn clock_sync_slave_service(&self) -> Option<Arc<ClockSyncSlaveService>> {
        match self.wiring.lock().as_ref().map(|wiring| &wiring.sync) {
            Some(SyncRole::Slave(service)) => Some(service.clone()),
            _ => None,
        }
    }

    pub fn scheduler(&self) -> Option<Arc<TimerScheduler>> {
        self.wiring
            .lock()
            .as_ref()
            .map(|wiring| wiring.scheduler.clone())
    }

    pub fn add_job(
        &self,
        name: impl Into<String>,
        job: Arc<dyn Job>,
        config: JobConfiguration,
    ) -> Result<()> {
        if self.is_initialized() {
            return Err(Error::InvalidState(format!(
                "participant '{}' is initialized; jobs are added before",
                self.config.name
            )));
        }
        self.job_registry.add_job(name, job, config)
    }

    /// Build the clock sync role and the scheduler from the configuration
    ///
    /// Either everything is wired or nothing is left registered, so a failed
    /// call can be retried.
    pub fn initialize(&self) -> Result<()> {
        let mut wiring = self.wiring.lock();
        if wiring.is_some() {
            return Err(Error::InvalidState(format!(
                "participant '{}' is already initialized",
                self.config.name
            )));
        }

        if let Some(path) = &self.config.timing_configuration {
            let table = TimingConfiguration::from_file(path)?.table_for(&self.config.name);
            self.job_registry
                .configure_jobs_by_timing_configuration(&table)?;
        }

        let main_clock = self.clock_service.main_clock_name();
        let slave_clocks = if self.config.is_timing_master() {
            None
        } else {
            Some(self.register_slave_clocks()?)
        };
        let wired = self.wire(slave_clocks).and_then(|wired| {
            self.services
                .register_service(&self.config.name, wired.sync.service())?;
            Ok(wired)
        });

        match wired {
            Ok(wired) => {
                log::info!(
                    "participant '{}' initialized: main clock '{}', {} job(s)",
                    self.config.name,
                    self.clock_service.main_clock_name(),
                    self.job_registry.len()
                );
                *wiring = Some(wired);
                Ok(())
            }
            Err(e) => {
                self.unwind(&main_clock);
                Err(e)
            }
        }
    }

    fn wire(
        &self,
        slave_clocks: Option<(Arc<DiscreteSlaveClock>, Arc<ContinuousSlaveClock>)>,
    ) -> Result<Wiring> {
        self.clock_service.configure(&self.config.clock)?;
        let sync = match slave_clocks {
            None => self.serve_as_master()?,
            Some((discrete, continuous)) => self.serve_as_slave(discrete, continuous),
        };

        let scheduler = Arc::new(TimerScheduler::from_jobs(
            self.clock_service.clone(),
            &self.job_registry,
            self.logger.clone(),
            self.error_state.clone(),
        )?);
        self.clock_service
            .register_event_sink(downgrade_sink(&scheduler))?;
        Ok(Wiring { sync, scheduler })
    }

    /// Undo a failed `initialize`; sinks go away with their last reference
    fn unwind(&self, main_clock: &str) {
        if !self.config.is_timing_master() {
            let registry = self.clock_service.registry();
            for name in [SLAVE_MASTER_ON_DEMAND_DISCRETE, SLAVE_MASTER_ON_DEMAND] {
                let _ = registry.unregister_clock(name);
            }
        }
        if let Err(e) = self.clock_service.select_main_clock(main_clock) {
            log::warn!(
                "participant '{}' could not restore main clock '{main_clock}': {e}",
                self.config.name
            );
        }
    }

    fn register_slave_clocks(&self) -> Result<(Arc<DiscreteSlaveClock>, Arc<ContinuousSlaveClock>)> {
        let master_name = self.config.sync.timing_master.clone().unwrap_or_default();
        let connection = || {
            MasterConnection::new(
                self.config.name.clone(),
                master_name.clone(),
                self.resolver.clone(),
                self.config.sync.rpc_timeout,
            )
        };
        let discrete = Arc::new(DiscreteSlaveClock::new(connection()));
        let continuous = Arc::new(ContinuousSlaveClock::new(
            connection(),
            self.config.sync.sync_cycle_time,
        )?);

        let registry = self.clock_service.registry();
        registry.register_clock(discrete.clone())?;
        if let Err(e) = registry.register_clock(continuous.clone()) {
            let _ = registry.unregister_clock(SLAVE_MASTER_ON_DEMAND_DISCRETE);
            return Err(e);
        }
        Ok((discrete, continuous))
    }

    fn serve_as_master(&self) -> Result<SyncRole> {
        let master = Arc::new(ClockSyncMaster::new(
            self.clock_service.clone(),
            self.resolver.clone(),
            self.config.sync.rpc_timeout,
            self.logger.clone(),
            self.error_state.clone(),
        ));
        self.clock_service
            .register_event_sink(downgrade_sink(&master))?;
        log::info!("participant '{}' is timing master", self.config.name);
        Ok(SyncRole::Master(master))
    }

    fn serve_as_slave(
        &self,
        discrete: Arc<DiscreteSlaveClock>,
        continuous: Arc<ContinuousSlaveClock>,
    ) -> SyncRole {
        let service = Arc::new(ClockSyncSlaveService::new());
        let main_clock = self.clock_service.main_clock_name();
        let target: Option<Arc<dyn SyncEventTarget>> = match main_clock.as_str() {
            SLAVE_MASTER_ON_DEMAND_DISCRETE => Some(discrete as Arc<dyn SyncEventTarget>),
            SLAVE_MASTER_ON_DEMAND => Some(continuous as Arc<dyn SyncEventTarget>),
            _ => None,
        };
        match target {
            Some(target) => service.attach(target),
            None => log::warn!(
                "participant '{}' follows '{}' but its main clock '{main_clock}' is not a slave clock",
                self.config.name,
                self.config.sync.timing_master.as_deref().unwrap_or_default()
            ),
        }
        SyncRole::Slave(service)
    }

    /// Start the job registry, the scheduler and the clock service, in order
    pub fn start(&self) -> Result<()> {
        let scheduler = self.scheduler().ok_or_else(|| {
            Error::InvalidState(format!(
                "participant '{}' is not initialized",
                self.config.name
            ))
        })?;
        self.lifecycle.start(COMPONENT)?;

        if let Err(e) = self.start_components(&scheduler) {
            log::error!("participant '{}' failed to start: {e}", self.config.name);
            self.lifecycle.stop(COMPONENT)?;
            return Err(e);
        }
        log::info!("participant '{}' started", self.config.name);
        Ok(())
    }

    fn start_components(&self, scheduler: &TimerScheduler) -> Result<()> {
        self.job_registry.start()?;
        if let Err(e) = scheduler.start() {
            self.job_registry.stop()?;
            return Err(e);
        }
        if let Err(e) = self.clock_service.start() {
            scheduler.stop()?;
            self.job_registry.stop()?;
            return Err(e);
        }
        Ok(())
    }

    /// Stop the clock service, the scheduler and the job registry, in order
    pub fn stop(&self) -> Result<()> {
        self.lifecycle.stop(COMPONENT)?;
        let clock_stopped = self.clock_service.stop();
        if let Some(scheduler) = self.scheduler() {
            scheduler.stop()?;
        }
        self.job_registry.stop()?;
        log::info!("participant '{}' stopped", self.config.name);
        clock_stopped
    }

    fn service_name(&self) -> &'static str {
        if self.config.is_timing_master() {
            MASTER_SERVICE
        } else {
            SLAVE_SERVICE
        }
    }
}

impl Drop for Participant {
    fn drop(&mut self) {
        if self.is_running() {
            if let Err(e) = self.stop() {
                log::warn!("participant '{}' stopped with error: {e}", self.config.name);
            }
        }
        if self.is_initialized() {
            let _ = self
                .services
                .unregister_service(&self.config.name, self.service_name());
        }
    }
}
