use crate::config::ClockServiceConfig;
use crate::fanout::EventFanout;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use tempo_clock::{ClockRegistry, LOCAL_SYSTEM_REALTIME, LocalSystemSimClock};
use tempo_core::{Error, Lifecycle, Result, Timestamp};
use tempo_ports::{Clock, ClockType, EventSink, TimeSource};

const COMPONENT: &str = "clock service";

/// Owns the participant's clocks and drives one of them
///
/// The main clock's sink is the service's fan-out, so every registered event
/// sink sees the main clock's events in registration order. The clock registry
/// is frozen while the service runs.
pub struct ClockService {
    registry: ClockRegistry,
    lifecycle: Lifecycle,
    main_clock: RwLock<String>,
    active: Mutex<Option<Arc<dyn Clock>>>,
    fanout: Arc<EventFanout>,
}

impl ClockService {
    /// Service with the built-in clocks, `local_system_realtime` selected
    pub fn new() -> Self {
        let lifecycle = Lifecycle::new();
        Self::with_registry(ClockRegistry::with_builtin_clocks(lifecycle.clone()), lifecycle)
    }

    pub fn with_registry(registry: ClockRegistry, lifecycle: Lifecycle) -> Self {
        Self {
            registry,
            lifecycle,
            main_clock: RwLock::new(LOCAL_SYSTEM_REALTIME.to_string()),
            active: Mutex::new(None),
            fanout: Arc::new(EventFanout::new()),
        }
    }

    pub fn registry(&self) -> &ClockRegistry {
        &self.registry
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Apply a configuration; only allowed while stopped
    pub fn configure(&self, config: &ClockServiceConfig) -> Result<()> {
        self.lifecycle.ensure_stopped("configure")?;
        let simulation = LocalSystemSimClock::new(config.step_size, config.time_factor)?;
        self.registry.replace_simulation_clock(simulation)?;
        self.select_main_clock(&config.main_clock)
    }

    pub fn select_main_clock(&self, name: &str) -> Result<()> {
        self.lifecycle.ensure_stopped("select_main_clock")?;
        if self.registry.find_clock(name).is_none() {
            return Err(Error::NotFound(format!("clock '{name}'")));
        }
        *self.main_clock.write() = name.to_string();
        Ok(())
    }

    pub fn main_clock_name(&self) -> String {
        self.main_clock.read().clone()
    }

    pub fn main_clock_type(&self) -> Result<ClockType> {
        Ok(self.main_clock()?.clock_type())
    }

    /// Start the main clock with the fan-out as its sink
    pub fn start(&self) -> Result<()> {
        self.lifecycle.start(COMPONENT)?;

        let started = self.main_clock().and_then(|clock| {
            let sink: Arc<dyn EventSink> = self.fanout.clone();
            clock.start(Arc::downgrade(&sink))?;
            Ok(clock)
        });
        match started {
            Ok(clock) => {
                log::info!("clock service started on '{}'", clock.name());
                *self.active.lock() = Some(clock);
                Ok(())
            }
            Err(e) => {
                self.lifecycle.stop(COMPONENT)?;
                Err(e)
            }
        }
    }

    pub fn stop(&self) -> Result<()> {
        self.lifecycle.stop(COMPONENT)?;
        let active = self.active.lock().take();
        match active {
            Some(clock) => {
                log::info!("clock service stopping '{}'", clock.name());
                clock.stop()
            }
            None => Ok(()),
        }
    }

    /// Current time of the main clock
    pub fn time(&self) -> Timestamp {
        let active = self.active.lock().clone();
        match active {
            Some(clock) => clock.now(),
            None => self
                .main_clock()
                .map(|clock| clock.now())
                .unwrap_or(Timestamp::ZERO),
        }
    }

    /// Current time of any registered clock
    pub fn time_of(&self, name: &str) -> Result<Timestamp> {
        self.registry
            .find_clock(name)
            .map(|clock| clock.now())
            .ok_or_else(|| Error::NotFound(format!("clock '{name}'")))
    }

    pub fn register_event_sink(&self, sink: Weak<dyn EventSink>) -> Result<()> {
        self.fanout.register(sink)
    }

    pub fn unregister_event_sink(&self, sink: &Weak<dyn EventSink>) -> Result<()> {
        self.fanout.unregister(sink)
    }

    fn main_clock(&self) -> Result<Arc<dyn Clock>> {
        let name = self.main_clock.read().clone();
        self.registry
            .find_clock(&name)
            .ok_or_else(|| Error::NotFound(format!("main clock '{name}'")))
    }
}

impl Default for ClockService {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ClockService {
    fn time(&self) -> Timestamp {
        ClockService::time(self)
    }

    fn clock_type(&self) -> ClockType {
        self.main_clock_type().unwrap_or(ClockType::Continuous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_clock::{DiscreteClock, LOCAL_SYSTEM_SIMTIME};

    #[test]
    fn test_default_main_clock() {
        let service = ClockService::new();
        assert_eq!(service.main_clock_name(), LOCAL_SYSTEM_REALTIME);
        assert_eq!(service.main_clock_type(), Ok(ClockType::Continuous));
    }

    #[test]
    fn test_select_unknown_clock() {
        let service = ClockService::new();
        assert!(matches!(
            service.select_main_clock("missing"),
            Err(Error::NotFound(_))
        ));
        assert_eq!(service.main_clock_name(), LOCAL_SYSTEM_REALTIME);
    }

    #[test]
    fn test_lifecycle_errors() {
        let service = ClockService::new();
        assert!(matches!(service.stop(), Err(Error::InvalidState(_))));

        service.start().unwrap();
        assert!(matches!(service.start(), Err(Error::InvalidState(_))));
        assert!(matches!(
            service.select_main_clock(LOCAL_SYSTEM_SIMTIME),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            service
                .registry()
                .register_clock(Arc::new(DiscreteClock::new("late"))),
            Err(Error::InvalidState(_))
        ));
        service.stop().unwrap();
    }

    #[test]
    fn test_time_of() {
        let service = ClockService::new();
        service
            .registry()
            .register_clock(Arc::new(DiscreteClock::new("stepped")))
            .unwrap();

        assert_eq!(service.time_of("stepped"), Ok(Timestamp::ZERO));
        assert!(matches!(service.time_of("missing"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_start_fails_when_main_clock_was_removed() {
        let service = ClockService::new();
        service
            .registry()
            .register_clock(Arc::new(DiscreteClock::new("stepped")))
            .unwrap();
        service.select_main_clock("stepped").unwrap();
        service.registry().unregister_clock("stepped").unwrap();

        assert!(matches!(service.start(), Err(Error::NotFound(_))));
        assert!(!service.is_running());
    }
}
