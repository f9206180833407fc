use crate::simulation::LocalSystemSimClock;
use crate::system::{LOCAL_SYSTEM_REALTIME, LOCAL_SYSTEM_SIMTIME, LocalSystemRealtimeClock};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tempo_core::{Error, Lifecycle, Result};
use tempo_ports::Clock;

/// Named clocks of one participant, in registration order
///
/// Mutation is only allowed while the owning clock service is stopped; the
/// service shares its [`Lifecycle`] with the registry.
pub struct ClockRegistry {
    clocks: RwLock<IndexMap<String, Arc<dyn Clock>>>,
    builtin: Vec<String>,
    lifecycle: Lifecycle,
}

impl ClockRegistry {
    /// Empty registry without built-in clocks
    pub fn new(lifecycle: Lifecycle) -> Self {
        Self {
            clocks: RwLock::new(IndexMap::new()),
            builtin: Vec::new(),
            lifecycle,
        }
    }

    /// Registry pre-populated with `local_system_realtime` and `local_system_simtime`
    pub fn with_builtin_clocks(lifecycle: Lifecycle) -> Self {
        let realtime: Arc<dyn Clock> = Arc::new(LocalSystemRealtimeClock::local());
        let simtime: Arc<dyn Clock> = Arc::new(LocalSystemSimClock::default());

        let mut clocks = IndexMap::new();
        clocks.insert(LOCAL_SYSTEM_REALTIME.to_string(), realtime);
        clocks.insert(LOCAL_SYSTEM_SIMTIME.to_string(), simtime);

        Self {
            clocks: RwLock::new(clocks),
            builtin: vec![
                LOCAL_SYSTEM_REALTIME.to_string(),
                LOCAL_SYSTEM_SIMTIME.to_string(),
            ],
            lifecycle,
        }
    }

    pub fn register_clock(&self, clock: Arc<dyn Clock>) -> Result<()> {
        let mut clocks = self.clocks.write();
        self.lifecycle.ensure_stopped("register_clock")?;

        let name = clock.name().to_string();
        if clocks.contains_key(&name) {
            return Err(Error::ResourceInUse(format!(
                "clock '{name}' already exists"
            )));
        }
        log::debug!("registered clock '{name}'");
        clocks.insert(name, clock);
        Ok(())
    }

    pub fn unregister_clock(&self, name: &str) -> Result<()> {
        let mut clocks = self.clocks.write();
        self.lifecycle.ensure_stopped("unregister_clock")?;

        if self.is_builtin(name) {
            return Err(Error::InvalidArg(format!(
                "built-in clock '{name}' cannot be unregistered"
            )));
        }
        clocks
            .shift_remove(name)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("clock '{name}'")))
    }

    /// Swap the built-in simulation clock for one with different stepping
    pub fn replace_simulation_clock(&self, clock: LocalSystemSimClock) -> Result<()> {
        let mut clocks = self.clocks.write();
        self.lifecycle.ensure_stopped("replace_simulation_clock")?;

        let slot = clocks
            .get_mut(LOCAL_SYSTEM_SIMTIME)
            .ok_or_else(|| Error::NotFound(format!("clock '{LOCAL_SYSTEM_SIMTIME}'")))?;
        *slot = Arc::new(clock);
        Ok(())
    }

    pub fn find_clock(&self, name: &str) -> Option<Arc<dyn Clock>> {
        self.clocks.read().get(name).cloned()
    }

    pub fn clock_names(&self) -> Vec<String> {
        self.clocks.read().keys().cloned().collect()
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtin.iter().any(|builtin| builtin == name)
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiscreteClock;
    use tempo_core::Duration;

    fn registry() -> ClockRegistry {
        ClockRegistry::with_builtin_clocks(Lifecycle::new())
    }

    #[test]
    fn test_builtins_come_first() {
        let registry = registry();
        registry
            .register_clock(Arc::new(DiscreteClock::new("custom")))
            .unwrap();

        assert_eq!(
            registry.clock_names(),
            vec![LOCAL_SYSTEM_REALTIME, LOCAL_SYSTEM_SIMTIME, "custom"]
        );
    }

    #[test]
    fn test_duplicate_registration() {
        let registry = registry();
        let result = registry.register_clock(Arc::new(DiscreteClock::new(LOCAL_SYSTEM_REALTIME)));
        assert!(matches!(result, Err(Error::ResourceInUse(_))));
        assert_eq!(registry.clock_names().len(), 2);
    }

    #[test]
    fn test_unregister() {
        let registry = registry();
        registry
            .register_clock(Arc::new(DiscreteClock::new("custom")))
            .unwrap();

        registry.unregister_clock("custom").unwrap();
        assert!(registry.find_clock("custom").is_none());
        assert!(matches!(
            registry.unregister_clock("custom"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            registry.unregister_clock(LOCAL_SYSTEM_SIMTIME),
            Err(Error::InvalidArg(_))
        ));
    }

    #[test]
    fn test_frozen_while_running() {
        let lifecycle = Lifecycle::new();
        let registry = ClockRegistry::with_builtin_clocks(lifecycle.clone());
        registry
            .register_clock(Arc::new(DiscreteClock::new("custom")))
            .unwrap();
        lifecycle.start("clock service").unwrap();

        assert!(matches!(
            registry.register_clock(Arc::new(DiscreteClock::new("other"))),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            registry.unregister_clock("custom"),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            registry.replace_simulation_clock(LocalSystemSimClock::default()),
            Err(Error::InvalidState(_))
        ));

        lifecycle.stop("clock service").unwrap();
        registry.unregister_clock("custom").unwrap();
    }

    #[test]
    fn test_replace_simulation_clock_keeps_position() {
        let registry = registry();
        let clock = LocalSystemSimClock::new(Duration::from_millis(5), 0.0).unwrap();
        registry.replace_simulation_clock(clock).unwrap();

        assert_eq!(
            registry.clock_names(),
            vec![LOCAL_SYSTEM_REALTIME, LOCAL_SYSTEM_SIMTIME]
        );
        assert!(registry.find_clock(LOCAL_SYSTEM_SIMTIME).is_some());
    }

    #[test]
    fn test_empty_registry_has_no_builtins() {
        let registry = ClockRegistry::new(Lifecycle::new());
        assert!(registry.clock_names().is_empty());
        assert!(!registry.is_builtin(LOCAL_SYSTEM_REALTIME));
        assert!(matches!(
            registry.replace_simulation_clock(LocalSystemSimClock::default()),
            Err(Error::NotFound(_))
        ));
    }
}
