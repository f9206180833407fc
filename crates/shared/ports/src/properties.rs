use parking_lot::RwLock;
use std::collections::HashMap;
use tempo_core::{Error, Result};

/// Port for the participant's named configuration properties
///
/// Paths are slash separated, e.g. `clock_synchronization/timing_master`.
/// Values are exchanged as text; the typed helpers parse them.
pub trait PropertyStore: Send + Sync {
    fn property(&self, path: &str) -> Option<String>;

    fn set_property(&self, path: &str, value: &str) -> Result<()>;

    fn string_or(&self, path: &str, default: &str) -> String {
        self.property(path).unwrap_or_else(|| default.to_string())
    }

    fn i64_or(&self, path: &str, default: i64) -> Result<i64> {
        match self.property(path) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| {
                Error::InvalidArg(format!("property '{path}' is not an integer: '{value}'"))
            }),
        }
    }

    fn f64_or(&self, path: &str, default: f64) -> Result<f64> {
        match self.property(path) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| {
                Error::InvalidArg(format!("property '{path}' is not a number: '{value}'"))
            }),
        }
    }
}

/// Flat in-memory property store
#[derive(Debug, Default)]
pub struct PropertyMap {
    values: RwLock<HashMap<String, String>>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, path: &str, value: impl ToString) -> Self {
        self.values.write().insert(path.to_string(), value.to_string());
        self
    }
}

impl PropertyStore for PropertyMap {
    fn property(&self, path: &str) -> Option<String> {
        self.values.read().get(path).cloned()
    }

    fn set_property(&self, path: &str, value: &str) -> Result<()> {
        self.values.write().insert(path.to_string(), value.to_string());
        Ok(())
    }
}
