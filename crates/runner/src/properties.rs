use crate::config::ConfigError;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tempo_core::{Error, Result};
use tempo_ports::PropertyStore;

/// Property store backed by one JSON document
///
/// A property path walks nested objects, so `clock/main_clock` reads
/// `{"clock": {"main_clock": ...}}`. Strings are returned as-is, other scalars
/// in their JSON spelling; `null` reads as absent.
#[derive(Debug)]
pub struct JsonPropertyStore {
    document: RwLock<Value>,
}

impl JsonPropertyStore {
    pub fn new() -> Self {
        Self {
            document: RwLock::new(Value::Object(Map::new())),
        }
    }

    pub fn from_json(text: &str) -> std::result::Result<Self, ConfigError> {
        let document: Value = serde_json::from_str(text)?;
        if !document.is_object() {
            return Err(ConfigError::NotAnObject);
        }
        Ok(Self {
            document: RwLock::new(document),
        })
    }

    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// The whole document as JSON text
    pub fn to_json(&self) -> String {
        self.document.read().to_string()
    }
}

impl Default for JsonPropertyStore {
    fn default() -> Self {
        Self::new()
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

impl PropertyStore for JsonPropertyStore {
    fn property(&self, path: &str) -> Option<String> {
        let document = self.document.read();
        let mut node = &*document;
        for segment in segments(path) {
            node = node.get(segment)?;
        }
        match node {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }

    fn set_property(&self, path: &str, value: &str) -> Result<()> {
        let segments = segments(path);
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| Error::InvalidArg(format!("empty property path '{path}'")))?;

        let mut document = self.document.write();
        let mut node = &mut *document;
        for segment in parents {
            let object = node.as_object_mut().ok_or_else(|| {
                Error::InvalidArg(format!("property '{path}': '{segment}' is not an object"))
            })?;
            node = object
                .entry(segment.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        let object = node.as_object_mut().ok_or_else(|| {
            Error::InvalidArg(format!("property '{path}': parent is not an object"))
        })?;
        object.insert(last.to_string(), Value::String(value.to_string()));
        Ok(())
    }
}
