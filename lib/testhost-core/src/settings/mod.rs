//! Immutable application settings loaded from a JSON file.
//!
//! The test host factory reads a settings file (by default
//! [`DEFAULT_SETTINGS_FILE`], i.e. `appsettings.json`) once at configuration
//! time and freezes it into a [`Settings`] value: a flat, read-only mapping
//! from dotted hierarchical keys to string values.
//!
//! ```json
//! {
//!   "logging": { "level": "debug" },
//!   "features": ["retries", "metrics"]
//! }
//! ```
//!
//! flattens to:
//!
//! ```text
//! logging.level = "debug"
//! features.0    = "retries"
//! features.1    = "metrics"
//! ```
//!
//! # Example
//!
//! ```rust
//! use testhost_core::Settings;
//!
//! # fn example() -> Result<(), testhost_core::SettingsError> {
//! let settings = Settings::from_json_str(r#"{"database": {"url": "postgres://localhost"}}"#)?;
//! assert_eq!(settings.get("database.url"), Some("postgres://localhost"));
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

mod error;
pub use self::error::SettingsError;

/// Default settings file name, resolved relative to the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "appsettings.json";

/// Separator between hierarchy levels in flattened keys.
const KEY_SEPARATOR: char = '.';

/// An immutable mapping from dotted hierarchical keys to string values.
///
/// Built once from a JSON document and never mutated afterwards. The backing
/// storage is shared, so cloning a `Settings` is cheap and every clone
/// observes the same frozen values.
///
/// Two `Settings` loaded from the same document compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    values: Arc<IndexMap<String, String>>,
}

impl Settings {
    /// Loads settings from a JSON file.
    ///
    /// The document root must be a JSON object. Nested objects and arrays are
    /// flattened into dotted keys; scalar values are stringified and `null`
    /// becomes the empty string.
    ///
    /// # Errors
    ///
    /// - [`SettingsError::Io`] if the file is missing or unreadable
    /// - [`SettingsError::Malformed`] if the content is not valid JSON
    /// - [`SettingsError::RootNotObject`] if the root is not a JSON object
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::parse(&content, &path.display().to_string())?;
        debug!(path = %path.display(), entries = settings.len(), "settings loaded");
        Ok(settings)
    }

    /// Loads settings from an in-memory JSON document.
    ///
    /// Same flattening rules as [`Settings::from_file`]. Mostly useful for
    /// tests and embedded fixtures.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Malformed`] or [`SettingsError::RootNotObject`]
    /// like [`Settings::from_file`]; I/O errors cannot occur.
    pub fn from_json_str(content: &str) -> Result<Self, SettingsError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, path: &str) -> Result<Self, SettingsError> {
        let deserializer = &mut serde_json::Deserializer::from_str(content);
        let root: Value = serde_path_to_error::deserialize(deserializer).map_err(|error| {
            SettingsError::Malformed {
                path: path.to_string(),
                json_path: error.path().to_string(),
                error: error.into_inner(),
            }
        })?;

        let Value::Object(fields) = root else {
            return Err(SettingsError::RootNotObject {
                path: path.to_string(),
            });
        };

        let mut values = IndexMap::new();
        for (key, value) in fields {
            flatten(&key, &value, &mut values);
        }

        Ok(Self {
            values: Arc::new(values),
        })
    }

    /// Returns the value for a flattened key, if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Returns all flattened keys in document order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Iterates over all key/value pairs in document order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Number of flattened entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the settings contain no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn flatten(key: &str, value: &Value, out: &mut IndexMap<String, String>) {
    match value {
        Value::Object(fields) => {
            for (child, value) in fields {
                flatten(&format!("{key}{KEY_SEPARATOR}{child}"), value, out);
            }
        }
        Value::Array(items) => {
            for (index, value) in items.iter().enumerate() {
                flatten(&format!("{key}{KEY_SEPARATOR}{index}"), value, out);
            }
        }
        Value::String(text) => {
            out.insert(key.to_string(), text.clone());
        }
        Value::Null => {
            out.insert(key.to_string(), String::new());
        }
        scalar => {
            out.insert(key.to_string(), scalar.to_string());
        }
    }
}
