//! Error types for settings loading.

/// Errors raised while loading the settings file.
///
/// All variants surface synchronously from [`Settings::from_file`] or
/// [`Settings::from_json_str`]; the factory performs no retry or recovery.
///
/// [`Settings::from_file`]: super::Settings::from_file
/// [`Settings::from_json_str`]: super::Settings::from_json_str
#[derive(Debug, derive_more::Error, derive_more::Display)]
pub enum SettingsError {
    /// The settings file is missing or unreadable.
    #[display("Cannot read settings file '{path}': {source}")]
    Io {
        /// Path of the settings file.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid JSON.
    ///
    /// `json_path` points at the element inside the document where parsing
    /// failed, e.g. `logging.level`.
    #[display("Malformed settings file '{path}' at '{json_path}': {error}")]
    Malformed {
        /// Path of the settings file.
        path: String,
        /// JSON path of the offending element.
        json_path: String,
        /// The underlying parse error.
        error: serde_json::Error,
    },

    /// The document parses but its root is not a JSON object.
    #[display("Settings file '{path}' must contain a JSON object at the root")]
    RootNotObject {
        /// Path of the settings file.
        path: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<SettingsError>();
        assert_sync::<SettingsError>();
    }

    #[test]
    fn test_root_not_object_display() {
        let error = SettingsError::RootNotObject {
            path: "appsettings.json".to_string(),
        };
        assert_eq!(
            format!("{error}"),
            "Settings file 'appsettings.json' must contain a JSON object at the root"
        );
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let error = SettingsError::Io {
            path: "appsettings.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        let rendered = format!("{error}");
        assert!(rendered.contains("appsettings.json"));
        assert!(rendered.contains("not found"));
    }
}
