use thiserror::Error;

/// Application-level errors using thiserror for structured error handling.
///
/// Audio errors split into the fatal kind (`AudioUnavailable`,
/// `NoBuffersLoaded`), which `initialize()` propagates, and the per-asset and
/// per-playback kinds, which are logged and recovered where they happen.

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Audio output is unavailable")]
    AudioUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to load sound asset: {asset}")]
    AssetLoadFailure {
        asset: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Timed out loading sound asset {asset} after {timeout_ms}ms")]
    AssetLoadTimeout { asset: String, timeout_ms: u64 },

    #[error("Failed to decode audio data")]
    DecodeFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Invalid audio format: {0}")]
    InvalidFormat(String),

    #[error("No sound buffers could be loaded ({failed} assets failed)")]
    NoBuffersLoaded { failed: usize },

    #[error("Audio playback failed: {0}")]
    PlaybackFailure(String),
}

impl AudioError {
    /// Whether this error must abort engine initialization
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AudioError::AudioUnavailable(_) | AudioError::NoBuffersLoaded { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine the user configuration directory")]
    NoConfigDirectory,
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),

    #[error("Missing argument for {0}")]
    MissingArgument(&'static str),

    #[error("Invalid volume: {0}")]
    InvalidVolume(String),

    #[error("Invalid settings JSON")]
    InvalidJson(#[from] serde_json::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Settings update must be a JSON object")]
    NotAnObject,

    #[error("Failed to read settings from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write settings to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display() {
        let err = AudioError::InvalidFormat("unknown".to_string());
        assert_eq!(err.to_string(), "Invalid audio format: unknown");

        let err = AudioError::NoBuffersLoaded { failed: 8 };
        assert_eq!(err.to_string(), "No sound buffers could be loaded (8 assets failed)");

        let err = AudioError::AssetLoadTimeout {
            asset: "press/space.wav".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "Timed out loading sound asset press/space.wav after 5000ms"
        );
    }

    #[test]
    fn test_error_source_chain() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = AudioError::AssetLoadFailure {
            asset: "press/enter.wav".to_string(),
            source: Box::new(io_err),
        };

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Failed to load sound asset: press/enter.wav");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(AudioError::AudioUnavailable("no device".into()).is_fatal());
        assert!(AudioError::NoBuffersLoaded { failed: 1 }.is_fatal());
        assert!(!AudioError::PlaybackFailure("suspended".to_string()).is_fatal());
        assert!(!AudioError::InvalidFormat("x".to_string()).is_fatal());
    }
}
