//! Error types for the dialogue orchestrator

use thiserror::Error;

/// Result type alias for dialogue operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a dialogue session
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio capture or playback error (device/stream failure)
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Language model error (quota, network, malformed reply)
    #[error("generation error: {0}")]
    Generation(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Robot platform command error
    #[error("platform error: {0}")]
    Platform(String),

    /// Hint provider error
    #[error("hint error: {0}")]
    Hint(String),

    /// A step exceeded its time budget
    #[error("{step} timed out after {secs}s")]
    Timeout {
        /// Name of the step that stalled
        step: &'static str,
        /// Budget that was exceeded, in seconds
        secs: u64,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
