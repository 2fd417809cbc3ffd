//! TOML configuration file loading
//!
//! Supports `~/.config/robot-dialogue/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct DialogueConfigFile {
    /// Session defaults (skip the startup menus when set)
    #[serde(default)]
    pub session: SessionFileConfig,

    /// LLM configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Per-step time budgets
    #[serde(default)]
    pub timeouts: TimeoutsFileConfig,

    /// Robot platform settings
    #[serde(default)]
    pub platform: PlatformFileConfig,

    /// Hint provider settings
    #[serde(default)]
    pub hints: HintsFileConfig,
}

/// Session-level configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    /// Task variant ("a"/"sudoku" or "b"/"life-coach")
    pub task: Option<String>,

    /// Speech output ("cloud" or "native")
    pub speech: Option<String>,

    /// Seconds until the task phase starts
    pub task_start_secs: Option<f64>,

    /// Seconds until the conclusion phase starts
    pub conclusion_start_secs: Option<f64>,

    /// Maximum turns kept in conversation history
    pub history_max_turns: Option<usize>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o-mini")
    pub model: Option<String>,

    /// OpenAI-compatible API base URL
    pub base_url: Option<String>,

    /// Max tokens per reply
    pub max_tokens: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,

    /// Upper bound on one recording, in seconds
    pub max_recording_secs: Option<f64>,

    /// Recordings shorter than this are treated as no input, in seconds
    pub min_segment_secs: Option<f64>,

    /// Recordings quieter than this RMS level are treated as no input
    pub silence_rms: Option<f32>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Step timeouts, in seconds
#[derive(Debug, Default, Deserialize)]
pub struct TimeoutsFileConfig {
    pub transcription_secs: Option<u64>,
    pub hint_secs: Option<u64>,
    pub generation_secs: Option<u64>,
    pub synthesis_secs: Option<u64>,
    pub platform_secs: Option<u64>,
}

/// Robot platform configuration
#[derive(Debug, Default, Deserialize)]
pub struct PlatformFileConfig {
    /// Speaker volume set on entry (0-100)
    pub volume: Option<u8>,

    /// Animation played once setup completes
    pub ready_animation: Option<String>,

    /// Animation played during wind-down
    pub closing_animation: Option<String>,
}

/// Hint provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct HintsFileConfig {
    /// Path to the shared Sudoku board file
    pub board_path: Option<String>,
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config(content: &str) -> crate::Result<DialogueConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `DialogueConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> DialogueConfigFile {
    let Some(path) = config_file_path() else {
        return DialogueConfigFile::default();
    };

    if !path.exists() {
        return DialogueConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                DialogueConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            DialogueConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/robot-dialogue/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("robot-dialogue").join("config.toml"))
}
