//! Configuration management for the dialogue orchestrator

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::conversation::{DEFAULT_MAX_TURNS, MIN_MAX_TURNS};
use crate::phase::{DEFAULT_CONCLUSION_START, DEFAULT_TASK_START, PhaseClock};
use crate::session::{SpeechOutput, TaskVariant};
use crate::{Error, Result};

use file::DialogueConfigFile;

/// Default LLM model
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";

/// Max tokens for responses
const DEFAULT_MAX_TOKENS: u32 = 300;

/// Dialogue orchestrator configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Task variant preselected by env or config file
    pub task: Option<TaskVariant>,

    /// Speech output preselected by env or config file
    pub speech: Option<SpeechOutput>,

    /// Phase thresholds
    pub phases: PhaseClock,

    /// Maximum turns kept in conversation history
    pub history_max_turns: usize,

    /// LLM configuration
    pub llm: LlmConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Per-step time budgets
    pub timeouts: Timeouts,

    /// Robot platform configuration
    pub platform: PlatformConfig,

    /// Shared Sudoku board file written by the puzzle GUI
    pub sudoku_board: PathBuf,
}

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model identifier for chat completions
    pub model: String,

    /// OpenAI-compatible API base URL
    pub base_url: String,

    /// Max tokens per reply
    pub max_tokens: u32,
}

/// STT backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttBackend {
    Whisper,
    Deepgram,
}

/// Cloud TTS backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsBackend {
    OpenAi,
    ElevenLabs,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT backend
    pub stt_provider: SttBackend,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// Cloud TTS backend
    pub tts_provider: TtsBackend,

    /// TTS model (e.g. "tts-1", "eleven_monolingual_v1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,

    /// Upper bound on one recording
    pub max_recording: Duration,

    /// Recordings shorter than this are no input
    pub min_segment: Duration,

    /// Recordings quieter than this RMS level are no input
    pub silence_rms: f32,
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (LLM, Whisper and TTS)
    pub openai: Option<String>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

/// Time budgets for the steps that call external services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub transcription: Duration,
    pub hint: Duration,
    pub generation: Duration,
    pub synthesis: Duration,
    /// Robot commands; audio playback gets this on top of the clip length
    pub platform: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            transcription: Duration::from_secs(30),
            hint: Duration::from_secs(10),
            generation: Duration::from_secs(45),
            synthesis: Duration::from_secs(45),
            platform: Duration::from_secs(10),
        }
    }
}

/// Robot platform configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Speaker volume set on entry (0-100)
    pub volume: u8,

    /// Animation played once setup completes
    pub ready_animation: String,

    /// Animation played during wind-down
    pub closing_animation: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            volume: 45,
            ready_animation: "BlocklyStand".to_string(),
            closing_animation: "BlocklyCrouch".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment, config file and defaults
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn resolve(fc: DialogueConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let task: Option<TaskVariant> = env("DIALOGUE_TASK")
            .or(fc.session.task)
            .map(|s| s.parse())
            .transpose()?;
        let speech: Option<SpeechOutput> = env("DIALOGUE_SPEECH")
            .or(fc.session.speech)
            .map(|s| s.parse())
            .transpose()?;

        let task_start = fc
            .session
            .task_start_secs
            .map_or(Ok(DEFAULT_TASK_START), |s| seconds("session.task_start_secs", s))?;
        let conclusion_start = fc
            .session
            .conclusion_start_secs
            .map_or(Ok(DEFAULT_CONCLUSION_START), |s| {
                seconds("session.conclusion_start_secs", s)
            })?;
        let phases = PhaseClock::new(task_start, conclusion_start)?;

        let history_max_turns = fc.session.history_max_turns.unwrap_or(DEFAULT_MAX_TURNS);
        if history_max_turns < MIN_MAX_TURNS {
            return Err(Error::Config(format!(
                "session.history_max_turns must be at least {MIN_MAX_TURNS}"
            )));
        }

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        let llm = LlmConfig {
            model: env("DIALOGUE_LLM_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("DIALOGUE_LLM_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            max_tokens: fc.llm.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        };

        let stt_provider = match env("DIALOGUE_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("whisper" | "openai") => SttBackend::Whisper,
            Some("deepgram") => SttBackend::Deepgram,
            Some(other) => {
                return Err(Error::Config(format!("unknown STT provider: {other}")));
            }
        };
        let tts_provider = match env("DIALOGUE_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .as_deref()
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            None | Some("openai") => TtsBackend::OpenAi,
            Some("elevenlabs") => TtsBackend::ElevenLabs,
            Some(other) => {
                return Err(Error::Config(format!("unknown TTS provider: {other}")));
            }
        };

        let default_stt_model = match stt_provider {
            SttBackend::Whisper => "whisper-1",
            SttBackend::Deepgram => "nova-2",
        };
        let (default_tts_model, default_tts_voice) = match tts_provider {
            TtsBackend::OpenAi => ("tts-1", "alloy"),
            // ElevenLabs "Rachel"
            TtsBackend::ElevenLabs => ("eleven_monolingual_v1", "21m00Tcm4TlvDq8ikWAM"),
        };

        let tts_speed = fc.voice.tts_speed.unwrap_or(1.0);
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(Error::Config(format!(
                "voice.tts_speed must be between 0.25 and 4.0, got {tts_speed}"
            )));
        }

        let voice = VoiceConfig {
            stt_provider,
            stt_model: env("DIALOGUE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| default_stt_model.to_string()),
            tts_provider,
            tts_model: env("DIALOGUE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_tts_model.to_string()),
            tts_voice: env("DIALOGUE_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| default_tts_voice.to_string()),
            tts_speed,
            max_recording: seconds(
                "voice.max_recording_secs",
                fc.voice.max_recording_secs.unwrap_or(30.0),
            )?,
            min_segment: seconds(
                "voice.min_segment_secs",
                fc.voice.min_segment_secs.unwrap_or(0.3),
            )?,
            silence_rms: fc.voice.silence_rms.unwrap_or(0.005),
        };
        if voice.max_recording.is_zero() {
            return Err(Error::Config(
                "voice.max_recording_secs must be positive".to_string(),
            ));
        }

        let defaults = Timeouts::default();
        let timeouts = Timeouts {
            transcription: fc
                .timeouts
                .transcription_secs
                .map_or(defaults.transcription, Duration::from_secs),
            hint: fc
                .timeouts
                .hint_secs
                .map_or(defaults.hint, Duration::from_secs),
            generation: fc
                .timeouts
                .generation_secs
                .map_or(defaults.generation, Duration::from_secs),
            synthesis: fc
                .timeouts
                .synthesis_secs
                .map_or(defaults.synthesis, Duration::from_secs),
            platform: fc
                .timeouts
                .platform_secs
                .map_or(defaults.platform, Duration::from_secs),
        };

        let platform_defaults = PlatformConfig::default();
        let platform = PlatformConfig {
            volume: fc.platform.volume.unwrap_or(platform_defaults.volume).min(100),
            ready_animation: fc
                .platform
                .ready_animation
                .unwrap_or(platform_defaults.ready_animation),
            closing_animation: fc
                .platform
                .closing_animation
                .unwrap_or(platform_defaults.closing_animation),
        };

        let sudoku_board = env("DIALOGUE_SUDOKU_BOARD")
            .or(fc.hints.board_path)
            .map_or_else(|| PathBuf::from("sudoku_board.txt"), PathBuf::from);

        Ok(Self {
            task,
            speech,
            phases,
            history_max_turns,
            llm,
            voice,
            api_keys,
            timeouts,
            platform,
            sudoku_board,
        })
    }

    /// `OpenAI` API key, required for the default providers
    ///
    /// # Errors
    ///
    /// Returns error if the key is not configured
    pub fn openai_key(&self) -> Result<&str> {
        self.api_keys
            .openai
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config("set OPENAI_API_KEY in your environment".to_string()))
    }
}

/// Convert a non-negative number of seconds into a duration
fn seconds(field: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| Error::Config(format!("{field} must be a non-negative number of seconds")))
}
