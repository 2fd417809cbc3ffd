//! Per-session settings chosen by the operator at startup

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::Error;

/// Task the robot performs with the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum TaskVariant {
    /// Help the participant solve a Sudoku puzzle
    #[value(name = "a", alias = "sudoku")]
    Sudoku,
    /// Act as a life coach
    #[value(name = "b", alias = "life-coach")]
    LifeCoach,
}

impl TaskVariant {
    /// Whether the task phase needs situational grounding from a hint provider
    #[must_use]
    pub const fn needs_hint(self) -> bool {
        matches!(self, Self::Sudoku)
    }
}

impl fmt::Display for TaskVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sudoku => write!(f, "sudoku"),
            Self::LifeCoach => write!(f, "life coach"),
        }
    }
}

impl FromStr for TaskVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "sudoku" => Ok(Self::Sudoku),
            "b" | "life-coach" | "lifecoach" | "coach" => Ok(Self::LifeCoach),
            other => Err(Error::Config(format!("unknown task variant: {other}"))),
        }
    }
}

/// How replies are voiced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum SpeechOutput {
    /// Cloud TTS voice, played through the robot speaker
    Cloud,
    /// The robot's built-in animated speech
    Native,
}

impl fmt::Display for SpeechOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cloud => write!(f, "cloud"),
            Self::Native => write!(f, "native"),
        }
    }
}

impl FromStr for SpeechOutput {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cloud" | "1" => Ok(Self::Cloud),
            "native" | "robot" | "2" => Ok(Self::Native),
            other => Err(Error::Config(format!("unknown speech output: {other}"))),
        }
    }
}

/// Immutable settings for one session
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    task: TaskVariant,
    speech: SpeechOutput,
    started_at: DateTime<Utc>,
}

impl SessionConfig {
    /// Fix the session settings, stamping the start time now
    #[must_use]
    pub fn new(task: TaskVariant, speech: SpeechOutput) -> Self {
        Self {
            task,
            speech,
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub const fn task(&self) -> TaskVariant {
        self.task
    }

    #[must_use]
    pub const fn speech(&self) -> SpeechOutput {
        self.speech
    }

    /// Wall-clock session start, used for logs
    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_variant_parsing() {
        assert_eq!("A".parse::<TaskVariant>().unwrap(), TaskVariant::Sudoku);
        assert_eq!(" b ".parse::<TaskVariant>().unwrap(), TaskVariant::LifeCoach);
        assert_eq!("sudoku".parse::<TaskVariant>().unwrap(), TaskVariant::Sudoku);
        assert!("c".parse::<TaskVariant>().is_err());
    }

    #[test]
    fn test_speech_output_parsing() {
        assert_eq!("1".parse::<SpeechOutput>().unwrap(), SpeechOutput::Cloud);
        assert_eq!("Native".parse::<SpeechOutput>().unwrap(), SpeechOutput::Native);
        assert!("loud".parse::<SpeechOutput>().is_err());
    }

    #[test]
    fn test_only_sudoku_needs_hints() {
        assert!(TaskVariant::Sudoku.needs_hint());
        assert!(!TaskVariant::LifeCoach.needs_hint());
    }

    #[test]
    fn test_session_config_is_fixed() {
        let session = SessionConfig::new(TaskVariant::LifeCoach, SpeechOutput::Native);
        assert_eq!(session.task(), TaskVariant::LifeCoach);
        assert_eq!(session.speech(), SpeechOutput::Native);
        assert!(Utc::now() >= session.started_at());
    }
}
