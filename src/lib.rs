//! Robot Dialogue - time-phased spoken conversations with a social robot
//!
//! This library provides the pieces of a scripted human-robot dialogue
//! session:
//! - Phase clock (introduction, task, conclusion by elapsed time)
//! - Conversation history and prompt assembly per task and phase
//! - Voice I/O (microphone capture, STT, TTS, playback)
//! - Turn orchestrator that ties them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Operator                         │
//! │      task / speech menus  │  quit  │  stop rec       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                Turn Orchestrator                     │
//! │   Phase Clock  │  History  │  Prompts  │  Hints     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                  Collaborators                       │
//! │   Capture  │  STT  │  LLM  │  TTS  │  Platform      │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod control;
pub mod conversation;
pub mod error;
pub mod hint;
pub mod llm;
pub mod orchestrator;
pub mod phase;
pub mod platform;
pub mod prompt;
pub mod session;
pub mod setup;
pub mod voice;

pub use config::Config;
pub use control::SessionControl;
pub use conversation::{ConversationHistory, Role, Turn};
pub use error::{Error, Result};
pub use orchestrator::{Collaborators, CycleOutcome, Orchestrator, SessionReport, TurnState};
pub use phase::{Phase, PhaseClock};
pub use session::{SessionConfig, SpeechOutput, TaskVariant};
