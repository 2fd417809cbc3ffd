//! Voice processing module
//!
//! Handles audio capture, transcription, synthesis and local playback.

mod capture;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioSegment, AudioSource, Microphone, SAMPLE_RATE, downmix, resample};
pub use playback::AudioPlayback;
pub use stt::{SpeechToText, Transcriber};
pub use tts::{SpeechSynthesizer, SynthesizedSpeech, TTS_SAMPLE_RATE, TextToSpeech, pcm_to_samples};
