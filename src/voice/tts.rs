//! Text-to-speech (TTS) processing
//!
//! Cloud voices are requested as raw 16-bit little-endian PCM so the bytes
//! can be handed straight to the robot speaker.

use async_trait::async_trait;

use crate::config::{Config, TtsBackend};
use crate::{Error, Result};

/// Sample rate of PCM returned by the cloud TTS backends
pub const TTS_SAMPLE_RATE: u32 = 24000;

/// Synthesized reply audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    /// Mono 16-bit little-endian PCM
    pub pcm: Vec<u8>,
    pub sample_rate: u32,
}

/// Converts reply text to audio
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech>;
}

/// Synthesizes speech via a cloud TTS API
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsBackend,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(api_key: String, voice: String, speed: f32, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider: TtsBackend::OpenAi,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: String, voice_id: String, model: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsBackend::ElevenLabs,
        })
    }

    /// Build the configured TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the backend's API key is missing
    pub fn from_config(config: &Config) -> Result<Self> {
        let voice = &config.voice;
        match voice.tts_provider {
            TtsBackend::OpenAi => Self::new_openai(
                config.openai_key()?.to_string(),
                voice.tts_voice.clone(),
                voice.tts_speed,
                voice.tts_model.clone(),
            ),
            TtsBackend::ElevenLabs => Self::new_elevenlabs(
                config.api_keys.elevenlabs.clone().unwrap_or_default(),
                voice.tts_voice.clone(),
                voice.tts_model.clone(),
            ),
        }
    }

    /// Synthesize using OpenAI TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
            response_format: &'a str,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
            response_format: "pcm",
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }

    /// Synthesize using ElevenLabs TTS
    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}?output_format=pcm_{TTS_SAMPLE_RATE}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech> {
        tracing::debug!(chars = text.len(), provider = ?self.provider, "synthesizing");

        let pcm = match self.provider {
            TtsBackend::OpenAi => self.synthesize_openai(text).await?,
            TtsBackend::ElevenLabs => self.synthesize_elevenlabs(text).await?,
        };

        if pcm.is_empty() {
            return Err(Error::Tts("TTS returned no audio".to_string()));
        }

        Ok(SynthesizedSpeech {
            pcm,
            sample_rate: TTS_SAMPLE_RATE,
        })
    }
}

/// Decode 16-bit little-endian PCM bytes into samples
///
/// A trailing odd byte is ignored.
#[must_use]
pub fn pcm_to_samples(pcm: &[u8]) -> Vec<i16> {
    pcm.chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_keys_rejected() {
        assert!(
            TextToSpeech::new_openai(String::new(), "alloy".into(), 1.0, "tts-1".into()).is_err()
        );
        assert!(
            TextToSpeech::new_elevenlabs(String::new(), "voice".into(), "model".into()).is_err()
        );
    }

    #[test]
    fn test_pcm_decoding() {
        let pcm = [0x01, 0x00, 0xff, 0x7f, 0x00, 0x80, 0x42];
        assert_eq!(pcm_to_samples(&pcm), vec![1, i16::MAX, i16::MIN]);
    }
}
