//! Robot platform session
//!
//! The orchestrator drives the robot through a handful of coarse commands:
//! a ready pose on entry, speech on every reply, a closing pose on exit.
//! How the commands reach the robot is up to the implementation.

use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;

use crate::Result;
use crate::voice::AudioPlayback;

/// Robot control commands used by a session
#[async_trait]
pub trait Platform: Send + Sync {
    /// Play a named animation, returning when it has started
    async fn play_animation(&self, name: &str) -> Result<()>;

    /// Set speaker volume (0-100)
    async fn set_volume(&self, level: u8) -> Result<()>;

    /// Speak with the robot's built-in voice and gestures
    async fn say_animated(&self, text: &str) -> Result<()>;

    /// Play 16-bit mono PCM through the robot speaker
    async fn play_audio(&self, pcm: &[u8], sample_rate: u32) -> Result<()>;

    /// Release the robot session
    async fn leave(&self) -> Result<()>;
}

/// Desktop stand-in for the robot
///
/// Animations and volume are only logged, audio goes to the default output
/// device and native speech is printed.
#[derive(Debug)]
pub struct LocalPlatform {
    playback: AudioPlayback,
    volume: AtomicU8,
}

impl Default for LocalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            playback: AudioPlayback::new(),
            volume: AtomicU8::new(100),
        }
    }

    /// Last volume set
    #[must_use]
    pub fn volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Platform for LocalPlatform {
    async fn play_animation(&self, name: &str) -> Result<()> {
        tracing::info!(animation = %name, "playing animation");
        Ok(())
    }

    async fn set_volume(&self, level: u8) -> Result<()> {
        let level = level.min(100);
        self.volume.store(level, Ordering::Relaxed);
        tracing::info!(volume = level, "volume set");
        Ok(())
    }

    async fn say_animated(&self, text: &str) -> Result<()> {
        println!("Robot: {text}");
        Ok(())
    }

    async fn play_audio(&self, pcm: &[u8], sample_rate: u32) -> Result<()> {
        tracing::debug!(bytes = pcm.len(), sample_rate, "playing audio");
        self.playback.play_pcm(pcm, sample_rate).await
    }

    async fn leave(&self) -> Result<()> {
        tracing::info!("leaving robot session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_volume_is_clamped() {
        let platform = LocalPlatform::new();
        platform.set_volume(45).await.unwrap();
        assert_eq!(platform.volume(), 45);

        platform.set_volume(250).await.unwrap();
        assert_eq!(platform.volume(), 100);
    }

    #[tokio::test]
    async fn test_empty_audio_is_noop() {
        let platform = LocalPlatform::new();
        platform.play_audio(&[], 24000).await.unwrap();
    }
}
