//! Audio playback to speakers

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::capture::resample;
use super::tts::pcm_to_samples;
use crate::{Error, Result};

/// Plays PCM audio on the default output device
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioPlayback;

impl AudioPlayback {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Play mono 16-bit little-endian PCM, returning once playback ends
    ///
    /// # Errors
    ///
    /// Returns error if no output device is usable or playback fails
    pub async fn play_pcm(&self, pcm: &[u8], sample_rate: u32) -> Result<()> {
        let samples: Vec<f32> = pcm_to_samples(pcm)
            .into_iter()
            .map(|s| f32::from(s) / 32768.0)
            .collect();

        tokio::task::spawn_blocking(move || play_blocking(samples, sample_rate))
            .await
            .map_err(|e| Error::Audio(format!("playback worker failed: {e}")))?
    }
}

/// Play samples on the current thread
fn play_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
    if samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let config = output_config(&device, sample_rate)?;
    let device_rate = config.sample_rate.0;
    let channels = usize::from(config.channels);

    let samples = if device_rate == sample_rate {
        samples
    } else {
        resample(&samples, sample_rate, device_rate)?
    };
    let sample_count = samples.len();

    let (done_tx, done_rx) = std_mpsc::channel::<()>();
    let mut position = 0usize;
    let mut done_tx = Some(done_tx);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = samples.get(position).copied().unwrap_or(0.0);
                    frame.fill(sample);
                    position += 1;
                }
                if position >= samples.len() {
                    if let Some(tx) = done_tx.take() {
                        let _ = tx.send(());
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(device_rate.max(1));
    let _ = done_rx.recv_timeout(Duration::from_millis(duration_ms + 500));

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Pick an output config at the requested rate, else the device default
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let supports_rate = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels
            && c.min_sample_rate() <= SampleRate(sample_rate)
            && c.max_sample_rate() >= SampleRate(sample_rate)
    };

    let configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .collect();

    let exact = configs
        .iter()
        .find(|c| supports_rate(*c, 1))
        .or_else(|| configs.iter().find(|c| supports_rate(*c, 2)));

    if let Some(supported) = exact {
        return Ok(supported.clone().with_sample_rate(SampleRate(sample_rate)).config());
    }

    device
        .default_output_config()
        .map(|c| c.config())
        .map_err(|e| Error::Audio(format!("no suitable output config found: {e}")))
}
