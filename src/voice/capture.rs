//! Audio capture from microphone
//!
//! One capture produces one [`AudioSegment`]: the microphone is opened on a
//! blocking worker, recorded until the time bound or an early stop, and the
//! result is converted to 22050 Hz mono 16-bit.

use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use crate::control::CaptureStop;
use crate::{Error, Result};

/// Sample rate of captured segments
pub const SAMPLE_RATE: u32 = 22050;

/// A captured utterance, mono 16-bit PCM
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSegment {
    samples: Vec<i16>,
    sample_rate: u32,
}

impl AudioSegment {
    #[must_use]
    pub const fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Convert f32 samples in [-1.0, 1.0] to a 16-bit segment
    #[must_use]
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let samples = samples
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect();
        Self::new(samples, sample_rate)
    }

    #[must_use]
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Length of the recording
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// RMS energy normalised to [0.0, 1.0]
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = self
            .samples
            .iter()
            .map(|&s| {
                let s = f64::from(s) / 32768.0;
                s * s
            })
            .sum();
        (sum_squares / self.samples.len() as f64).sqrt() as f32
    }

    /// Whether the segment is long and loud enough to be worth transcribing
    #[must_use]
    pub fn has_speech(&self, min_duration: Duration, silence_rms: f32) -> bool {
        !self.is_empty() && self.duration() >= min_duration && self.rms() >= silence_rms
    }

    /// Encode as WAV bytes for STT APIs
    ///
    /// # Errors
    ///
    /// Returns error if WAV encoding fails
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut writer =
                hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

            for &sample in &self.samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| Error::Audio(e.to_string()))?;
            }

            writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

/// Source of participant audio
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Record one segment, ending after `max_duration` or when `stop` fires
    async fn capture(&self, max_duration: Duration, stop: &mut CaptureStop) -> Result<AudioSegment>;
}

/// Captures from the default input device
#[derive(Debug, Default, Clone, Copy)]
pub struct Microphone;

impl Microphone {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioSource for Microphone {
    async fn capture(&self, max_duration: Duration, stop: &mut CaptureStop) -> Result<AudioSegment> {
        let (done_tx, done_rx) = std_mpsc::channel::<()>();
        let mut worker = tokio::task::spawn_blocking(move || record(&done_rx, max_duration));

        let joined = tokio::select! {
            res = &mut worker => res,
            () = stop.triggered() => {
                tracing::debug!("recording stopped early");
                let _ = done_tx.send(());
                worker.await
            }
        };

        joined.map_err(|e| Error::Audio(format!("capture worker failed: {e}")))?
    }
}

/// Record on the current thread until `done` fires or `max_duration` passes
fn record(done: &std_mpsc::Receiver<()>, max_duration: Duration) -> Result<AudioSegment> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

    let config = input_config(&device)?;
    let native_rate = config.sample_rate.0;
    let channels = usize::from(config.channels);

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = native_rate,
        channels,
        "recording"
    );

    let buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
    let sink = Arc::clone(&buffer);
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut buf) = sink.lock() {
                    buf.extend_from_slice(data);
                }
            },
            |err| {
                tracing::error!(error = %err, "audio capture error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Returns on early stop, on timeout, or when the caller went away
    let _ = done.recv_timeout(max_duration);
    drop(stream);

    let raw = buffer
        .lock()
        .map(|mut buf| std::mem::take(&mut *buf))
        .unwrap_or_default();
    let mono = downmix(&raw, channels);
    let samples = if native_rate == SAMPLE_RATE {
        mono
    } else {
        resample(&mono, native_rate, SAMPLE_RATE)?
    };

    let segment = AudioSegment::from_f32(&samples, SAMPLE_RATE);
    tracing::debug!(
        duration_secs = segment.duration().as_secs_f64(),
        rms = segment.rms(),
        "recording finished"
    );
    Ok(segment)
}

/// Pick an input config: mono at the target rate if offered, else the device default
fn input_config(device: &Device) -> Result<StreamConfig> {
    let exact = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        });

    if let Some(supported) = exact {
        return Ok(supported.with_sample_rate(SampleRate(SAMPLE_RATE)).config());
    }

    device
        .default_input_config()
        .map(|c| c.config())
        .map_err(|e| Error::Audio(format!("no suitable audio config found: {e}")))
}

/// Average interleaved channels into mono
#[allow(clippy::cast_precision_loss)]
pub fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio using rubato
///
/// The final partial chunk is zero-padded and the output trimmed to the
/// expected length.
///
/// # Errors
///
/// Returns error if the resampler cannot be built or fails
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{FftFixedIn, Resampler};

    if samples.is_empty() || from_rate == to_rate {
        return Ok(samples.to_vec());
    }

    let chunk_size = 1024;
    let sub_chunks = 2;

    let mut resampler =
        FftFixedIn::<f64>::new(from_rate as usize, to_rate as usize, chunk_size, sub_chunks, 1)
            .map_err(|e| Error::Audio(format!("resampler init failed: {e}")))?;

    let frames = resampler.input_frames_next();
    let input: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let expected =
        (samples.len() as f64 * f64::from(to_rate) / f64::from(from_rate)).round() as usize;
    let mut output = Vec::with_capacity(expected + frames);

    for chunk in input.chunks(frames) {
        let mut block = chunk.to_vec();
        block.resize(frames, 0.0);
        let result = resampler
            .process(&[block], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
    }

    // Flush the resampler's internal delay with silence
    let mut flushes = 0;
    while output.len() < expected && flushes < 8 {
        let result = resampler
            .process(&[vec![0.0; frames]], None)
            .map_err(|e| Error::Audio(format!("resample failed: {e}")))?;
        output.extend_from_slice(&result[0]);
        flushes += 1;
    }
    output.truncate(expected);

    Ok(output.iter().map(|&s| s as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn sine(frequency: f32, secs: f32, amplitude: f32) -> Vec<f32> {
        let n = (SAMPLE_RATE as f32 * secs) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_duration_and_rms() {
        let segment = AudioSegment::from_f32(&sine(440.0, 1.0, 0.5), SAMPLE_RATE);

        assert_eq!(segment.samples().len(), SAMPLE_RATE as usize);
        assert!((segment.duration().as_secs_f64() - 1.0).abs() < 1e-6);
        // RMS of a sine is amplitude / sqrt(2)
        assert!((segment.rms() - 0.353_55).abs() < 0.01);
    }

    #[test]
    fn test_silence_and_short_segments_have_no_speech() {
        let min = Duration::from_millis(300);

        let silence = AudioSegment::new(vec![0; SAMPLE_RATE as usize], SAMPLE_RATE);
        assert!(!silence.has_speech(min, 0.005));

        let blip = AudioSegment::from_f32(&sine(440.0, 0.1, 0.5), SAMPLE_RATE);
        assert!(!blip.has_speech(min, 0.005));

        let empty = AudioSegment::new(Vec::new(), SAMPLE_RATE);
        assert!(!empty.has_speech(Duration::ZERO, 0.0));

        let speech = AudioSegment::from_f32(&sine(220.0, 0.5, 0.3), SAMPLE_RATE);
        assert!(speech.has_speech(min, 0.005));
    }

    #[test]
    fn test_wav_header() {
        let segment = AudioSegment::from_f32(&sine(440.0, 0.1, 0.5), SAMPLE_RATE);
        let wav = segment.to_wav().unwrap();

        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, SAMPLE_RATE);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, segment.samples().len());
    }

    #[test]
    fn test_f32_conversion_clamps() {
        let segment = AudioSegment::from_f32(&[2.0, -2.0, 0.0], SAMPLE_RATE);
        assert_eq!(segment.samples(), &[32767, -32768, 0]);
    }

    #[test]
    fn test_downmix_stereo() {
        assert_eq!(downmix(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix(&[0.1, 0.2], 1), vec![0.1, 0.2]);
    }

    #[test]
    fn test_resample_length() {
        let input = vec![0.0_f32; 48_000];
        let output = resample(&input, 48_000, SAMPLE_RATE).unwrap();
        assert_eq!(output.len(), SAMPLE_RATE as usize);
    }
}
