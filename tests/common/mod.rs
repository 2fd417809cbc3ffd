//! Shared test utilities
//!
//! Scripted stand-ins for every collaborator the orchestrator talks to, so
//! sessions can run without audio hardware or network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use robot_dialogue::control::CaptureStop;
use robot_dialogue::hint::HintProvider;
use robot_dialogue::llm::Responder;
use robot_dialogue::orchestrator::OrchestratorSettings;
use robot_dialogue::phase::SessionClock;
use robot_dialogue::platform::Platform;
use robot_dialogue::prompt::ChatMessage;
use robot_dialogue::voice::{
    AudioSegment, AudioSource, SAMPLE_RATE, SpeechSynthesizer, SynthesizedSpeech, Transcriber,
};
use robot_dialogue::{
    Collaborators, Error, Orchestrator, Result, SessionConfig, SessionControl, SpeechOutput,
    TaskVariant,
};

/// Half a second of loud audio
#[must_use]
pub fn speech_segment() -> AudioSegment {
    AudioSegment::new(vec![8000; SAMPLE_RATE as usize / 2], SAMPLE_RATE)
}

/// Half a second of silence
#[must_use]
pub fn silent_segment() -> AudioSegment {
    AudioSegment::new(vec![0; SAMPLE_RATE as usize / 2], SAMPLE_RATE)
}

/// Audio source that plays back a script, then quits the session
pub struct ScriptedAudio {
    script: Mutex<VecDeque<AudioSegment>>,
    control: SessionControl,
    captures: AtomicUsize,
}

impl ScriptedAudio {
    pub fn new(script: Vec<AudioSegment>, control: SessionControl) -> Self {
        Self {
            script: Mutex::new(script.into()),
            control,
            captures: AtomicUsize::new(0),
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for ScriptedAudio {
    async fn capture(&self, _max: Duration, _stop: &mut CaptureStop) -> Result<AudioSegment> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().await.pop_front() {
            Some(segment) => Ok(segment),
            None => {
                self.control.quit();
                Ok(AudioSegment::new(Vec::new(), SAMPLE_RATE))
            }
        }
    }
}

/// Audio source that records until stopped
pub struct WaitingAudio {
    captures: AtomicUsize,
}

impl WaitingAudio {
    pub fn new() -> Self {
        Self {
            captures: AtomicUsize::new(0),
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for WaitingAudio {
    async fn capture(&self, _max: Duration, stop: &mut CaptureStop) -> Result<AudioSegment> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        stop.triggered().await;
        Ok(speech_segment())
    }
}

/// Audio source whose device is gone
pub struct BrokenAudio {
    captures: AtomicUsize,
}

impl BrokenAudio {
    pub fn new() -> Self {
        Self {
            captures: AtomicUsize::new(0),
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioSource for BrokenAudio {
    async fn capture(&self, _max: Duration, _stop: &mut CaptureStop) -> Result<AudioSegment> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        Err(Error::Audio("no input device available".to_string()))
    }
}

/// Transcriber returning queued transcripts, then empty strings
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(script: &[&str]) -> Self {
        Self {
            script: Mutex::new(script.iter().map(ToString::to_string).collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _segment: &AudioSegment) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.script.lock().await.pop_front().unwrap_or_default())
    }
}

/// Responder that records every request
///
/// Replies "reply N" for the Nth call; calls listed in `fail_on` (1-based)
/// return a generation error instead.
pub struct MockResponder {
    requests: Mutex<Vec<Vec<ChatMessage>>>,
    fail_on: Vec<usize>,
    quit_on: Option<(usize, SessionControl)>,
}

impl MockResponder {
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            fail_on: Vec::new(),
            quit_on: None,
        }
    }

    pub fn failing_on(calls: &[usize]) -> Self {
        Self {
            fail_on: calls.to_vec(),
            ..Self::new()
        }
    }

    /// Request quit while answering the given call
    pub fn quitting_on(call: usize, control: SessionControl) -> Self {
        Self {
            quit_on: Some((call, control)),
            ..Self::new()
        }
    }

    pub async fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().await.clone()
    }

    pub async fn calls(&self) -> usize {
        self.requests.lock().await.len()
    }
}

#[async_trait]
impl Responder for MockResponder {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let call = {
            let mut requests = self.requests.lock().await;
            requests.push(messages.to_vec());
            requests.len()
        };

        if let Some((quit_call, control)) = &self.quit_on {
            if *quit_call == call {
                control.quit();
            }
        }
        if self.fail_on.contains(&call) {
            return Err(Error::Generation("quota exceeded".to_string()));
        }
        Ok(format!("reply {call}"))
    }
}

/// Synthesizer that either succeeds with a short tone or fails
pub struct MockSynthesizer {
    fail: bool,
    stall: bool,
    calls: AtomicUsize,
}

impl MockSynthesizer {
    pub fn working() -> Self {
        Self {
            fail: false,
            stall: false,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::working()
        }
    }

    pub fn stalling() -> Self {
        Self {
            stall: true,
            ..Self::working()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<SynthesizedSpeech> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stall {
            std::future::pending::<()>().await;
        }
        if self.fail {
            return Err(Error::Tts("vendor unavailable".to_string()));
        }
        Ok(SynthesizedSpeech {
            pcm: vec![0; 480],
            sample_rate: 24000,
        })
    }
}

/// Hint provider with a fixed answer
pub struct FixedHints {
    text: String,
    calls: AtomicUsize,
}

impl FixedHints {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HintProvider for FixedHints {
    async fn hint(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// A platform command as seen by [`RecordingPlatform`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    Animation(String),
    Volume(u8),
    Say(String),
    Audio { bytes: usize, sample_rate: u32 },
    Leave,
}

/// Platform that records every command
///
/// Commands are recorded before any configured failure or stall.
pub struct RecordingPlatform {
    events: Mutex<Vec<PlatformEvent>>,
    fail_say: bool,
    stall_audio: bool,
    stall_commands: bool,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_say: false,
            stall_audio: false,
            stall_commands: false,
        }
    }

    pub fn mute() -> Self {
        Self {
            fail_say: true,
            ..Self::new()
        }
    }

    /// Audio playback never finishes
    pub fn stuck_speaker() -> Self {
        Self {
            stall_audio: true,
            ..Self::new()
        }
    }

    /// Volume, animation and leave commands never finish
    pub fn stuck_motors() -> Self {
        Self {
            stall_commands: true,
            ..Self::new()
        }
    }

    async fn record(&self, event: PlatformEvent, stall: bool) {
        self.events.lock().await.push(event);
        if stall {
            std::future::pending::<()>().await;
        }
    }

    pub async fn events(&self) -> Vec<PlatformEvent> {
        self.events.lock().await.clone()
    }

    pub async fn spoken(&self) -> Vec<String> {
        self.events()
            .await
            .into_iter()
            .filter_map(|e| match e {
                PlatformEvent::Say(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub async fn audio_plays(&self) -> usize {
        self.events()
            .await
            .iter()
            .filter(|e| matches!(e, PlatformEvent::Audio { .. }))
            .count()
    }
}

#[async_trait]
impl Platform for RecordingPlatform {
    async fn play_animation(&self, name: &str) -> Result<()> {
        self.record(PlatformEvent::Animation(name.to_string()), self.stall_commands)
            .await;
        Ok(())
    }

    async fn set_volume(&self, level: u8) -> Result<()> {
        self.record(PlatformEvent::Volume(level), self.stall_commands)
            .await;
        Ok(())
    }

    async fn say_animated(&self, text: &str) -> Result<()> {
        self.events
            .lock()
            .await
            .push(PlatformEvent::Say(text.to_string()));
        if self.fail_say {
            return Err(Error::Platform("robot connection lost".to_string()));
        }
        Ok(())
    }

    async fn play_audio(&self, pcm: &[u8], sample_rate: u32) -> Result<()> {
        let event = PlatformEvent::Audio {
            bytes: pcm.len(),
            sample_rate,
        };
        self.record(event, self.stall_audio).await;
        Ok(())
    }

    async fn leave(&self) -> Result<()> {
        self.record(PlatformEvent::Leave, self.stall_commands).await;
        Ok(())
    }
}

/// Session clock set by hand
pub struct ManualClock {
    millis: AtomicU64,
}

impl ManualClock {
    pub fn at(elapsed: Duration) -> Self {
        let clock = Self {
            millis: AtomicU64::new(0),
        };
        clock.set(elapsed);
        clock
    }

    pub fn set(&self, elapsed: Duration) {
        let millis = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl SessionClock for ManualClock {
    fn elapsed(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::SeqCst))
    }
}

/// Settings tuned for fast tests
#[must_use]
pub fn test_settings() -> OrchestratorSettings {
    OrchestratorSettings {
        min_segment: Duration::from_millis(100),
        silence_rms: 0.01,
        ..OrchestratorSettings::default()
    }
}

/// One session's worth of mocks
pub struct Rig {
    pub control: SessionControl,
    pub clock: Arc<ManualClock>,
    pub audio: Arc<ScriptedAudio>,
    pub transcriber: Arc<ScriptedTranscriber>,
    pub responder: Arc<MockResponder>,
    pub synthesizer: Arc<MockSynthesizer>,
    pub hints: Arc<FixedHints>,
    pub platform: Arc<RecordingPlatform>,
}

impl Rig {
    /// Rig where every capture yields speech and the transcriber says `utterances`
    pub fn new(utterances: &[&str]) -> Self {
        let control = SessionControl::new();
        let script = utterances.iter().map(|_| speech_segment()).collect();
        Self {
            audio: Arc::new(ScriptedAudio::new(script, control.clone())),
            control,
            clock: Arc::new(ManualClock::at(Duration::ZERO)),
            transcriber: Arc::new(ScriptedTranscriber::new(utterances)),
            responder: Arc::new(MockResponder::new()),
            synthesizer: Arc::new(MockSynthesizer::working()),
            hints: Arc::new(FixedHints::new("Place 4 at row 1, column 3.")),
            platform: Arc::new(RecordingPlatform::new()),
        }
    }

    #[must_use]
    pub fn at(self, elapsed: Duration) -> Self {
        self.clock.set(elapsed);
        self
    }

    #[must_use]
    pub fn with_audio(mut self, script: Vec<AudioSegment>) -> Self {
        self.audio = Arc::new(ScriptedAudio::new(script, self.control.clone()));
        self
    }

    #[must_use]
    pub fn with_responder(mut self, responder: MockResponder) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    #[must_use]
    pub fn with_synthesizer(mut self, synthesizer: MockSynthesizer) -> Self {
        self.synthesizer = Arc::new(synthesizer);
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: RecordingPlatform) -> Self {
        self.platform = Arc::new(platform);
        self
    }

    pub fn build(&self, task: TaskVariant, speech: SpeechOutput) -> Orchestrator {
        self.build_with(task, speech, test_settings())
    }

    pub fn build_with(
        &self,
        task: TaskVariant,
        speech: SpeechOutput,
        settings: OrchestratorSettings,
    ) -> Orchestrator {
        let services = Collaborators {
            audio: self.audio.clone(),
            transcriber: self.transcriber.clone(),
            responder: self.responder.clone(),
            synthesizer: Some(self.synthesizer.clone()),
            hints: Some(self.hints.clone()),
            platform: self.platform.clone(),
        };
        Orchestrator::new(
            SessionConfig::new(task, speech),
            settings,
            services,
            self.control.clone(),
            self.clock.clone(),
        )
        .expect("failed to build orchestrator")
    }
}
