//! Turn orchestrator
//!
//! Runs one session as a loop of cycles. Each cycle captures an utterance,
//! transcribes it, builds the phase-appropriate prompt, asks the responder
//! for a reply and speaks it. Steps run strictly in order and a failing
//! cycle is logged and skipped; only an operator quit ends the session.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, PlatformConfig, Timeouts};
use crate::control::SessionControl;
use crate::conversation::{ConversationHistory, Turn};
use crate::hint::HintProvider;
use crate::llm::Responder;
use crate::phase::{Phase, PhaseClock, PhaseTracker, SessionClock};
use crate::platform::Platform;
use crate::prompt::{ChatMessage, PromptContext, conclusion_messages};
use crate::session::{SessionConfig, SpeechOutput};
use crate::voice::{AudioSource, SpeechSynthesizer, Transcriber};
use crate::{Error, Result};

/// Pause between cycles, cut short by quit
const CYCLE_PAUSE: Duration = Duration::from_millis(100);

/// Longest pause after repeated failed cycles
const MAX_FAILURE_PAUSE: Duration = Duration::from_secs(5);

/// Pause after the `streak`-th consecutive failed cycle, doubling up to
/// [`MAX_FAILURE_PAUSE`]
fn failure_pause(streak: u32) -> Duration {
    CYCLE_PAUSE
        .saturating_mul(1 << streak.min(16))
        .min(MAX_FAILURE_PAUSE)
}

/// Where the orchestrator is within a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingInput,
    Transcribing,
    BuildingPrompt,
    Generating,
    Speaking,
    Terminated,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingInput => "awaiting_input",
            Self::Transcribing => "transcribing",
            Self::BuildingPrompt => "building_prompt",
            Self::Generating => "generating",
            Self::Speaking => "speaking",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// How a reply reached the participant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeechPath {
    /// Cloud voice played through the robot speaker
    Cloud,
    /// Robot's built-in animated speech
    Native,
    /// Speech failed; the reply was only logged
    Text,
}

/// Result of one completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reply was generated and delivered
    Replied { phase: Phase, speech: SpeechPath },
    /// The captured segment was empty or silent
    NoInput,
    /// The transcriber heard nothing
    EmptyTranscript,
    /// Quit was observed before the cycle finished
    Interrupted,
}

/// Summary of a finished session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub cycles: usize,
    pub replies: usize,
    pub failures: usize,
    pub final_phase: Phase,
    pub final_state: TurnState,
}

/// Tunables for the loop
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub phases: PhaseClock,
    pub history_max_turns: usize,
    pub max_recording: Duration,
    pub min_segment: Duration,
    pub silence_rms: f32,
    pub timeouts: Timeouts,
    pub platform: PlatformConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            phases: PhaseClock::default(),
            history_max_turns: crate::conversation::DEFAULT_MAX_TURNS,
            max_recording: Duration::from_secs(30),
            min_segment: Duration::from_millis(300),
            silence_rms: 0.005,
            timeouts: Timeouts::default(),
            platform: PlatformConfig::default(),
        }
    }
}

impl From<&Config> for OrchestratorSettings {
    fn from(config: &Config) -> Self {
        Self {
            phases: config.phases,
            history_max_turns: config.history_max_turns,
            max_recording: config.voice.max_recording,
            min_segment: config.voice.min_segment,
            silence_rms: config.voice.silence_rms,
            timeouts: config.timeouts,
            platform: config.platform.clone(),
        }
    }
}

/// External services a session talks to
pub struct Collaborators {
    pub audio: Arc<dyn AudioSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub responder: Arc<dyn Responder>,
    /// Required for cloud speech output
    pub synthesizer: Option<Arc<dyn SpeechSynthesizer>>,
    pub hints: Option<Arc<dyn HintProvider>>,
    pub platform: Arc<dyn Platform>,
}

/// Drives one dialogue session
pub struct Orchestrator {
    session: SessionConfig,
    settings: OrchestratorSettings,
    services: Collaborators,
    control: SessionControl,
    clock: Arc<dyn SessionClock>,
    phases: PhaseTracker,
    history: ConversationHistory,
    state: TurnState,
    /// Clock reading when setup finished; phases count from here
    timing_offset: Duration,
}

impl Orchestrator {
    /// Assemble an orchestrator
    ///
    /// # Errors
    ///
    /// Returns error if cloud speech is selected without a synthesizer
    pub fn new(
        session: SessionConfig,
        settings: OrchestratorSettings,
        services: Collaborators,
        control: SessionControl,
        clock: Arc<dyn SessionClock>,
    ) -> Result<Self> {
        if session.speech() == SpeechOutput::Cloud && services.synthesizer.is_none() {
            return Err(Error::Config(
                "cloud speech output needs a speech synthesizer".to_string(),
            ));
        }
        if session.task().needs_hint() && services.hints.is_none() {
            tracing::warn!(task = %session.task(), "no hint provider, task prompts will go without hints");
        }

        Ok(Self {
            phases: PhaseTracker::new(settings.phases),
            history: ConversationHistory::with_max_turns(settings.history_max_turns),
            session,
            settings,
            services,
            control,
            clock,
            state: TurnState::AwaitingInput,
            timing_offset: Duration::ZERO,
        })
    }

    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    #[must_use]
    pub const fn session(&self) -> &SessionConfig {
        &self.session
    }

    #[must_use]
    pub const fn control(&self) -> &SessionControl {
        &self.control
    }

    /// Run the session until quit, then wind down
    pub async fn run(&mut self) -> SessionReport {
        tracing::info!(
            task = %self.session.task(),
            speech = %self.session.speech(),
            started_at = %self.session.started_at(),
            "session starting"
        );

        self.setup().await;
        self.timing_offset = self.clock.elapsed();

        let control = self.control.clone();
        let mut cycles = 0;
        let mut replies = 0;
        let mut failures = 0;
        let mut streak: u32 = 0;

        while !control.is_quit() {
            cycles += 1;
            let pause = match self.run_cycle().await {
                Err(e) => {
                    failures += 1;
                    streak = streak.saturating_add(1);
                    let pause = failure_pause(streak);
                    if streak == 1 {
                        tracing::warn!(error = %e, state = %self.state, "cycle failed");
                    } else {
                        tracing::debug!(
                            error = %e,
                            state = %self.state,
                            streak,
                            retry_ms = pause.as_millis() as u64,
                            "cycle failed again"
                        );
                    }
                    pause
                }
                Ok(outcome) => {
                    if streak > 1 {
                        tracing::info!(failed_cycles = streak, "cycles recovered");
                    }
                    streak = 0;
                    match outcome {
                        CycleOutcome::Replied { .. } => replies += 1,
                        other => tracing::debug!(outcome = ?other, "cycle ended without reply"),
                    }
                    CYCLE_PAUSE
                }
            };
            self.state = TurnState::AwaitingInput;

            tokio::select! {
                () = control.quit_requested() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        self.wind_down().await;

        let report = SessionReport {
            cycles,
            replies,
            failures,
            final_phase: self.phases.reached(),
            final_state: self.state,
        };
        tracing::info!(
            cycles,
            replies,
            failures,
            phase = %report.final_phase,
            "session ended"
        );
        report
    }

    /// Run a single capture-to-speech cycle
    ///
    /// # Errors
    ///
    /// Returns the first step failure; history keeps whatever was appended
    /// before it.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let elapsed = self.clock.elapsed().saturating_sub(self.timing_offset);
        let (phase, changed) = self.phases.advance(elapsed);
        if changed {
            tracing::info!(phase = %phase, elapsed_secs = elapsed.as_secs_f64(), "phase changed");
        }

        if self.control.is_quit() {
            return Ok(CycleOutcome::Interrupted);
        }

        self.state = TurnState::AwaitingInput;
        let control = self.control.clone();
        let mut stop = control.capture_stop();
        let segment = tokio::select! {
            biased;
            () = control.quit_requested() => return Ok(CycleOutcome::Interrupted),
            segment = self.services.audio.capture(self.settings.max_recording, &mut stop) => segment?,
        };
        if control.is_quit() {
            return Ok(CycleOutcome::Interrupted);
        }
        if !segment.has_speech(self.settings.min_segment, self.settings.silence_rms) {
            tracing::debug!(
                duration_secs = segment.duration().as_secs_f64(),
                rms = segment.rms(),
                "no speech captured"
            );
            return Ok(CycleOutcome::NoInput);
        }

        self.state = TurnState::Transcribing;
        let transcript = bounded(
            "transcription",
            self.settings.timeouts.transcription,
            self.services.transcriber.transcribe(&segment),
        )
        .await?;
        if control.is_quit() {
            return Ok(CycleOutcome::Interrupted);
        }
        let transcript = transcript.trim();
        if transcript.is_empty() {
            tracing::debug!("empty transcript");
            return Ok(CycleOutcome::EmptyTranscript);
        }
        tracing::info!(phase = %phase, text = %transcript, "participant said");

        self.state = TurnState::BuildingPrompt;
        let hint = self.fetch_hint(phase).await;
        if control.is_quit() {
            return Ok(CycleOutcome::Interrupted);
        }

        let messages = self.prepare_messages(phase, &hint, transcript);

        self.state = TurnState::Generating;
        let reply = bounded(
            "generation",
            self.settings.timeouts.generation,
            self.services.responder.generate(&messages),
        )
        .await?;
        if phase != Phase::Conclusion {
            self.history.append(Turn::assistant(reply.as_str()));
        }
        tracing::info!(phase = %phase, text = %reply, "robot replies");
        if control.is_quit() {
            return Ok(CycleOutcome::Interrupted);
        }

        self.state = TurnState::Speaking;
        let speech = self.speak(&reply).await;

        Ok(CycleOutcome::Replied { phase, speech })
    }

    /// Message list for this cycle
    ///
    /// Outside the conclusion the user turn is recorded here, before the
    /// responder is called.
    fn prepare_messages(&mut self, phase: Phase, hint: &str, transcript: &str) -> Vec<ChatMessage> {
        let task = self.session.task();
        if phase == Phase::Conclusion {
            return conclusion_messages(task);
        }

        let messages = PromptContext {
            task,
            phase,
            hint,
            history: self.history.turns(),
            user_input: transcript,
        }
        .build_messages();
        self.history.append(Turn::user(transcript));
        messages
    }

    /// Hint text for this cycle, empty outside the task phase
    async fn fetch_hint(&self, phase: Phase) -> String {
        if phase != Phase::Task || !self.session.task().needs_hint() {
            return String::new();
        }
        let Some(hints) = &self.services.hints else {
            return String::new();
        };

        match bounded("hint", self.settings.timeouts.hint, hints.hint()).await {
            Ok(hint) => hint,
            Err(e) => {
                tracing::warn!(error = %e, "hint unavailable");
                String::new()
            }
        }
    }

    /// Deliver a reply, degrading cloud -> native -> text
    async fn speak(&self, text: &str) -> SpeechPath {
        if self.session.speech() == SpeechOutput::Cloud {
            match self.speak_cloud(text).await {
                Ok(()) => return SpeechPath::Cloud,
                Err(e) => tracing::warn!(error = %e, "cloud speech failed, using native speech"),
            }
        }

        let native = bounded(
            "native speech",
            self.settings.timeouts.synthesis,
            self.services.platform.say_animated(text),
        )
        .await;
        match native {
            Ok(()) => SpeechPath::Native,
            Err(e) => {
                tracing::warn!(error = %e, reply = %text, "native speech failed, reply not spoken");
                SpeechPath::Text
            }
        }
    }

    async fn speak_cloud(&self, text: &str) -> Result<()> {
        let synthesizer = self
            .services
            .synthesizer
            .as_ref()
            .ok_or_else(|| Error::Tts("no speech synthesizer".to_string()))?;

        let speech = bounded(
            "synthesis",
            self.settings.timeouts.synthesis,
            synthesizer.synthesize(text),
        )
        .await?;

        let budget = clip_length(speech.pcm.len(), speech.sample_rate)
            .saturating_add(self.settings.timeouts.platform);
        bounded(
            "playback",
            budget,
            self.services
                .platform
                .play_audio(&speech.pcm, speech.sample_rate),
        )
        .await
    }

    /// Volume and ready pose; failures are logged
    async fn setup(&mut self) {
        let platform = &self.services.platform;
        let budget = self.settings.timeouts.platform;
        if let Err(e) = bounded(
            "set volume",
            budget,
            platform.set_volume(self.settings.platform.volume),
        )
        .await
        {
            tracing::warn!(error = %e, "failed to set volume");
        }
        if let Err(e) = bounded(
            "ready animation",
            budget,
            platform.play_animation(&self.settings.platform.ready_animation),
        )
        .await
        {
            tracing::warn!(error = %e, "failed to play ready animation");
        }
        self.state = TurnState::AwaitingInput;
    }

    /// Closing pose and release of the robot session
    async fn wind_down(&mut self) {
        let platform = &self.services.platform;
        let budget = self.settings.timeouts.platform;
        if let Err(e) = bounded(
            "closing animation",
            budget,
            platform.play_animation(&self.settings.platform.closing_animation),
        )
        .await
        {
            tracing::warn!(error = %e, "failed to play closing animation");
        }
        if let Err(e) = bounded("leave", budget, platform.leave()).await {
            tracing::warn!(error = %e, "failed to leave robot session");
        }
        self.state = TurnState::Terminated;
    }
}

/// Play time of 16-bit mono PCM
fn clip_length(bytes: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64((bytes / 2) as f64 / f64::from(sample_rate))
}

/// Await `fut` within `budget`
async fn bounded<T>(
    step: &'static str,
    budget: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(budget, fut)
        .await
        .map_err(|_| Error::Timeout {
            step,
            secs: budget.as_secs(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::DialogueConfigFile;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, Error>(())
        };
        let err = bounded("generation", Duration::from_millis(10), slow)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { step: "generation", .. }));
    }

    #[tokio::test]
    async fn test_bounded_passes_through() {
        let value = bounded("hint", Duration::from_secs(1), async { Ok::<_, Error>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn test_clip_length() {
        assert_eq!(clip_length(32_000, 16_000), Duration::from_secs(1));
        assert_eq!(clip_length(48_000, 24_000), Duration::from_secs(1));
        assert_eq!(clip_length(100, 0), Duration::ZERO);
    }

    #[test]
    fn test_failure_pause_backs_off() {
        assert_eq!(failure_pause(1), Duration::from_millis(200));
        assert_eq!(failure_pause(2), Duration::from_millis(400));
        assert_eq!(failure_pause(5), Duration::from_millis(3200));
        assert_eq!(failure_pause(6), MAX_FAILURE_PAUSE);
        assert_eq!(failure_pause(u32::MAX), MAX_FAILURE_PAUSE);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(TurnState::AwaitingInput.to_string(), "awaiting_input");
        assert_eq!(TurnState::Terminated.to_string(), "terminated");
    }

    #[test]
    fn test_settings_from_config() {
        let config = Config::resolve(DialogueConfigFile::default(), |_| None).unwrap();
        let settings = OrchestratorSettings::from(&config);
        assert_eq!(settings.platform.volume, 45);
        assert_eq!(settings.history_max_turns, 40);
        assert_eq!(settings.max_recording, Duration::from_secs(30));
        assert_eq!(settings.timeouts.platform, Duration::from_secs(10));
    }
}
