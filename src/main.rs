use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use robot_dialogue::hint::{HintProvider, SudokuHints};
use robot_dialogue::llm::ChatClient;
use robot_dialogue::orchestrator::OrchestratorSettings;
use robot_dialogue::phase::MonotonicClock;
use robot_dialogue::platform::LocalPlatform;
use robot_dialogue::voice::{
    AudioPlayback, AudioSource, Microphone, SpeechSynthesizer, SpeechToText, TextToSpeech,
};
use robot_dialogue::{
    Collaborators, Config, Orchestrator, SessionConfig, SessionControl, SpeechOutput, TaskVariant,
    setup,
};

/// Dialogue - time-phased spoken conversations with a social robot
#[derive(Parser)]
#[command(name = "dialogue", version, about)]
struct Cli {
    /// Task to run (a = Sudoku helper, b = life coach); asked if omitted
    #[arg(short, long, value_enum, env = "DIALOGUE_TASK")]
    task: Option<TaskVariant>,

    /// Speech output (cloud voice or the robot's own); asked if omitted
    #[arg(short, long, value_enum, env = "DIALOGUE_SPEECH")]
    speech: Option<SpeechOutput>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Hello! I am Charlie. This is a test of my voice.")]
        text: String,
    },
    /// Print the current Sudoku hint
    Hint {
        /// Board file (defaults to the configured path)
        #[arg(short, long)]
        board: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn,robot_dialogue=info",
        1 => "info,robot_dialogue=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::Hint { board } => show_hint(&config, board).await,
        };
    }

    let task = setup::choose_task(cli.task.or(config.task))?;
    let speech = setup::choose_speech(cli.speech.or(config.speech))?;
    let session = SessionConfig::new(task, speech);

    let services = Collaborators {
        audio: Arc::new(Microphone::new()),
        transcriber: Arc::new(SpeechToText::from_config(&config)?),
        responder: Arc::new(ChatClient::from_config(&config)?),
        synthesizer: match speech {
            SpeechOutput::Cloud => {
                Some(Arc::new(TextToSpeech::from_config(&config)?) as Arc<dyn SpeechSynthesizer>)
            }
            SpeechOutput::Native => None,
        },
        hints: task.needs_hint().then(|| {
            Arc::new(SudokuHints::new(config.sudoku_board.clone())) as Arc<dyn HintProvider>
        }),
        platform: Arc::new(LocalPlatform::new()),
    };

    let control = SessionControl::new();
    spawn_operator_input(control.clone());
    spawn_ctrl_c(control.clone());

    let mut orchestrator = Orchestrator::new(
        session,
        OrchestratorSettings::from(&config),
        services,
        control,
        Arc::new(MonotonicClock::start()),
    )?;

    println!("Task: {task} | speech: {speech}");
    println!("Speak after the prompt. Enter stops a recording, q + Enter quits.\n");

    let report = orchestrator.run().await;

    println!(
        "\nSession over: {} cycles, {} replies, {} failed, reached {}",
        report.cycles, report.replies, report.failures, report.final_phase
    );

    Ok(())
}

/// Read operator commands from stdin
///
/// An empty line stops the current recording, `q` ends the session. Runs on
/// a plain thread so a pending read never holds up runtime shutdown.
fn spawn_operator_input(control: SessionControl) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match line.trim() {
                "" => control.stop_recording(),
                "q" | "quit" => {
                    control.quit();
                    break;
                }
                other => tracing::debug!(input = %other, "ignoring operator input"),
            }
        }
    });
}

/// Quit on Ctrl-C
fn spawn_ctrl_c(control: SessionControl) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            control.quit();
        }
    });
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone! Press Enter to stop early.\n");

    let control = SessionControl::new();
    spawn_operator_input(control.clone());

    let mut stop = control.capture_stop();
    let segment = Microphone::new()
        .capture(Duration::from_secs(duration), &mut stop)
        .await?;

    println!("Sample rate: {} Hz", segment.sample_rate());
    println!("Captured: {:.2}s", segment.duration().as_secs_f64());
    println!("RMS: {:.4}", segment.rms());

    println!("\n---");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test TTS output through the configured cloud voice
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_config(config)?;

    println!("Synthesizing speech...");
    let speech = tts.synthesize(text).await?;
    println!(
        "Got {} bytes of audio at {} Hz",
        speech.pcm.len(),
        speech.sample_rate
    );

    println!("Playing audio...");
    AudioPlayback::new()
        .play_pcm(&speech.pcm, speech.sample_rate)
        .await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");

    Ok(())
}

/// Print the hint the task phase would receive
async fn show_hint(config: &Config, board: Option<PathBuf>) -> anyhow::Result<()> {
    let path = board.unwrap_or_else(|| config.sudoku_board.clone());
    let hint = SudokuHints::new(path).hint().await?;
    println!("{hint}");
    Ok(())
}
