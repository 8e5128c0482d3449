use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use care_companion::channels::TelegramNotifier;
use care_companion::daemon::{load_patient, telegram_gateway};
use care_companion::plan::{FilePlanProvider, TherapyPlanProvider, day_name};
use care_companion::vision::{BoxMatcher, Camera, CommandCamera, TesseractOcr, TextRecognizer, VisionOcr};
use care_companion::voice::{AudioCapture, AudioPlayback, TextToSpeech, rms_energy};
use care_companion::config::OcrBackend;
use care_companion::{Config, Daemon};

/// Care companion - medication assistant with voice, camera and caregiver alerts
#[derive(Parser)]
#[command(name = "care-companion", version, about)]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, env = "CARE_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable microphone and speaker; prompts go to stdout, replies come from stdin
    #[arg(long, env = "CARE_DISABLE_VOICE")]
    disable_voice: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
#[allow(clippy::enum_variant_names)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "Ciao! Questa è una prova della sintesi vocale.")]
        text: String,
    },
    /// Capture one frame and print the text read from it
    TestCamera {
        /// Also score the text against this medication name
        #[arg(short, long)]
        medication: Option<String>,
    },
    /// Print the therapy plan for a day
    Plan {
        /// Lowercase English weekday (defaults to today)
        day: Option<String>,
    },
    /// Resolve caregiver handles to chat ids and print them
    ResolveCaregivers,
    /// Run only the caregiver relay bot
    Relay,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,care_companion=info",
        1 => "info,care_companion=debug",
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

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.config.as_deref(), cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    // Handle subcommands
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration } => test_mic(duration).await,
            Command::TestSpeaker => test_speaker(),
            Command::TestTts { text } => test_tts(&config, &text).await,
            Command::TestCamera { medication } => test_camera(&config, medication.as_deref()).await,
            Command::Plan { day } => show_plan(&config, day).await,
            Command::ResolveCaregivers => resolve_caregivers(&config).await,
            Command::Relay => relay(&config).await,
        };
    }

    tracing::info!(
        registry = %config.registry_path.display(),
        plans = %config.plan_dir.display(),
        voice = config.voice.enabled,
        "starting care companion"
    );

    // Run until interrupted
    Daemon::new(config)?.run().await?;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.resume()?;

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.drain();
        let energy = rms_energy(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]", i + 1);
    }

    capture.pause();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: arecord -l (to list devices)");
    println!("  3. Try: pavucontrol (to check levels)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = 24000_u16;
    let frequency = 440.0_f32;
    let num_samples = usize::from(sample_rate) * 2;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / f32::from(sample_rate);
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    println!("Playing {} samples at {sample_rate} Hz...", samples.len());
    playback.play(samples)?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Test TTS output with the configured backend
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    println!("Testing TTS with text: \"{text}\"\n");

    let tts = TextToSpeech::from_model(
        &config.voice.tts_model,
        &config.voice.tts_voice,
        config.voice.tts_speed,
        config.api_keys.openai.as_deref(),
        config.api_keys.elevenlabs.as_deref(),
    )?;

    println!("Synthesizing speech...");
    let mp3 = tts.synthesize(text).await?;
    println!("Got {} bytes of audio data", mp3.len());

    println!("Playing audio...");
    AudioPlayback::new()?.play_mp3(&mp3)?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

/// Capture a frame and run text recognition on it
#[allow(clippy::future_not_send)]
async fn test_camera(config: &Config, medication: Option<&str>) -> anyhow::Result<()> {
    println!("Capturing with `{}`...", config.camera.command);
    let frame = CommandCamera::new(&config.camera).capture().await?;
    println!("Got {} bytes", frame.bytes.len());

    let recognizer: Box<dyn TextRecognizer> = match config.ocr.backend {
        OcrBackend::Tesseract => Box::new(TesseractOcr::new(&config.ocr.language)),
        OcrBackend::Vision => Box::new(VisionOcr::new(config.api_keys.anthropic.as_deref())?),
    };
    let fragments = recognizer.recognize(&frame).await?;
    if fragments.is_empty() {
        println!("No text recognized");
    }
    for fragment in &fragments {
        println!("  {:>5.2}  {}", fragment.confidence, fragment.text);
    }

    if let Some(medication) = medication {
        let matcher = BoxMatcher::new(config.ocr.threshold);
        let score = matcher.best_score(medication, &fragments).unwrap_or(0);
        let verdict = if matcher.matches(medication, &fragments) { "match" } else { "no match" };
        println!("\n{medication}: score {score} (threshold {}) - {verdict}", matcher.threshold());
    }
    Ok(())
}

/// Print one day's therapy plan
async fn show_plan(config: &Config, day: Option<String>) -> anyhow::Result<()> {
    let day = day.unwrap_or_else(|| day_name(Local::now().weekday()).to_string());
    let provider = FilePlanProvider::new(&config.plan_dir);
    let plan = provider.plan_for(&day).await?;

    println!("Therapy plan for {day} ({})", provider.path_for(&day).display());
    if plan.is_empty() {
        println!("  (no doses)");
    }
    for (time, doses) in plan.slots() {
        println!("  {}", time.format("%H:%M"));
        for dose in doses {
            println!("    {} x {}", dose.medication, dose.quantity);
        }
    }
    Ok(())
}

/// Print the patient's caregiver chat ids
async fn resolve_caregivers(config: &Config) -> anyhow::Result<()> {
    let gateway = telegram_gateway(config);
    let patient = load_patient(config, gateway.as_ref()).await?;

    println!("Caregivers of {}:", patient.name);
    if patient.caregivers().is_empty() {
        println!("  (none)");
    }
    for chat_id in patient.caregivers() {
        println!("  {chat_id}");
    }
    Ok(())
}

/// Run the relay bot until interrupted
async fn relay(config: &Config) -> anyhow::Result<()> {
    let gateway = telegram_gateway(config)
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;

    let relay = TelegramNotifier::new(gateway, None)
        .start_relay(Duration::from_secs(config.telegram.poll_interval_secs));
    tracing::info!("relay running, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    relay.abort();
    Ok(())
}
