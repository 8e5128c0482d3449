//! Daemon - the care companion service
//!
//! Resolves the patient, builds every capability from [`Config`], starts the
//! caregiver relay and runs the interaction controller until interrupted.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::channels::{Notifier, TelegramGateway, TelegramNotifier, UnconfiguredNotifier};
use crate::config::OcrBackend;
use crate::controller::{Capabilities, Controller, SystemClock};
use crate::events::SceneBus;
use crate::patient::{Patient, PatientRegistry};
use crate::plan::FilePlanProvider;
use crate::vision::{BoxMatcher, CommandCamera, PhotoArchive, TesseractOcr, TextRecognizer, VisionOcr};
use crate::voice::{ConsoleListener, ConsoleSpeaker, Listener, Microphone, Speaker, VoiceOutput};
use crate::{Config, Result};

/// The care companion daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the data directories cannot be created
    pub fn new(config: Config) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;
        std::fs::create_dir_all(&config.photo_dir)?;
        tracing::debug!(data_dir = %config.data_dir.display(), "data directory ready");
        Ok(Self { config })
    }

    /// Run the daemon until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if the registry cannot be loaded, a device cannot be
    /// opened, or a day's therapy plan is unavailable
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let gateway = telegram_gateway(&self.config);
        let patient = load_patient(&self.config, gateway.as_ref()).await?;
        tracing::info!(
            patient = %patient.name,
            caregivers = patient.caregivers().len(),
            "patient loaded"
        );

        let archive = PhotoArchive::new(&self.config.photo_dir);

        // Set up shutdown signal
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = shutdown_tx.send(()).await;
            }
        });

        let notifier: Box<dyn Notifier> = if let Some(gateway) = gateway {
            let photos = self.config.telegram.send_photos.then(|| archive.clone());
            let notifier = TelegramNotifier::new(gateway, photos).with_caregivers(patient.caregivers());
            let _relay = notifier.start_relay(Duration::from_secs(self.config.telegram.poll_interval_secs));
            tracing::info!("telegram relay started");
            Box::new(notifier)
        } else {
            tracing::warn!("no Telegram bot token, caregivers will not be notified");
            Box::new(UnconfiguredNotifier)
        };

        let scenes = SceneBus::new();
        spawn_scene_logger(&scenes);

        let (listener, speaker) = self.voice()?;
        let caps = Capabilities {
            listener,
            speaker,
            camera: Box::new(CommandCamera::new(&self.config.camera)),
            recognizer: self.recognizer()?,
            notifier,
            plans: Box::new(FilePlanProvider::new(&self.config.plan_dir)),
            clock: Box::new(SystemClock),
        };

        let mut controller = Controller::new(
            patient,
            caps,
            self.config.dialogue.clone(),
            BoxMatcher::new(self.config.ocr.threshold),
            scenes,
        )
        .with_archive(archive);

        // Runs on the main task (cpal streams aren't Send)
        controller.run(&mut shutdown_rx).await?;

        tracing::info!("daemon stopped");
        Ok(())
    }

    /// Microphone and speaker, or the console pair when voice is disabled
    fn voice(&self) -> Result<(Box<dyn Listener>, Box<dyn Speaker>)> {
        let voice = &self.config.voice;
        if voice.enabled {
            tracing::info!(stt = %voice.stt_model, tts = %voice.tts_model, "voice enabled");
            Ok((
                Box::new(Microphone::new(voice, &self.config.api_keys)?),
                Box::new(VoiceOutput::new(voice, &self.config.api_keys)?),
            ))
        } else {
            tracing::info!("voice disabled - reading replies from stdin");
            Ok((
                Box::new(ConsoleListener::new(Duration::from_millis(voice.listen_window_ms))),
                Box::new(ConsoleSpeaker),
            ))
        }
    }

    fn recognizer(&self) -> Result<Box<dyn TextRecognizer>> {
        Ok(match self.config.ocr.backend {
            OcrBackend::Tesseract => Box::new(TesseractOcr::new(&self.config.ocr.language)),
            OcrBackend::Vision => {
                Box::new(VisionOcr::new(self.config.api_keys.anthropic.as_deref())?)
            }
        })
    }
}

/// Gateway for the configured bot token, if any
#[must_use]
pub fn telegram_gateway(config: &Config) -> Option<TelegramGateway> {
    let token = config.api_keys.telegram.as_deref()?;
    match TelegramGateway::new(token) {
        Ok(gateway) => Some(gateway),
        Err(e) => {
            tracing::warn!(error = %e, "invalid Telegram bot token");
            None
        }
    }
}

/// Load the registry and resolve caregiver handles to chat ids
///
/// Resolution failures leave only the literal chat ids.
///
/// # Errors
///
/// Returns error if the registry cannot be read or parsed
pub async fn load_patient(config: &Config, gateway: Option<&TelegramGateway>) -> Result<Patient> {
    let registry = PatientRegistry::load(&config.registry_path)?;
    let handles = registry.handles();

    let resolved = match gateway {
        Some(gateway) if !handles.is_empty() => match gateway.resolve_chat_ids(&handles).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(error = %e, "caregiver handle resolution failed");
                Vec::new()
            }
        },
        None if !handles.is_empty() => {
            tracing::warn!(handles = handles.len(), "caregiver handles need a Telegram bot token");
            Vec::new()
        }
        _ => Vec::new(),
    };

    Ok(registry.into_patient(resolved))
}

/// Log every scene change
fn spawn_scene_logger(scenes: &SceneBus) {
    let mut rx = scenes.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::info!(name = %event.name, image = %event.image, "scene"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(missed = n, "scene logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
