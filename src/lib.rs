//! Care Companion - medication assistant for patients living alone
//!
//! This library provides the core functionality of the companion:
//! - Voice dialogue (utterance segmentation, STT, TTS)
//! - Medication box verification (camera capture, OCR, fuzzy matching)
//! - Caregiver notifications over a Telegram bot
//! - Scene events for whatever display is attached
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Capabilities                      │
//! │  Listener │ Speaker │ Camera │ OCR │ Notifier │ Plan │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   Controller                         │
//! │  Help escalation │ Feeling check │ Medication round  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                    SceneBus                          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod config;
pub mod controller;
pub mod daemon;
pub mod error;
pub mod events;
pub mod patient;
pub mod plan;
pub mod vision;
pub mod voice;

pub use channels::{CaregiverCommand, Notifier};
pub use config::Config;
pub use controller::{Capabilities, Controller, DeliveryReport, DialogueSettings, TickOutcome};
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use events::{Scene, SceneBus, SceneEvent};
pub use patient::{CaregiverCount, Patient, PatientRegistry};
pub use plan::{Dose, TherapyPlan, TherapyPlanProvider};
