//! Multimodal interaction controller
//!
//! One serial loop drives everything the patient sees and hears. Each
//! [`Controller::tick`] rolls the therapy plan over on a new day, listens for
//! a single utterance (escalating on the help keyword), then starts a
//! medication round when the clock reaches an unconsumed plan slot.
//!
//! Capabilities are injected as trait objects so the loop can run against
//! real hardware or scripted doubles.

mod clock;
pub mod dialogue;
mod round;
mod session;

pub use clock::{Clock, SystemClock};
pub use session::{DialoguePhase, DoseAttempt, Feeling, SessionState};

use chrono::{Datelike, NaiveDate};
use tokio::sync::mpsc;

use crate::Result;
use crate::channels::Notifier;
use crate::events::{Scene, SceneBus};
use crate::patient::Patient;
use crate::plan::{Dose, TherapyPlan, TherapyPlanProvider, day_name, truncate_to_minute};
use crate::vision::{BoxMatcher, Camera, PhotoArchive, TextRecognizer};
use crate::voice::{Listener, Speaker, Utterance};

/// Keywords and retry bounds for the dialogue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogueSettings {
    /// Utterance substring that triggers a help escalation
    pub help_keyword: String,

    /// Word the patient says when the box is in front of the camera
    pub photo_cue: String,

    /// Word the patient says to move to the next medication
    pub next_cue: String,

    /// Re-prompts allowed for feeling and yes/no replies; `None` is unbounded
    pub max_clarifications: Option<u32>,

    /// Box captures allowed per medication; `None` is unbounded
    pub max_verification_attempts: Option<u32>,
}

impl Default for DialogueSettings {
    fn default() -> Self {
        Self {
            help_keyword: "aiuto".to_string(),
            photo_cue: "foto".to_string(),
            next_cue: "avanti".to_string(),
            max_clarifications: None,
            max_verification_attempts: None,
        }
    }
}

/// Everything the controller talks to
pub struct Capabilities {
    pub listener: Box<dyn Listener>,
    pub speaker: Box<dyn Speaker>,
    pub camera: Box<dyn Camera>,
    pub recognizer: Box<dyn TextRecognizer>,
    pub notifier: Box<dyn Notifier>,
    pub plans: Box<dyn TherapyPlanProvider>,
    pub clock: Box<dyn Clock>,
}

/// Per-caregiver delivery counts for one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to do
    Idle,
    /// The patient asked for help
    HelpSent(DeliveryReport),
    /// Every dose was verified and the recap went out
    RoundCompleted(DeliveryReport),
    /// A retry bound was hit; caregivers were alerted and no recap was sent
    RoundAborted,
}

/// The interaction controller
pub struct Controller {
    patient: Patient,
    caps: Capabilities,
    settings: DialogueSettings,
    matcher: BoxMatcher,
    scenes: SceneBus,
    archive: Option<PhotoArchive>,
    plan: TherapyPlan,
    state: SessionState,
}

impl Controller {
    #[must_use]
    pub fn new(
        patient: Patient,
        caps: Capabilities,
        settings: DialogueSettings,
        matcher: BoxMatcher,
        scenes: SceneBus,
    ) -> Self {
        Self {
            patient,
            caps,
            settings,
            matcher,
            scenes,
            archive: None,
            plan: TherapyPlan::default(),
            state: SessionState::default(),
        }
    }

    /// Keep the box photos of each round
    #[must_use]
    pub fn with_archive(mut self, archive: PhotoArchive) -> Self {
        self.archive = Some(archive);
        self
    }

    #[must_use]
    pub fn patient(&self) -> &Patient {
        &self.patient
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Plan for the loaded day
    #[must_use]
    pub fn plan(&self) -> &TherapyPlan {
        &self.plan
    }

    #[must_use]
    pub fn settings(&self) -> &DialogueSettings {
        &self.settings
    }

    /// Run one loop iteration
    ///
    /// # Errors
    ///
    /// Returns `ScheduleUnavailable` if the plan for a new day cannot be
    /// loaded. No other failure escapes.
    #[allow(clippy::future_not_send)]
    pub async fn tick(&mut self) -> Result<TickOutcome> {
        let now = self.caps.clock.now();
        self.roll_over(now.date()).await?;

        if let Some(utterance) = self.listen_once().await
            && utterance.mentions(&self.settings.help_keyword)
        {
            tracing::info!(text = %utterance.text, "help requested");
            self.scenes.publish(Scene::Alert);
            let report = self.escalate().await;
            self.scenes.publish(Scene::Idle);
            return Ok(TickOutcome::HelpSent(report));
        }

        let slot = truncate_to_minute(now.time());
        let started = now.date().and_time(slot);
        if self.state.slot_consumed(started) {
            return Ok(TickOutcome::Idle);
        }
        let Some(doses) = self.plan.doses_at(slot).map(<[Dose]>::to_vec) else {
            return Ok(TickOutcome::Idle);
        };

        tracing::info!(day = self.plan.day(), slot = %slot.format("%H:%M"), doses = doses.len(), "dose slot reached");
        self.state.begin_round(started);
        Ok(self.medication_round(&doses).await)
    }

    /// Tick until `shutdown` fires
    ///
    /// # Errors
    ///
    /// Returns `ScheduleUnavailable` if a day's plan cannot be loaded
    #[allow(clippy::future_not_send)]
    pub async fn run(&mut self, shutdown: &mut mpsc::Receiver<()>) -> Result<()> {
        tracing::info!(
            patient = %self.patient.name,
            caregivers = self.patient.caregivers().len(),
            "controller running"
        );
        self.scenes.publish(Scene::Idle);

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown requested");
                    break;
                }
                outcome = self.tick() => {
                    match outcome? {
                        TickOutcome::Idle => {}
                        TickOutcome::HelpSent(report) => {
                            tracing::info!(sent = report.sent, failed = report.failed, "help escalation done");
                        }
                        TickOutcome::RoundCompleted(report) => {
                            tracing::info!(sent = report.sent, failed = report.failed, "medication round completed");
                        }
                        TickOutcome::RoundAborted => {
                            tracing::warn!("medication round aborted");
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Replace the plan when the weekday changes
    async fn roll_over(&mut self, date: NaiveDate) -> Result<()> {
        let day = day_name(date.weekday());
        if self.state.loaded_day.as_deref() == Some(day) {
            return Ok(());
        }

        let plan = self.caps.plans.plan_for(day).await?;
        tracing::info!(day, slots = plan.len(), "therapy plan loaded");
        self.plan = plan;
        self.state.loaded_day = Some(day.to_string());
        Ok(())
    }

    /// One bracketed recognition attempt; failures count as silence
    #[allow(clippy::future_not_send)]
    async fn listen_once(&mut self) -> Option<Utterance> {
        if let Err(e) = self.caps.listener.resume() {
            tracing::warn!(error = %e, "failed to resume listener");
            return None;
        }
        let heard = self.caps.listener.listen().await;
        self.caps.listener.pause();

        match heard {
            Ok(utterance) => {
                if let Some(ref u) = utterance {
                    tracing::debug!(text = %u.text, "heard");
                }
                utterance
            }
            Err(e) => {
                tracing::warn!(error = %e, "recognition failed");
                None
            }
        }
    }

    /// Listen until an utterance mentions `cue`
    #[allow(clippy::future_not_send)]
    async fn wait_for(&mut self, cue: &str) {
        loop {
            if let Some(utterance) = self.listen_once().await
                && utterance.mentions(cue)
            {
                return;
            }
        }
    }

    #[allow(clippy::future_not_send)]
    async fn speak(&mut self, text: &str) {
        if let Err(e) = self.caps.speaker.say(text).await {
            tracing::warn!(error = %e, "speech output failed");
        }
    }
}

/// Whether `used` retries exhaust `limit`
const fn bound_reached(limit: Option<u32>, used: u32) -> bool {
    match limit {
        Some(max) => used >= max,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_never_reached() {
        assert!(!bound_reached(None, u32::MAX));
    }

    #[test]
    fn bound_counts_used_retries() {
        assert!(!bound_reached(Some(2), 1));
        assert!(bound_reached(Some(2), 2));
        assert!(bound_reached(Some(0), 0));
    }

    #[test]
    fn default_keywords() {
        let settings = DialogueSettings::default();
        assert_eq!(settings.help_keyword, "aiuto");
        assert_eq!(settings.photo_cue, "foto");
        assert_eq!(settings.next_cue, "avanti");
        assert!(settings.max_clarifications.is_none());
    }
}
