//! Help escalation, feeling check and the medication round

use super::dialogue;
use super::{Controller, DeliveryReport, DialoguePhase, Feeling, TickOutcome, bound_reached};
use crate::channels::CaregiverCommand;
use crate::events::Scene;
use crate::patient::CaregiverCount;
use crate::plan::Dose;

impl Controller {
    /// Tell the patient, message every caregiver, confirm
    ///
    /// Scenes are left to the caller. The phase is restored afterwards.
    #[allow(clippy::future_not_send)]
    pub(super) async fn escalate(&mut self) -> DeliveryReport {
        let previous = self.state.phase;
        self.state.phase = DialoguePhase::HelpEscalation;

        let name = self.patient.name.clone();
        let count = self.patient.caregiver_count();

        if let Some(notice) = dialogue::help_notice(&name, count) {
            self.speak(&notice).await;
        }
        let report = self
            .broadcast(&CaregiverCommand::help_request(&name))
            .await;
        self.speak(&dialogue::help_confirmation(&name, count)).await;

        self.state.phase = previous;
        report
    }

    /// Send `command` to each caregiver; failures are skipped
    async fn broadcast(&self, command: &CaregiverCommand) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        for chat_id in self.patient.caregivers() {
            match self.caps.notifier.notify(chat_id, command).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    tracing::warn!(chat_id, %command, error = %e, "caregiver notification failed");
                    report.failed += 1;
                }
            }
        }
        tracing::debug!(%command, sent = report.sent, failed = report.failed, "broadcast done");
        report
    }

    /// Ask how the patient feels
    ///
    /// Returns `None` when the clarification bound is exhausted.
    #[allow(clippy::future_not_send)]
    async fn feeling_check(&mut self) -> Option<Feeling> {
        self.state.phase = DialoguePhase::FeelingCheck;
        let name = self.patient.name.clone();
        self.speak(&dialogue::greeting(&name)).await;

        let mut clarifications = 0;
        let feeling = loop {
            let Some(reply) = self.listen_once().await else {
                continue;
            };
            match dialogue::classify_feeling(&reply.text) {
                Feeling::Unknown => {
                    if bound_reached(self.settings.max_clarifications, clarifications) {
                        tracing::warn!(clarifications, "feeling never understood");
                        return None;
                    }
                    clarifications += 1;
                    self.speak(&dialogue::clarify_feeling()).await;
                }
                feeling => break feeling,
            }
        };
        tracing::info!(?feeling, "feeling classified");
        self.state.feeling = feeling;

        match feeling {
            Feeling::Good => {
                self.scenes.publish(Scene::Happy);
                self.speak(&dialogue::feeling_good(&name)).await;
            }
            Feeling::Bad => {
                self.scenes.publish(Scene::Sad);
                let count = self.patient.caregiver_count();
                self.speak(&dialogue::feeling_bad(&name, count)).await;
                if count != CaregiverCount::None && self.wants_help().await {
                    self.scenes.publish(Scene::Alert);
                    self.escalate().await;
                }
            }
            Feeling::Unknown => {}
        }

        Some(feeling)
    }

    /// Yes/no reply to the help offer; an exhausted bound counts as yes
    #[allow(clippy::future_not_send)]
    async fn wants_help(&mut self) -> bool {
        let mut clarifications = 0;
        loop {
            let Some(reply) = self.listen_once().await else {
                continue;
            };
            if let Some(answer) = dialogue::classify_yes_no(&reply.text) {
                return answer;
            }
            if bound_reached(self.settings.max_clarifications, clarifications) {
                tracing::warn!(clarifications, "yes/no never understood, escalating");
                return true;
            }
            clarifications += 1;
            self.speak(&dialogue::clarify_yes_no()).await;
        }
    }

    /// Walk the patient through every dose of the slot
    #[allow(clippy::future_not_send)]
    pub(super) async fn medication_round(&mut self, doses: &[Dose]) -> TickOutcome {
        self.scenes.publish(Scene::Medication);
        if let Some(archive) = &self.archive
            && let Err(e) = archive.clear_day(self.plan.day()).await
        {
            tracing::warn!(error = %e, "failed to clear photo archive");
        }

        if self.feeling_check().await.is_none() {
            return self.abort_round().await;
        }

        self.state.phase = DialoguePhase::MedicationRound;
        self.scenes.publish(Scene::Medication);
        let name = self.patient.name.clone();
        let names: Vec<&str> = doses.iter().map(|d| d.medication.as_str()).collect();
        self.speak(&dialogue::announce(&name, &names)).await;
        self.speak(&dialogue::verification_rules()).await;

        for dose in doses {
            if !self.verify_dose(dose).await {
                return self.abort_round().await;
            }
        }

        self.complete_round(doses.len()).await
    }

    /// Photograph the box until it matches
    ///
    /// Returns `false` when the verification bound is exhausted.
    #[allow(clippy::future_not_send)]
    async fn verify_dose(&mut self, dose: &Dose) -> bool {
        self.state.begin_dose(&dose.medication, &dose.quantity);
        let photo_cue = self.settings.photo_cue.clone();
        self.scenes.publish(Scene::Medication);
        self.speak(&dialogue::instruct(&dose.medication, &photo_cue)).await;

        loop {
            self.scenes.publish(Scene::Photo);
            self.wait_for(&photo_cue).await;

            let frame = match self.caps.camera.capture().await {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!(medication = %dose.medication, error = %e, "capture failed");
                    self.speak(&dialogue::capture_failed(&photo_cue)).await;
                    continue;
                }
            };

            if let Some(archive) = &self.archive
                && let Err(e) = archive
                    .store(self.plan.day(), &dose.medication, &frame)
                    .await
            {
                tracing::warn!(error = %e, "failed to archive photo");
            }

            let attempts = match self.state.current.as_mut() {
                Some(attempt) => {
                    attempt.attempts += 1;
                    attempt.attempts
                }
                None => 1,
            };

            let verified = match self.caps.recognizer.recognize(&frame).await {
                Ok(fragments) => {
                    tracing::debug!(
                        medication = %dose.medication,
                        fragments = fragments.len(),
                        score = ?self.matcher.best_score(&dose.medication, &fragments),
                        "box text recognized"
                    );
                    self.matcher.matches(&dose.medication, &fragments)
                }
                Err(e) => {
                    tracing::warn!(medication = %dose.medication, error = %e, "text recognition failed");
                    false
                }
            };

            if verified {
                if let Some(attempt) = self.state.current.as_mut() {
                    attempt.verified = true;
                }
                self.state.finish_dose();
                tracing::info!(medication = %dose.medication, attempts, "box verified");

                self.scenes.publish(Scene::Happy);
                let next_cue = self.settings.next_cue.clone();
                let name = self.patient.name.clone();
                self.speak(&dialogue::box_correct(&name, &dose.quantity, &next_cue))
                    .await;
                self.wait_for(&next_cue).await;
                return true;
            }

            tracing::info!(medication = %dose.medication, attempts, "wrong box");
            self.scenes.publish(Scene::Sad);
            if bound_reached(self.settings.max_verification_attempts, attempts) {
                self.state.finish_dose();
                return false;
            }
            self.speak(&dialogue::box_wrong()).await;
        }
    }

    /// Goodbye and recap
    #[allow(clippy::future_not_send)]
    async fn complete_round(&mut self, expected: usize) -> TickOutcome {
        self.state.phase = DialoguePhase::Recap;
        self.scenes.publish(Scene::Medication);

        let name = self.patient.name.clone();
        let count = self.patient.caregiver_count();
        let help_keyword = self.settings.help_keyword.clone();
        self.speak(&dialogue::goodbye(&name, count, &help_keyword)).await;

        let report = if self.state.all_verified(expected) {
            // Named after the day the round started, like its photos
            let finished = self.caps.clock.now();
            let at = self
                .state
                .last_slot
                .map_or(finished, |started| started.date().and_time(finished.time()));
            match CaregiverCommand::recap(&name, self.state.feeling, at) {
                Ok(recap) => self.broadcast(&recap).await,
                Err(e) => {
                    tracing::warn!(error = %e, "recap not sent");
                    DeliveryReport::default()
                }
            }
        } else {
            DeliveryReport::default()
        };

        self.state.finish_round();
        self.scenes.publish(Scene::Idle);
        TickOutcome::RoundCompleted(report)
    }

    /// Alert caregivers and drop the round without a recap
    #[allow(clippy::future_not_send)]
    async fn abort_round(&mut self) -> TickOutcome {
        self.scenes.publish(Scene::Alert);
        self.escalate().await;
        self.state.finish_round();
        self.scenes.publish(Scene::Idle);
        TickOutcome::RoundAborted
    }
}
