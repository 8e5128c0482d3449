//! Dialogue session state

use chrono::NaiveDateTime;

/// Which sub-dialogue is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialoguePhase {
    /// Polling for help or a dose slot
    #[default]
    Idle,
    /// Contacting caregivers
    HelpEscalation,
    /// Asking how the patient feels
    FeelingCheck,
    /// Walking through the slot's medications
    MedicationRound,
    /// Saying goodbye and sending the recap
    Recap,
}

/// How the patient says they feel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Feeling {
    Good,
    Bad,
    #[default]
    Unknown,
}

impl Feeling {
    /// Word used in recap commands; `None` for `Unknown`
    #[must_use]
    pub const fn wire_word(self) -> Option<&'static str> {
        match self {
            Self::Good => Some("bene"),
            Self::Bad => Some("male"),
            Self::Unknown => None,
        }
    }

    /// Inverse of [`wire_word`](Self::wire_word)
    #[must_use]
    pub fn from_wire(word: &str) -> Self {
        match word {
            "bene" => Self::Good,
            "male" => Self::Bad,
            _ => Self::Unknown,
        }
    }
}

/// Verification progress for one medication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DoseAttempt {
    pub medication: String,
    pub quantity: String,
    /// Captures that reached text recognition
    pub attempts: u32,
    pub verified: bool,
}

impl DoseAttempt {
    #[must_use]
    pub fn new(medication: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            medication: medication.into(),
            quantity: quantity.into(),
            attempts: 0,
            verified: false,
        }
    }
}

/// Everything the controller remembers between ticks
///
/// Owned and mutated only by the controller. Per-round fields are reset by
/// [`begin_round`](Self::begin_round).
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub phase: DialoguePhase,
    pub feeling: Feeling,
    /// Medication currently being verified
    pub current: Option<DoseAttempt>,
    /// Attempts finished in this round, in plan order
    pub completed: Vec<DoseAttempt>,
    /// Weekday of the active plan
    pub loaded_day: Option<String>,
    /// Date and minute the last round was started for
    pub last_slot: Option<NaiveDateTime>,
}

impl SessionState {
    /// Reset per-round state and remember the slot as consumed
    pub fn begin_round(&mut self, slot: NaiveDateTime) {
        self.phase = DialoguePhase::MedicationRound;
        self.feeling = Feeling::Unknown;
        self.current = None;
        self.completed.clear();
        self.last_slot = Some(slot);
    }

    /// Whether a round was already started for this date and minute
    #[must_use]
    pub fn slot_consumed(&self, slot: NaiveDateTime) -> bool {
        self.last_slot == Some(slot)
    }

    /// Start verifying a new medication
    pub fn begin_dose(&mut self, medication: &str, quantity: &str) {
        self.current = Some(DoseAttempt::new(medication, quantity));
    }

    /// Move the current attempt into the completed list
    pub fn finish_dose(&mut self) {
        if let Some(attempt) = self.current.take() {
            self.completed.push(attempt);
        }
    }

    /// Every medication of the round reached verified
    #[must_use]
    pub fn all_verified(&self, expected: usize) -> bool {
        self.completed.len() == expected && self.completed.iter().all(|a| a.verified)
    }

    /// Back to idle polling
    pub fn finish_round(&mut self) {
        self.phase = DialoguePhase::Idle;
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{Duration, NaiveDate};

    // 2024-01-01 was a Monday
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn feeling_wire_words() {
        assert_eq!(Feeling::Good.wire_word(), Some("bene"));
        assert_eq!(Feeling::Bad.wire_word(), Some("male"));
        assert_eq!(Feeling::Unknown.wire_word(), None);
        assert_eq!(Feeling::from_wire("male"), Feeling::Bad);
        assert_eq!(Feeling::from_wire("boh"), Feeling::Unknown);
    }

    #[test]
    fn slot_is_consumed_per_date() {
        let mut state = SessionState::default();
        assert!(!state.slot_consumed(monday_at(8, 0)));

        state.begin_round(monday_at(8, 0));
        assert!(state.slot_consumed(monday_at(8, 0)));
        assert!(!state.slot_consumed(monday_at(8, 1)));
        assert!(!state.slot_consumed(monday_at(8, 0) + Duration::days(1)));
        // Same weekday a week later is a new slot
        assert!(!state.slot_consumed(monday_at(8, 0) + Duration::weeks(1)));
    }

    #[test]
    fn begin_round_resets_round_fields() {
        let mut state = SessionState {
            feeling: Feeling::Bad,
            ..SessionState::default()
        };
        state.begin_dose("Aspirina", "1");
        state.finish_dose();

        state.begin_round(monday_at(20, 0));
        assert_eq!(state.feeling, Feeling::Unknown);
        assert!(state.completed.is_empty());
        assert_eq!(state.phase, DialoguePhase::MedicationRound);
    }

    #[test]
    fn all_verified_requires_every_dose() {
        let mut state = SessionState::default();
        state.begin_dose("Aspirina", "1");
        if let Some(a) = state.current.as_mut() {
            a.verified = true;
        }
        state.finish_dose();
        assert!(state.all_verified(1));
        assert!(!state.all_verified(2));

        state.begin_dose("Ibuprofene", "1");
        state.finish_dose();
        assert!(!state.all_verified(2));
    }
}
