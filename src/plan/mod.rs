//! Therapy plans
//!
//! A plan maps minute-resolution clock times to the ordered list of doses due
//! at that time, for one weekday. Plans come from a [`TherapyPlanProvider`]
//! and are replaced wholesale when the calendar day changes.

mod file;

pub use file::FilePlanProvider;

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

use crate::Result;

/// One medication to take at a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dose {
    /// Canonical name, as printed on the box
    pub medication: String,

    /// Quantity to announce ("1", "mezza compressa", ...)
    pub quantity: String,
}

impl Dose {
    #[must_use]
    pub fn new(medication: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            medication: medication.into(),
            quantity: quantity.into(),
        }
    }
}

/// Dose schedule for a single weekday
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TherapyPlan {
    day: String,
    slots: BTreeMap<NaiveTime, Vec<Dose>>,
}

impl TherapyPlan {
    /// Empty plan for `day`
    #[must_use]
    pub fn new(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            slots: BTreeMap::new(),
        }
    }

    /// Add a slot
    ///
    /// Seconds are truncated. Empty dose lists are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if the time already has an entry
    pub fn insert(&mut self, time: NaiveTime, doses: Vec<Dose>) -> Result<()> {
        if doses.is_empty() {
            return Ok(());
        }
        let key = truncate_to_minute(time);
        if self.slots.contains_key(&key) {
            return Err(crate::Error::ScheduleUnavailable {
                day: self.day.clone(),
                reason: format!("duplicate entry for {}", key.format("%H:%M")),
            });
        }
        self.slots.insert(key, doses);
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert)
    ///
    /// # Errors
    ///
    /// Returns error if the time already has an entry
    pub fn with_slot(mut self, time: NaiveTime, doses: Vec<Dose>) -> Result<Self> {
        self.insert(time, doses)?;
        Ok(self)
    }

    /// Lowercase English weekday this plan is for
    #[must_use]
    pub fn day(&self) -> &str {
        &self.day
    }

    /// Doses due exactly at `time` (minute resolution)
    #[must_use]
    pub fn doses_at(&self, time: NaiveTime) -> Option<&[Dose]> {
        self.slots
            .get(&truncate_to_minute(time))
            .map(Vec::as_slice)
    }

    /// First slot strictly after `time`
    #[must_use]
    pub fn next_after(&self, time: NaiveTime) -> Option<(NaiveTime, &[Dose])> {
        let key = truncate_to_minute(time);
        self.slots
            .range(key..)
            .find(|(t, _)| **t > key)
            .map(|(t, d)| (*t, d.as_slice()))
    }

    /// All slots in clock order
    pub fn slots(&self) -> impl Iterator<Item = (NaiveTime, &[Dose])> {
        self.slots.iter().map(|(t, d)| (*t, d.as_slice()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Source of per-day plans
#[async_trait]
pub trait TherapyPlanProvider: Send + Sync {
    /// Plan for a lowercase English weekday
    ///
    /// # Errors
    ///
    /// Returns `ScheduleUnavailable` if no plan exists for the day
    async fn plan_for(&self, day: &str) -> Result<TherapyPlan>;
}

/// Lowercase English weekday name
#[must_use]
pub const fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

/// Italian weekday name, as shown to caregivers
#[must_use]
pub fn italian_day_name(day: &str) -> Option<&'static str> {
    let name = match day.to_lowercase().as_str() {
        "monday" => "Lunedì",
        "tuesday" => "Martedì",
        "wednesday" => "Mercoledì",
        "thursday" => "Giovedì",
        "friday" => "Venerdì",
        "saturday" => "Sabato",
        "sunday" => "Domenica",
        _ => return None,
    };
    Some(name)
}

/// Drop seconds and sub-second precision
#[must_use]
pub fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}
