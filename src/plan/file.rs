//! Therapy plans stored as one TOML file per weekday
//!
//! ```toml
//! [[dose]]
//! time = "08:00"
//! medications = [{ name = "Aspirina", quantity = "1" }]
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::Deserialize;

use super::{Dose, TherapyPlan, TherapyPlanProvider};
use crate::{Error, Result};

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default, rename = "dose")]
    doses: Vec<SlotEntry>,
}

#[derive(Debug, Deserialize)]
struct SlotEntry {
    time: String,
    #[serde(default)]
    medications: Vec<MedicationEntry>,
}

#[derive(Debug, Deserialize)]
struct MedicationEntry {
    name: String,
    quantity: String,
}

/// Reads `<dir>/<day>.toml`
#[derive(Debug, Clone)]
pub struct FilePlanProvider {
    dir: PathBuf,
}

impl FilePlanProvider {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Plan file path for a weekday
    #[must_use]
    pub fn path_for(&self, day: &str) -> PathBuf {
        self.dir.join(format!("{day}.toml"))
    }

    /// Parse plan file contents for `day`
    ///
    /// # Errors
    ///
    /// Returns `ScheduleUnavailable` on malformed TOML, bad times or duplicate slots
    pub fn parse(day: &str, content: &str) -> Result<TherapyPlan> {
        let unavailable = |reason: String| Error::ScheduleUnavailable {
            day: day.to_string(),
            reason,
        };

        let file: PlanFile = toml::from_str(content).map_err(|e| unavailable(e.to_string()))?;

        let mut plan = TherapyPlan::new(day);
        for entry in file.doses {
            let time = NaiveTime::parse_from_str(entry.time.trim(), "%H:%M")
                .map_err(|e| unavailable(format!("invalid time {:?}: {e}", entry.time)))?;
            let doses = entry
                .medications
                .into_iter()
                .filter(|m| !m.name.trim().is_empty())
                .map(|m| Dose::new(m.name.trim(), m.quantity.trim()))
                .collect();
            plan.insert(time, doses)?;
        }
        Ok(plan)
    }
}

#[async_trait]
impl TherapyPlanProvider for FilePlanProvider {
    async fn plan_for(&self, day: &str) -> Result<TherapyPlan> {
        let path = self.path_for(day);
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| Error::ScheduleUnavailable {
            day: day.to_string(),
            reason: format!("{}: {e}", path.display()),
        })?;

        let plan = Self::parse(day, &content)?;
        tracing::info!(day, slots = plan.len(), path = %path.display(), "loaded therapy plan");
        Ok(plan)
    }
}
