//! Patient registry
//!
//! The registry names the patient and lists the caregivers to notify. Caregivers
//! are given either as Telegram handles (resolved to chat ids at startup) or as
//! literal chat ids.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The person being assisted
///
/// Immutable for the controller's lifetime once caregivers are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patient {
    /// Name used in prompts and caregiver messages
    pub name: String,

    /// Gender as written in the registry
    pub gender: Option<String>,

    /// Age in years
    pub age: Option<u32>,

    /// Caregiver chat ids, deduplicated, in registry order
    caregivers: Vec<String>,
}

/// How many caregivers will receive a notification
///
/// Drives the singular/plural wording of spoken prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaregiverCount {
    /// Nobody to notify
    None,
    /// Exactly one caregiver
    One,
    /// Two or more caregivers
    Many,
}

impl Patient {
    /// Create a patient with the given caregiver chat ids
    #[must_use]
    pub fn new(name: impl Into<String>, caregivers: impl IntoIterator<Item = String>) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for id in caregivers {
            let id = id.trim().to_string();
            if !id.is_empty() && !unique.contains(&id) {
                unique.push(id);
            }
        }

        Self {
            name: name.into(),
            gender: None,
            age: None,
            caregivers: unique,
        }
    }

    /// Caregiver chat ids
    #[must_use]
    pub fn caregivers(&self) -> &[String] {
        &self.caregivers
    }

    /// Singular/plural classification of the caregiver set
    #[must_use]
    pub fn caregiver_count(&self) -> CaregiverCount {
        match self.caregivers.len() {
            0 => CaregiverCount::None,
            1 => CaregiverCount::One,
            _ => CaregiverCount::Many,
        }
    }
}

/// On-disk registry entry
#[derive(Debug, Clone, Deserialize)]
pub struct PatientRegistry {
    /// Patient name
    pub name: String,

    #[serde(default)]
    pub gender: Option<String>,

    #[serde(default)]
    pub age: Option<u32>,

    /// Telegram usernames to resolve through the bot's update history
    #[serde(default)]
    pub caregiver_handles: Vec<String>,

    /// Chat ids that need no resolution
    #[serde(default)]
    pub caregiver_chat_ids: Vec<String>,
}

impl PatientRegistry {
    /// Load the registry from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file is missing or malformed
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Registry(format!("{}: {e}", path.display())))?;
        let registry = Self::parse(&content)?;
        tracing::info!(
            path = %path.display(),
            handles = registry.caregiver_handles.len(),
            chat_ids = registry.caregiver_chat_ids.len(),
            "loaded patient registry"
        );
        Ok(registry)
    }

    /// Parse registry TOML
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or the name is blank
    pub fn parse(content: &str) -> Result<Self> {
        let registry: Self =
            toml::from_str(content).map_err(|e| Error::Registry(e.to_string()))?;
        if registry.name.trim().is_empty() {
            return Err(Error::Registry("patient name is empty".to_string()));
        }
        Ok(registry)
    }

    /// Handles with any leading `@` removed
    #[must_use]
    pub fn handles(&self) -> Vec<String> {
        self.caregiver_handles
            .iter()
            .map(|h| h.trim().trim_start_matches('@').to_string())
            .filter(|h| !h.is_empty())
            .collect()
    }

    /// Build the patient from literal chat ids plus those resolved from handles
    #[must_use]
    pub fn into_patient(self, resolved: Vec<String>) -> Patient {
        let mut patient = Patient::new(
            self.name.trim(),
            self.caregiver_chat_ids.into_iter().chain(resolved),
        );
        patient.gender = self.gender;
        patient.age = self.age;
        patient
    }
}
