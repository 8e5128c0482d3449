//! Scene events for the patient-facing display
//!
//! The controller publishes a [`SceneEvent`] whenever the background should
//! change. Delivery is fire-and-forget: with no subscribers the event is
//! dropped, and a subscriber that falls behind loses the oldest events.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Channel capacity for scene updates
const CHANNEL_CAPACITY: usize = 64;

/// Event name used when returning to the idle background
pub const IDLE_EVENT: &str = "background_idle_change";

/// Event name used for every other background
pub const CHANGE_EVENT: &str = "background_event_change";

/// Visual state of the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    /// Waiting for a trigger
    Idle,
    /// Caregivers are being contacted
    Alert,
    /// A medication round is running
    Medication,
    /// Positive feedback (feeling good, correct box)
    Happy,
    /// Negative feedback (feeling bad, wrong box)
    Sad,
    /// Waiting for the patient to show a box
    Photo,
}

impl Scene {
    /// Background image for this scene
    #[must_use]
    pub const fn asset(self) -> &'static str {
        match self {
            Self::Idle => "background.jpg",
            Self::Alert => "alert_background.jpg",
            Self::Medication => "medication_background.jpg",
            Self::Happy => "medication_happy_background.jpg",
            Self::Sad => "medication_sad_background.jpg",
            Self::Photo => "photo_background.jpg",
        }
    }

    /// Event name the display listens for
    #[must_use]
    pub const fn event_name(self) -> &'static str {
        match self {
            Self::Idle => IDLE_EVENT,
            _ => CHANGE_EVENT,
        }
    }
}

/// Named event with the background asset as payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEvent {
    pub name: String,
    pub image: String,
}

impl From<Scene> for SceneEvent {
    fn from(scene: Scene) -> Self {
        Self {
            name: scene.event_name().to_string(),
            image: scene.asset().to_string(),
        }
    }
}

/// Broadcast channel for scene changes
#[derive(Debug, Clone)]
pub struct SceneBus {
    tx: broadcast::Sender<SceneEvent>,
}

impl Default for SceneBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBus {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Subscribe to scene changes
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SceneEvent> {
        self.tx.subscribe()
    }

    /// Publish a scene change
    pub fn publish(&self, scene: Scene) {
        tracing::debug!(?scene, "scene change");
        // No subscribers is fine
        let _ = self.tx.send(SceneEvent::from(scene));
    }
}
