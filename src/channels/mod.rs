//! Caregiver messaging
//!
//! The controller only sees the [`Notifier`] trait. Telegram is the one
//! concrete gateway; it also runs the relay bot caregivers talk to.

mod commands;
mod telegram;

use async_trait::async_trait;

pub use commands::CaregiverCommand;
pub use telegram::{TelegramGateway, TelegramNotifier, Update, UpdateChat, UpdateDedup, UpdateMessage};

use crate::{Error, Result};

/// Outbound caregiver notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver `command` to one caregiver chat
    ///
    /// # Errors
    ///
    /// Returns `NotificationDeliveryFailed` if the message could not be sent
    async fn notify(&self, chat_id: &str, command: &CaregiverCommand) -> Result<()>;
}

/// Notifier used when no bot token is configured; every send fails
#[derive(Debug, Default)]
pub struct UnconfiguredNotifier;

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn notify(&self, chat_id: &str, command: &CaregiverCommand) -> Result<()> {
        tracing::warn!(chat_id, %command, "no Telegram bot token, notification dropped");
        Err(Error::NotificationDeliveryFailed {
            chat_id: chat_id.to_string(),
            reason: "Telegram bot token not configured".to_string(),
        })
    }
}
