//! Telegram Bot API gateway
//!
//! Sends caregiver messages and box photos, resolves caregiver usernames to
//! chat ids, and long-polls `getUpdates` for the relay bot.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CaregiverCommand, Notifier};
use crate::vision::PhotoArchive;
use crate::{Error, Result};

/// Telegram Bot API base URL
const API_BASE: &str = "https://api.telegram.org/bot";

/// Long-poll timeout for the relay, in seconds
const LONG_POLL_SECS: u64 = 30;

/// Update ids remembered by the relay
const DEDUP_CAPACITY: usize = 2000;

/// Remembers recently handled update ids
///
/// `getUpdates` can return an update again if the offset acknowledgement
/// races a restart; the oldest ids are evicted first.
#[derive(Debug)]
pub struct UpdateDedup {
    seen: HashSet<i64>,
    order: VecDeque<i64>,
    capacity: usize,
}

impl Default for UpdateDedup {
    fn default() -> Self {
        Self::with_capacity(DEDUP_CAPACITY)
    }
}

impl UpdateDedup {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// `true` if `update_id` was already seen; records it otherwise
    pub fn is_duplicate(&mut self, update_id: i64) -> bool {
        if self.seen.contains(&update_id) {
            return true;
        }
        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.seen.remove(&oldest);
        }
        self.seen.insert(update_id);
        self.order.push_back(update_id);
        false
    }
}

/// Thin Bot API client
#[derive(Clone)]
pub struct TelegramGateway {
    token: String,
    client: Client,
}

impl TelegramGateway {
    /// # Errors
    ///
    /// Returns error if the token is empty
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::Config("Telegram bot token is empty".to_string()));
        }
        Ok(Self {
            token,
            client: Client::new(),
        })
    }

    fn url(&self, method: &str) -> String {
        format!("{API_BASE}{}/{method}", self.token)
    }

    /// Send plain text to a chat
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url("sendMessage"))
            .json(&SendMessageRequest { chat_id, text })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendMessage error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendMessage error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, "Telegram message sent");
        Ok(())
    }

    /// Upload a JPEG with a caption
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or the API request fails
    pub async fn send_photo(&self, chat_id: i64, path: &Path, caption: &str) -> Result<()> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "photo.jpg".to_string(), |n| n.to_string_lossy().into_owned());
        let photo = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/jpeg")
            .map_err(|e| Error::Channel(e.to_string()))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let response = self
            .client
            .post(self.url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram sendPhoto error: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Channel(format!(
                "Telegram sendPhoto error: {status} - {body}"
            )));
        }

        tracing::debug!(chat_id, path = %path.display(), "Telegram photo sent");
        Ok(())
    }

    /// Fetch pending updates
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Telegram reports `ok: false`
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let response: GetUpdatesResponse = self
            .client
            .post(self.url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&GetUpdatesRequest {
                offset,
                timeout: timeout_secs,
                allowed_updates: &["message"],
            })
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram getUpdates error: {e}")))?
            .json()
            .await?;

        if !response.ok {
            return Err(Error::Channel(format!(
                "Telegram getUpdates error: {}",
                response.description.unwrap_or_default()
            )));
        }
        Ok(response.result)
    }

    /// Drop any webhook so `getUpdates` works
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails
    pub async fn delete_webhook(&self) -> Result<()> {
        self.client
            .post(self.url("deleteWebhook"))
            .send()
            .await
            .map_err(|e| Error::Channel(format!("Telegram deleteWebhook error: {e}")))?;
        Ok(())
    }

    /// Map caregiver usernames to chat ids using the bot's pending updates
    ///
    /// A caregiver is resolvable once they have written to the bot. Handles
    /// are matched case-insensitively; unresolved ones are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns error if `getUpdates` fails
    pub async fn resolve_chat_ids(&self, handles: &[String]) -> Result<Vec<String>> {
        if handles.is_empty() {
            return Ok(Vec::new());
        }
        let updates = self.get_updates(None, 0).await?;
        let resolved = match_handles(handles, &updates);
        tracing::info!(
            requested = handles.len(),
            resolved = resolved.len(),
            "caregiver handles resolved"
        );
        Ok(resolved)
    }
}

/// Chat ids for `handles`, in handle order
fn match_handles(handles: &[String], updates: &[Update]) -> Vec<String> {
    let mut resolved = Vec::new();
    for handle in handles {
        let chat = updates
            .iter()
            .filter_map(|u| u.message.as_ref())
            .map(|m| &m.chat)
            .find(|c| {
                c.username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(handle))
            });
        match chat {
            Some(chat) => resolved.push(chat.id.to_string()),
            None => tracing::warn!(handle, "caregiver has not messaged the bot, skipping"),
        }
    }
    resolved
}

/// [`Notifier`] that renders commands and posts them to caregiver chats
#[derive(Clone)]
pub struct TelegramNotifier {
    gateway: TelegramGateway,
    photos: Option<PhotoArchive>,
    caregivers: Vec<String>,
}

impl TelegramNotifier {
    /// With `photos`, recaps to caregiver chats carry the day's box photos
    #[must_use]
    pub const fn new(gateway: TelegramGateway, photos: Option<PhotoArchive>) -> Self {
        Self {
            gateway,
            photos,
            caregivers: Vec::new(),
        }
    }

    /// Chats allowed to receive box photos
    #[must_use]
    pub fn with_caregivers(mut self, caregivers: &[String]) -> Self {
        self.caregivers = caregivers.to_vec();
        self
    }

    /// Archive to attach to a recap for `chat_id`, if that chat is a caregiver's
    fn photos_for(&self, chat_id: i64) -> Option<&PhotoArchive> {
        let chat = chat_id.to_string();
        self.photos
            .as_ref()
            .filter(|_| self.caregivers.iter().any(|c| c.trim() == chat))
    }

    #[must_use]
    pub const fn gateway(&self) -> &TelegramGateway {
        &self.gateway
    }

    async fn deliver(&self, chat_id: i64, command: &CaregiverCommand) -> Result<()> {
        self.gateway.send_message(chat_id, &command.render()).await?;

        if let (CaregiverCommand::SendRecap { day, .. }, Some(archive)) =
            (command, self.photos_for(chat_id))
        {
            for (medication, path) in archive.list(day).await? {
                // A missing photo does not undo the recap text
                if let Err(e) = self.gateway.send_photo(chat_id, &path, &medication).await {
                    tracing::warn!(chat_id, medication, error = %e, "recap photo not sent");
                }
            }
        }
        Ok(())
    }

    /// Spawn the relay bot
    ///
    /// Long-polls `getUpdates`, answers `/start` and `/help`, and echoes
    /// `/sendhelp` and `/sendrecap` back as rendered messages. Only caregiver
    /// chats get photos with an echoed recap.
    #[must_use]
    pub fn start_relay(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let notifier = self.clone();

        tokio::spawn(async move {
            if let Err(e) = notifier.gateway.delete_webhook().await {
                tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
            }

            let mut offset: Option<i64> = None;
            let mut dedup = UpdateDedup::default();

            loop {
                match notifier.gateway.get_updates(offset, LONG_POLL_SECS).await {
                    Ok(updates) => {
                        for update in updates {
                            offset = Some(update.update_id + 1);
                            if dedup.is_duplicate(update.update_id) {
                                continue;
                            }
                            let Some((chat_id, command)) = update_command(&update) else {
                                continue;
                            };
                            tracing::info!(chat_id, %command, "relay command");
                            if let Err(e) = notifier.deliver(chat_id, &command).await {
                                tracing::warn!(chat_id, error = %e, "relay reply failed");
                            }
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "Telegram getUpdates error"),
                }

                tokio::time::sleep(interval).await;
            }
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat_id: &str, command: &CaregiverCommand) -> Result<()> {
        let failed = |reason: String| Error::NotificationDeliveryFailed {
            chat_id: chat_id.to_string(),
            reason,
        };
        let id: i64 = chat_id
            .trim()
            .parse()
            .map_err(|_| failed("chat id is not numeric".to_string()))?;

        self.deliver(id, command)
            .await
            .map_err(|e| failed(e.to_string()))?;
        tracing::info!(chat_id, %command, "caregiver notified");
        Ok(())
    }
}

/// Parse a command out of a text message, ignoring other traffic
fn update_command(update: &Update) -> Option<(i64, CaregiverCommand)> {
    let message = update.message.as_ref()?;
    let text = message.text.as_deref()?;
    match text.parse() {
        Ok(command) => Some((message.chat.id, command)),
        Err(_) => {
            tracing::debug!(chat_id = message.chat.id, "ignoring non-command message");
            None
        }
    }
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
}

#[derive(Serialize)]
struct GetUpdatesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<Update>,
    description: Option<String>,
}

/// A single update from `getUpdates`
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<UpdateMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMessage {
    pub chat: UpdateChat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateChat {
    pub id: i64,
    pub username: Option<String>,
}
