//! Chat widget core — state machine and polling driver for the user-facing
//! chat surface.
//!
//! DESIGN
//! ======
//! `ChatWidget` is a pure state machine: closed/open panel, the loaded
//! message list, the last-read marker, and an optimistic-send protocol. The
//! embedding frontend drives it through the async helpers below, which pair
//! it with a `ChatTransport` (HTTP in production, a stub in tests).
//!
//! Polls are sequenced: `begin_poll` hands out a monotonic token and
//! `apply_poll` only accepts the newest outstanding one, so a slow response
//! arriving after a fresher one can never overwrite newer state. The poll
//! task is a plain tokio handle; aborting it on unmount is the cancellation
//! story.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::services::chat::{ChatMessage, SenderRole};

/// Background fetch cadence for the user widget (badge freshness).
pub const USER_POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Fetch cadence for the admin panel while a conversation is on screen.
pub const ADMIN_POLL_INTERVAL: Duration = Duration::from_secs(3);

// =============================================================================
// TRANSPORT & STORAGE SEAMS
// =============================================================================

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Wire access to the chat endpoints.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn fetch_messages(&self, owner_id: &str) -> Result<Vec<ChatMessage>, TransportError>;
    async fn send_message(
        &self,
        owner_id: &str,
        role: SenderRole,
        text: &str,
    ) -> Result<ChatMessage, TransportError>;
}

/// Key-value slot holding the last-read message id. Injected so the widget
/// never reaches for ambient storage directly.
pub trait ReadMarkerStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, message_id: &str);
}

impl<T: ReadMarkerStore + ?Sized> ReadMarkerStore for Arc<T> {
    fn load(&self) -> Option<String> {
        (**self).load()
    }

    fn save(&self, message_id: &str) {
        (**self).save(message_id);
    }
}

/// In-memory marker store for tests and embedders without platform storage.
#[derive(Default)]
pub struct MemoryMarkerStore(std::sync::Mutex<Option<String>>);

impl ReadMarkerStore for MemoryMarkerStore {
    fn load(&self) -> Option<String> {
        self.0.lock().ok().and_then(|slot| slot.clone())
    }

    fn save(&self, message_id: &str) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(message_id.to_owned());
        }
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Identity of a displayed message: persisted rows carry the server id,
/// optimistic entries a temporary one that never leaves the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageId {
    Persisted(Uuid),
    Pending(Uuid),
}

#[derive(Debug, Clone)]
pub struct DisplayMessage {
    pub id: MessageId,
    pub sender_role: SenderRole,
    pub message: String,
    pub created_at: String,
}

impl DisplayMessage {
    fn from_persisted(msg: ChatMessage) -> Self {
        Self {
            id: MessageId::Persisted(msg.id),
            sender_role: msg.sender_role,
            message: msg.message,
            created_at: msg.created_at,
        }
    }
}

/// Token for one poll cycle. Only the newest outstanding token is accepted
/// by `apply_poll`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollToken(u64);

pub struct ChatWidget {
    owner_id: String,
    sender_role: SenderRole,
    open: bool,
    messages: Vec<DisplayMessage>,
    error: Option<String>,
    last_read: Option<Uuid>,
    poll_seq: u64,
    marker: Box<dyn ReadMarkerStore>,
}

impl ChatWidget {
    #[must_use]
    pub fn new(owner_id: impl Into<String>, sender_role: SenderRole, marker: Box<dyn ReadMarkerStore>) -> Self {
        let last_read = marker.load().and_then(|raw| Uuid::parse_str(&raw).ok());
        Self {
            owner_id: owner_id.into(),
            sender_role,
            open: false,
            messages: Vec::new(),
            error: None,
            last_read,
            poll_seq: 0,
            marker,
        }
    }

    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    #[must_use]
    pub fn sender_role(&self) -> SenderRole {
        self.sender_role
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the poll task should fetch right now. The user widget polls
    /// in the background to keep the unread badge current and pauses while
    /// the panel is open; the admin panel only polls while a conversation
    /// is on screen.
    #[must_use]
    pub fn polls_now(&self) -> bool {
        match self.sender_role {
            SenderRole::User => !self.open,
            SenderRole::Admin => self.open,
        }
    }

    // -------------------------------------------------------------------------
    // Polling
    // -------------------------------------------------------------------------

    /// Start a poll cycle. Taking a new token invalidates all older ones.
    pub fn begin_poll(&mut self) -> PollToken {
        self.poll_seq += 1;
        PollToken(self.poll_seq)
    }

    /// Apply a fetched message list. Returns false (and changes nothing)
    /// when the token is stale. Unconfirmed optimistic entries are
    /// re-appended after the fetched rows.
    pub fn apply_poll(&mut self, token: PollToken, fetched: Vec<ChatMessage>) -> bool {
        if token.0 != self.poll_seq {
            debug!(token = token.0, newest = self.poll_seq, "dropping stale poll response");
            return false;
        }

        let pending: Vec<DisplayMessage> = self
            .messages
            .iter()
            .filter(|m| matches!(m.id, MessageId::Pending(_)))
            .cloned()
            .collect();

        self.messages = fetched.into_iter().map(DisplayMessage::from_persisted).collect();
        self.messages.extend(pending);
        true
    }

    // -------------------------------------------------------------------------
    // Unread tracking
    // -------------------------------------------------------------------------

    /// Admin-authored messages after the last-read marker. A missing or
    /// no-longer-present marker counts every admin message as unread.
    #[must_use]
    pub fn unread_count(&self) -> usize {
        let start = self.last_read.and_then(|read_id| {
            self.messages
                .iter()
                .position(|m| m.id == MessageId::Persisted(read_id))
                .map(|idx| idx + 1)
        });

        self.messages[start.unwrap_or(0)..]
            .iter()
            .filter(|m| m.sender_role == SenderRole::Admin)
            .count()
    }

    /// Open the panel, marking everything currently loaded as read.
    pub fn open_panel(&mut self) {
        self.open = true;
        self.mark_read();
    }

    pub fn close_panel(&mut self) {
        self.open = false;
    }

    fn mark_read(&mut self) {
        let newest = self.messages.iter().rev().find_map(|m| match m.id {
            MessageId::Persisted(id) => Some(id),
            MessageId::Pending(_) => None,
        });
        if let Some(id) = newest {
            self.last_read = Some(id);
            self.marker.save(&id.to_string());
        }
    }

    // -------------------------------------------------------------------------
    // Optimistic send
    // -------------------------------------------------------------------------

    /// Append an optimistic pending entry and return its id. `None` when
    /// the trimmed text is empty (nothing to send).
    pub fn begin_send(&mut self, text: &str) -> Option<MessageId> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.error = None;
        let id = MessageId::Pending(Uuid::new_v4());
        self.messages.push(DisplayMessage {
            id,
            sender_role: self.sender_role,
            message: text.to_owned(),
            created_at: local_timestamp(),
        });
        Some(id)
    }

    /// Replace the pending entry with the server-confirmed message. If the
    /// server copy already arrived via a poll, the pending entry is dropped
    /// instead of duplicated.
    pub fn confirm_send(&mut self, pending: MessageId, confirmed: ChatMessage) {
        let already_present = self
            .messages
            .iter()
            .any(|m| m.id == MessageId::Persisted(confirmed.id));

        if already_present {
            self.messages.retain(|m| m.id != pending);
            return;
        }

        if let Some(entry) = self.messages.iter_mut().find(|m| m.id == pending) {
            *entry = DisplayMessage::from_persisted(confirmed);
        }
    }

    /// Remove the pending entry and surface the error.
    pub fn fail_send(&mut self, pending: MessageId, error: impl Into<String>) {
        self.messages.retain(|m| m.id != pending);
        self.error = Some(error.into());
    }
}

fn local_timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default()
}

// =============================================================================
// ASYNC DRIVERS
// =============================================================================

/// One fetch-and-apply cycle. The token is taken before the await and
/// checked after, so a response that lost the race is dropped.
pub async fn poll_once(widget: &Mutex<ChatWidget>, transport: &dyn ChatTransport) {
    let (token, owner_id) = {
        let mut widget = widget.lock().await;
        (widget.begin_poll(), widget.owner_id().to_owned())
    };

    match transport.fetch_messages(&owner_id).await {
        Ok(messages) => {
            widget.lock().await.apply_poll(token, messages);
        }
        Err(e) => {
            warn!(error = %e, owner_id, "message fetch failed");
        }
    }
}

/// Spawn the widget's poll loop. Abort the handle on unmount.
pub fn spawn_poll_task(
    widget: Arc<Mutex<ChatWidget>>,
    transport: Arc<dyn ChatTransport>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if widget.lock().await.polls_now() {
                poll_once(&widget, transport.as_ref()).await;
            }
        }
    })
}

/// Drive one optimistic send: pending entry first, then confirm or fail
/// depending on the transport result. Returns true when the server
/// confirmed the message. A failed send is abandoned; there is no retry.
pub async fn send_message(widget: &Mutex<ChatWidget>, transport: &dyn ChatTransport, text: &str) -> bool {
    let (pending, owner_id, role) = {
        let mut widget = widget.lock().await;
        let Some(pending) = widget.begin_send(text) else {
            return false;
        };
        (pending, widget.owner_id().to_owned(), widget.sender_role())
    };

    match transport.send_message(&owner_id, role, text.trim()).await {
        Ok(confirmed) => {
            widget.lock().await.confirm_send(pending, confirmed);
            true
        }
        Err(e) => {
            widget.lock().await.fail_send(pending, e.to_string());
            false
        }
    }
}

// =============================================================================
// HTTP TRANSPORT
// =============================================================================

/// Production transport against the crate's own chat endpoints.
pub struct HttpChatTransport {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChatTransport {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: reqwest::Client::new() }
    }

    pub(crate) async fn get_json(&self, path: &str) -> Result<serde_json::Value, TransportError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_body(resp).await);
        }

        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError(e.to_string()))
    }

    async fn error_body(resp: reqwest::Response) -> TransportError {
        #[derive(serde::Deserialize)]
        struct ErrorBody {
            error: String,
        }
        match resp.json::<ErrorBody>().await {
            Ok(body) => TransportError(body.error),
            Err(_) => TransportError("Failed to send message".to_owned()),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn fetch_messages(&self, owner_id: &str) -> Result<Vec<ChatMessage>, TransportError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            messages: Vec<ChatMessage>,
        }

        let resp = self
            .client
            .get(format!("{}/chat", self.base_url))
            .query(&[("user_auth_id", owner_id)])
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_body(resp).await);
        }

        let envelope = resp
            .json::<Envelope>()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(envelope.messages)
    }

    async fn send_message(
        &self,
        owner_id: &str,
        role: SenderRole,
        text: &str,
    ) -> Result<ChatMessage, TransportError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            message: ChatMessage,
        }

        let resp = self
            .client
            .post(format!("{}/chat", self.base_url))
            .json(&serde_json::json!({
                "user_auth_id": owner_id,
                "sender_role": role.as_str(),
                "message": text,
            }))
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::error_body(resp).await);
        }

        let envelope = resp
            .json::<Envelope>()
            .await
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(envelope.message)
    }
}

#[cfg(test)]
#[path = "widget_test.rs"]
mod tests;
