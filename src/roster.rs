//! Admin roster — owner listing and panel session bootstrap for the
//! operator-facing chat surface.
//!
//! The roster is fetched once per mount; selecting an owner starts a panel
//! session, which is the same `ChatWidget` machinery as the user widget
//! with the sender role fixed to admin and a tighter poll cadence. Sends
//! from the panel follow the same optimistic begin/confirm/fail path; the
//! panel's 3s poll reconciles the list afterwards.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::services::chat::{OwnerSummary, SenderRole};
use crate::widget::{ChatWidget, HttpChatTransport, ReadMarkerStore, TransportError};

/// Wire access to the owner-summary endpoint.
#[async_trait]
pub trait RosterTransport: Send + Sync {
    async fn fetch_owner_summaries(&self) -> Result<Vec<OwnerSummary>, TransportError>;
}

/// Token for one roster fetch; stale responses are dropped on apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RosterToken(u64);

#[derive(Default)]
pub struct AdminRoster {
    entries: Vec<OwnerSummary>,
    selected: Option<String>,
    fetch_seq: u64,
}

impl AdminRoster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> &[OwnerSummary] {
        &self.entries
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn begin_fetch(&mut self) -> RosterToken {
        self.fetch_seq += 1;
        RosterToken(self.fetch_seq)
    }

    /// Apply fetched roster rows. Returns false (and changes nothing) when
    /// the token is stale. When nothing is selected yet, the most active
    /// owner is selected automatically.
    pub fn apply_fetch(&mut self, token: RosterToken, rows: Vec<OwnerSummary>) -> bool {
        if token.0 != self.fetch_seq {
            debug!(token = token.0, newest = self.fetch_seq, "dropping stale roster response");
            return false;
        }

        self.entries = rows;
        if self.selected.is_none() {
            self.selected = self.entries.first().map(|row| row.user_auth_id.clone());
        }
        true
    }

    /// Select an owner's conversation. Returns true when the selection
    /// changed (the embedder should start a new panel session).
    pub fn select_owner(&mut self, owner_id: impl Into<String>) -> bool {
        let owner_id = owner_id.into();
        if self.selected.as_deref() == Some(owner_id.as_str()) {
            return false;
        }
        self.selected = Some(owner_id);
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Start a panel session for the selected owner: an admin-role widget,
    /// already open so its poll loop runs.
    #[must_use]
    pub fn start_panel(&self, marker: Box<dyn ReadMarkerStore>) -> Option<ChatWidget> {
        let owner_id = self.selected.as_deref()?;
        let mut panel = ChatWidget::new(owner_id, SenderRole::Admin, marker);
        panel.open_panel();
        Some(panel)
    }
}

/// Mount-time roster load. Fetch failures leave the roster untouched.
pub async fn fetch_roster(roster: &Mutex<AdminRoster>, transport: &dyn RosterTransport) {
    let token = roster.lock().await.begin_fetch();
    match transport.fetch_owner_summaries().await {
        Ok(rows) => {
            roster.lock().await.apply_fetch(token, rows);
        }
        Err(e) => {
            warn!(error = %e, "roster fetch failed");
        }
    }
}

#[async_trait]
impl RosterTransport for HttpChatTransport {
    async fn fetch_owner_summaries(&self) -> Result<Vec<OwnerSummary>, TransportError> {
        #[derive(serde::Deserialize)]
        struct Envelope {
            users: Vec<OwnerSummary>,
        }

        let value = self.get_json("/admin/chats").await?;
        serde_json::from_value::<Envelope>(value)
            .map(|envelope| envelope.users)
            .map_err(|e| TransportError(e.to_string()))
    }
}

#[cfg(test)]
#[path = "roster_test.rs"]
mod tests;
