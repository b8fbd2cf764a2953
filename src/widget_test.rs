use std::sync::Arc;

use super::*;
use crate::services::chat::{ChatMessage, SenderRole};

fn persisted(role: SenderRole, text: &str) -> ChatMessage {
    ChatMessage {
        id: Uuid::new_v4(),
        user_auth_id: "u1".into(),
        sender_role: role,
        message: text.into(),
        created_at: "2026-08-29T12:00:00.000Z".into(),
    }
}

fn widget() -> ChatWidget {
    ChatWidget::new("u1", SenderRole::User, Box::new(MemoryMarkerStore::default()))
}

// =============================================================================
// Construction & basic state
// =============================================================================

#[test]
fn new_widget_is_closed_and_empty() {
    let w = widget();
    assert!(!w.is_open());
    assert!(w.messages().is_empty());
    assert!(w.error().is_none());
    assert_eq!(w.unread_count(), 0);
}

#[test]
fn new_widget_loads_marker_from_store() {
    let store = Arc::new(MemoryMarkerStore::default());
    let read = persisted(SenderRole::Admin, "earlier");
    store.save(&read.id.to_string());

    let mut w = ChatWidget::new("u1", SenderRole::User, Box::new(Arc::clone(&store)));
    let token = w.begin_poll();
    w.apply_poll(token, vec![read, persisted(SenderRole::Admin, "later")]);

    assert_eq!(w.unread_count(), 1);
}

#[test]
fn new_widget_ignores_garbage_marker() {
    let store = Arc::new(MemoryMarkerStore::default());
    store.save("not-a-uuid");

    let mut w = ChatWidget::new("u1", SenderRole::User, Box::new(store));
    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "hi")]);

    assert_eq!(w.unread_count(), 1);
}

#[test]
fn polls_now_user_widget_only_while_closed() {
    let mut w = widget();
    assert!(w.polls_now());
    w.open_panel();
    assert!(!w.polls_now());
    w.close_panel();
    assert!(w.polls_now());
}

#[test]
fn polls_now_admin_panel_only_while_open() {
    let mut w = ChatWidget::new("u1", SenderRole::Admin, Box::new(MemoryMarkerStore::default()));
    assert!(!w.polls_now());
    w.open_panel();
    assert!(w.polls_now());
}

// =============================================================================
// Poll sequencing
// =============================================================================

#[test]
fn apply_poll_replaces_messages() {
    let mut w = widget();
    let token = w.begin_poll();
    assert!(w.apply_poll(token, vec![persisted(SenderRole::User, "hello")]));
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.messages()[0].message, "hello");
}

#[test]
fn stale_poll_response_is_dropped() {
    let mut w = widget();
    let old_token = w.begin_poll();
    let new_token = w.begin_poll();

    assert!(w.apply_poll(new_token, vec![persisted(SenderRole::Admin, "fresh")]));
    assert!(!w.apply_poll(old_token, vec![persisted(SenderRole::Admin, "stale")]));

    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.messages()[0].message, "fresh");
}

#[test]
fn apply_poll_preserves_pending_entries() {
    let mut w = widget();
    let pending = w.begin_send("typing...").unwrap();

    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "from server")]);

    assert_eq!(w.messages().len(), 2);
    assert_eq!(w.messages()[0].message, "from server");
    assert_eq!(w.messages()[1].id, pending);
}

// =============================================================================
// Unread tracking
// =============================================================================

#[test]
fn unread_counts_all_admin_messages_without_marker() {
    let mut w = widget();
    let token = w.begin_poll();
    w.apply_poll(
        token,
        vec![
            persisted(SenderRole::User, "hi"),
            persisted(SenderRole::Admin, "hello"),
            persisted(SenderRole::Admin, "anything else?"),
        ],
    );
    assert_eq!(w.unread_count(), 2);
}

#[test]
fn unread_counts_all_admin_messages_when_marker_absent_from_list() {
    let store = Arc::new(MemoryMarkerStore::default());
    store.save(&Uuid::new_v4().to_string());

    let mut w = ChatWidget::new("u1", SenderRole::User, Box::new(store));
    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "hi")]);

    assert_eq!(w.unread_count(), 1);
}

#[test]
fn unread_ignores_user_authored_messages() {
    let mut w = widget();
    let token = w.begin_poll();
    w.apply_poll(
        token,
        vec![persisted(SenderRole::User, "a"), persisted(SenderRole::User, "b")],
    );
    assert_eq!(w.unread_count(), 0);
}

#[test]
fn open_panel_zeroes_unread_and_persists_marker() {
    let store = Arc::new(MemoryMarkerStore::default());
    let mut w = ChatWidget::new("u1", SenderRole::User, Box::new(Arc::clone(&store)));

    let newest = persisted(SenderRole::Admin, "second");
    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "first"), newest.clone()]);
    assert_eq!(w.unread_count(), 2);

    w.open_panel();
    assert!(w.is_open());
    assert_eq!(w.unread_count(), 0);
    assert_eq!(store.load().as_deref(), Some(newest.id.to_string().as_str()));
}

#[test]
fn open_panel_with_no_messages_leaves_marker_unset() {
    let store = Arc::new(MemoryMarkerStore::default());
    let mut w = ChatWidget::new("u1", SenderRole::User, Box::new(Arc::clone(&store)));
    w.open_panel();
    assert!(store.load().is_none());
}

#[test]
fn marker_advances_past_read_messages_only() {
    let mut w = widget();
    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "old")]);
    w.open_panel();
    w.close_panel();

    let token = w.begin_poll();
    let mut all = w.messages().to_vec();
    let mut refreshed: Vec<ChatMessage> = all
        .drain(..)
        .map(|m| ChatMessage {
            id: match m.id {
                MessageId::Persisted(id) => id,
                MessageId::Pending(_) => unreachable!(),
            },
            user_auth_id: "u1".into(),
            sender_role: m.sender_role,
            message: m.message,
            created_at: m.created_at,
        })
        .collect();
    refreshed.push(persisted(SenderRole::Admin, "new"));
    w.apply_poll(token, refreshed);

    assert_eq!(w.unread_count(), 1);
}

// =============================================================================
// Optimistic send
// =============================================================================

#[test]
fn begin_send_appends_pending_entry() {
    let mut w = widget();
    let id = w.begin_send("  hello there  ").unwrap();

    assert!(matches!(id, MessageId::Pending(_)));
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.messages()[0].message, "hello there");
    assert_eq!(w.messages()[0].sender_role, SenderRole::User);
}

#[test]
fn begin_send_rejects_empty_text() {
    let mut w = widget();
    assert!(w.begin_send("   ").is_none());
    assert!(w.messages().is_empty());
}

#[test]
fn begin_send_clears_previous_error() {
    let mut w = widget();
    let failed = w.begin_send("first").unwrap();
    w.fail_send(failed, "Failed to send message");
    assert!(w.error().is_some());

    w.begin_send("second").unwrap();
    assert!(w.error().is_none());
}

#[test]
fn confirm_send_swaps_pending_in_place() {
    let mut w = widget();
    let token = w.begin_poll();
    w.apply_poll(token, vec![persisted(SenderRole::Admin, "hi")]);

    let pending = w.begin_send("hello").unwrap();
    let confirmed = persisted(SenderRole::User, "hello");
    w.confirm_send(pending, confirmed.clone());

    assert_eq!(w.messages().len(), 2);
    assert_eq!(w.messages()[1].id, MessageId::Persisted(confirmed.id));
    assert_eq!(w.messages()[1].message, "hello");
}

#[test]
fn confirm_send_drops_pending_when_poll_already_delivered_it() {
    let mut w = widget();
    let pending = w.begin_send("hello").unwrap();

    // Poll lands first with the server copy; the pending entry is re-appended.
    let confirmed = persisted(SenderRole::User, "hello");
    let token = w.begin_poll();
    w.apply_poll(token, vec![confirmed.clone()]);
    assert_eq!(w.messages().len(), 2);

    w.confirm_send(pending, confirmed.clone());
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.messages()[0].id, MessageId::Persisted(confirmed.id));
}

#[test]
fn fail_send_removes_pending_and_surfaces_error() {
    let mut w = widget();
    let pending = w.begin_send("hello").unwrap();
    w.fail_send(pending, "Failed to send message");

    assert!(w.messages().is_empty());
    assert_eq!(w.error(), Some("Failed to send message"));
}

// =============================================================================
// End-to-end scenario (pure)
// =============================================================================

#[test]
fn user_and_admin_exchange_scenario() {
    let mut w = widget();

    // u1 sends "hello"; server confirms.
    let pending = w.begin_send("hello").unwrap();
    let hello = persisted(SenderRole::User, "hello");
    w.confirm_send(pending, hello.clone());

    // Admin replies; next poll picks both up in send order.
    let reply = persisted(SenderRole::Admin, "hi there");
    let token = w.begin_poll();
    w.apply_poll(token, vec![hello, reply]);

    assert_eq!(w.messages().len(), 2);
    assert_eq!(w.messages()[0].message, "hello");
    assert_eq!(w.messages()[1].message, "hi there");
    assert_eq!(w.unread_count(), 1);

    w.open_panel();
    assert_eq!(w.unread_count(), 0);
}

// =============================================================================
// Async drivers
// =============================================================================

struct StubTransport {
    messages: Vec<ChatMessage>,
    fail_send: bool,
}

#[async_trait]
impl ChatTransport for StubTransport {
    async fn fetch_messages(&self, _owner_id: &str) -> Result<Vec<ChatMessage>, TransportError> {
        Ok(self.messages.clone())
    }

    async fn send_message(
        &self,
        owner_id: &str,
        role: SenderRole,
        text: &str,
    ) -> Result<ChatMessage, TransportError> {
        if self.fail_send {
            return Err(TransportError("Failed to send message".into()));
        }
        Ok(ChatMessage {
            id: Uuid::new_v4(),
            user_auth_id: owner_id.into(),
            sender_role: role,
            message: text.into(),
            created_at: "2026-08-29T12:00:00.000Z".into(),
        })
    }
}

#[tokio::test]
async fn poll_once_applies_fetched_messages() {
    let widget = Mutex::new(widget());
    let transport = StubTransport { messages: vec![persisted(SenderRole::Admin, "hi")], fail_send: false };

    poll_once(&widget, &transport).await;

    let w = widget.lock().await;
    assert_eq!(w.messages().len(), 1);
    assert_eq!(w.unread_count(), 1);
}

#[tokio::test]
async fn send_message_confirms_on_success() {
    let widget = Mutex::new(widget());
    let transport = StubTransport { messages: Vec::new(), fail_send: false };

    assert!(send_message(&widget, &transport, "  hello  ").await);

    let w = widget.lock().await;
    assert_eq!(w.messages().len(), 1);
    assert!(matches!(w.messages()[0].id, MessageId::Persisted(_)));
    assert_eq!(w.messages()[0].message, "hello");
    assert!(w.error().is_none());
}

#[tokio::test]
async fn send_message_fails_and_abandons() {
    let widget = Mutex::new(widget());
    let transport = StubTransport { messages: Vec::new(), fail_send: true };

    assert!(!send_message(&widget, &transport, "hello").await);

    let w = widget.lock().await;
    assert!(w.messages().is_empty());
    assert_eq!(w.error(), Some("Failed to send message"));
}

#[tokio::test]
async fn send_message_skips_empty_input() {
    let widget = Mutex::new(widget());
    let transport = StubTransport { messages: Vec::new(), fail_send: false };

    assert!(!send_message(&widget, &transport, "   ").await);
    assert!(widget.lock().await.messages().is_empty());
}

#[tokio::test]
async fn spawn_poll_task_aborts_cleanly() {
    let widget = Arc::new(Mutex::new(widget()));
    let transport: Arc<dyn ChatTransport> =
        Arc::new(StubTransport { messages: vec![persisted(SenderRole::Admin, "hi")], fail_send: false });

    let handle = spawn_poll_task(Arc::clone(&widget), transport, Duration::from_millis(5));
    tokio::time::sleep(Duration::from_millis(30)).await;
    handle.abort();

    assert_eq!(widget.lock().await.messages().len(), 1);
}
