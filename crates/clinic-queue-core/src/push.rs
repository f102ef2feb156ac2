// Push notifications
//
// A subscription is one live connection to the backend. Events are only ever
// used as "something changed" triggers; their payloads are kept for logging.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PushEventKind {
    /// Queue composition or the currently served token changed
    #[serde(rename = "queueUpdate")]
    QueueUpdate,
    /// A token's fields changed
    #[serde(rename = "tokenUpdate")]
    TokenUpdate,
    /// A token was created
    #[serde(rename = "newToken")]
    NewToken,
    /// A token was removed
    #[serde(rename = "tokenDelete")]
    TokenDelete,
}

impl PushEventKind {
    pub const ALL: [PushEventKind; 4] = [
        PushEventKind::QueueUpdate,
        PushEventKind::TokenUpdate,
        PushEventKind::NewToken,
        PushEventKind::TokenDelete,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PushEventKind::QueueUpdate => "queueUpdate",
            PushEventKind::TokenUpdate => "tokenUpdate",
            PushEventKind::NewToken => "newToken",
            PushEventKind::TokenDelete => "tokenDelete",
        }
    }

    /// Parse a wire event name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for PushEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PushEvent {
    pub kind: PushEventKind,
    pub data: serde_json::Value,
}

impl PushEvent {
    pub fn new(kind: PushEventKind) -> Self {
        Self {
            kind,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(kind: PushEventKind, data: serde_json::Value) -> Self {
        Self { kind, data }
    }
}

/// Handle to one live push connection.
///
/// Producers forward events into the channel until `cancel` fires. Closing is
/// idempotent and also happens on drop.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<PushEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(events: mpsc::Receiver<PushEvent>, cancel: CancellationToken) -> Self {
        Self { events, cancel }
    }

    /// Create a subscription plus the sender and token a producer task needs
    pub fn channel(buffer: usize) -> (mpsc::Sender<PushEvent>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let cancel = CancellationToken::new();
        let subscription = Self::new(rx, cancel.clone());
        (tx, cancel, subscription)
    }

    /// Next event, or `None` once the connection is closed or ended
    pub async fn next(&mut self) -> Option<PushEvent> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.events.recv().await
    }

    pub fn close(&mut self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!("Closing push subscription");
        }
        self.cancel.cancel();
        self.events.close();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
