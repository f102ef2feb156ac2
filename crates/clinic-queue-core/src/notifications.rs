// Transient notifications
//
// One-shot confirmations ("Now serving token #12") shown one at a time, in
// arrival order, each auto-dismissed after a fixed duration. Kept apart from the
// persistent error state.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    /// Increases by one per emitted message within a view
    pub id: u64,
    pub message: String,
}

#[derive(Debug)]
pub struct NotificationQueue {
    ttl: Duration,
    emitted: u64,
    current: Option<(Notification, Instant)>,
    pending: VecDeque<Notification>,
}

impl NotificationQueue {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            emitted: 0,
            current: None,
            pending: VecDeque::new(),
        }
    }

    /// Enqueue a message; shown immediately if nothing else is on screen
    pub fn push(&mut self, message: impl Into<String>, now: Instant) -> u64 {
        self.emitted += 1;
        let notification = Notification {
            id: self.emitted,
            message: message.into(),
        };
        if self.current.is_none() {
            self.current = Some((notification, now + self.ttl));
        } else {
            self.pending.push_back(notification);
        }
        self.emitted
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref().map(|(n, _)| n)
    }

    /// When the visible message should be dismissed
    pub fn deadline(&self) -> Option<Instant> {
        self.current.as_ref().map(|(_, at)| *at)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Dismiss the visible message if its time is up. Returns true on change.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.deadline() {
            Some(at) if at <= now => {
                self.promote(now);
                true
            }
            _ => false,
        }
    }

    /// Dismiss the visible message early. Returns true on change.
    pub fn dismiss(&mut self, now: Instant) -> bool {
        if self.current.is_none() {
            return false;
        }
        self.promote(now);
        true
    }

    fn promote(&mut self, now: Instant) {
        self.current = self.pending.pop_front().map(|n| (n, now + self.ttl));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(3);

    #[test]
    fn test_messages_shown_in_order_one_at_a_time() {
        let start = Instant::now();
        let mut queue = NotificationQueue::new(TTL);

        queue.push("Now serving token #101", start);
        queue.push("Patient skipped", start);

        assert_eq!(queue.current().unwrap().message, "Now serving token #101");
        assert_eq!(queue.pending_len(), 1);

        assert!(!queue.expire(start + Duration::from_secs(1)));
        assert!(queue.expire(start + TTL));
        assert_eq!(queue.current().unwrap().message, "Patient skipped");
        assert_eq!(queue.deadline(), Some(start + TTL + TTL));

        assert!(queue.expire(start + TTL + TTL));
        assert!(queue.current().is_none());
        assert_eq!(queue.emitted(), 2);
    }

    #[test]
    fn test_dismiss_promotes_next() {
        let start = Instant::now();
        let mut queue = NotificationQueue::new(TTL);
        assert!(!queue.dismiss(start));

        queue.push("a", start);
        queue.push("b", start);
        let later = start + Duration::from_millis(500);
        assert!(queue.dismiss(later));
        assert_eq!(queue.current().unwrap().id, 2);
        assert_eq!(queue.deadline(), Some(later + TTL));
    }
}
