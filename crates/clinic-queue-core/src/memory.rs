// In-memory implementations for examples and testing
//
// `InMemoryQueue` behaves like a small queue backend: it owns the tokens, checks
// bearer tokens on privileged calls and broadcasts push events after every
// change. Each `InMemoryQueueClient` is one front end's connection to it.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::model::{
    AdvanceOutcome, NewToken, QueueSnapshot, Token, TokenId, TokenNumber, TokenPatch, TokenStatus,
};
use crate::push::{PushEvent, PushEventKind, Subscription};
use crate::session::{Role, Route, SessionCredential, User};
use crate::traits::{CredentialStore, Navigator, PushChannel, QueueClient, RedirectReason};

const EVENT_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 64;

// ============================================================================
// InMemoryQueue - the backend
// ============================================================================

#[derive(Debug)]
struct Backend {
    /// Creation order; the waiting list is derived from it
    tokens: Vec<Token>,
    current: Option<TokenId>,
    next_number: u64,
    average_wait_time: f64,
    users: HashMap<String, (String, Role)>,
    sessions: HashMap<String, Role>,
    status_failure: Option<QueueError>,
}

impl Backend {
    fn snapshot(&self) -> QueueSnapshot {
        let current_token = self
            .current
            .as_ref()
            .and_then(|id| self.tokens.iter().find(|t| &t.id == id))
            .cloned();
        let waiting_tokens = self
            .tokens
            .iter()
            .filter(|t| t.status == TokenStatus::Waiting)
            .cloned()
            .collect();
        QueueSnapshot {
            current_token,
            waiting_tokens,
        }
    }

    fn authorize(&self, bearer: Option<&str>) -> Result<Role> {
        bearer
            .and_then(|b| self.sessions.get(b))
            .copied()
            .ok_or_else(|| QueueError::auth("Invalid or missing token"))
    }

    fn token_mut(&mut self, id: &TokenId) -> Result<&mut Token> {
        self.tokens
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| QueueError::not_found(Some("Token not found".into())))
    }
}

/// In-memory queue backend
#[derive(Clone)]
pub struct InMemoryQueue {
    inner: Arc<RwLock<Backend>>,
    events: broadcast::Sender<PushEvent>,
    open_subscriptions: Arc<AtomicUsize>,
}

impl InMemoryQueue {
    /// Create an empty queue whose first token is number 101
    pub fn new() -> Self {
        Self::starting_at(101)
    }

    pub fn starting_at(first_number: u64) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(RwLock::new(Backend {
                tokens: Vec::new(),
                current: None,
                next_number: first_number,
                average_wait_time: 0.0,
                users: HashMap::new(),
                sessions: HashMap::new(),
                status_failure: None,
            })),
            events,
            open_subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A front end's connection, optionally carrying a bearer token
    pub fn client(&self, credential: Option<&SessionCredential>) -> InMemoryQueueClient {
        InMemoryQueueClient {
            queue: self.clone(),
            bearer: credential.map(|c| c.token.clone()),
        }
    }

    pub async fn add_user(&self, username: &str, password: &str, role: Role) {
        self.inner
            .write()
            .await
            .users
            .insert(username.to_string(), (password.to_string(), role));
    }

    /// Issue a credential directly, skipping the login call
    pub async fn issue_session(&self, role: Role) -> SessionCredential {
        let token = Uuid::now_v7().to_string();
        self.inner.write().await.sessions.insert(token.clone(), role);
        SessionCredential::new(token, role)
    }

    /// Invalidate a credential; later privileged calls fail with `Auth`
    pub async fn revoke(&self, credential: &SessionCredential) {
        self.inner.write().await.sessions.remove(&credential.token);
    }

    /// Pre-populate a waiting token without broadcasting (useful for testing)
    pub async fn seed(&self, patient_name: &str, phone_number: &str, is_vip: bool) -> Token {
        let mut backend = self.inner.write().await;
        let token = new_token(&mut backend, patient_name, phone_number, is_vip);
        backend.tokens.push(token.clone());
        token
    }

    pub async fn set_wait_time(&self, minutes: f64) {
        self.inner.write().await.average_wait_time = minutes;
    }

    /// Make status reads fail until cleared with `None`
    pub async fn fail_status_with(&self, failure: Option<QueueError>) {
        self.inner.write().await.status_failure = failure;
    }

    /// Broadcast an event without changing anything
    pub fn emit(&self, kind: PushEventKind) {
        self.broadcast(kind, serde_json::Value::Null);
    }

    pub fn open_subscriptions(&self) -> usize {
        self.open_subscriptions.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.inner.read().await.snapshot()
    }

    fn broadcast(&self, kind: PushEventKind, data: serde_json::Value) {
        // No receivers is fine; nobody is watching
        let _ = self.events.send(PushEvent::with_data(kind, data));
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

fn new_token(backend: &mut Backend, patient_name: &str, phone_number: &str, is_vip: bool) -> Token {
    let number = backend.next_number;
    backend.next_number += 1;
    Token {
        id: TokenId::new(Uuid::now_v7().to_string()),
        token_number: TokenNumber(number),
        patient_name: patient_name.to_string(),
        phone_number: phone_number.to_string(),
        status: TokenStatus::Waiting,
        is_vip,
        notes: None,
        created_at: Some(Utc::now()),
    }
}

// ============================================================================
// InMemoryQueueClient - one connection to the backend
// ============================================================================

#[derive(Clone)]
pub struct InMemoryQueueClient {
    queue: InMemoryQueue,
    bearer: Option<String>,
}

impl InMemoryQueueClient {
    fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn fetch_status(&self) -> Result<QueueSnapshot> {
        let backend = self.queue.inner.read().await;
        if let Some(failure) = &backend.status_failure {
            return Err(failure.clone());
        }
        Ok(backend.snapshot())
    }

    async fn fetch_wait_time(&self) -> Result<f64> {
        Ok(self.queue.inner.read().await.average_wait_time)
    }

    async fn submit_token(&self, request: &NewToken) -> Result<Token> {
        request.validate()?;
        let token = {
            let mut backend = self.queue.inner.write().await;
            let token = new_token(
                &mut backend,
                request.patient_name.trim(),
                request.phone_number.trim(),
                false,
            );
            backend.tokens.push(token.clone());
            token
        };
        self.queue.broadcast(
            PushEventKind::NewToken,
            serde_json::to_value(&token).unwrap_or_default(),
        );
        self.queue
            .broadcast(PushEventKind::QueueUpdate, serde_json::json!({"action": "new"}));
        Ok(token)
    }

    async fn list_tokens(&self) -> Result<Vec<Token>> {
        Ok(self.queue.inner.read().await.tokens.clone())
    }

    async fn advance_queue(&self) -> Result<AdvanceOutcome> {
        let outcome = {
            let mut backend = self.queue.inner.write().await;
            backend.authorize(self.bearer())?;

            let Some(next_index) = backend
                .tokens
                .iter()
                .position(|t| t.status == TokenStatus::Waiting)
            else {
                return Ok(AdvanceOutcome {
                    advanced: false,
                    current_token: None,
                });
            };

            if let Some(current) = backend.current.take() {
                backend.token_mut(&current)?.status = TokenStatus::Done;
            }
            let next = &mut backend.tokens[next_index];
            next.status = TokenStatus::Serving;
            let next = next.clone();
            backend.current = Some(next.id.clone());

            AdvanceOutcome {
                advanced: true,
                current_token: Some(next),
            }
        };
        self.queue.broadcast(
            PushEventKind::QueueUpdate,
            serde_json::json!({"action": "next", "currentToken": outcome.current_token}),
        );
        Ok(outcome)
    }

    async fn skip_token(&self, id: &TokenId) -> Result<()> {
        {
            let mut backend = self.queue.inner.write().await;
            backend.authorize(self.bearer())?;
            backend.token_mut(id)?.status = TokenStatus::Skipped;
            if backend.current.as_ref() == Some(id) {
                backend.current = None;
            }
        }
        self.queue
            .broadcast(PushEventKind::QueueUpdate, serde_json::json!({"action": "skip"}));
        self.queue
            .broadcast(PushEventKind::TokenUpdate, serde_json::json!({"_id": id}));
        Ok(())
    }

    async fn update_token(&self, id: &TokenId, patch: &TokenPatch) -> Result<Token> {
        let token = {
            let mut backend = self.queue.inner.write().await;
            backend.authorize(self.bearer())?;
            patch.validate()?;
            let token = backend.token_mut(id)?;
            patch.apply(token);
            token.clone()
        };
        self.queue.broadcast(
            PushEventKind::TokenUpdate,
            serde_json::to_value(&token).unwrap_or_default(),
        );
        Ok(token)
    }

    async fn delete_token(&self, id: &TokenId) -> Result<()> {
        {
            let mut backend = self.queue.inner.write().await;
            backend.authorize(self.bearer())?;
            let index = backend
                .tokens
                .iter()
                .position(|t| &t.id == id)
                .ok_or_else(|| QueueError::not_found(Some("Token not found".into())))?;
            backend.tokens.remove(index);
            if backend.current.as_ref() == Some(id) {
                backend.current = None;
            }
        }
        self.queue
            .broadcast(PushEventKind::TokenDelete, serde_json::json!({"_id": id}));
        self.queue
            .broadcast(PushEventKind::QueueUpdate, serde_json::json!({"action": "delete"}));
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<SessionCredential> {
        let mut backend = self.queue.inner.write().await;
        let role = match backend.users.get(username) {
            Some((expected, role)) if expected == password => *role,
            _ => return Err(QueueError::auth("Invalid credentials")),
        };
        let token = Uuid::now_v7().to_string();
        backend.sessions.insert(token.clone(), role);
        Ok(SessionCredential {
            token,
            user: User {
                role,
                username: Some(username.to_string()),
            },
        })
    }
}

/// Decrements the open-subscription count when a forwarder stops
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PushChannel for InMemoryQueueClient {
    async fn subscribe(
        &self,
        kinds: &[PushEventKind],
        _credential: Option<&str>,
    ) -> Result<Subscription> {
        let (tx, cancel, subscription) = Subscription::channel(SUBSCRIPTION_BUFFER);
        let mut events = self.queue.events.subscribe();
        let kinds = kinds.to_vec();
        let on_lag = kinds.first().copied().unwrap_or(PushEventKind::QueueUpdate);

        self.queue.open_subscriptions.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(self.queue.open_subscriptions.clone());

        tokio::spawn(async move {
            let _guard = guard;
            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    received = events.recv() => match received {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            // Missed events still mean "something changed"
                            tracing::warn!(missed, "Push forwarder lagged");
                            PushEvent::new(on_lag)
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                };
                if !kinds.contains(&event.kind) {
                    continue;
                }
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(subscription)
    }
}

// ============================================================================
// InMemoryCredentialStore
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credential: Mutex<Option<SessionCredential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: SessionCredential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn load(&self) -> Result<Option<SessionCredential>> {
        self.credential
            .lock()
            .map(|c| c.clone())
            .map_err(|_| QueueError::credential_store("credential lock poisoned"))
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        let mut slot = self
            .credential
            .lock()
            .map_err(|_| QueueError::credential_store("credential lock poisoned"))?;
        *slot = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut slot = self
            .credential
            .lock()
            .map_err(|_| QueueError::credential_store("credential lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

// ============================================================================
// RecordingNavigator
// ============================================================================

/// Navigator that remembers every redirect it was asked for
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    redirects: Mutex<Vec<(Route, RedirectReason)>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redirects(&self) -> Vec<(Route, RedirectReason)> {
        self.redirects
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route, reason: RedirectReason) {
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push((route, reason));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_advance_serves_in_creation_order() {
        let queue = InMemoryQueue::new();
        let doctor = queue.issue_session(Role::Doctor).await;
        let first = queue.seed("Ann", "1", false).await;
        let second = queue.seed("Bob", "2", true).await;
        let client = queue.client(Some(&doctor));

        let outcome = client.advance_queue().await.unwrap();
        assert!(outcome.advanced);
        assert_eq!(outcome.current_token.unwrap().id, first.id);

        let snapshot = client.fetch_status().await.unwrap();
        assert_eq!(snapshot.waiting_tokens.len(), 1);
        assert_eq!(snapshot.waiting_tokens[0].id, second.id);

        client.advance_queue().await.unwrap();
        let outcome = client.advance_queue().await.unwrap();
        assert!(!outcome.advanced);
        assert_eq!(
            client.fetch_status().await.unwrap().current_token.unwrap().id,
            second.id
        );
    }

    #[tokio::test]
    async fn test_privileged_calls_need_session() {
        let queue = InMemoryQueue::new();
        let token = queue.seed("Ann", "1", false).await;
        let anonymous = queue.client(None);

        assert!(anonymous.advance_queue().await.unwrap_err().is_auth());
        assert!(anonymous
            .delete_token(&token.id)
            .await
            .unwrap_err()
            .is_auth());

        let staff = queue.issue_session(Role::Receptionist).await;
        let client = queue.client(Some(&staff));
        assert_eq!(
            client.skip_token(&TokenId::from("missing")).await,
            Err(QueueError::not_found(Some("Token not found".into())))
        );

        queue.revoke(&staff).await;
        assert!(client.skip_token(&token.id).await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_subscription_filters_kinds_and_releases() {
        let queue = InMemoryQueue::new();
        let client = queue.client(None);
        let mut subscription = client
            .subscribe(&[PushEventKind::TokenDelete], None)
            .await
            .unwrap();
        assert_eq!(queue.open_subscriptions(), 1);

        queue.emit(PushEventKind::QueueUpdate);
        queue.emit(PushEventKind::TokenDelete);
        let event = subscription.next().await.unwrap();
        assert_eq!(event.kind, PushEventKind::TokenDelete);

        subscription.close();
        for _ in 0..10 {
            if queue.open_subscriptions() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(queue.open_subscriptions(), 0);
    }
}
