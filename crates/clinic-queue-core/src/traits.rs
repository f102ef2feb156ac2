// Collaborator traits
//
// The synchronizer depends only on these. HTTP/SSE implementations live in
// clinic-queue-http; in-memory ones in `memory`.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{AdvanceOutcome, NewToken, QueueSnapshot, Token, TokenId, TokenPatch};
use crate::push::{PushEventKind, Subscription};
use crate::session::{Route, SessionCredential};

/// Outbound request/response calls to the queue backend.
///
/// Implementations attach the credential they were built with to every call.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Current token plus the waiting list, in server order
    async fn fetch_status(&self) -> Result<QueueSnapshot>;

    /// Average wait estimate in minutes
    async fn fetch_wait_time(&self) -> Result<f64>;

    async fn submit_token(&self, request: &NewToken) -> Result<Token>;

    async fn list_tokens(&self) -> Result<Vec<Token>>;

    async fn advance_queue(&self) -> Result<AdvanceOutcome>;

    async fn skip_token(&self, id: &TokenId) -> Result<()>;

    async fn update_token(&self, id: &TokenId, patch: &TokenPatch) -> Result<Token>;

    async fn delete_token(&self, id: &TokenId) -> Result<()>;

    async fn login(&self, username: &str, password: &str) -> Result<SessionCredential>;
}

/// Opens live notification channels
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open one connection delivering only `kinds`
    async fn subscribe(
        &self,
        kinds: &[PushEventKind],
        credential: Option<&str>,
    ) -> Result<Subscription>;
}

/// Why a view asked to leave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectReason {
    /// The view needs a credential and none was supplied
    MissingCredential,
    /// The backend rejected the credential; the session must be dropped
    AuthFailed,
}

/// External router; views signal where to go but never route themselves
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route, reason: RedirectReason);
}

/// Persisted credential (the browser's local storage, a file, ...)
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionCredential>>;

    fn save(&self, credential: &SessionCredential) -> Result<()>;

    fn clear(&self) -> Result<()>;
}

/// Navigator that only logs
#[derive(Debug, Clone, Default)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: Route, reason: RedirectReason) {
        tracing::debug!(route = %route, reason = ?reason, "Navigation requested");
    }
}
