// Queue View Synchronizer
//
// One actor task per mounted view owns all view state and publishes it through a
// watch channel. Fetches and mutations run as child tasks in a JoinSet; their
// results come back to the actor, which alone decides what becomes visible.
//
// Ordering: every status fetch carries a sequence number taken at initiation. A
// completion behind the latest applied sequence is discarded, so the visible
// snapshot always belongs to the newest fetch that has finished.
//
// Teardown: cancelling the actor aborts child tasks and closes the push
// subscription. Nothing is published after that.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::SyncConfig;
use crate::error::{QueueError, Result};
use crate::model::{
    AdvanceOutcome, NewToken, QueueSnapshot, Token, TokenId, TokenNumber, TokenPatch,
};
use crate::notifications::{Notification, NotificationQueue};
use crate::push::{PushEvent, PushEventKind, Subscription};
use crate::session::{Route, SessionContext};
use crate::traits::{Navigator, NoopNavigator, PushChannel, QueueClient, RedirectReason};
use crate::views::ViewKind;

// ============================================================================
// Published state
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "phase", content = "message", rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Idle,
    Loading,
    Ready,
    Error(String),
}

/// Mutating operations, each with its own busy flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Advance,
    Skip,
    Submit,
    Update,
    SetVip,
    Delete,
}

impl Operation {
    fn failure_message(&self) -> &'static str {
        match self {
            Operation::Advance => "Error moving to next patient",
            Operation::Skip => "Error skipping token",
            Operation::Submit => "Error generating token",
            Operation::Update => "Error updating token",
            Operation::SetVip => "Error updating VIP status",
            Operation::Delete => "Error deleting token",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Advance => "advance",
            Operation::Skip => "skip",
            Operation::Submit => "submit",
            Operation::Update => "update",
            Operation::SetVip => "set_vip",
            Operation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Everything a view renders. Read-only outside the synchronizer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ViewState {
    pub phase: SyncPhase,
    /// Last good snapshot; kept visible while in `Error`
    pub snapshot: Option<QueueSnapshot>,
    /// Full token list (reception dashboard only)
    pub tokens: Option<Vec<Token>>,
    pub average_wait_time: Option<f64>,
    /// Token returned by the last successful submission from this view
    pub issued_token: Option<Token>,
    pub busy: BTreeSet<Operation>,
    pub notification: Option<Notification>,
    pub pending_notifications: usize,
    pub redirect: Option<Route>,
    /// Push subscription is open
    pub live: bool,
    pub refreshing: bool,
    /// A push event arrived mid-fetch; one more fetch follows
    pub refresh_pending: bool,
    /// Sequence number of the fetch whose result is shown
    pub revision: u64,
    pub discarded_fetches: u64,
}

impl ViewState {
    pub fn error(&self) -> Option<&str> {
        match &self.phase {
            SyncPhase::Error(message) => Some(message),
            _ => None,
        }
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.busy.contains(&op)
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SyncPhase::Loading
    }

    pub fn current_token(&self) -> Option<&Token> {
        self.snapshot.as_ref().and_then(|s| s.current_token.as_ref())
    }

    pub fn waiting_tokens(&self) -> &[Token] {
        self.snapshot
            .as_ref()
            .map(|s| s.waiting_tokens.as_slice())
            .unwrap_or(&[])
    }
}

// ============================================================================
// View context
// ============================================================================

/// Collaborators shared by every view of one front end
#[derive(Clone)]
pub struct ViewContext {
    pub client: Arc<dyn QueueClient>,
    pub push: Arc<dyn PushChannel>,
    pub session: SessionContext,
    pub navigator: Arc<dyn Navigator>,
    pub config: SyncConfig,
}

impl ViewContext {
    pub fn new(client: Arc<dyn QueueClient>, push: Arc<dyn PushChannel>) -> Self {
        Self {
            client,
            push,
            session: SessionContext::anonymous(),
            navigator: Arc::new(NoopNavigator),
            config: SyncConfig::default(),
        }
    }

    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = navigator;
        self
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }
}

// ============================================================================
// Handle
// ============================================================================

#[derive(Debug)]
enum Command {
    Refresh,
    Mutate(Mutation),
    DismissNotification,
}

#[derive(Debug)]
enum Mutation {
    Advance,
    Skip(TokenId),
    Submit(NewToken),
    Update(TokenId, TokenPatch),
    SetVip(TokenId, bool),
    Delete(TokenId),
}

impl Mutation {
    fn operation(&self) -> Operation {
        match self {
            Mutation::Advance => Operation::Advance,
            Mutation::Skip(_) => Operation::Skip,
            Mutation::Submit(_) => Operation::Submit,
            Mutation::Update(..) => Operation::Update,
            Mutation::SetVip(..) => Operation::SetVip,
            Mutation::Delete(_) => Operation::Delete,
        }
    }
}

/// A mounted view's synchronizer.
///
/// Commands are fire-and-forget; their effects show up in the published
/// [`ViewState`]. Dropping the handle unmounts the view.
pub struct QueueSynchronizer {
    view: ViewKind,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ViewState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl QueueSynchronizer {
    /// Mount `view`: start the actor, open the push subscription and fetch.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(view: ViewKind, ctx: &ViewContext) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ViewState::default());
        let cancel = CancellationToken::new();

        let actor = SyncActor {
            view,
            client: ctx.client.clone(),
            push: ctx.push.clone(),
            session: ctx.session.clone(),
            navigator: ctx.navigator.clone(),
            state: ViewState::default(),
            state_tx,
            tasks: JoinSet::new(),
            subscription: None,
            next_seq: 0,
            latest_seq: 0,
            in_flight: 0,
            announced: None,
            announce_after: None,
            notifications: NotificationQueue::new(ctx.config.notification_ttl),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(actor.run(commands_rx));

        Self {
            view,
            commands: commands_tx,
            state: state_rx,
            cancel,
            task: Some(task),
        }
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    /// Copy of the latest published state
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// Receiver for observing state changes
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    /// Wait until the published state satisfies `predicate`.
    ///
    /// Fails with `ViewClosed` if the view stops publishing first.
    pub async fn wait_for(&self, predicate: impl FnMut(&ViewState) -> bool) -> Result<ViewState> {
        let mut rx = self.state.clone();
        let guard = rx
            .wait_for(predicate)
            .await
            .map_err(|_| QueueError::ViewClosed)?;
        let state = (*guard).clone();
        Ok(state)
    }

    pub fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh)
    }

    pub fn advance_queue(&self) -> Result<()> {
        self.send(Command::Mutate(Mutation::Advance))
    }

    pub fn skip_token(&self, id: TokenId) -> Result<()> {
        self.send(Command::Mutate(Mutation::Skip(id)))
    }

    pub fn submit_token(&self, request: NewToken) -> Result<()> {
        self.send(Command::Mutate(Mutation::Submit(request)))
    }

    pub fn update_token(&self, id: TokenId, patch: TokenPatch) -> Result<()> {
        self.send(Command::Mutate(Mutation::Update(id, patch)))
    }

    /// Set only the VIP flag; failures report as a VIP update
    pub fn set_vip(&self, id: TokenId, is_vip: bool) -> Result<()> {
        self.send(Command::Mutate(Mutation::SetVip(id, is_vip)))
    }

    pub fn delete_token(&self, id: TokenId) -> Result<()> {
        self.send(Command::Mutate(Mutation::Delete(id)))
    }

    pub fn dismiss_notification(&self) -> Result<()> {
        self.send(Command::DismissNotification)
    }

    /// Tear the view down and wait for the actor to stop.
    ///
    /// In-flight fetches are aborted, not awaited.
    pub async fn unmount(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(view = %self.view, error = %e, "Synchronizer task failed");
            }
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(QueueError::ViewClosed);
        }
        self.commands
            .send(command)
            .map_err(|_| QueueError::ViewClosed)
    }
}

impl Drop for QueueSynchronizer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Actor
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshTrigger {
    Mount,
    Push,
    Manual,
    Mutation,
}

struct Reconciled {
    snapshot: QueueSnapshot,
    tokens: Option<Vec<Token>>,
}

enum Mutated {
    Advanced(AdvanceOutcome),
    Skipped,
    Submitted(Token),
    Updated,
    Deleted,
}

enum TaskOutcome {
    Refresh {
        seq: u64,
        result: Result<Reconciled>,
    },
    WaitTime(Result<f64>),
    Subscribed(Result<Subscription>),
    Mutation {
        op: Operation,
        result: Result<Mutated>,
    },
}

enum Wake {
    Cancelled,
    Command(Command),
    Push(Option<PushEvent>),
    Task(std::result::Result<TaskOutcome, tokio::task::JoinError>),
    NotificationExpired,
}

struct SyncActor {
    view: ViewKind,
    client: Arc<dyn QueueClient>,
    push: Arc<dyn PushChannel>,
    session: SessionContext,
    navigator: Arc<dyn Navigator>,
    state: ViewState,
    state_tx: watch::Sender<ViewState>,
    tasks: JoinSet<TaskOutcome>,
    subscription: Option<Subscription>,
    next_seq: u64,
    latest_seq: u64,
    in_flight: usize,
    /// Last token announced as "Now serving"
    announced: Option<TokenNumber>,
    /// Announce the current token once a fetch at or past this sequence applies
    announce_after: Option<u64>,
    notifications: NotificationQueue,
    cancel: CancellationToken,
}

impl SyncActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        tracing::info!(view = %self.view, "Mounting queue view");

        if self.view.requires_credential() && self.session.credential.is_none() {
            self.redirect(self.view.login_route(), RedirectReason::MissingCredential);
            self.publish();
            return;
        }

        // The subscription connects as a task beside the first fetch
        self.state.phase = SyncPhase::Loading;
        self.start_subscription();
        self.start_refresh(RefreshTrigger::Mount);
        if self.view.shows_wait_time() {
            self.start_wait_time();
        }
        self.publish();

        loop {
            let cancel = self.cancel.clone();
            let deadline = self.notifications.deadline();

            let wake = tokio::select! {
                biased;
                _ = cancel.cancelled() => Wake::Cancelled,
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => Wake::Task(joined),
                command = commands.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Cancelled,
                },
                event = next_event(&mut self.subscription), if self.subscription.is_some() => Wake::Push(event),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    Wake::NotificationExpired
                }
            };

            match wake {
                Wake::Cancelled => break,
                Wake::Command(command) => self.on_command(command),
                Wake::Push(Some(event)) => {
                    tracing::debug!(view = %self.view, kind = %event.kind, data = %event.data, "Push event received");
                    if self.view.announces_serving() {
                        if let Some(number) = serving_from_push(&event) {
                            self.announce_serving(number);
                        }
                    }
                    self.start_refresh(RefreshTrigger::Push);
                }
                Wake::Push(None) => {
                    tracing::warn!(view = %self.view, "Push subscription ended; updates now depend on user actions");
                    self.subscription = None;
                    self.state.live = false;
                }
                Wake::Task(Ok(outcome)) => self.on_task(outcome),
                Wake::Task(Err(e)) => {
                    tracing::error!(view = %self.view, error = %e, "Synchronizer subtask failed");
                }
                Wake::NotificationExpired => {
                    self.notifications.expire(Instant::now());
                }
            }
            self.publish();
        }

        self.shutdown();
    }

    fn start_subscription(&mut self) {
        let push = self.push.clone();
        let bearer = self.session.bearer().map(str::to_string);
        let kinds = self.view.push_kinds();
        self.tasks.spawn(async move {
            TaskOutcome::Subscribed(push.subscribe(kinds, bearer.as_deref()).await)
        });
    }

    fn on_subscribed(&mut self, result: Result<Subscription>) {
        match result {
            Ok(subscription) => {
                tracing::debug!(view = %self.view, kinds = ?self.view.push_kinds(), "Push subscription open");
                self.subscription = Some(subscription);
                self.state.live = true;
            }
            Err(e) if e.is_auth() => self.escalate_auth(&e),
            Err(e) => {
                tracing::warn!(view = %self.view, error = %e, "Failed to open push subscription");
            }
        }
    }

    fn shutdown(&mut self) {
        // A subscription still connecting is dropped with its task, which closes it
        self.tasks.abort_all();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
        }
        tracing::info!(view = %self.view, "Queue view unmounted");
    }

    fn publish(&mut self) {
        self.state.notification = self.notifications.current().cloned();
        self.state.pending_notifications = self.notifications.pending_len();
        self.state.refreshing = self.in_flight > 0;
        self.state_tx.send_replace(self.state.clone());
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Refresh => {
                self.start_refresh(RefreshTrigger::Manual);
                if self.view.shows_wait_time() {
                    self.start_wait_time();
                }
            }
            Command::Mutate(mutation) => self.start_mutation(mutation),
            Command::DismissNotification => {
                self.notifications.dismiss(Instant::now());
            }
        }
    }

    fn start_refresh(&mut self, trigger: RefreshTrigger) {
        if trigger == RefreshTrigger::Push && self.in_flight > 0 {
            if !self.state.refresh_pending {
                tracing::debug!(view = %self.view, "Fetch in flight, coalescing push-triggered refresh");
            }
            self.state.refresh_pending = true;
            return;
        }

        self.next_seq += 1;
        self.in_flight += 1;
        let seq = self.next_seq;
        let client = self.client.clone();
        let lists_tokens = self.view.lists_tokens();

        tracing::debug!(view = %self.view, seq, trigger = ?trigger, "Fetching queue status");
        self.tasks.spawn(async move {
            let result = reconcile(client.as_ref(), lists_tokens).await;
            TaskOutcome::Refresh { seq, result }
        });
    }

    fn start_wait_time(&mut self) {
        let client = self.client.clone();
        self.tasks
            .spawn(async move { TaskOutcome::WaitTime(client.fetch_wait_time().await) });
    }

    fn start_mutation(&mut self, mutation: Mutation) {
        let op = mutation.operation();
        if !self.state.busy.insert(op) {
            tracing::debug!(view = %self.view, op = %op, "Ignoring duplicate submission while busy");
            return;
        }

        tracing::info!(view = %self.view, op = %op, "Submitting queue mutation");
        let client = self.client.clone();
        self.tasks.spawn(async move {
            let result = match mutation {
                Mutation::Advance => client.advance_queue().await.map(Mutated::Advanced),
                Mutation::Skip(id) => client.skip_token(&id).await.map(|_| Mutated::Skipped),
                Mutation::Submit(request) => {
                    client.submit_token(&request).await.map(Mutated::Submitted)
                }
                Mutation::Update(id, patch) => client
                    .update_token(&id, &patch)
                    .await
                    .map(|_| Mutated::Updated),
                Mutation::SetVip(id, is_vip) => client
                    .update_token(&id, &TokenPatch::vip(is_vip))
                    .await
                    .map(|_| Mutated::Updated),
                Mutation::Delete(id) => client.delete_token(&id).await.map(|_| Mutated::Deleted),
            };
            TaskOutcome::Mutation { op, result }
        });
    }

    // ------------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------------

    fn on_task(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Refresh { seq, result } => self.on_refresh(seq, result),
            TaskOutcome::WaitTime(Ok(minutes)) => self.state.average_wait_time = Some(minutes),
            TaskOutcome::WaitTime(Err(e)) => {
                tracing::warn!(view = %self.view, error = %e, "Failed to fetch wait time");
            }
            TaskOutcome::Subscribed(result) => self.on_subscribed(result),
            TaskOutcome::Mutation { op, result } => self.on_mutation(op, result),
        }
    }

    fn on_refresh(&mut self, seq: u64, result: Result<Reconciled>) {
        self.in_flight = self.in_flight.saturating_sub(1);

        if seq < self.latest_seq {
            tracing::debug!(view = %self.view, seq, latest = self.latest_seq, "Discarding stale queue status");
            self.state.discarded_fetches += 1;
        } else {
            self.latest_seq = seq;
            match result {
                Ok(reconciled) => {
                    self.state.snapshot = Some(reconciled.snapshot);
                    if let Some(tokens) = reconciled.tokens {
                        self.state.tokens = Some(tokens);
                    }
                    self.state.phase = SyncPhase::Ready;
                    self.state.revision = seq;
                }
                Err(e) if e.is_auth() => self.escalate_auth(&e),
                Err(e) => {
                    tracing::warn!(view = %self.view, seq, error = %e, "Failed to fetch queue status");
                    self.state.phase = SyncPhase::Error(self.view.fetch_error_message().to_string());
                }
            }

            if self.announce_after.is_some_and(|after| seq >= after) {
                self.announce_after = None;
                let applied = self.state.revision == seq;
                let current = self.state.current_token().map(|t| t.token_number);
                if let Some(number) = current.filter(|_| applied) {
                    self.announce_serving(number);
                }
            }
        }

        if self.in_flight == 0 && self.state.refresh_pending {
            self.state.refresh_pending = false;
            self.start_refresh(RefreshTrigger::Push);
        }
    }

    fn on_mutation(&mut self, op: Operation, result: Result<Mutated>) {
        self.state.busy.remove(&op);

        match result {
            Ok(done) => {
                tracing::info!(view = %self.view, op = %op, "Queue mutation succeeded");
                match done {
                    Mutated::Advanced(outcome) if outcome.advanced => match outcome.current_token {
                        Some(token) => self.announce_serving(token.token_number),
                        // The refresh started below is the next sequence
                        None => self.announce_after = Some(self.next_seq + 1),
                    },
                    Mutated::Advanced(_) => self.notify("No more patients in queue"),
                    Mutated::Skipped => self.notify("Patient skipped"),
                    Mutated::Submitted(token) => self.state.issued_token = Some(token),
                    Mutated::Updated | Mutated::Deleted => {}
                }
                self.start_refresh(RefreshTrigger::Mutation);
            }
            Err(e) if e.is_auth() => self.escalate_auth(&e),
            Err(e) => {
                tracing::warn!(view = %self.view, op = %op, error = %e, "Queue mutation failed");
                self.state.phase = SyncPhase::Error(e.user_message(op.failure_message()));
            }
        }
    }

    fn notify(&mut self, message: impl Into<String>) {
        self.notifications.push(message, Instant::now());
    }

    /// Own advances and pushes from other devices both land here; each token once
    fn announce_serving(&mut self, number: TokenNumber) {
        if self.announced == Some(number) {
            tracing::debug!(view = %self.view, token = %number, "Token already announced");
            return;
        }
        self.announced = Some(number);
        self.notify(format!("Now serving token #{number}"));
    }

    // ------------------------------------------------------------------------
    // Escalation
    // ------------------------------------------------------------------------

    fn escalate_auth(&mut self, error: &QueueError) {
        let route = self
            .session
            .role()
            .and_then(Route::login_for)
            .unwrap_or_else(|| self.view.login_route());
        tracing::warn!(view = %self.view, route = %route, error = %error, "Credential rejected");
        self.redirect(route, RedirectReason::AuthFailed);
    }

    /// Signal the router once; later failures do not re-navigate
    fn redirect(&mut self, route: Route, reason: RedirectReason) {
        if self.state.redirect.is_some() {
            return;
        }
        self.state.redirect = Some(route);
        self.navigator.navigate(route, reason);
    }
}

async fn reconcile(client: &dyn QueueClient, lists_tokens: bool) -> Result<Reconciled> {
    if lists_tokens {
        let (snapshot, tokens) = tokio::try_join!(client.fetch_status(), client.list_tokens())?;
        Ok(Reconciled {
            snapshot,
            tokens: Some(tokens),
        })
    } else {
        Ok(Reconciled {
            snapshot: client.fetch_status().await?,
            tokens: None,
        })
    }
}

/// Token number carried by a `queueUpdate` for an advance, if any
fn serving_from_push(event: &PushEvent) -> Option<TokenNumber> {
    if event.kind != PushEventKind::QueueUpdate {
        return None;
    }
    if event.data.get("action").and_then(serde_json::Value::as_str) != Some("next") {
        return None;
    }
    let number = event.data.get("currentToken")?.get("tokenNumber")?;
    serde_json::from_value(number.clone()).ok()
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<PushEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}
