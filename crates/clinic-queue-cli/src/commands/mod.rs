// CLI commands
//
// Every command mounts the view a person at that desk would use, so the CLI
// follows the same busy, error and redirect rules as any other front end.

pub mod auth;
pub mod queue;
pub mod tokens;
pub mod watch;

use anyhow::{anyhow, bail, Result};
use std::future::Future;
use std::time::Duration;

use clinic_queue_core::{
    Operation, QueueSynchronizer, Result as QueueResult, SyncPhase, ViewState,
};

async fn within<F>(deadline: Duration, wait: F) -> Result<ViewState>
where
    F: Future<Output = QueueResult<ViewState>>,
{
    let state = tokio::time::timeout(deadline, wait)
        .await
        .map_err(|_| anyhow!("Timed out waiting for the clinic backend"))??;
    Ok(state)
}

/// Turn a redirect or a displayed error into the command's failure
fn check(state: &ViewState) -> Result<()> {
    if let Some(route) = state.redirect {
        bail!("Not signed in or session expired; sign in again ({})", route.path());
    }
    if let Some(message) = state.error() {
        bail!("{message}");
    }
    Ok(())
}

/// Wait for the first settled state after mounting
pub async fn loaded(sync: &QueueSynchronizer, deadline: Duration) -> Result<ViewState> {
    let state = within(
        deadline,
        sync.wait_for(|s| {
            s.redirect.is_some() || matches!(s.phase, SyncPhase::Ready | SyncPhase::Error(_))
        }),
    )
    .await?;
    check(&state)?;
    Ok(state)
}

/// Start one mutation and wait until its result has been reconciled
pub async fn mutate(
    sync: &QueueSynchronizer,
    op: Operation,
    deadline: Duration,
    start: impl FnOnce() -> QueueResult<()>,
) -> Result<ViewState> {
    let before = sync.state().revision;
    start()?;

    let state = within(
        deadline,
        sync.wait_for(|s| {
            !s.is_busy(op)
                && (s.redirect.is_some()
                    || s.error().is_some()
                    || (s.revision > before && !s.refreshing))
        }),
    )
    .await?;
    check(&state)?;
    Ok(state)
}
