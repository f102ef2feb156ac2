// Patient and doctor commands

use anyhow::{bail, Result};
use std::time::Duration;

use clinic_queue_core::{
    DoctorDashboard, NewToken, Operation, PatientTokenPage, QueueSynchronizer, TokenId,
    ViewState,
};

use crate::app::App;
use crate::commands::{loaded, mutate};
use crate::output::{print_field, print_queue, token_label, QueueReport};

/// How long `status` lingers for the wait-time estimate after the queue arrives
const WAIT_TIME_GRACE: Duration = Duration::from_millis(500);

fn render(app: &App, state: &ViewState) -> Result<()> {
    if app.output.is_text() {
        print_queue(state);
        Ok(())
    } else {
        app.output.print_value(&QueueReport::from_state(state))
    }
}

fn announce(app: &App, state: &ViewState) {
    if let Some(notification) = &state.notification {
        if app.output.is_text() && !app.quiet {
            println!("{}", notification.message);
        }
    }
}

/// Wait time is optional: a slow or failing estimate still shows the queue,
/// but a view that closed underneath us fails the command
async fn settle_wait_time(sync: &QueueSynchronizer, grace: Duration) -> Result<()> {
    match tokio::time::timeout(grace, sync.wait_for(|s| s.average_wait_time.is_some())).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "View closed while waiting for wait time");
            Err(e.into())
        }
        Err(_) => {
            tracing::debug!("Wait time not available; showing queue without it");
            Ok(())
        }
    }
}

pub async fn status(app: &App) -> Result<()> {
    let page = PatientTokenPage::mount(&app.view_context()?);

    let result = async {
        loaded(page.sync(), app.deadline()).await?;
        settle_wait_time(page.sync(), WAIT_TIME_GRACE).await?;
        render(app, &page.state())
    }
    .await;

    page.unmount().await;
    result
}

pub async fn request(app: &App, patient_name: String, phone_number: String) -> Result<()> {
    // Reject blanks before touching the network
    NewToken::new(patient_name.as_str(), phone_number.as_str()).validate()?;

    let page = PatientTokenPage::mount(&app.view_context()?);
    let result = async {
        loaded(page.sync(), app.deadline()).await?;
        let state = mutate(page.sync(), Operation::Submit, app.deadline(), || {
            page.request_token(patient_name, phone_number)
        })
        .await?;

        let Some(token) = state.issued_token.as_ref() else {
            bail!("Backend did not return a token");
        };
        if app.output.is_text() {
            if app.quiet {
                println!("{}", token.token_number);
            } else {
                println!("Your token: #{}", token.token_number);
                print_field("Patient", &token.patient_name);
                if let Some(position) = state.waiting_tokens().iter().position(|t| t.id == token.id)
                {
                    print_field("Position", &(position + 1).to_string());
                }
            }
            Ok(())
        } else {
            app.output.print_value(token)
        }
    }
    .await;

    page.unmount().await;
    result
}

pub async fn next(app: &App) -> Result<()> {
    let view = DoctorDashboard::mount(&app.view_context()?);
    let result = async {
        loaded(view.sync(), app.deadline()).await?;
        let state = mutate(view.sync(), Operation::Advance, app.deadline(), || {
            view.next_patient()
        })
        .await?;
        announce(app, &state);
        render(app, &state)
    }
    .await;

    view.unmount().await;
    result
}

pub async fn skip(app: &App, id: Option<String>) -> Result<()> {
    let view = DoctorDashboard::mount(&app.view_context()?);
    let result = async {
        let state = loaded(view.sync(), app.deadline()).await?;
        let target = match id {
            Some(id) => TokenId::new(id),
            None => match state.current_token() {
                Some(current) => current.id.clone(),
                None => bail!("Nobody is being served"),
            },
        };
        if let Some(token) = state.snapshot.as_ref().and_then(|s| s.find(&target)) {
            tracing::info!(token = %token_label(token), "Skipping token");
        }

        let state = mutate(view.sync(), Operation::Skip, app.deadline(), || {
            view.sync().skip_token(target)
        })
        .await?;
        announce(app, &state);
        render(app, &state)
    }
    .await;

    view.unmount().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_queue_core::memory::InMemoryQueue;
    use clinic_queue_core::{QueueError, Role, SessionContext, ViewContext};
    use std::sync::Arc;

    fn context(queue: &InMemoryQueue, session: SessionContext) -> ViewContext {
        let client = Arc::new(queue.client(session.credential.as_ref()));
        ViewContext::new(client.clone(), client).with_session(session)
    }

    #[tokio::test]
    async fn test_wait_time_arrives_within_grace() {
        let queue = InMemoryQueue::new();
        queue.set_wait_time(7.5).await;
        let page = PatientTokenPage::mount(&context(&queue, SessionContext::anonymous()));

        settle_wait_time(page.sync(), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(page.state().average_wait_time, Some(7.5));
        page.unmount().await;
    }

    #[tokio::test]
    async fn test_missing_wait_time_is_not_an_error() {
        let queue = InMemoryQueue::new();
        let doctor = queue.issue_session(Role::Doctor).await;
        // Dashboards never fetch the estimate, so the grace period runs out
        let view = DoctorDashboard::mount(&context(&queue, SessionContext::authenticated(doctor)));

        settle_wait_time(view.sync(), Duration::from_millis(50))
            .await
            .unwrap();
        view.unmount().await;
    }

    #[tokio::test]
    async fn test_closed_view_fails_instead_of_waiting_out_grace() {
        let queue = InMemoryQueue::new();
        // Without a credential the dashboard redirects and stops publishing
        let view = DoctorDashboard::mount(&context(&queue, SessionContext::anonymous()));

        let err = settle_wait_time(view.sync(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), QueueError::ViewClosed.to_string());
    }
}
