// Live view of one screen until Ctrl-C

use anyhow::{bail, Result};

use clinic_queue_core::{QueueSynchronizer, ViewKind, ViewState};

use crate::app::App;
use crate::output::{print_queue, print_token_table, QueueReport};

pub fn view_kind(name: &str) -> ViewKind {
    match name {
        "doctor" => ViewKind::DoctorDashboard,
        "reception" => ViewKind::ReceptionDashboard,
        _ => ViewKind::PatientToken,
    }
}

/// What changed between two published states that is worth printing
#[derive(Debug, Default, PartialEq)]
struct Changes {
    queue: bool,
    notification: Option<String>,
    error: Option<String>,
    live: Option<bool>,
}

fn diff(previous: &ViewState, current: &ViewState) -> Changes {
    Changes {
        queue: current.revision != previous.revision
            || current.average_wait_time != previous.average_wait_time,
        notification: match (&previous.notification, &current.notification) {
            (Some(before), Some(now)) if before.id == now.id => None,
            (_, Some(now)) => Some(now.message.clone()),
            _ => None,
        },
        error: match (previous.error(), current.error()) {
            (before, Some(now)) if before != Some(now) => Some(now.to_string()),
            _ => None,
        },
        live: (previous.live != current.live).then_some(current.live),
    }
}

fn render(app: &App, view: ViewKind, state: &ViewState) -> Result<()> {
    if app.output.is_text() {
        println!();
        println!("--- {} (revision {}) ---", view, state.revision);
        if view.lists_tokens() {
            print_token_table(state.tokens.as_deref().unwrap_or(&[]));
        } else {
            print_queue(state);
        }
        Ok(())
    } else if view.lists_tokens() {
        app.output.print_value(&state.tokens)
    } else {
        app.output.print_value(&QueueReport::from_state(state))
    }
}

pub async fn run(app: &App, view_name: &str) -> Result<()> {
    let view = view_kind(view_name);
    let sync = QueueSynchronizer::mount(view, &app.view_context()?);
    let result = follow(app, view, &sync).await;
    sync.unmount().await;
    result
}

async fn follow(app: &App, view: ViewKind, sync: &QueueSynchronizer) -> Result<()> {
    let mut states = sync.watch();
    let mut previous = ViewState::default();

    loop {
        let current = states.borrow_and_update().clone();

        if let Some(route) = current.redirect {
            bail!("Not signed in or session expired; sign in again ({})", route.path());
        }

        let changes = diff(&previous, &current);
        if changes.queue {
            render(app, view, &current)?;
        }
        if let Some(message) = changes.notification {
            eprintln!("* {message}");
        }
        if let Some(error) = changes.error {
            eprintln!("! {error}");
        }
        match changes.live {
            Some(true) if !app.quiet => eprintln!("(live updates connected)"),
            Some(false) => eprintln!("(live updates stopped; showing last known state)"),
            _ => {}
        }
        previous = current;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_queue_core::{Notification, SyncPhase};

    #[test]
    fn test_diff_reports_new_notification_once() {
        let before = ViewState::default();
        let mut after = ViewState {
            notification: Some(Notification {
                id: 1,
                message: "Patient skipped".into(),
            }),
            ..Default::default()
        };

        assert_eq!(
            diff(&before, &after).notification.as_deref(),
            Some("Patient skipped")
        );
        assert_eq!(diff(&after, &after), Changes::default());

        after.phase = SyncPhase::Error("Error skipping token".into());
        after.revision = 3;
        let changes = diff(&before, &after);
        assert!(changes.queue);
        assert_eq!(changes.error.as_deref(), Some("Error skipping token"));
    }

    #[test]
    fn test_view_names() {
        assert_eq!(view_kind("doctor"), ViewKind::DoctorDashboard);
        assert_eq!(view_kind("reception"), ViewKind::ReceptionDashboard);
        assert_eq!(view_kind("patient"), ViewKind::PatientToken);
    }
}
