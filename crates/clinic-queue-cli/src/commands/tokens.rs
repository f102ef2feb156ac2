// Reception commands

use anyhow::{bail, Result};

use clinic_queue_core::{Operation, ReceptionDashboard, TokenId, TokenPatch, TokenStatus};

use crate::app::App;
use crate::commands::{loaded, mutate};
use crate::output::{print_field, print_token_table, token_label};

/// Field changes collected from `edit` flags
#[derive(Debug, Default)]
pub struct EditArgs {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub vip: Option<bool>,
    pub notes: Option<String>,
}

impl EditArgs {
    fn into_patch(self) -> TokenPatch {
        TokenPatch {
            patient_name: self.name,
            phone_number: self.phone,
            status: self.status.as_deref().map(parse_status),
            is_vip: self.vip,
            notes: self.notes,
        }
    }
}

pub fn parse_status(s: &str) -> TokenStatus {
    match s {
        "serving" => TokenStatus::Serving,
        "skipped" => TokenStatus::Skipped,
        "done" => TokenStatus::Done,
        _ => TokenStatus::Waiting,
    }
}

pub async fn list(app: &App) -> Result<()> {
    let view = ReceptionDashboard::mount(&app.view_context()?);
    let result = async {
        loaded(view.sync(), app.deadline()).await?;
        let tokens = view.tokens();

        if app.output.is_text() {
            if tokens.is_empty() {
                println!("No tokens found");
            } else {
                print_token_table(&tokens);
            }
            Ok(())
        } else {
            app.output.print_value(&tokens)
        }
    }
    .await;

    view.unmount().await;
    result
}

pub async fn edit(app: &App, id: String, args: EditArgs) -> Result<()> {
    let patch = args.into_patch();
    patch.validate()?;
    let id = TokenId::new(id);

    let view = ReceptionDashboard::mount(&app.view_context()?);
    let result = async {
        loaded(view.sync(), app.deadline()).await?;
        let target = id.clone();
        let state = mutate(view.sync(), Operation::Update, app.deadline(), || {
            view.edit(target, patch)
        })
        .await?;
        print_outcome(app, "Updated", state.tokens.as_deref().unwrap_or(&[]), &id)
    }
    .await;

    view.unmount().await;
    result
}

pub async fn toggle_vip(app: &App, id: String) -> Result<()> {
    let id = TokenId::new(id);

    let view = ReceptionDashboard::mount(&app.view_context()?);
    let result = async {
        let state = loaded(view.sync(), app.deadline()).await?;
        let known = state
            .tokens
            .as_deref()
            .is_some_and(|tokens| tokens.iter().any(|t| t.id == id));
        if !known {
            bail!("Token {id} not found");
        }

        let state = mutate(view.sync(), Operation::SetVip, app.deadline(), || {
            view.toggle_vip(&id).map(|_| ())
        })
        .await?;
        print_outcome(app, "Updated", state.tokens.as_deref().unwrap_or(&[]), &id)
    }
    .await;

    view.unmount().await;
    result
}

pub async fn delete(app: &App, id: String) -> Result<()> {
    let id = TokenId::new(id);

    let view = ReceptionDashboard::mount(&app.view_context()?);
    let result = async {
        loaded(view.sync(), app.deadline()).await?;
        let target = id.clone();
        mutate(view.sync(), Operation::Delete, app.deadline(), || {
            view.delete(target)
        })
        .await?;

        if app.output.is_text() {
            if !app.quiet {
                println!("Deleted token {id}");
            }
            Ok(())
        } else {
            app.output
                .print_value(&serde_json::json!({"deleted": id.as_str()}))
        }
    }
    .await;

    view.unmount().await;
    result
}

fn print_outcome(
    app: &App,
    verb: &str,
    tokens: &[clinic_queue_core::Token],
    id: &TokenId,
) -> Result<()> {
    let Some(token) = tokens.iter().find(|t| &t.id == id) else {
        // Reconciled list no longer has it (deleted elsewhere in the meantime)
        if app.output.is_text() && !app.quiet {
            println!("{verb} token {id}");
        }
        return Ok(());
    };

    if app.output.is_text() {
        if app.quiet {
            println!("{}", token.id);
        } else {
            println!("{verb} {}", token_label(token));
            print_field("Phone", &token.phone_number);
            print_field("Status", &token.status.to_string());
            if let Some(notes) = &token.notes {
                print_field("Notes", notes);
            }
        }
        Ok(())
    } else {
        app.output.print_value(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_args_only_set_given_fields() {
        let patch = EditArgs {
            vip: Some(true),
            status: Some("done".into()),
            ..Default::default()
        }
        .into_patch();

        assert_eq!(patch.is_vip, Some(true));
        assert_eq!(patch.status, Some(TokenStatus::Done));
        assert_eq!(patch.patient_name, None);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({"isVIP": true, "status": "done"})
        );
    }

    #[test]
    fn test_empty_edit_is_rejected() {
        let patch = EditArgs::default().into_patch();
        assert!(patch.validate().is_err());
    }
}
