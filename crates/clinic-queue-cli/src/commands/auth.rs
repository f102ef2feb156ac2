// Sign-in and sign-out commands

use anyhow::Result;
use serde_json::json;

use clinic_queue_core::Portal;

use crate::app::App;
use crate::output::print_field;

pub fn portal(name: &str) -> Portal {
    match name {
        "doctor" => Portal::Doctor,
        _ => Portal::Reception,
    }
}

pub async fn login(app: &App, portal_name: &str, username: &str, password: &str) -> Result<()> {
    let client = app.client(None)?;
    let outcome = clinic_queue_core::login(
        &client,
        app.store.as_ref(),
        portal(portal_name),
        username,
        password,
    )
    .await?;
    let role = outcome.credential.role().to_string();

    if app.output.is_text() {
        if app.quiet {
            println!("{role}");
        } else {
            println!("Signed in as {role}");
            print_field("Dashboard", outcome.route.path());
            print_field("Credentials", &app.store.path().display().to_string());
        }
    } else {
        app.output
            .print_value(&json!({"role": role, "route": outcome.route.path()}))?;
    }
    Ok(())
}

pub fn logout(app: &App) -> Result<()> {
    let route = clinic_queue_core::logout(app.store.as_ref())?;

    if app.output.is_text() {
        if !app.quiet {
            println!("Signed out");
            print_field("Next", route.path());
        }
    } else {
        app.output.print_value(&json!({"route": route.path()}))?;
    }
    Ok(())
}
