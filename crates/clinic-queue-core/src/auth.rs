// Login and logout flows
//
// The backend issues credentials; these helpers only check the role against the
// portal the user signed in through and keep the credential store in step.

use crate::error::{QueueError, Result};
use crate::session::{Role, Route, SessionCredential};
use crate::traits::{CredentialStore, QueueClient};

/// Which login page the user came through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Portal {
    Doctor,
    Reception,
}

impl Portal {
    pub fn required_role(&self) -> Role {
        match self {
            Portal::Doctor => Role::Doctor,
            Portal::Reception => Role::Receptionist,
        }
    }

    pub fn dashboard(&self) -> Route {
        match self {
            Portal::Doctor => Route::DoctorDashboard,
            Portal::Reception => Route::ReceptionDashboard,
        }
    }

    fn denial_message(&self) -> &'static str {
        match self {
            Portal::Doctor => "Access denied. Only doctors can log in.",
            Portal::Reception => "Access denied. Only reception staff can log in.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub credential: SessionCredential,
    pub route: Route,
}

/// Sign in through `portal` and persist the credential on success
pub async fn login(
    client: &dyn QueueClient,
    store: &dyn CredentialStore,
    portal: Portal,
    username: &str,
    password: &str,
) -> Result<LoginOutcome> {
    let credential = client.login(username, password).await?;

    if credential.role() != portal.required_role() {
        tracing::warn!(role = %credential.role(), portal = ?portal, "Login role does not match portal");
        return Err(QueueError::auth(portal.denial_message()));
    }

    store.save(&credential)?;
    tracing::info!(role = %credential.role(), "Signed in");

    Ok(LoginOutcome {
        credential,
        route: portal.dashboard(),
    })
}

/// Drop the stored credential and return the role-dependent landing route
pub fn logout(store: &dyn CredentialStore) -> Result<Route> {
    let role = store.load()?.map(|c| c.role());
    store.clear()?;
    tracing::info!(role = ?role, "Signed out");
    Ok(Route::after_logout(role))
}
