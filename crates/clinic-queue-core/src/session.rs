// Session context and navigation targets
//
// The credential is issued by the backend and persisted by an external store.
// Views receive it explicitly at mount time and never read storage mid-operation.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Staff,
    Doctor,
    Receptionist,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
            Role::Doctor => "doctor",
            Role::Receptionist => "receptionist",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Auth token plus the user it was issued to
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCredential {
    pub token: String,
    pub user: User,
}

impl SessionCredential {
    pub fn new(token: impl Into<String>, role: Role) -> Self {
        Self {
            token: token.into(),
            user: User {
                role,
                username: None,
            },
        }
    }

    pub fn role(&self) -> Role {
        self.user.role
    }
}

// Keeps bearer tokens out of logs
impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredential")
            .field("token", &"<redacted>")
            .field("user", &self.user)
            .finish()
    }
}

/// What a view knows about the signed-in user when it is mounted
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub credential: Option<SessionCredential>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { credential: None }
    }

    pub fn authenticated(credential: SessionCredential) -> Self {
        Self {
            credential: Some(credential),
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.credential.as_ref().map(SessionCredential::role)
    }

    pub fn bearer(&self) -> Option<&str> {
        self.credential.as_ref().map(|c| c.token.as_str())
    }
}

// ============================================================================
// Routes
// ============================================================================

/// Navigation targets handed to the external router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Home,
    PatientToken,
    DoctorLogin,
    DoctorDashboard,
    ReceptionLogin,
    ReceptionDashboard,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::PatientToken => "/clinic/token",
            Route::DoctorLogin => "/clinic/doctor/login",
            Route::DoctorDashboard => "/clinic/doctor",
            Route::ReceptionLogin => "/clinic/reception/login",
            Route::ReceptionDashboard => "/clinic/reception",
        }
    }

    /// Login page for a role, if the role has one
    pub fn login_for(role: Role) -> Option<Route> {
        match role {
            Role::Doctor => Some(Route::DoctorLogin),
            Role::Receptionist => Some(Route::ReceptionLogin),
            Role::Admin | Role::Staff => None,
        }
    }

    /// Where a user lands after signing out
    pub fn after_logout(role: Option<Role>) -> Route {
        role.and_then(Route::login_for).unwrap_or(Route::Home)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logout_route_by_role() {
        assert_eq!(Route::after_logout(Some(Role::Doctor)), Route::DoctorLogin);
        assert_eq!(
            Route::after_logout(Some(Role::Receptionist)),
            Route::ReceptionLogin
        );
        assert_eq!(Route::after_logout(Some(Role::Admin)), Route::Home);
        assert_eq!(Route::after_logout(None), Route::Home);
    }

    #[test]
    fn test_credential_debug_is_redacted() {
        let credential = SessionCredential::new("secret-bearer", Role::Doctor);
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("secret-bearer"));
        assert!(printed.contains("Doctor"));
    }

    #[test]
    fn test_credential_wire_shape() {
        let credential: SessionCredential = serde_json::from_value(serde_json::json!({
            "token": "abc",
            "user": {"role": "receptionist"}
        }))
        .unwrap();
        assert_eq!(credential.role(), Role::Receptionist);
        assert_eq!(
            SessionContext::authenticated(credential).bearer(),
            Some("abc")
        );
    }
}
