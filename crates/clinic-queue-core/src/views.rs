// Views
//
// The three screens are profiles of the one synchronizer. Each profile decides
// which push events it listens to, whether it needs a credential and what it
// fetches; the view types add screen-specific actions on top.

use serde::Serialize;
use std::fmt;

use crate::error::Result;
use crate::model::{NewToken, Token, TokenId, TokenPatch};
use crate::push::PushEventKind;
use crate::session::Route;
use crate::sync::{Operation, QueueSynchronizer, SyncPhase, ViewContext, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    PatientToken,
    DoctorDashboard,
    ReceptionDashboard,
}

impl ViewKind {
    pub fn push_kinds(&self) -> &'static [PushEventKind] {
        match self {
            ViewKind::PatientToken | ViewKind::DoctorDashboard => &[PushEventKind::QueueUpdate],
            ViewKind::ReceptionDashboard => &[
                PushEventKind::TokenUpdate,
                PushEventKind::NewToken,
                PushEventKind::TokenDelete,
            ],
        }
    }

    pub fn requires_credential(&self) -> bool {
        !matches!(self, ViewKind::PatientToken)
    }

    pub fn lists_tokens(&self) -> bool {
        matches!(self, ViewKind::ReceptionDashboard)
    }

    pub fn shows_wait_time(&self) -> bool {
        matches!(self, ViewKind::PatientToken)
    }

    /// Raises "Now serving" for advances made on any device
    pub fn announces_serving(&self) -> bool {
        matches!(self, ViewKind::DoctorDashboard)
    }

    /// Fallback target when the session cannot tell us the user's role
    pub fn login_route(&self) -> Route {
        match self {
            ViewKind::PatientToken => Route::Home,
            ViewKind::DoctorDashboard => Route::DoctorLogin,
            ViewKind::ReceptionDashboard => Route::ReceptionLogin,
        }
    }

    pub fn route(&self) -> Route {
        match self {
            ViewKind::PatientToken => Route::PatientToken,
            ViewKind::DoctorDashboard => Route::DoctorDashboard,
            ViewKind::ReceptionDashboard => Route::ReceptionDashboard,
        }
    }

    pub(crate) fn fetch_error_message(&self) -> &'static str {
        match self {
            ViewKind::ReceptionDashboard => "Error fetching tokens",
            _ => "Error fetching queue status",
        }
    }
}

impl fmt::Display for ViewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViewKind::PatientToken => "patient_token",
            ViewKind::DoctorDashboard => "doctor_dashboard",
            ViewKind::ReceptionDashboard => "reception_dashboard",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Doctor dashboard
// ============================================================================

pub struct DoctorDashboard {
    sync: QueueSynchronizer,
}

impl DoctorDashboard {
    pub fn mount(ctx: &ViewContext) -> Self {
        Self {
            sync: QueueSynchronizer::mount(ViewKind::DoctorDashboard, ctx),
        }
    }

    pub fn sync(&self) -> &QueueSynchronizer {
        &self.sync
    }

    pub fn state(&self) -> ViewState {
        self.sync.state()
    }

    /// The "next patient" button is enabled
    pub fn can_advance(state: &ViewState) -> bool {
        !state.is_busy(Operation::Advance)
            && state.phase != SyncPhase::Loading
            && !state.waiting_tokens().is_empty()
    }

    pub fn next_patient(&self) -> Result<()> {
        self.sync.advance_queue()
    }

    /// Skip whoever is being served. Returns false if nobody is.
    pub fn skip_current(&self) -> Result<bool> {
        let Some(current) = self.state().current_token().map(|t| t.id.clone()) else {
            return Ok(false);
        };
        self.sync.skip_token(current)?;
        Ok(true)
    }

    pub async fn unmount(self) {
        self.sync.unmount().await
    }
}

// ============================================================================
// Reception dashboard
// ============================================================================

pub struct ReceptionDashboard {
    sync: QueueSynchronizer,
}

impl ReceptionDashboard {
    pub fn mount(ctx: &ViewContext) -> Self {
        Self {
            sync: QueueSynchronizer::mount(ViewKind::ReceptionDashboard, ctx),
        }
    }

    pub fn sync(&self) -> &QueueSynchronizer {
        &self.sync
    }

    pub fn state(&self) -> ViewState {
        self.sync.state()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.state().tokens.unwrap_or_default()
    }

    pub fn edit(&self, id: TokenId, patch: TokenPatch) -> Result<()> {
        self.sync.update_token(id, patch)
    }

    /// Flip a token's VIP flag based on the last fetched list.
    ///
    /// Returns false when the token is not in the list.
    pub fn toggle_vip(&self, id: &TokenId) -> Result<bool> {
        let state = self.state();
        let known = state
            .tokens
            .as_deref()
            .and_then(|tokens| tokens.iter().find(|t| &t.id == id))
            .or_else(|| state.snapshot.as_ref().and_then(|s| s.find(id)));
        let Some(token) = known else {
            return Ok(false);
        };
        self.sync.set_vip(id.clone(), !token.is_vip)?;
        Ok(true)
    }

    pub fn delete(&self, id: TokenId) -> Result<()> {
        self.sync.delete_token(id)
    }

    pub async fn unmount(self) {
        self.sync.unmount().await
    }
}

// ============================================================================
// Patient token page
// ============================================================================

pub struct PatientTokenPage {
    sync: QueueSynchronizer,
}

impl PatientTokenPage {
    pub fn mount(ctx: &ViewContext) -> Self {
        Self {
            sync: QueueSynchronizer::mount(ViewKind::PatientToken, ctx),
        }
    }

    pub fn sync(&self) -> &QueueSynchronizer {
        &self.sync
    }

    pub fn state(&self) -> ViewState {
        self.sync.state()
    }

    pub fn request_token(
        &self,
        patient_name: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Result<()> {
        self.sync
            .submit_token(NewToken::new(patient_name, phone_number))
    }

    pub fn issued_token(&self) -> Option<Token> {
        self.state().issued_token
    }

    pub async fn unmount(self) {
        self.sync.unmount().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        assert!(!ViewKind::PatientToken.requires_credential());
        assert!(ViewKind::DoctorDashboard.requires_credential());
        assert!(ViewKind::ReceptionDashboard.lists_tokens());
        assert!(ViewKind::PatientToken.shows_wait_time());
        assert!(ViewKind::DoctorDashboard.announces_serving());
        assert!(!ViewKind::PatientToken.announces_serving());
        assert_eq!(
            ViewKind::ReceptionDashboard.push_kinds(),
            &[
                PushEventKind::TokenUpdate,
                PushEventKind::NewToken,
                PushEventKind::TokenDelete
            ]
        );
        assert_eq!(ViewKind::DoctorDashboard.login_route(), Route::DoctorLogin);
    }

    #[test]
    fn test_can_advance_needs_waiting_patients() {
        let mut state = ViewState {
            phase: SyncPhase::Ready,
            ..Default::default()
        };
        assert!(!DoctorDashboard::can_advance(&state));

        let token: Token =
            serde_json::from_value(serde_json::json!({"_id": "t1", "tokenNumber": 1})).unwrap();
        state.snapshot = Some(crate::model::QueueSnapshot {
            current_token: None,
            waiting_tokens: vec![token],
        });
        assert!(DoctorDashboard::can_advance(&state));

        state.busy.insert(Operation::Advance);
        assert!(!DoctorDashboard::can_advance(&state));
    }
}
