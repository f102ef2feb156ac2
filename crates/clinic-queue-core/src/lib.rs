// Clinic Queue Core
//
// Decision: Views never apply push payloads; every event means "re-fetch the truth"
// Decision: Only the newest initiated fetch may become visible (sequence-tagged completions)
// Decision: Last good snapshot stays on screen when a fetch fails
// Decision: Session context is passed in at mount time, never read from storage mid-operation

pub mod auth;
pub mod config;
pub mod error;
pub mod memory;
pub mod model;
pub mod notifications;
pub mod push;
pub mod session;
pub mod sync;
pub mod traits;
pub mod views;

pub use auth::{login, logout, LoginOutcome, Portal};
pub use config::SyncConfig;
pub use error::{QueueError, Result};
pub use model::{
    AdvanceOutcome, NewToken, QueueSnapshot, Token, TokenId, TokenNumber, TokenPatch, TokenStatus,
};
pub use notifications::{Notification, NotificationQueue};
pub use push::{PushEvent, PushEventKind, Subscription};
pub use session::{Role, Route, SessionContext, SessionCredential, User};
pub use sync::{Operation, QueueSynchronizer, SyncPhase, ViewContext, ViewState};
pub use traits::{
    CredentialStore, Navigator, NoopNavigator, PushChannel, QueueClient, RedirectReason,
};
pub use views::{DoctorDashboard, PatientTokenPage, ReceptionDashboard, ViewKind};
