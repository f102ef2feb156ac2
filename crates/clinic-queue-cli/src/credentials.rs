// File-backed credential store and the CLI's navigator

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clinic_queue_core::{
    CredentialStore, Navigator, QueueError, RedirectReason, Result, Route, SessionCredential,
};

const CREDENTIALS_FILE: &str = ".clinic-queue/credentials.json";

/// `$HOME/.clinic-queue/credentials.json`, or relative to the working directory without a home
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(CREDENTIALS_FILE))
        .unwrap_or_else(|| PathBuf::from(CREDENTIALS_FILE))
}

/// Stores the signed-in credential as JSON on disk
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<SessionCredential>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(QueueError::credential_store(e.to_string())),
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            QueueError::credential_store(format!("{}: {e}", self.path.display()))
        })
    }

    fn save(&self, credential: &SessionCredential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| QueueError::credential_store(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(credential)
            .map_err(|e| QueueError::credential_store(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| QueueError::credential_store(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(QueueError::credential_store(e.to_string())),
        }
    }
}

/// A rejected credential is a forced logout: the stored file goes away
pub struct CliNavigator {
    store: Arc<dyn CredentialStore>,
}

impl CliNavigator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }
}

impl Navigator for CliNavigator {
    fn navigate(&self, route: Route, reason: RedirectReason) {
        tracing::info!(route = %route, reason = ?reason, "Redirect requested");
        if reason == RedirectReason::AuthFailed {
            if let Err(e) = self.store.clear() {
                tracing::warn!(error = %e, "Failed to clear rejected credential");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_queue_core::Role;

    fn store_in(dir: &tempfile::TempDir) -> FileCredentialStore {
        FileCredentialStore::new(dir.path().join("nested").join("credentials.json"))
    }

    #[test]
    fn test_missing_file_means_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.load().unwrap(), None);
        assert!(store.clear().is_ok());
    }

    #[test]
    fn test_save_load_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let credential = SessionCredential::new("abc", Role::Doctor);

        store.save(&credential).unwrap();
        assert_eq!(store.load().unwrap(), Some(credential));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_store_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "not json").unwrap();

        assert!(matches!(
            store.load(),
            Err(QueueError::CredentialStore(_))
        ));
    }

    #[test]
    fn test_auth_failure_clears_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        store
            .save(&SessionCredential::new("abc", Role::Receptionist))
            .unwrap();
        let navigator = CliNavigator::new(store.clone());

        navigator.navigate(Route::ReceptionLogin, RedirectReason::MissingCredential);
        assert!(store.load().unwrap().is_some());

        navigator.navigate(Route::ReceptionLogin, RedirectReason::AuthFailed);
        assert_eq!(store.load().unwrap(), None);
    }
}
