// Wiring shared by every command

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use clinic_queue_core::{
    CredentialStore, SessionContext, SessionCredential, SyncConfig, ViewContext,
};
use clinic_queue_http::{ApiConfig, HttpQueueClient, SsePushChannel};

use crate::credentials::{CliNavigator, FileCredentialStore};
use crate::output::OutputFormat;

pub struct App {
    pub api: ApiConfig,
    pub sync: SyncConfig,
    pub store: Arc<FileCredentialStore>,
    pub output: OutputFormat,
    pub quiet: bool,
}

impl App {
    pub fn client(&self, credential: Option<&SessionCredential>) -> Result<HttpQueueClient> {
        Ok(HttpQueueClient::new(&self.api)?.with_credential(credential))
    }

    /// Everything a view needs, with the stored credential read once here
    pub fn view_context(&self) -> Result<ViewContext> {
        let credential = self.store.load()?;
        let client = self.client(credential.as_ref())?;
        let push = SsePushChannel::new(&self.api)?.with_buffer(self.sync.push_buffer);
        let session = match credential {
            Some(credential) => SessionContext::authenticated(credential),
            None => SessionContext::anonymous(),
        };

        Ok(ViewContext::new(Arc::new(client), Arc::new(push))
            .with_session(session)
            .with_navigator(Arc::new(CliNavigator::new(self.store.clone())))
            .with_config(self.sync.clone()))
    }

    /// Longest a command waits for the backend to settle a view
    pub fn deadline(&self) -> Duration {
        self.api.timeout
    }
}
