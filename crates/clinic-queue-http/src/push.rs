// Server-Sent Events push channel
//
// Each subscription is its own GET on the events endpoint. A forwarder task
// parses the stream and hands matching events to the view. Closing the
// subscription cancels the forwarder, which drops the response and with it the
// connection.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde_json::Value;

use clinic_queue_core::{
    PushChannel, PushEvent, PushEventKind, QueueError, Result, Subscription, SyncConfig,
};

use crate::client::error_from_response;
use crate::config::ApiConfig;

pub struct SsePushChannel {
    url: String,
    http: reqwest::Client,
    buffer: usize,
}

impl SsePushChannel {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        // Streams are long-lived, so only the connect phase is bounded
        let http = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| QueueError::network(e.to_string()))?;
        Ok(Self {
            url: config.push_url(),
            http,
            buffer: SyncConfig::default().push_buffer,
        })
    }

    /// Events buffered per subscription before the forwarder waits on the view
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PushChannel for SsePushChannel {
    async fn subscribe(
        &self,
        kinds: &[PushEventKind],
        credential: Option<&str>,
    ) -> Result<Subscription> {
        let mut request = self
            .http
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(bearer) = credential {
            request = request.bearer_auth(bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| QueueError::network(e.to_string()))?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let (tx, cancel, subscription) = Subscription::channel(self.buffer);
        let kinds = kinds.to_vec();
        let mut events = Box::pin(response.bytes_stream().eventsource());
        tracing::debug!(url = %self.url, kinds = ?kinds, "Push stream connected");

        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    next = events.next() => next,
                };

                let event = match next {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Push stream failed");
                        break;
                    }
                    None => {
                        tracing::debug!("Push stream ended");
                        break;
                    }
                };

                let Some(kind) = PushEventKind::from_name(&event.event) else {
                    tracing::trace!(event = %event.event, "Ignoring push event");
                    continue;
                };
                if !kinds.contains(&kind) {
                    continue;
                }

                let event = PushEvent::with_data(kind, decode_data(&event.data));
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    sent = tx.send(event) => sent,
                };
                if sent.is_err() {
                    break;
                }
            }
        });

        Ok(subscription)
    }
}

/// Payloads are only logged, so anything non-JSON is kept as text
fn decode_data(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
