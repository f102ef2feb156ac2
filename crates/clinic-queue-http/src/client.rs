// HTTP client for the clinic queue API

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use clinic_queue_core::{
    AdvanceOutcome, NewToken, QueueClient, QueueError, QueueSnapshot, Result, SessionCredential,
    Token, TokenId, TokenPatch, User,
};

use crate::config::ApiConfig;

/// Message the backend sends instead of a token when nobody is waiting
const NO_MORE_TOKENS: &str = "No more tokens in queue";

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WaitTimeBody {
    average_wait_time: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    current_token: Option<Token>,
}

#[derive(Debug, Serialize)]
struct LoginBody<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
    user: User,
}

/// REST client bound to one backend and, optionally, one credential
#[derive(Clone)]
pub struct HttpQueueClient {
    base_url: String,
    http: reqwest::Client,
    bearer: Option<String>,
}

impl HttpQueueClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| QueueError::network(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.clone(),
            http,
            bearer: None,
        })
    }

    /// Attach `credential` to every subsequent call
    pub fn with_credential(mut self, credential: Option<&SessionCredential>) -> Self {
        self.bearer = credential.map(|c| c.token.clone());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let request = self.http.request(method, url);
        match &self.bearer {
            Some(bearer) => request.bearer_auth(bearer),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path), path).await?;
        decode(response, path).await
    }

    async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.request(Method::POST, path).json(body), path)
            .await?;
        decode(response, path).await
    }

    async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self
            .send(self.request(Method::PUT, path).json(body), path)
            .await?;
        decode(response, path).await
    }

    /// PUT without a body whose response content is not needed
    async fn put_empty(&self, path: &str) -> Result<Response> {
        self.send(self.request(Method::PUT, path), path).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.send(self.request(Method::DELETE, path), path).await?;
        Ok(())
    }

    async fn send(&self, request: RequestBuilder, path: &str) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            tracing::debug!(path, error = %e, "Request failed");
            QueueError::network(e.to_string())
        })?;

        if response.status().is_success() {
            return Ok(response);
        }
        Err(error_from_response(response).await)
    }
}

/// Turn a non-success response into the error taxonomy, keeping the server's `message`
pub(crate) async fn error_from_response(response: Response) -> QueueError {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<ErrorBody>(&text).ok())
        .and_then(|body| body.message);
    tracing::debug!(status, message = ?message, "Backend rejected request");
    QueueError::from_status(status, message)
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T> {
    let bytes = response
        .bytes()
        .await
        .map_err(|e| QueueError::network(e.to_string()))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| QueueError::validation(format!("unexpected response from {path}: {e}")))
}

#[async_trait]
impl QueueClient for HttpQueueClient {
    async fn fetch_status(&self) -> Result<QueueSnapshot> {
        self.get("/api/queue/status").await
    }

    async fn fetch_wait_time(&self) -> Result<f64> {
        let body: WaitTimeBody = self.get("/api/queue/wait-time").await?;
        Ok(body.average_wait_time)
    }

    async fn submit_token(&self, request: &NewToken) -> Result<Token> {
        request.validate()?;
        self.post("/api/tokens", request).await
    }

    async fn list_tokens(&self) -> Result<Vec<Token>> {
        self.get("/api/tokens").await
    }

    async fn advance_queue(&self) -> Result<AdvanceOutcome> {
        let path = "/api/queue/next";
        let response = self.put_empty(path).await?;
        let body: NextBody = decode(response, path).await?;

        if body.message.as_deref() == Some(NO_MORE_TOKENS) {
            return Ok(AdvanceOutcome {
                advanced: false,
                current_token: None,
            });
        }
        Ok(AdvanceOutcome {
            advanced: true,
            current_token: body.current_token,
        })
    }

    async fn skip_token(&self, id: &TokenId) -> Result<()> {
        self.put_empty(&format!("/api/queue/skip/{id}")).await?;
        Ok(())
    }

    async fn update_token(&self, id: &TokenId, patch: &TokenPatch) -> Result<Token> {
        patch.validate()?;
        self.put(&format!("/api/tokens/{id}"), patch).await
    }

    async fn delete_token(&self, id: &TokenId) -> Result<()> {
        self.delete(&format!("/api/tokens/{id}")).await
    }

    async fn login(&self, username: &str, password: &str) -> Result<SessionCredential> {
        let body: LoginResponse = self
            .post("/api/auth/login", &LoginBody { username, password })
            .await?;
        let mut user = body.user;
        if user.username.is_none() {
            user.username = Some(username.to_string());
        }
        Ok(SessionCredential {
            token: body.token,
            user,
        })
    }
}
