// Queue domain types
//
// These types double as the wire schema: decoding a payload through them is the
// single validation step between the backend and the views.

use chrono::{DateTime, Utc};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{QueueError, Result};

// ============================================================================
// Token identity
// ============================================================================

/// Opaque server-assigned token id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(pub String);

impl TokenId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Sequential display number assigned by the server.
///
/// The backend sends either a JSON number or a numeric string; both decode here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TokenNumber(pub u64);

impl<'de> Deserialize<'de> for TokenNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(TokenNumber(n)),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(TokenNumber)
                .map_err(|_| D::Error::custom(format!("token number is not numeric: {s:?}"))),
        }
    }
}

impl fmt::Display for TokenNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Token
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    #[default]
    Waiting,
    Serving,
    Skipped,
    Done,
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TokenStatus::Waiting => "waiting",
            TokenStatus::Serving => "serving",
            TokenStatus::Skipped => "skipped",
            TokenStatus::Done => "done",
        };
        f.write_str(s)
    }
}

/// One patient's place in the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    #[serde(rename = "_id")]
    pub id: TokenId,
    pub token_number: TokenNumber,
    #[serde(default)]
    pub patient_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub status: TokenStatus,
    #[serde(default, rename = "isVIP")]
    pub is_vip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The client's view of the queue, replaced whole on every refresh
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(default)]
    pub current_token: Option<Token>,
    /// Server order, never re-sorted
    #[serde(default)]
    pub waiting_tokens: Vec<Token>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current_token.is_none() && self.waiting_tokens.is_empty()
    }

    pub fn find(&self, id: &TokenId) -> Option<&Token> {
        self.current_token
            .iter()
            .chain(self.waiting_tokens.iter())
            .find(|t| &t.id == id)
    }
}

// ============================================================================
// Requests and outcomes
// ============================================================================

/// Patient submission for a new token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewToken {
    pub patient_name: String,
    pub phone_number: String,
}

impl NewToken {
    pub fn new(patient_name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            patient_name: patient_name.into(),
            phone_number: phone_number.into(),
        }
    }

    /// Reject missing fields before anything is sent
    pub fn validate(&self) -> Result<()> {
        if self.patient_name.trim().is_empty() || self.phone_number.trim().is_empty() {
            return Err(QueueError::validation(
                "Patient name and phone number are required",
            ));
        }
        Ok(())
    }
}

/// Partial token update; only `Some` fields are sent and changed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TokenStatus>,
    #[serde(default, rename = "isVIP", skip_serializing_if = "Option::is_none")]
    pub is_vip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TokenPatch {
    pub fn vip(is_vip: bool) -> Self {
        Self {
            is_vip: Some(is_vip),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patient_name.is_none()
            && self.phone_number.is_none()
            && self.status.is_none()
            && self.is_vip.is_none()
            && self.notes.is_none()
    }

    pub fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(QueueError::validation("No fields to update"));
        }
        let blank = |v: &Option<String>| v.as_deref().is_some_and(|s| s.trim().is_empty());
        if blank(&self.patient_name) || blank(&self.phone_number) {
            return Err(QueueError::validation(
                "Patient name and phone number cannot be blank",
            ));
        }
        Ok(())
    }

    /// Apply the supplied fields to `token`, leaving the rest untouched
    pub fn apply(&self, token: &mut Token) {
        if let Some(name) = &self.patient_name {
            token.patient_name = name.clone();
        }
        if let Some(phone) = &self.phone_number {
            token.phone_number = phone.clone();
        }
        if let Some(status) = self.status {
            token.status = status;
        }
        if let Some(is_vip) = self.is_vip {
            token.is_vip = is_vip;
        }
        if let Some(notes) = &self.notes {
            token.notes = Some(notes.clone());
        }
    }
}

/// Result of asking the doctor's queue to move on.
///
/// An empty queue is `advanced == false`, not an error.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceOutcome {
    pub advanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_token: Option<Token>,
}
