//! In-memory stand-in for the identity service, used by integration tests.

use parking_lot::Mutex;
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{ApiError, ImportResult};
use crate::okta::rate_limit::{self, RateLimit};
use crate::okta::schema::SchemaDocument;
use crate::okta::{CreateUserResponse, RemoteSchema, UserApi};
use crate::payload::Payload;

/// Scripted reply to one create-user submission.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(CreateUserResponse),
    Timeout,
    /// A transport-level fault that is neither a timeout nor an HTTP status.
    Transport,
}

impl Reply {
    /// 200 with plenty of quota left.
    pub fn ok() -> Self {
        Self::ok_with(RateLimit {
            limit: Some(600),
            remaining: Some(599),
            reset: Some(rate_limit::now_epoch() + 60),
        })
    }

    pub fn ok_with(rate_limit: RateLimit) -> Self {
        Reply::Respond(CreateUserResponse {
            status: StatusCode::OK,
            rate_limit,
            error_summary: None,
        })
    }

    pub fn too_many_requests(reset: Option<i64>) -> Self {
        Reply::Respond(CreateUserResponse {
            status: StatusCode::TOO_MANY_REQUESTS,
            rate_limit: RateLimit {
                limit: Some(600),
                remaining: Some(0),
                reset,
            },
            error_summary: None,
        })
    }

    pub fn error(status: u16, summary: &str) -> Self {
        Reply::Respond(CreateUserResponse {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_REQUEST),
            rate_limit: RateLimit::default(),
            error_summary: Some(summary.to_string()),
        })
    }
}

/// One observed submission.
#[derive(Debug, Clone)]
pub struct Call {
    pub login: String,
    pub body: serde_json::Value,
    pub at: Instant,
}

/// [`UserApi`] that answers from per-login scripts and records every call.
pub struct ScriptedApi {
    attributes: Vec<String>,
    default_reply: Reply,
    latency: Duration,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedApi {
    /// Service whose schema defines `attributes` and that accepts every user.
    pub fn new<I, S>(attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            attributes: attributes.into_iter().map(Into::into).collect(),
            default_reply: Reply::ok(),
            latency: Duration::ZERO,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_default(mut self, reply: Reply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Simulated round-trip time for every create-user call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replies for `login`, consumed in order before falling back to the default.
    pub fn script(self, login: &str, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.scripts
            .lock()
            .entry(login.to_string())
            .or_default()
            .extend(replies);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, login: &str) -> Vec<Call> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.login == login)
            .cloned()
            .collect()
    }
}

impl UserApi for ScriptedApi {
    async fn fetch_user_schema(&self) -> ImportResult<RemoteSchema> {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .attributes
            .iter()
            .map(|name| (name.clone(), serde_json::json!({"type": "string"})))
            .collect();
        let document: SchemaDocument = serde_json::from_value(serde_json::json!({
            "definitions": {
                "base": {"properties": properties},
                "custom": {"properties": {}}
            }
        }))
        .map_err(|err| crate::error::ImportError::SchemaFetch(err.into()))?;
        Ok(RemoteSchema::from_document(document))
    }

    async fn create_user(&self, payload: &Payload<'_>) -> Result<CreateUserResponse, ApiError> {
        let login = payload.profile.get("login").copied().unwrap_or_default().to_string();
        self.calls.lock().push(Call {
            login: login.clone(),
            body: serde_json::to_value(payload)?,
            at: Instant::now(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .get_mut(&login)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_reply.clone());

        match reply {
            Reply::Respond(response) => Ok(response),
            Reply::Timeout => Err(ApiError::Timeout),
            Reply::Transport => Err(ApiError::Decode(
                serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
            )),
        }
    }
}
