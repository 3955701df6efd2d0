use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::rate_limit::RateLimit;
use super::schema::{RemoteSchema, SchemaDocument};
use crate::config::ImportConfig;
use crate::error::{ApiError, ImportError, ImportResult};
use crate::payload::Payload;

const USER_AGENT: &str = "okta-user-import/0.1";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one create-user submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserResponse {
    pub status: StatusCode,
    pub rate_limit: RateLimit,
    /// Error summary reported by the service for statuses other than 200 and 429.
    pub error_summary: Option<String>,
}

/// Operations the import needs from the identity service.
pub trait UserApi: Send + Sync + 'static {
    fn fetch_user_schema(&self) -> impl Future<Output = ImportResult<RemoteSchema>> + Send;

    fn create_user(
        &self,
        payload: &Payload<'_>,
    ) -> impl Future<Output = Result<CreateUserResponse, ApiError>> + Send;
}

impl<A: UserApi> UserApi for Arc<A> {
    fn fetch_user_schema(&self) -> impl Future<Output = ImportResult<RemoteSchema>> + Send {
        (**self).fetch_user_schema()
    }

    fn create_user(
        &self,
        payload: &Payload<'_>,
    ) -> impl Future<Output = Result<CreateUserResponse, ApiError>> + Send {
        (**self).create_user(payload)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "errorSummary")]
    error_summary: String,
}

/// `errorSummary` from an error body, or the raw body when it is not the expected JSON.
pub fn error_summary(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|parsed| parsed.error_summary)
        .unwrap_or_else(|_| body.trim().to_string())
}

/// HTTP client for the Okta management API.
#[derive(Debug, Clone)]
pub struct OktaClient {
    base_url: String,
    headers: HeaderMap,
    activate: bool,
    request_timeout: Duration,
}

impl OktaClient {
    pub fn new(config: &ImportConfig) -> ImportResult<Self> {
        let mut auth =
            HeaderValue::from_str(&format!("SSWS {}", config.api_token)).map_err(|_| {
                ImportError::Config("OKTA_API_TOKEN contains invalid characters".into())
            })?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, auth);

        Ok(Self {
            base_url: config.org_url.trim_end_matches('/').to_string(),
            headers,
            activate: config.activate,
            request_timeout: config.request_timeout,
        })
    }

    /// Each submission gets its own client; connections are not shared across records.
    fn http(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(self.headers.clone())
            .build()
            .map_err(ApiError::Http)
    }
}

impl UserApi for OktaClient {
    async fn fetch_user_schema(&self) -> ImportResult<RemoteSchema> {
        let url = format!("{}/api/v1/meta/schemas/user/default", self.base_url);
        let http = self.http().map_err(ImportError::SchemaFetch)?;
        let response = http
            .get(url)
            .send()
            .await
            .map_err(|err| ImportError::SchemaFetch(err.into()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ImportError::SchemaStatus { status, body });
        }

        let document: SchemaDocument = response
            .json()
            .await
            .map_err(|err| ImportError::SchemaFetch(err.into()))?;
        Ok(RemoteSchema::from_document(document))
    }

    async fn create_user(&self, payload: &Payload<'_>) -> Result<CreateUserResponse, ApiError> {
        let url = format!("{}/api/v1/users", self.base_url);
        let response = self
            .http()?
            .post(url)
            .query(&[("activate", self.activate)])
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let rate_limit = RateLimit::from_headers(response.headers());
        let error_summary = match status {
            StatusCode::OK | StatusCode::TOO_MANY_REQUESTS => None,
            _ => Some(error_summary(&response.text().await?)),
        };

        Ok(CreateUserResponse {
            status,
            rate_limit,
            error_summary,
        })
    }
}
