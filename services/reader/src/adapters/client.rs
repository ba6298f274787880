//! services/reader/src/adapters/client.rs
//!
//! The configured handle to the hosted backend. It owns the HTTP client, the
//! project URL and key, and the locally held session; the port implementations
//! live in `auth`, `rest` and `storage`.

use novel_reader_core::domain::AuthSession;
use novel_reader_core::ports::{PortError, PortResult};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::adapters::events::AuthEventHub;
use crate::config::Config;
use crate::error::ReaderError;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A backend adapter that implements the auth, row-store and storage ports.
#[derive(Clone)]
pub struct SupabaseClient {
    pub(crate) http: Client,
    pub(crate) base_url: String,
    pub(crate) anon_key: String,
    pub(crate) session: Arc<RwLock<Option<AuthSession>>>,
    pub(crate) session_path: Option<PathBuf>,
    pub(crate) events: AuthEventHub,
}

impl SupabaseClient {
    /// Creates a new `SupabaseClient`, picking up a stored session if one exists.
    pub fn new(config: &Config) -> Result<Self, ReaderError> {
        let mut headers = HeaderMap::new();
        let api_key = HeaderValue::from_str(&config.supabase_anon_key)
            .map_err(|e| ReaderError::Internal(format!("Invalid anon key: {}", e)))?;
        headers.insert("apikey", api_key);

        let http = Client::builder().default_headers(headers).build()?;
        let stored = match &config.session_path {
            Some(path) => super::auth::load_stored_session(path)?,
            None => None,
        };

        Ok(Self {
            http,
            base_url: config.supabase_url.clone(),
            anon_key: config.supabase_anon_key.clone(),
            session: Arc::new(RwLock::new(stored)),
            session_path: config.session_path.clone(),
            events: AuthEventHub::default(),
        })
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    pub(crate) fn rpc_url(&self, function: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.base_url, function)
    }

    pub(crate) fn storage_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, path)
    }

    /// The bearer token for row and storage requests: the signed-in user's
    /// access token, or the anon key when signed out.
    pub(crate) async fn bearer(&self) -> String {
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.access_token.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }
}

//=========================================================================================
// Response Checking
//=========================================================================================

/// The error shapes returned by the auth, PostgREST and storage endpoints.
#[derive(Deserialize, Default)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
}

impl ErrorBody {
    fn text(self) -> Option<String> {
        self.msg
            .or(self.message)
            .or(self.error_description)
            .or(self.error)
    }
}

/// PostgREST code for "single object requested, zero rows returned".
const NO_ROWS_CODE: &str = "PGRST116";

pub(crate) fn transport_error(e: reqwest::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

/// Passes successful responses through and turns the rest into a `PortError`.
pub(crate) async fn check(response: Response, what: &str) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_from_status(status, &body, what))
}

pub(crate) fn error_from_status(status: StatusCode, body: &str, what: &str) -> PortError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let no_rows = parsed
        .code
        .as_ref()
        .and_then(|c| c.as_str())
        .is_some_and(|c| c == NO_ROWS_CODE);
    let message = parsed
        .text()
        .unwrap_or_else(|| format!("{} failed with status {}", what, status));

    match status {
        StatusCode::NOT_FOUND => PortError::NotFound(what.to_string()),
        StatusCode::NOT_ACCEPTABLE if no_rows => PortError::NotFound(what.to_string()),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN if body.trim().is_empty() => {
            PortError::Unauthorized
        }
        s if s.is_client_error() => PortError::Rejected(message),
        _ => PortError::Unexpected(message),
    }
}
