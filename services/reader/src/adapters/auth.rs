//! services/reader/src/adapters/auth.rs
//!
//! `AuthService` implementation for the hosted backend's auth endpoints,
//! including local session storage and access token refresh.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use novel_reader_core::domain::{AuthEvent, AuthSession, Identity};
use novel_reader_core::ports::{AuthEventStream, AuthService, PortError, PortResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::client::{check, transport_error, SupabaseClient};

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct UserRecord {
    id: Uuid,
    email: Option<String>,
}

impl UserRecord {
    fn to_domain(self) -> Identity {
        Identity {
            id: self.id,
            email: self.email,
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    expires_at: Option<i64>,
    user: UserRecord,
}

impl TokenResponse {
    fn to_domain(self, now: DateTime<Utc>) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| self.expires_in.map(|secs| now + Duration::seconds(secs)));
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            identity: self.user.to_domain(),
        }
    }
}

/// Sign-up answers with a full session when confirmation is off, and with the
/// bare user when an email confirmation is pending.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(UserRecord),
    Empty {},
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// The on-disk form of the held session.
#[derive(Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    user_id: Uuid,
    email: Option<String>,
}

impl StoredSession {
    fn from_domain(session: &AuthSession) -> Self {
        Self {
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user_id: session.identity.id,
            email: session.identity.email.clone(),
        }
    }

    fn to_domain(self) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            identity: Identity {
                id: self.user_id,
                email: self.email,
            },
        }
    }
}

//=========================================================================================
// Session Storage
//=========================================================================================

/// Reads a previously stored session. A missing or unreadable file means no session.
pub(crate) fn load_stored_session(path: &Path) -> std::io::Result<Option<AuthSession>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    match serde_json::from_str::<StoredSession>(&raw) {
        Ok(stored) => Ok(Some(stored.to_domain())),
        Err(e) => {
            warn!("Ignoring unreadable stored session at {}: {}", path.display(), e);
            Ok(None)
        }
    }
}

impl SupabaseClient {
    /// Replaces the held session and mirrors it to disk when configured.
    async fn store_session(&self, session: Option<AuthSession>) {
        if let Some(path) = &self.session_path {
            let result = match &session {
                Some(s) => match serde_json::to_string(&StoredSession::from_domain(s)) {
                    Ok(json) => tokio::fs::write(path, json).await,
                    Err(e) => Err(std::io::Error::other(e)),
                },
                None => match tokio::fs::remove_file(path).await {
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    other => other,
                },
            };
            if let Err(e) = result {
                warn!("Failed to persist session to {}: {}", path.display(), e);
            }
        }
        *self.session.write().await = session;
    }

    async fn request_token(&self, grant_type: &str, body: &impl Serialize) -> PortResult<AuthSession> {
        let response = self
            .http
            .post(self.auth_url(&format!("token?grant_type={}", grant_type)))
            .bearer_auth(&self.anon_key)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        let token: TokenResponse = check(response, "sign in")
            .await?
            .json()
            .await
            .map_err(transport_error)?;
        Ok(token.to_domain(Utc::now()))
    }

    async fn refresh(&self, refresh_token: &str) -> PortResult<AuthSession> {
        self.request_token("refresh_token", &RefreshRequest { refresh_token })
            .await
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for SupabaseClient {
    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        let held = self.session.read().await.clone();
        let Some(session) = held else {
            return Ok(None);
        };
        if !session.is_expired(Utc::now()) {
            return Ok(Some(session));
        }

        debug!("Access token expired, attempting refresh");
        let refreshed = match session.refresh_token.as_deref() {
            Some(token) => self.refresh(token).await,
            None => Err(PortError::Unauthorized),
        };
        match refreshed {
            Ok(fresh) => {
                self.store_session(Some(fresh.clone())).await;
                self.events.emit(AuthEvent::TokenRefreshed(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!("Session refresh failed, signing out locally: {}", e);
                self.store_session(None).await;
                self.events.emit(AuthEvent::SignedOut);
                Ok(None)
            }
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let session = self
            .request_token("password", &Credentials { email, password })
            .await?;
        info!("Signed in as {}", session.identity.id);
        self.store_session(Some(session.clone())).await;
        self.events.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .bearer_auth(&self.anon_key)
            .json(&Credentials { email, password })
            .send()
            .await
            .map_err(transport_error)?;
        let body: SignUpResponse = check(response, "sign up")
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        match body {
            SignUpResponse::Session(token) => {
                let session = token.to_domain(Utc::now());
                let identity = session.identity.clone();
                self.store_session(Some(session.clone())).await;
                self.events.emit(AuthEvent::SignedIn(session));
                Ok(Some(identity))
            }
            SignUpResponse::User(user) => Ok(Some(user.to_domain())),
            SignUpResponse::Empty {} => Ok(None),
        }
    }

    async fn sign_out(&self) -> PortResult<()> {
        let token = self.session.read().await.as_ref().map(|s| s.access_token.clone());
        if let Some(token) = token {
            let response = self
                .http
                .post(self.auth_url("logout"))
                .bearer_auth(token)
                .send()
                .await
                .map_err(transport_error)?;
            check(response, "sign out").await?;
        }
        self.store_session(None).await;
        self.events.emit(AuthEvent::SignedOut);
        Ok(())
    }

    fn auth_events(&self) -> AuthEventStream {
        self.events.subscribe()
    }
}
