//! crates/novel_reader_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the reader's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the hosted backend and its client SDK.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    AuthEvent, AuthSession, Chapter, ChapterRef, Identity, Novel, ProfileUpdate, UploadFile,
    UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from the backend (HTTP, JSON, storage).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The backend refused the request and said why (bad credentials, policy, ...).
    #[error("{0}")]
    Rejected(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Session-change notifications, delivered for as long as the stream is held.
pub type AuthEventStream = Pin<Box<dyn Stream<Item = AuthEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// The session currently held by the client, if any.
    async fn current_session(&self) -> PortResult<Option<AuthSession>>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession>;

    /// Creates a new identity. `None` means the backend accepted the request
    /// but returned no user.
    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>>;

    async fn sign_out(&self) -> PortResult<()>;

    /// Subscribes to session transitions.
    fn auth_events(&self) -> AuthEventStream;
}

#[async_trait]
pub trait ProfileRepository: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile>;

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<()>;
}

#[async_trait]
pub trait LibraryRepository: Send + Sync {
    async fn get_novel(&self, novel_id: Uuid) -> PortResult<Novel>;

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter>;

    /// All chapters of a novel, ordered by chapter number ascending.
    async fn list_chapter_refs(&self, novel_id: Uuid) -> PortResult<Vec<ChapterRef>>;

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> PortResult<()>;
}

/// Upload behaviour for a single object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub cache_control_secs: u32,
    pub upsert: bool,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: UploadOptions,
    ) -> PortResult<()>;

    /// The globally-addressable URL of an object in a public bucket.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}
