//! crates/novel_reader_core/src/domain.rs
//!
//! Defines the pure, core data structures for the reader.
//! These structs are independent of the backend wire format.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// The identity of a signed-in user, as issued by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A backend-issued login session. Its lifecycle is owned by the auth service;
/// the client only observes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub identity: Identity,
}

impl AuthSession {
    /// True once the access token's expiry has passed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Session transitions pushed by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

impl AuthEvent {
    pub fn session(&self) -> Option<&AuthSession> {
        match self {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => Some(session),
            AuthEvent::SignedOut => None,
        }
    }
}

/// The onboarding record for a user, provisioned by a server-side trigger at sign-up.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub username: Option<String>,
    pub age: Option<u32>,
    pub interest_genres: Vec<String>,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// A profile is complete exactly when it carries a non-empty username.
    pub fn is_complete(&self) -> bool {
        self.username.as_deref().is_some_and(|name| !name.is_empty())
    }
}

/// Whether onboarding still has to run for the loaded profile.
///
/// No profile means the profile is not known yet, which is not the same
/// thing as incomplete.
pub fn needs_profile_completion(profile: Option<&UserProfile>) -> bool {
    profile.is_some_and(|p| !p.is_complete())
}

/// Input of the profile completion form.
#[derive(Debug, Clone)]
pub struct ProfileDraft {
    pub username: String,
    pub age: u32,
    pub interest_genres: Vec<String>,
    pub bio: String,
    pub profile_picture: Option<UploadFile>,
}

/// The row mutation written to the profile table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub username: String,
    pub age: u32,
    pub interest_genres: Vec<String>,
    pub bio: String,
    pub profile_picture: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Novel {
    pub novel_id: Uuid,
    pub title: String,
    pub author: String,
    pub upload_by: Uuid,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub chapter_id: Uuid,
    pub novel_id: Uuid,
    pub chapter_number: i32,
    pub title: String,
    pub content: String,
    pub views: i64,
}

impl Chapter {
    /// Splits the newline-delimited content into paragraphs.
    pub fn paragraphs(&self) -> Vec<&str> {
        self.content.split('\n').collect()
    }
}

/// The `(id, number)` projection of a chapter used for navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRef {
    pub chapter_id: Uuid,
    pub chapter_number: i32,
}

/// Previous/next chapter ids around the chapter being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChapterNeighbours {
    pub prev: Option<Uuid>,
    pub next: Option<Uuid>,
}

/// Locates `current` in a list ordered by chapter number and returns its
/// neighbours. A chapter missing from the list has no neighbours.
pub fn adjacent_chapters(ordered: &[ChapterRef], current: Uuid) -> ChapterNeighbours {
    let Some(index) = ordered.iter().position(|c| c.chapter_id == current) else {
        return ChapterNeighbours::default();
    };

    ChapterNeighbours {
        prev: index.checked_sub(1).map(|i| ordered[i].chapter_id),
        next: ordered.get(index + 1).map(|c| c.chapter_id),
    }
}

/// A binary blob handed over for upload, along with its original file name.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The text after the last `.` of the original name, or the whole name
    /// when there is no dot.
    pub fn extension(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Builds the collision-resistant object name `{owner}-{millis}.{ext}`.
pub fn upload_file_name(owner: &str, timestamp_millis: i64, file: &UploadFile) -> String {
    format!("{}-{}.{}", owner, timestamp_millis, file.extension())
}
