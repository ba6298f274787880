//! services/reader/src/adapters/rest.rs
//!
//! This module contains the row-store adapter, the concrete implementation of the
//! `ProfileRepository` and `LibraryRepository` ports over the backend's REST
//! (PostgREST) interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use novel_reader_core::domain::{Chapter, ChapterRef, Novel, ProfileUpdate, UserProfile};
use novel_reader_core::ports::{LibraryRepository, PortResult, ProfileRepository};
use reqwest::header::ACCEPT;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::client::{check, transport_error, SupabaseClient};

pub const USERS_TABLE: &str = "Users";
pub const NOVELS_TABLE: &str = "Novels";
pub const CHAPTERS_TABLE: &str = "Chapters";
pub const INCREMENT_VIEWS_RPC: &str = "increment_chapter_views";

/// Asks PostgREST for a single JSON object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

fn eq(id: Uuid) -> String {
    format!("eq.{}", id)
}

fn parse_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|t| t.with_timezone(&Utc))
}

//=========================================================================================
// "Impure" Row Record Structs
//=========================================================================================

#[derive(Deserialize)]
struct UserRecord {
    user_id: Uuid,
    username: Option<String>,
    age: Option<i64>,
    interest_genre: Option<Vec<String>>,
    bio: Option<String>,
    profile_picture: Option<String>,
    created_at: Option<String>,
    updated_at: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            user_id: self.user_id,
            username: self.username,
            age: self.age.and_then(|a| u32::try_from(a).ok()),
            interest_genres: self.interest_genre.unwrap_or_default(),
            bio: self.bio,
            profile_picture: self.profile_picture,
            created_at: parse_timestamp(self.created_at),
            updated_at: parse_timestamp(self.updated_at),
        }
    }
}

#[derive(Serialize)]
struct UserUpdateRecord<'a> {
    username: &'a str,
    age: u32,
    interest_genre: &'a [String],
    bio: &'a str,
    profile_picture: Option<&'a str>,
    updated_at: String,
}
impl<'a> UserUpdateRecord<'a> {
    fn from_domain(update: &'a ProfileUpdate) -> Self {
        Self {
            username: &update.username,
            age: update.age,
            interest_genre: &update.interest_genres,
            bio: &update.bio,
            profile_picture: update.profile_picture.as_deref(),
            updated_at: update.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
struct NovelRecord {
    novel_id: Uuid,
    title: String,
    #[serde(default)]
    author: Option<String>,
    upload_by: Uuid,
    #[serde(default)]
    novel_cover: Option<String>,
}
impl NovelRecord {
    fn to_domain(self) -> Novel {
        Novel {
            novel_id: self.novel_id,
            title: self.title,
            author: self.author.unwrap_or_default(),
            upload_by: self.upload_by,
            cover_url: self.novel_cover,
        }
    }
}

#[derive(Deserialize)]
struct ChapterRecord {
    chapter_id: Uuid,
    novel_id: Uuid,
    chapter_number: i32,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    views: Option<i64>,
}
impl ChapterRecord {
    fn to_domain(self) -> Chapter {
        Chapter {
            chapter_id: self.chapter_id,
            novel_id: self.novel_id,
            chapter_number: self.chapter_number,
            title: self.title.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            views: self.views.unwrap_or(0),
        }
    }
}

#[derive(Deserialize)]
struct ChapterRefRecord {
    chapter_id: Uuid,
    chapter_number: i32,
}

#[derive(Serialize)]
struct IncrementViewsArgs {
    chapter_id: Uuid,
}

//=========================================================================================
// Request Helpers
//=========================================================================================

impl SupabaseClient {
    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.bearer().await)
    }

    /// Fetches exactly one row of `table` where `column` equals `id`.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        table: &str,
        column: &str,
        id: Uuid,
        what: &str,
    ) -> PortResult<T> {
        let request = self
            .http
            .get(self.rest_url(table))
            .header(ACCEPT, SINGLE_OBJECT)
            .query(&[(column, eq(id)), ("select", "*".to_string())]);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(transport_error)?;
        check(response, what)
            .await?
            .json()
            .await
            .map_err(transport_error)
    }
}

//=========================================================================================
// `ProfileRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProfileRepository for SupabaseClient {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        let record: UserRecord = self
            .fetch_one(USERS_TABLE, "user_id", user_id, &format!("User {}", user_id))
            .await?;
        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<()> {
        let request = self
            .http
            .patch(self.rest_url(USERS_TABLE))
            .query(&[("user_id", eq(user_id))])
            .header("Prefer", "return=minimal")
            .json(&UserUpdateRecord::from_domain(update));
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "profile update").await?;
        Ok(())
    }
}

//=========================================================================================
// `LibraryRepository` Trait Implementation
//=========================================================================================

#[async_trait]
impl LibraryRepository for SupabaseClient {
    async fn get_novel(&self, novel_id: Uuid) -> PortResult<Novel> {
        let record: NovelRecord = self
            .fetch_one(NOVELS_TABLE, "novel_id", novel_id, &format!("Novel {}", novel_id))
            .await?;
        Ok(record.to_domain())
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        let record: ChapterRecord = self
            .fetch_one(
                CHAPTERS_TABLE,
                "chapter_id",
                chapter_id,
                &format!("Chapter {}", chapter_id),
            )
            .await?;
        Ok(record.to_domain())
    }

    async fn list_chapter_refs(&self, novel_id: Uuid) -> PortResult<Vec<ChapterRef>> {
        let request = self.http.get(self.rest_url(CHAPTERS_TABLE)).query(&[
            ("novel_id", eq(novel_id)),
            ("select", "chapter_id,chapter_number".to_string()),
            ("order", "chapter_number.asc".to_string()),
        ]);
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(transport_error)?;
        let records: Vec<ChapterRefRecord> = check(response, "chapter list")
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(records
            .into_iter()
            .map(|r| ChapterRef {
                chapter_id: r.chapter_id,
                chapter_number: r.chapter_number,
            })
            .collect())
    }

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> PortResult<()> {
        let request = self
            .http
            .post(self.rpc_url(INCREMENT_VIEWS_RPC))
            .json(&IncrementViewsArgs { chapter_id });
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(transport_error)?;
        check(response, "view increment").await?;
        Ok(())
    }
}
