//! services/reader/src/adapters/fake.rs
//!
//! An in-memory backend implementing every port, with call counters and
//! injectable failures. Used by the tests and for running without a project.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use novel_reader_core::domain::{
    AuthEvent, AuthSession, Chapter, ChapterRef, Identity, Novel, ProfileUpdate, UploadFile,
    UserProfile,
};
use novel_reader_core::ports::{
    AuthEventStream, AuthService, LibraryRepository, ObjectStorage, PortError, PortResult,
    ProfileRepository, UploadOptions,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::adapters::events::AuthEventHub;

pub const FAKE_STORAGE_BASE: &str = "https://fake.storage.local";

struct Account {
    password: String,
    identity: Identity,
}

/// A stored object and the options it was uploaded with.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub file: UploadFile,
    pub options: UploadOptions,
}

#[derive(Default)]
pub struct FakeBackend {
    accounts: Mutex<HashMap<String, Account>>,
    session: Mutex<Option<AuthSession>>,
    profiles: Mutex<HashMap<Uuid, UserProfile>>,
    /// Profile reads that still answer "not found" after sign-up, per user.
    pending_profiles: Mutex<HashMap<Uuid, u32>>,
    novels: Mutex<HashMap<Uuid, Novel>>,
    chapters: Mutex<HashMap<Uuid, Chapter>>,
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    events: AuthEventHub,

    /// How many profile reads miss a freshly signed-up user's row.
    pub provisioning_lag: AtomicU32,
    pub sign_up_returns_no_user: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_profile_updates: AtomicBool,
    pub fail_sign_out: AtomicBool,
    pub fail_library: AtomicBool,

    pub calls: AtomicU64,
    pub profile_reads: AtomicU64,
    pub profile_updates: AtomicU64,
    pub library_reads: AtomicU64,
    pub view_increments: AtomicU64,
}

impl FakeBackend {
    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn new_session(identity: Identity) -> AuthSession {
        AuthSession {
            access_token: Uuid::new_v4().to_string(),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            identity,
        }
    }

    /// Registers an account whose profile row already exists, without a username.
    pub async fn add_account(&self, email: &str, password: &str) -> Identity {
        let identity = Identity {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
        };
        self.accounts.lock().await.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        self.put_profile(UserProfile {
            user_id: identity.id,
            created_at: Some(Utc::now()),
            ..UserProfile::default()
        })
        .await;
        identity
    }

    /// Installs a held session without announcing it, as if left by an earlier run.
    pub async fn restore_session(&self, identity: Identity) -> AuthSession {
        let session = Self::new_session(identity);
        *self.session.lock().await = Some(session.clone());
        session
    }

    /// Pushes a session transition to subscribers.
    pub async fn emit(&self, event: AuthEvent) {
        *self.session.lock().await = event.session().cloned();
        self.events.emit(event);
    }

    pub async fn put_profile(&self, profile: UserProfile) {
        self.profiles.lock().await.insert(profile.user_id, profile);
    }

    pub async fn profile(&self, user_id: Uuid) -> Option<UserProfile> {
        self.profiles.lock().await.get(&user_id).cloned()
    }

    pub async fn put_novel(&self, novel: Novel) {
        self.novels.lock().await.insert(novel.novel_id, novel);
    }

    pub async fn put_chapter(&self, chapter: Chapter) {
        self.chapters.lock().await.insert(chapter.chapter_id, chapter);
    }

    pub async fn chapter(&self, chapter_id: Uuid) -> Option<Chapter> {
        self.chapters.lock().await.get(&chapter_id).cloned()
    }

    pub async fn object(&self, bucket: &str, path: &str) -> Option<StoredObject> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), path.to_string()))
            .cloned()
    }

    pub async fn object_names(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .await
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl AuthService for FakeBackend {
    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        self.record_call();
        Ok(self.session.lock().await.clone())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        self.record_call();
        let identity = match self.accounts.lock().await.get(email) {
            Some(account) if account.password == password => account.identity.clone(),
            _ => return Err(PortError::Rejected("Invalid login credentials".to_string())),
        };
        let session = Self::new_session(identity);
        self.emit(AuthEvent::SignedIn(session.clone())).await;
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> PortResult<Option<Identity>> {
        self.record_call();
        if self.sign_up_returns_no_user.load(Ordering::Relaxed) {
            return Ok(None);
        }
        if self.accounts.lock().await.contains_key(email) {
            return Err(PortError::Rejected("User already registered".to_string()));
        }

        let identity = self.add_account(email, password).await;
        let lag = self.provisioning_lag.load(Ordering::Relaxed);
        if lag > 0 {
            self.pending_profiles.lock().await.insert(identity.id, lag);
        }
        self.emit(AuthEvent::SignedIn(Self::new_session(identity.clone())))
            .await;
        Ok(Some(identity))
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.record_call();
        if self.fail_sign_out.load(Ordering::Relaxed) {
            return Err(PortError::Unexpected("network unreachable".to_string()));
        }
        self.emit(AuthEvent::SignedOut).await;
        Ok(())
    }

    fn auth_events(&self) -> AuthEventStream {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileRepository for FakeBackend {
    async fn get_profile(&self, user_id: Uuid) -> PortResult<UserProfile> {
        self.record_call();
        self.profile_reads.fetch_add(1, Ordering::Relaxed);

        let mut pending = self.pending_profiles.lock().await;
        if let Some(remaining) = pending.get(&user_id).copied() {
            if remaining <= 1 {
                pending.remove(&user_id);
            } else {
                pending.insert(user_id, remaining - 1);
            }
            return Err(PortError::NotFound(format!("User {} not found", user_id)));
        }
        drop(pending);

        self.profile(user_id)
            .await
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn update_profile(&self, user_id: Uuid, update: &ProfileUpdate) -> PortResult<()> {
        self.record_call();
        self.profile_updates.fetch_add(1, Ordering::Relaxed);
        if self.fail_profile_updates.load(Ordering::Relaxed) {
            return Err(PortError::Rejected("permission denied for table Users".to_string()));
        }

        let mut profiles = self.profiles.lock().await;
        let profile = profiles
            .get_mut(&user_id)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))?;
        profile.username = Some(update.username.clone());
        profile.age = Some(update.age);
        profile.interest_genres = update.interest_genres.clone();
        profile.bio = Some(update.bio.clone());
        profile.profile_picture = update.profile_picture.clone();
        profile.updated_at = Some(update.updated_at);
        Ok(())
    }
}

#[async_trait]
impl LibraryRepository for FakeBackend {
    async fn get_novel(&self, novel_id: Uuid) -> PortResult<Novel> {
        self.record_call();
        self.library_reads.fetch_add(1, Ordering::Relaxed);
        if self.fail_library.load(Ordering::Relaxed) {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.novels
            .lock()
            .await
            .get(&novel_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Novel {} not found", novel_id)))
    }

    async fn get_chapter(&self, chapter_id: Uuid) -> PortResult<Chapter> {
        self.record_call();
        self.library_reads.fetch_add(1, Ordering::Relaxed);
        self.chapter(chapter_id)
            .await
            .ok_or_else(|| PortError::NotFound(format!("Chapter {} not found", chapter_id)))
    }

    async fn list_chapter_refs(&self, novel_id: Uuid) -> PortResult<Vec<ChapterRef>> {
        self.record_call();
        self.library_reads.fetch_add(1, Ordering::Relaxed);
        let mut refs: Vec<ChapterRef> = self
            .chapters
            .lock()
            .await
            .values()
            .filter(|c| c.novel_id == novel_id)
            .map(|c| ChapterRef {
                chapter_id: c.chapter_id,
                chapter_number: c.chapter_number,
            })
            .collect();
        refs.sort_by_key(|c| c.chapter_number);
        Ok(refs)
    }

    async fn increment_chapter_views(&self, chapter_id: Uuid) -> PortResult<()> {
        self.record_call();
        self.view_increments.fetch_add(1, Ordering::Relaxed);
        if let Some(chapter) = self.chapters.lock().await.get_mut(&chapter_id) {
            chapter.views += 1;
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        file: &UploadFile,
        options: UploadOptions,
    ) -> PortResult<()> {
        self.record_call();
        if self.fail_uploads.load(Ordering::Relaxed) {
            return Err(PortError::Rejected("Payload too large".to_string()));
        }

        let key = (bucket.to_string(), path.to_string());
        let mut objects = self.objects.lock().await;
        if !options.upsert && objects.contains_key(&key) {
            return Err(PortError::Rejected("The resource already exists".to_string()));
        }
        objects.insert(
            key,
            StoredObject {
                file: file.clone(),
                options,
            },
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", FAKE_STORAGE_BASE, bucket, path)
    }
}
