//! services/reader/src/session/store.rs
//!
//! The session store: tracks the signed-in identity and its profile, exposes the
//! login/register/complete-profile/logout operations, and follows the backend's
//! session-change notifications between `init` and `teardown`.

use chrono::Utc;
use futures::StreamExt;
use novel_reader_core::domain::{AuthEvent, Identity, ProfileDraft, ProfileUpdate, UserProfile};
use novel_reader_core::ports::{
    AuthEventStream, AuthService, ObjectStorage, PortError, PortResult, ProfileRepository,
};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ProvisioningPolicy;
use crate::error::SessionError;
use crate::session::state::SessionSnapshot;
use crate::uploads::upload_profile_picture;

//=========================================================================================
// Shared Inner State
//=========================================================================================

struct Inner {
    auth: Arc<dyn AuthService>,
    profiles: Arc<dyn ProfileRepository>,
    storage: Arc<dyn ObjectStorage>,
    provisioning: ProvisioningPolicy,
    state: watch::Sender<SessionSnapshot>,
    /// Cleared by `teardown`; no state is published afterwards.
    active: AtomicBool,
    /// Ticket handed to each profile read as it starts.
    profile_reads: AtomicU64,
    /// Ticket of the read whose answer is currently held.
    profile_applied: AtomicU64,
}

impl Inner {
    fn publish(&self, update: impl FnOnce(&mut SessionSnapshot)) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        self.state.send_modify(update);
    }

    fn set_identity(&self, identity: Option<Identity>) {
        self.publish(|s| {
            let same_user = match (&s.identity, &identity) {
                (Some(old), Some(new)) => old.id == new.id,
                _ => false,
            };
            if !same_user {
                s.profile = None;
            }
            s.identity = identity;
        });
    }

    fn next_profile_ticket(&self) -> u64 {
        self.profile_reads.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Holds `profile` unless its user signed out meanwhile or a read that
    /// started later has already answered.
    fn set_profile(&self, ticket: u64, profile: UserProfile) {
        self.publish(|s| {
            let current_user = s.identity.as_ref().is_some_and(|i| i.id == profile.user_id);
            if !current_user || ticket < self.profile_applied.load(Ordering::Acquire) {
                debug!("Dropping stale profile read for {}", profile.user_id);
                return;
            }
            self.profile_applied.store(ticket, Ordering::Release);
            s.profile = Some(profile);
        });
    }

    fn clear(&self) {
        self.publish(|s| {
            s.identity = None;
            s.profile = None;
        });
    }

    async fn load_profile(&self, user_id: Uuid) -> PortResult<()> {
        let ticket = self.next_profile_ticket();
        match self.profiles.get_profile(user_id).await {
            Ok(profile) => {
                self.set_profile(ticket, profile);
                Ok(())
            }
            Err(e) => {
                error!("Error fetching user profile: {}", e);
                Err(e)
            }
        }
    }

    /// Reads the profile row until the sign-up trigger has provisioned it,
    /// waiting `interval` before each of at most `attempts` reads.
    async fn await_provisioned_profile(&self, user_id: Uuid) -> PortResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            tokio::time::sleep(self.provisioning.interval).await;
            let ticket = self.next_profile_ticket();
            match self.profiles.get_profile(user_id).await {
                Ok(profile) => {
                    self.set_profile(ticket, profile);
                    return Ok(());
                }
                Err(PortError::NotFound(_)) if attempt < self.provisioning.attempts => {
                    debug!(
                        "Profile for {} not provisioned yet (attempt {}/{})",
                        user_id, attempt, self.provisioning.attempts
                    );
                }
                Err(e) => {
                    error!("Error fetching user profile: {}", e);
                    return Err(e);
                }
            }
        }
    }

    async fn on_auth_event(&self, event: AuthEvent) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        match event.session() {
            Some(session) => {
                let user_id = session.identity.id;
                let profile_held = {
                    let snapshot = self.state.borrow();
                    snapshot.identity.as_ref().is_some_and(|i| i.id == user_id)
                        && snapshot.profile.is_some()
                };
                self.set_identity(Some(session.identity.clone()));
                if profile_held {
                    debug!("Profile for {} already held, skipping reload", user_id);
                    return;
                }
                // Failures are already logged; the next event or operation retries.
                let _ = self.load_profile(user_id).await;
            }
            None => self.clear(),
        }
    }

    async fn listen(self: Arc<Self>, mut events: AuthEventStream, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.next() => match event {
                    Some(event) => self.on_auth_event(event).await,
                    None => break,
                },
            }
        }
        debug!("Auth event listener stopped");
    }
}

//=========================================================================================
// The Session Store
//=========================================================================================

/// Process-wide session state with explicit `init`/`teardown` and an observer
/// interface through `subscribe`.
pub struct SessionStore {
    inner: Arc<Inner>,
    shutdown: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionStore {
    pub fn new(
        auth: Arc<dyn AuthService>,
        profiles: Arc<dyn ProfileRepository>,
        storage: Arc<dyn ObjectStorage>,
        provisioning: ProvisioningPolicy,
    ) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(Inner {
                auth,
                profiles,
                storage,
                provisioning,
                state,
                active: AtomicBool::new(true),
                profile_reads: AtomicU64::new(0),
                profile_applied: AtomicU64::new(0),
            }),
            shutdown: CancellationToken::new(),
            listener: Mutex::new(None),
        }
    }

    /// Builds a store from a single backend that serves every port.
    pub fn from_backend<B>(backend: Arc<B>, provisioning: ProvisioningPolicy) -> Self
    where
        B: AuthService + ProfileRepository + ObjectStorage + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend, provisioning)
    }

    /// Subscribes to session changes, then picks up any pre-existing session.
    pub async fn init(&self) {
        let events = self.inner.auth.auth_events();
        let handle = tokio::spawn(self.inner.clone().listen(events, self.shutdown.clone()));
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(handle);
        }

        match self.inner.auth.current_session().await {
            Ok(session) => {
                let identity = session.map(|s| s.identity);
                let user_id = identity.as_ref().map(|i| i.id);
                self.inner.set_identity(identity);
                if let Some(user_id) = user_id {
                    let _ = self.inner.load_profile(user_id).await;
                }
            }
            Err(e) => error!("Error initializing auth: {}", e),
        }
        self.inner.publish(|s| s.loading = false);
    }

    /// Stops following session changes. No state is published afterwards.
    pub async fn teardown(&self) {
        self.inner.active.store(false, Ordering::Release);
        self.shutdown.cancel();
        let handle = self.listener.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Auth event listener ended abnormally: {}", e);
            }
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.state.borrow().profile.clone()
    }

    pub fn needs_profile_completion(&self) -> bool {
        self.inner.state.borrow().needs_profile_completion()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().loading
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let session = self
            .inner
            .auth
            .sign_in_with_password(email, password)
            .await
            .map_err(|e| {
                error!("Login error: {}", e);
                SessionError::from(e)
            })?;

        let user_id = session.identity.id;
        self.inner.set_identity(Some(session.identity));
        self.inner.load_profile(user_id).await?;
        info!("User {} logged in", user_id);
        Ok(())
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let identity = self
            .inner
            .auth
            .sign_up(email, password)
            .await
            .map_err(|e| {
                error!("Registration error: {}", e);
                SessionError::from(e)
            })?
            .ok_or(SessionError::RegistrationFailed)?;

        let user_id = identity.id;
        self.inner.set_identity(Some(identity));
        self.inner.await_provisioned_profile(user_id).await?;
        info!("User {} registered", user_id);
        Ok(())
    }

    pub async fn complete_profile(&self, draft: ProfileDraft) -> Result<(), SessionError> {
        let identity = self.identity().ok_or(SessionError::NoUser)?;

        let profile_picture = match &draft.profile_picture {
            Some(file) => Some(
                upload_profile_picture(self.inner.storage.as_ref(), file, identity.id)
                    .await
                    .map_err(SessionError::Upload)?,
            ),
            None => None,
        };

        let update = ProfileUpdate {
            username: draft.username,
            age: draft.age,
            interest_genres: draft.interest_genres,
            bio: draft.bio,
            profile_picture,
            updated_at: Utc::now(),
        };
        self.inner
            .profiles
            .update_profile(identity.id, &update)
            .await
            .map_err(|e| {
                error!("Error completing profile: {}", e);
                SessionError::from(e)
            })?;

        self.inner.load_profile(identity.id).await?;
        Ok(())
    }

    pub async fn logout(&self) -> Result<(), SessionError> {
        self.inner.auth.sign_out().await.map_err(|e| {
            error!("Logout error: {}", e);
            SessionError::from(e)
        })?;
        self.inner.clear();
        Ok(())
    }
}
