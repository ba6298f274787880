//! services/reader/src/session/state.rs
//!
//! The observable session state published by the session store.

use novel_reader_core::domain::{needs_profile_completion, Identity, UserProfile};

/// Where the current user stands in the sign-in and onboarding flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Unauthenticated,
    /// Signed in, profile not loaded yet.
    ProfileUnknown,
    ProfileIncomplete,
    ProfileComplete,
}

/// A point-in-time view of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub identity: Option<Identity>,
    pub profile: Option<UserProfile>,
    /// True until the initial session check has finished.
    pub loading: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            identity: None,
            profile: None,
            loading: true,
        }
    }
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn needs_profile_completion(&self) -> bool {
        needs_profile_completion(self.profile.as_ref())
    }

    pub fn phase(&self) -> SessionPhase {
        match (&self.identity, &self.profile) {
            (None, _) => SessionPhase::Unauthenticated,
            (Some(_), None) => SessionPhase::ProfileUnknown,
            (Some(_), Some(p)) if p.is_complete() => SessionPhase::ProfileComplete,
            (Some(_), Some(_)) => SessionPhase::ProfileIncomplete,
        }
    }
}
