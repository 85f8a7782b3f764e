//! crates/book_reels_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the feed's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the identity provider and document store actually in use.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::domain::{Identity, ProfilePatch, UserProfileDocument};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Errors surfaced by the external collaborators.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The interactive sign-in was cancelled or failed.
    #[error("Sign-in failed: {0}")]
    AuthFailure(String),
    /// The document store could not be reached or rejected the request.
    #[error("Profile store unavailable: {0}")]
    StoreUnavailable(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// How the provider should treat a cached account during sign-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prompt {
    /// Let the provider reuse a cached account if it has one.
    #[default]
    Auto,
    /// Always show the account picker.
    SelectAccount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignInOptions {
    pub prompt: Prompt,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The identity of the active session, if any.
    fn current(&self) -> Option<Identity>;

    /// Session change notifications. The receiver always holds the latest value.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Runs the provider's interactive flow.
    async fn sign_in_interactive(&self, options: SignInOptions) -> PortResult<Identity>;

    /// Clears the active session. Must succeed when nobody is signed in.
    async fn sign_out(&self) -> PortResult<()>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Loads the full document for `uid`. `None` means the user has no document yet.
    async fn load(&self, uid: &str) -> PortResult<Option<UserProfileDocument>>;

    /// Merge-writes the fields present in `patch`, leaving other stored fields untouched.
    async fn save(&self, uid: &str, patch: &ProfilePatch) -> PortResult<()>;
}
