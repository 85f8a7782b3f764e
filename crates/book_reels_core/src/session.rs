//! crates/book_reels_core/src/session.rs
//!
//! Wraps an identity provider into the session the rest of the app observes.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::domain::Identity;
use crate::ports::{IdentityProvider, PortResult, Prompt, SignInOptions};

/// The observable sign-in state.
#[derive(Clone)]
pub struct IdentitySession {
    provider: Arc<dyn IdentityProvider>,
    changes: watch::Receiver<Option<Identity>>,
}

impl IdentitySession {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let changes = provider.subscribe();
        Self { provider, changes }
    }

    pub fn current_user(&self) -> Option<Identity> {
        self.changes.borrow().clone()
    }

    /// A fresh receiver of session changes, marked so its first `changed()` fires
    /// with the current value.
    pub fn changes(&self) -> watch::Receiver<Option<Identity>> {
        let mut rx = self.changes.clone();
        rx.mark_changed();
        rx
    }

    /// Signs in through the provider, always clearing any previous session and
    /// forcing the account picker so the result matches the account just chosen.
    pub async fn sign_in(&self) -> PortResult<Identity> {
        if let Err(e) = self.provider.sign_out().await {
            warn!("No previous session to sign out: {}", e);
        }
        let options = SignInOptions { prompt: Prompt::SelectAccount };
        let identity = self.provider.sign_in_interactive(options).await?;
        info!("Session started for {}", identity.uid);
        Ok(identity)
    }

    pub async fn sign_out(&self) -> PortResult<()> {
        self.provider.sign_out().await?;
        info!("Session cleared.");
        Ok(())
    }
}
