//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the state of one reader connection.

use crate::adapters::{AccountDirectory, PickerIdentityProvider, PickerPrompt};
use crate::config::Config;
use book_reels_core::{FeedController, IdentitySession, ProfileStore, Surface};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub profiles: Arc<dyn ProfileStore>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub config: Arc<Config>,
}

//=========================================================================================
// ReaderState (Specific to One WebSocket Connection)
//=========================================================================================

/// Everything one connected reader owns: their session, feed and panels.
pub struct ReaderState {
    pub provider: Arc<PickerIdentityProvider>,
    pub session: IdentitySession,
    pub feed: Arc<FeedController>,
    pub surface: Arc<Mutex<Surface>>,
    /// Stops the connection's background tasks.
    pub cancellation_token: CancellationToken,
}

impl ReaderState {
    /// Builds a signed-out reader. Picker prompts for the client arrive on the
    /// returned receiver.
    pub fn new(app_state: &AppState) -> (Self, mpsc::UnboundedReceiver<PickerPrompt>) {
        let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
        let provider = Arc::new(PickerIdentityProvider::new(app_state.accounts.clone(), prompt_tx));
        let session = IdentitySession::new(provider.clone());
        let feed = FeedController::new(app_state.profiles.clone(), app_state.config.feed);

        let state = Self {
            provider,
            session,
            feed,
            surface: Arc::new(Mutex::new(Surface::new())),
            cancellation_token: CancellationToken::new(),
        };
        (state, prompt_rx)
    }
}
