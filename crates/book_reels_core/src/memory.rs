//! crates/book_reels_core/src/memory.rs
//!
//! In-process implementations of the ports. The service falls back to these when
//! no database is configured, and the core's tests drive the controller with them.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::info;

use crate::domain::{Identity, ProfilePatch, UserProfileDocument};
use crate::ports::{IdentityProvider, PortError, PortResult, ProfileStore, SignInOptions};

//=========================================================================================
// Profile Store
//=========================================================================================

/// A `users` collection held in memory.
#[derive(Default)]
pub struct InMemoryProfileStore {
    documents: Mutex<HashMap<String, UserProfileDocument>>,
    saves: Mutex<Vec<(String, ProfilePatch)>>,
    unavailable: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the stored document for `uid`.
    pub fn insert(&self, uid: &str, document: UserProfileDocument) {
        lock(&self.documents).insert(uid.to_string(), document);
    }

    /// The stored document for `uid`, if any.
    pub fn document(&self, uid: &str) -> Option<UserProfileDocument> {
        lock(&self.documents).get(uid).cloned()
    }

    /// Every patch written so far, in arrival order.
    pub fn saves(&self) -> Vec<(String, ProfilePatch)> {
        lock(&self.saves).clone()
    }

    /// Makes every following call fail with `StoreUnavailable` (or recover).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::StoreUnavailable("in-memory store offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, uid: &str) -> PortResult<Option<UserProfileDocument>> {
        self.check_available()?;
        Ok(lock(&self.documents).get(uid).cloned())
    }

    async fn save(&self, uid: &str, patch: &ProfilePatch) -> PortResult<()> {
        self.check_available()?;
        {
            let mut documents = lock(&self.documents);
            let document = documents.entry(uid.to_string()).or_default();
            patch.apply_to(document);
        }
        lock(&self.saves).push((uid.to_string(), patch.clone()));
        Ok(())
    }
}

//=========================================================================================
// Identity Provider
//=========================================================================================

enum PickerOutcome {
    Account(Identity),
    Cancel,
}

/// An identity provider whose picker answers come from a queue.
pub struct InMemoryIdentityProvider {
    session: watch::Sender<Option<Identity>>,
    picker: Mutex<VecDeque<PickerOutcome>>,
    last_options: Mutex<Option<SignInOptions>>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        let (session, _) = watch::channel(None);
        Self {
            session,
            picker: Mutex::new(VecDeque::new()),
            last_options: Mutex::new(None),
        }
    }
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The account the next picker flow will return.
    pub fn queue_account(&self, identity: Identity) {
        lock(&self.picker).push_back(PickerOutcome::Account(identity));
    }

    /// Makes the next picker flow behave as if the user closed it.
    pub fn cancel_next(&self) {
        lock(&self.picker).push_back(PickerOutcome::Cancel);
    }

    /// The options passed to the most recent interactive flow.
    pub fn last_options(&self) -> Option<SignInOptions> {
        *lock(&self.last_options)
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    fn current(&self) -> Option<Identity> {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.session.subscribe()
    }

    async fn sign_in_interactive(&self, options: SignInOptions) -> PortResult<Identity> {
        *lock(&self.last_options) = Some(options);
        let outcome = lock(&self.picker).pop_front();
        match outcome {
            Some(PickerOutcome::Account(identity)) => {
                info!("Signed in as {}", identity.uid);
                self.session.send_replace(Some(identity.clone()));
                Ok(identity)
            }
            Some(PickerOutcome::Cancel) => {
                Err(PortError::AuthFailure("account picker closed".to_string()))
            }
            None => Err(PortError::AuthFailure("no account available".to_string())),
        }
    }

    async fn sign_out(&self) -> PortResult<()> {
        self.session.send_if_modified(|current| current.take().is_some());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
