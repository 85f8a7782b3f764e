//! crates/book_reels_core/src/feed.rs
//!
//! The feed state controller.
//!
//! Owns the visible passages, the current index and the like/bookmark maps, and keeps
//! them in step with the signed-in user's remote profile. Every identity change runs
//! the same sequence: reset to the seed feed with writes disabled, load the new user's
//! document, then enable writes. Loads are tagged with a generation number so a result
//! that arrives after a newer identity change is thrown away.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::domain::{
    FlagMap, Identity, Passage, PassageDraft, PassageId, ProfilePatch, UserProfileDocument,
    DEFAULT_DRAFT_COLOR, USER_SUBMITTED_GENRE,
};
use crate::navigation::{GestureSettings, Navigator, ScrollCommand};
use crate::ports::ProfileStore;
use crate::seed::seed_passages;

//=========================================================================================
// Configuration, Errors and Events
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedConfig {
    pub gestures: GestureSettings,
    /// Wait before scrolling to a freshly submitted passage, so the view can render it.
    pub reveal_delay: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            gestures: GestureSettings::default(),
            reveal_delay: Duration::from_millis(200),
        }
    }
}

/// A submission that is missing required fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please fill in {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
}

/// Notifications for whoever renders the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// Local state was cleared for a new identity.
    Reset,
    /// The remote profile finished loading (or was absent).
    Loaded,
    /// Likes, bookmarks or passages changed.
    Changed,
    ScrollTo(ScrollCommand),
}

/// Where the controller is in its load/save sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Nobody is signed in. Remote writes stay disabled.
    Empty,
    /// A load for `identity` is in flight. Remote writes are disabled.
    Loading { identity: Identity, generation: u64 },
    /// The profile for `identity` is loaded and mutations are persisted.
    Ready { identity: Identity },
}

impl SyncPhase {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SyncPhase::Empty => None,
            SyncPhase::Loading { identity, .. } | SyncPhase::Ready { identity } => Some(identity),
        }
    }

    fn writer(&self) -> Option<&Identity> {
        match self {
            SyncPhase::Ready { identity } => Some(identity),
            _ => None,
        }
    }
}

//=========================================================================================
// Snapshots
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    SignedOut,
    Loading,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageView {
    #[serde(flatten)]
    pub passage: Passage,
    pub liked: bool,
    pub bookmarked: bool,
}

/// Everything the feed view and the profile drawer render, read in one go.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub identity: Option<Identity>,
    pub status: SyncStatus,
    pub passages: Vec<PassageView>,
    pub current_index: usize,
    pub likes: FlagMap,
    pub bookmarks: FlagMap,
    pub my_posts: Vec<Passage>,
    pub liked_posts: Vec<Passage>,
    pub saved_posts: Vec<Passage>,
}

//=========================================================================================
// Controller State
//=========================================================================================

#[derive(Debug, Clone, Copy)]
enum Flag {
    Like,
    Bookmark,
}

struct FeedState {
    passages: Vec<Passage>,
    user_posts: Vec<Passage>,
    likes: FlagMap,
    bookmarks: FlagMap,
    navigator: Navigator,
    phase: SyncPhase,
    generation: u64,
    /// The followed session, if any. Its current value gates remote writes.
    session: Option<watch::Receiver<Option<Identity>>>,
}

impl FeedState {
    fn new(gestures: GestureSettings) -> Self {
        Self {
            passages: seed_passages(),
            user_posts: Vec::new(),
            likes: FlagMap::new(),
            bookmarks: FlagMap::new(),
            navigator: Navigator::new(gestures),
            phase: SyncPhase::Empty,
            generation: 0,
            session: None,
        }
    }

    /// The user remote writes go to. Writes stop as soon as the followed session
    /// names someone else, even before the matching `set_identity` has run.
    fn writer(&self) -> Option<&Identity> {
        let identity = self.phase.writer()?;
        if let Some(session) = &self.session {
            let still_signed_in = session
                .borrow()
                .as_ref()
                .is_some_and(|current| current.uid == identity.uid);
            if !still_signed_in {
                return None;
            }
        }
        Some(identity)
    }

    fn reset(&mut self) {
        self.passages = seed_passages();
        self.user_posts.clear();
        self.likes.clear();
        self.bookmarks.clear();
        self.navigator.reset();
    }

    fn adopt(&mut self, document: UserProfileDocument) {
        self.likes = document.likes;
        self.bookmarks = document.bookmarks;
        self.user_posts = document.posts;
        let mut passages = seed_passages();
        passages.extend(self.user_posts.iter().cloned());
        self.passages = passages;
        self.navigator.clamp(self.passages.len());
    }

    fn fresh_id(&self) -> PassageId {
        let mut candidate = Utc::now().timestamp_millis();
        while self.passages.iter().any(|p| p.id == PassageId::Number(candidate)) {
            candidate += 1;
        }
        PassageId::Number(candidate)
    }

    fn filter(&self, flags: &FlagMap) -> Vec<Passage> {
        self.passages
            .iter()
            .filter(|p| flags.get(&p.id).copied().unwrap_or(false))
            .cloned()
            .collect()
    }

    fn snapshot(&self) -> FeedSnapshot {
        let status = match self.phase {
            SyncPhase::Empty => SyncStatus::SignedOut,
            SyncPhase::Loading { .. } => SyncStatus::Loading,
            SyncPhase::Ready { .. } => SyncStatus::Ready,
        };
        let passages = self
            .passages
            .iter()
            .map(|p| PassageView {
                liked: self.likes.get(&p.id).copied().unwrap_or(false),
                bookmarked: self.bookmarks.get(&p.id).copied().unwrap_or(false),
                passage: p.clone(),
            })
            .collect();
        FeedSnapshot {
            identity: self.phase.identity().cloned(),
            status,
            passages,
            current_index: self.navigator.current_index(),
            likes: self.likes.clone(),
            bookmarks: self.bookmarks.clone(),
            my_posts: self.user_posts.clone(),
            liked_posts: self.filter(&self.likes),
            saved_posts: self.filter(&self.bookmarks),
        }
    }
}

//=========================================================================================
// The Controller
//=========================================================================================

pub struct FeedController {
    store: Arc<dyn ProfileStore>,
    config: FeedConfig,
    state: Mutex<FeedState>,
    events: broadcast::Sender<FeedEvent>,
}

impl FeedController {
    pub fn new(store: Arc<dyn ProfileStore>, config: FeedConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(64);
        Arc::new(Self {
            store,
            config,
            state: Mutex::new(FeedState::new(config.gestures)),
            events,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn phase(&self) -> SyncPhase {
        self.state.lock().await.phase.clone()
    }

    fn emit(&self, event: FeedEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    //-------------------------------------------------------------------------------------
    // Identity transitions
    //-------------------------------------------------------------------------------------

    /// Switches the feed to `identity`.
    ///
    /// The reset and the write lock happen before this returns; the load runs in the
    /// returned task. A later call supersedes any load still in flight.
    pub async fn set_identity(self: &Arc<Self>, identity: Option<Identity>) -> Option<JoinHandle<()>> {
        let generation = {
            let mut state = self.state.lock().await;
            state.generation += 1;
            let generation = state.generation;
            state.phase = match &identity {
                Some(identity) => SyncPhase::Loading { identity: identity.clone(), generation },
                None => SyncPhase::Empty,
            };
            state.reset();
            generation
        };
        self.emit(FeedEvent::Reset);

        let identity = identity?;
        info!("Loading profile for {} (generation {})", identity.uid, generation);
        let controller = Arc::clone(self);
        Some(tokio::spawn(async move {
            controller.load_profile(identity, generation).await;
        }))
    }

    async fn load_profile(&self, identity: Identity, generation: u64) {
        let loaded = match self.store.load(&identity.uid).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Falling back to the seed feed for {}: {}", identity.uid, e);
                None
            }
        };

        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                debug!(
                    "Discarding profile load for {} (generation {} superseded by {})",
                    identity.uid, generation, state.generation
                );
                return;
            }
            if loaded.is_none() {
                debug!("No stored profile for {}", identity.uid);
            }
            // An absent document still clears anything toggled while loading.
            state.adopt(loaded.unwrap_or_default());
            info!("Profile ready for {}", identity.uid);
            state.phase = SyncPhase::Ready { identity };
        }
        self.emit(FeedEvent::Loaded);
    }

    /// Drives `set_identity` from session notifications until the session goes away.
    ///
    /// From this call on, mutations are only saved while the session still names the
    /// user whose profile is loaded.
    pub async fn follow(self: &Arc<Self>, mut changes: watch::Receiver<Option<Identity>>) -> JoinHandle<()> {
        self.state.lock().await.session = Some(changes.clone());
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut last_uid: Option<Option<String>> = None;
            while changes.changed().await.is_ok() {
                let identity = changes.borrow_and_update().clone();
                let uid = identity.as_ref().map(|i| i.uid.clone());
                if last_uid.as_ref() == Some(&uid) {
                    continue;
                }
                last_uid = Some(uid);
                controller.set_identity(identity).await;
            }
        })
    }

    //-------------------------------------------------------------------------------------
    // Likes, bookmarks and submissions
    //-------------------------------------------------------------------------------------

    /// Flips the like flag for `id` and returns the new value.
    pub async fn toggle_like(&self, id: PassageId) -> bool {
        self.toggle(Flag::Like, id).await
    }

    /// Flips the bookmark flag for `id` and returns the new value.
    pub async fn toggle_bookmark(&self, id: PassageId) -> bool {
        self.toggle(Flag::Bookmark, id).await
    }

    async fn toggle(&self, flag: Flag, id: PassageId) -> bool {
        let (value, pending) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            let map = match flag {
                Flag::Like => &mut state.likes,
                Flag::Bookmark => &mut state.bookmarks,
            };
            let entry = map.entry(id).or_insert(false);
            *entry = !*entry;
            let value = *entry;
            let pending = state.writer().map(|identity| {
                let patch = match flag {
                    Flag::Like => ProfilePatch::likes(state.likes.clone()),
                    Flag::Bookmark => ProfilePatch::bookmarks(state.bookmarks.clone()),
                };
                (identity.uid.clone(), patch)
            });
            (value, pending)
        };
        if let Some((uid, patch)) = pending {
            self.spawn_save(uid, patch);
        }
        self.emit(FeedEvent::Changed);
        value
    }

    /// Adds a user passage to the end of the feed and scrolls to it shortly after.
    pub async fn submit_passage(self: &Arc<Self>, draft: PassageDraft) -> Result<Passage, ValidationError> {
        validate(&draft)?;

        let (passage, index, generation, pending) = {
            let mut state = self.state.lock().await;
            let genre = if draft.genre.trim().is_empty() {
                USER_SUBMITTED_GENRE.to_string()
            } else {
                draft.genre
            };
            let color = if draft.color.trim().is_empty() {
                DEFAULT_DRAFT_COLOR.to_string()
            } else {
                draft.color
            };
            let passage = Passage {
                id: state.fresh_id(),
                text: draft.text,
                book: draft.book,
                author: draft.author,
                genre,
                color,
            };
            state.user_posts.push(passage.clone());
            state.passages.push(passage.clone());
            let index = state.passages.len() - 1;
            let pending = state
                .writer()
                .map(|identity| (identity.uid.clone(), ProfilePatch::posts(state.user_posts.clone())));
            (passage, index, state.generation, pending)
        };
        info!("Passage {} added at index {}", passage.id, index);

        if let Some((uid, patch)) = pending {
            self.spawn_save(uid, patch);
        }
        self.emit(FeedEvent::Changed);
        self.schedule_reveal(index, generation);
        Ok(passage)
    }

    fn spawn_save(&self, uid: String, patch: ProfilePatch) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            if let Err(e) = store.save(&uid, &patch).await {
                warn!("Dropping profile save for {}: {}", uid, e);
            }
        });
    }

    fn schedule_reveal(self: &Arc<Self>, index: usize, generation: u64) {
        let controller = Arc::clone(self);
        let delay = self.config.reveal_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let command = {
                let mut state = controller.state.lock().await;
                if state.generation != generation {
                    return;
                }
                let len = state.passages.len();
                state.navigator.jump_to(index as i64, len)
            };
            if let Some(command) = command {
                controller.emit(FeedEvent::ScrollTo(command));
            }
        });
    }

    //-------------------------------------------------------------------------------------
    // Navigation
    //-------------------------------------------------------------------------------------

    pub async fn jump_to(&self, index: i64) -> Option<ScrollCommand> {
        self.navigate(|nav, len| nav.jump_to(index, len)).await
    }

    pub async fn next(&self) -> Option<ScrollCommand> {
        self.navigate(|nav, len| nav.next(len)).await
    }

    pub async fn previous(&self) -> Option<ScrollCommand> {
        self.navigate(|nav, len| nav.previous(len)).await
    }

    pub async fn on_wheel(&self, delta_y: f64) -> Option<ScrollCommand> {
        let now = Instant::now();
        self.navigate(|nav, len| nav.on_wheel(delta_y, len, now)).await
    }

    pub async fn touch_start(&self, y: f64) {
        self.state.lock().await.navigator.touch_start(y);
    }

    pub async fn touch_end(&self, y: f64) -> Option<ScrollCommand> {
        self.navigate(|nav, len| nav.touch_end(y, len)).await
    }

    async fn navigate<F>(&self, step: F) -> Option<ScrollCommand>
    where
        F: FnOnce(&mut Navigator, usize) -> Option<ScrollCommand>,
    {
        let command = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;
            step(&mut state.navigator, state.passages.len())
        };
        if let Some(command) = command {
            self.emit(FeedEvent::ScrollTo(command));
        }
        command
    }
}

/// Checks that text, book and author are filled in.
pub fn validate(draft: &PassageDraft) -> Result<(), ValidationError> {
    let missing: Vec<&'static str> = [
        ("text", &draft.text),
        ("book", &draft.book),
        ("author", &draft.author),
    ]
    .into_iter()
    .filter(|(_, value)| value.trim().is_empty())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFields(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryIdentityProvider, InMemoryProfileStore};
    use crate::ports::{IdentityProvider, PortError, PortResult};
    use crate::session::IdentitySession;
    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    fn reader(uid: &str) -> Identity {
        Identity {
            uid: uid.to_string(),
            display_name: None,
            email: None,
            avatar_url: None,
        }
    }

    fn draft(text: &str, book: &str, author: &str) -> PassageDraft {
        PassageDraft {
            text: text.to_string(),
            book: book.to_string(),
            author: author.to_string(),
            ..Default::default()
        }
    }

    fn user_post(id: i64) -> Passage {
        Passage {
            id: PassageId::Number(id),
            text: "A user passage".to_string(),
            book: "Notebook".to_string(),
            author: "Someone".to_string(),
            genre: USER_SUBMITTED_GENRE.to_string(),
            color: DEFAULT_DRAFT_COLOR.to_string(),
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    async fn wait_until_ready(feed: &FeedController, uid: &str) {
        for _ in 0..50 {
            if feed.phase().await == (SyncPhase::Ready { identity: reader(uid) }) {
                return;
            }
            settle().await;
        }
        panic!("feed never became ready for {}", uid);
    }

    /// A store whose loads wait for a permit, so tests control when they resolve.
    struct GatedStore {
        inner: InMemoryProfileStore,
        gate: Semaphore,
    }

    impl GatedStore {
        fn new() -> Self {
            Self { inner: InMemoryProfileStore::new(), gate: Semaphore::new(0) }
        }

        fn release(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl ProfileStore for GatedStore {
        async fn load(&self, uid: &str) -> PortResult<Option<UserProfileDocument>> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| PortError::StoreUnavailable(e.to_string()))?;
            permit.forget();
            self.inner.load(uid).await
        }

        async fn save(&self, uid: &str, patch: &ProfilePatch) -> PortResult<()> {
            self.inner.save(uid, patch).await
        }
    }

    #[tokio::test]
    async fn starts_signed_out_with_seed_feed() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        let snap = feed.snapshot().await;
        assert_eq!(snap.passages.len(), 8);
        assert_eq!(snap.status, SyncStatus::SignedOut);
        assert_eq!(snap.current_index, 0);
    }

    #[tokio::test]
    async fn double_toggle_restores_original_value() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        let toggles = [1, 2, 1, 3, 1, 2];
        for id in toggles {
            feed.toggle_like(PassageId::Number(id)).await;
        }
        let likes = feed.snapshot().await.likes;
        assert_eq!(likes.get(&PassageId::Number(1)), Some(&true));
        assert_eq!(likes.get(&PassageId::Number(2)), Some(&false));
        assert_eq!(likes.get(&PassageId::Number(3)), Some(&true));
    }

    #[tokio::test]
    async fn unknown_ids_can_be_marked() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        assert!(feed.toggle_bookmark(PassageId::Text("ghost".into())).await);
        let snap = feed.snapshot().await;
        assert_eq!(snap.bookmarks.len(), 1);
        assert!(snap.saved_posts.is_empty());
    }

    #[tokio::test]
    async fn signed_out_mutations_are_never_saved() {
        let store = Arc::new(InMemoryProfileStore::new());
        let feed = FeedController::new(store.clone(), FeedConfig::default());
        feed.set_identity(None).await;
        feed.toggle_like(PassageId::Number(1)).await;
        feed.submit_passage(draft("t", "b", "a")).await.unwrap();
        settle().await;
        assert!(store.saves().is_empty());
    }

    #[tokio::test]
    async fn no_saves_while_profile_is_loading() {
        let store = Arc::new(GatedStore::new());
        let feed = FeedController::new(store.clone(), FeedConfig::default());

        let load = feed.set_identity(Some(reader("u1"))).await.unwrap();
        feed.toggle_like(PassageId::Number(3)).await;
        settle().await;
        assert!(store.inner.saves().is_empty());
        assert_eq!(feed.snapshot().await.status, SyncStatus::Loading);

        store.release();
        load.await.unwrap();
        assert_eq!(feed.snapshot().await.status, SyncStatus::Ready);

        feed.toggle_bookmark(PassageId::Number(4)).await;
        settle().await;
        let saves = store.inner.saves();
        assert_eq!(saves.len(), 1);
        assert!(saves[0].1.bookmarks.is_some());
        assert!(saves[0].1.likes.is_none());
    }

    #[tokio::test]
    async fn switching_users_never_shows_previous_state() {
        let store = Arc::new(GatedStore::new());
        let mut doc = UserProfileDocument::default();
        doc.likes.insert(PassageId::Number(2), true);
        doc.posts.push(user_post(42));
        store.inner.insert("u1", doc);

        let feed = FeedController::new(store.clone(), FeedConfig::default());
        let load = feed.set_identity(Some(reader("u1"))).await.unwrap();
        store.release();
        load.await.unwrap();
        feed.toggle_like(PassageId::Number(5)).await;
        assert_eq!(feed.snapshot().await.passages.len(), 9);

        let _pending = feed.set_identity(Some(reader("u2"))).await.unwrap();
        let snap = feed.snapshot().await;
        assert_eq!(snap.identity.map(|i| i.uid), Some("u2".to_string()));
        assert_eq!(snap.status, SyncStatus::Loading);
        assert!(snap.likes.is_empty());
        assert!(snap.my_posts.is_empty());
        assert_eq!(snap.passages.len(), 8);
    }

    #[tokio::test]
    async fn stale_load_is_discarded() {
        let store = Arc::new(GatedStore::new());
        let mut doc = UserProfileDocument::default();
        doc.likes.insert(PassageId::Number(1), true);
        store.inner.insert("u1", doc);

        let feed = FeedController::new(store.clone(), FeedConfig::default());
        let first = feed.set_identity(Some(reader("u1"))).await.unwrap();
        let second = feed.set_identity(Some(reader("u2"))).await.unwrap();

        // The first permit goes to u1's load, which must not win.
        store.release();
        first.await.unwrap();
        let snap = feed.snapshot().await;
        assert!(snap.likes.is_empty());
        assert_eq!(snap.status, SyncStatus::Loading);

        store.release();
        second.await.unwrap();
        let phase = feed.phase().await;
        assert_eq!(phase, SyncPhase::Ready { identity: reader("u2") });
        assert!(feed.snapshot().await.likes.is_empty());
    }

    #[tokio::test]
    async fn unavailable_store_falls_back_to_seed_state() {
        let store = Arc::new(InMemoryProfileStore::new());
        store.set_unavailable(true);
        let feed = FeedController::new(store.clone(), FeedConfig::default());
        feed.set_identity(Some(reader("u1"))).await.unwrap().await.unwrap();

        let snap = feed.snapshot().await;
        assert_eq!(snap.status, SyncStatus::Ready);
        assert_eq!(snap.passages.len(), 8);

        // Saves fail quietly and the local flip stays.
        assert!(feed.toggle_like(PassageId::Number(1)).await);
        settle().await;
        assert!(feed.snapshot().await.likes[&PassageId::Number(1)]);
    }

    #[tokio::test]
    async fn blank_fields_fail_validation() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        let err = feed.submit_passage(draft("", "b", "a")).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["text"]));
        let err = feed.submit_passage(draft("  ", " ", "a")).await.unwrap_err();
        assert_eq!(err, ValidationError::MissingFields(vec!["text", "book"]));
        assert_eq!(feed.snapshot().await.passages.len(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn submission_appends_and_scrolls_to_new_passage() {
        let store = Arc::new(InMemoryProfileStore::new());
        let feed = FeedController::new(store.clone(), FeedConfig::default());
        feed.set_identity(Some(reader("u1"))).await.unwrap().await.unwrap();
        let mut events = feed.subscribe();

        let passage = feed.submit_passage(draft("t", "b", "a")).await.unwrap();
        assert_eq!(passage.genre, USER_SUBMITTED_GENRE);

        let snap = feed.snapshot().await;
        assert_eq!(snap.passages.len(), 9);
        assert_eq!(snap.my_posts, vec![passage.clone()]);
        assert_eq!(snap.current_index, 0);

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(feed.snapshot().await.current_index, 8);

        let mut scrolled = false;
        while let Ok(event) = events.try_recv() {
            if let FeedEvent::ScrollTo(cmd) = event {
                scrolled = cmd.index == 8;
            }
        }
        assert!(scrolled);

        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].1.posts.as_deref(), Some(&[passage][..]));
    }

    #[tokio::test]
    async fn sign_in_scenario_from_empty_document_to_second_user() {
        let store = Arc::new(InMemoryProfileStore::new());
        let mut doc = UserProfileDocument::default();
        doc.posts.push(user_post(9));
        store.insert("u2", doc);

        let feed = FeedController::new(store.clone(), FeedConfig::default());
        feed.set_identity(Some(reader("u1"))).await.unwrap().await.unwrap();
        let snap = feed.snapshot().await;
        assert_eq!(snap.passages.len(), 8);
        assert!(snap.likes.is_empty());

        assert!(feed.toggle_like(PassageId::Number(3)).await);
        settle().await;
        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "u1");
        let mut expected = FlagMap::new();
        expected.insert(PassageId::Number(3), true);
        assert_eq!(saves[0].1, ProfilePatch::likes(expected));

        assert!(feed.set_identity(None).await.is_none());
        feed.set_identity(Some(reader("u2"))).await.unwrap().await.unwrap();
        let snap = feed.snapshot().await;
        assert_eq!(snap.passages.len(), 9);
        assert_eq!(snap.my_posts, vec![user_post(9)]);
        assert!(snap.liked_posts.is_empty());
    }

    #[tokio::test]
    async fn follow_tracks_session_changes() {
        let store = Arc::new(InMemoryProfileStore::new());
        let feed = FeedController::new(store, FeedConfig::default());
        let (tx, mut rx) = watch::channel(None);
        rx.mark_changed();
        let task = feed.follow(rx).await;

        tx.send_replace(Some(reader("u1")));
        for _ in 0..50 {
            if feed.snapshot().await.status == SyncStatus::Ready {
                break;
            }
            settle().await;
        }
        assert_eq!(feed.phase().await, SyncPhase::Ready { identity: reader("u1") });

        drop(tx);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn sign_out_stops_saves_before_the_feed_catches_up() {
        let store = Arc::new(InMemoryProfileStore::new());
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let session = IdentitySession::new(provider.clone());
        let feed = FeedController::new(store.clone(), FeedConfig::default());
        let _follow = feed.follow(session.changes()).await;

        provider.queue_account(reader("u1"));
        session.sign_in().await.unwrap();
        wait_until_ready(&feed, "u1").await;

        // Nothing has yielded to the follow task between these two calls.
        provider.sign_out().await.unwrap();
        feed.toggle_like(PassageId::Number(1)).await;
        settle().await;

        assert!(store.saves().is_empty());
        assert!(store.document("u1").is_none());
    }

    #[tokio::test]
    async fn switching_accounts_never_writes_to_the_previous_user() {
        let store = Arc::new(InMemoryProfileStore::new());
        let provider = Arc::new(InMemoryIdentityProvider::new());
        let session = IdentitySession::new(provider.clone());
        let feed = FeedController::new(store.clone(), FeedConfig::default());
        let _follow = feed.follow(session.changes()).await;

        provider.queue_account(reader("u1"));
        session.sign_in().await.unwrap();
        wait_until_ready(&feed, "u1").await;

        provider.queue_account(reader("u2"));
        session.sign_in().await.unwrap();
        feed.toggle_bookmark(PassageId::Number(2)).await;
        settle().await;
        assert!(store.document("u1").is_none());

        wait_until_ready(&feed, "u2").await;
        feed.toggle_bookmark(PassageId::Number(2)).await;
        settle().await;
        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].0, "u2");
    }

    #[tokio::test(start_paused = true)]
    async fn reveal_is_dropped_after_identity_change() {
        let store = Arc::new(InMemoryProfileStore::new());
        let mut doc = UserProfileDocument::default();
        doc.posts.push(user_post(100));
        doc.posts.push(user_post(101));
        store.insert("u2", doc);
        let feed = FeedController::new(store, FeedConfig::default());

        feed.set_identity(Some(reader("u1"))).await.unwrap().await.unwrap();
        feed.submit_passage(draft("t", "b", "a")).await.unwrap();

        // u2's feed is long enough that index 8 would still be valid.
        feed.set_identity(Some(reader("u2"))).await.unwrap().await.unwrap();
        assert_eq!(feed.snapshot().await.passages.len(), 10);
        feed.jump_to(3).await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(feed.snapshot().await.current_index, 3);
    }

    #[tokio::test]
    async fn follow_ignores_a_repeated_uid() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        let mut events = feed.subscribe();
        let (tx, rx) = watch::channel(None);
        let task = feed.follow(rx).await;

        tx.send_replace(Some(reader("u1")));
        settle().await;
        tx.send_replace(Some(reader("u1")));
        settle().await;
        drop(tx);
        task.await.unwrap();

        let mut resets = 0;
        while let Ok(event) = events.try_recv() {
            if event == FeedEvent::Reset {
                resets += 1;
            }
        }
        assert_eq!(resets, 1);
    }

    #[tokio::test]
    async fn wheel_navigation_goes_through_controller() {
        let feed = FeedController::new(Arc::new(InMemoryProfileStore::new()), FeedConfig::default());
        assert!(feed.on_wheel(100.0).await.is_some());
        assert!(feed.on_wheel(100.0).await.is_none());
        assert_eq!(feed.snapshot().await.current_index, 1);
        assert!(feed.jump_to(99).await.is_none());
        assert_eq!(feed.previous().await.map(|c| c.index), Some(0));
    }
}
