pub mod domain;
pub mod feed;
pub mod memory;
pub mod navigation;
pub mod ports;
pub mod seed;
pub mod session;
pub mod surface;

pub use domain::{FlagMap, Identity, Passage, PassageDraft, PassageId, ProfilePatch, UserProfileDocument};
pub use feed::{FeedConfig, FeedController, FeedEvent, FeedSnapshot, SyncPhase, SyncStatus, ValidationError};
pub use navigation::{GestureSettings, Navigator, ScrollBehavior, ScrollCommand};
pub use ports::{IdentityProvider, PortError, PortResult, ProfileStore, Prompt, SignInOptions};
pub use session::IdentitySession;
pub use surface::{DraftField, Surface, SurfaceCommand};
