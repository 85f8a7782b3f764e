//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the browser client and the API server
//! for the passage feed.

use book_reels_core::{DraftField, FeedSnapshot, PassageId, ScrollCommand, Surface};
use serde::{Deserialize, Serialize};

//=========================================================================================
// Messages Sent FROM the Client (Browser) TO the Server
//=========================================================================================

/// Every user input the feed reacts to. Each maps to one controller operation.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A wheel event; positive `delta_y` scrolls towards later passages.
    Wheel { delta_y: f64 },
    TouchStart { y: f64 },
    TouchEnd { y: f64 },
    Next,
    Previous,
    JumpTo { index: i64 },

    ToggleLike { id: PassageId },
    ToggleBookmark { id: PassageId },
    Share { id: PassageId },

    OpenAddForm,
    CloseAddForm,
    EditDraft { field: DraftField, value: String },
    SubmitPassage,

    OpenProfile,
    CloseProfile,

    SignIn,
    SignOut,
    /// The credentials picked in the account picker.
    AccountChosen { email: String, password: String },
    PickerCancelled,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client (Browser)
//=========================================================================================

#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full render state. Sent after every change.
    Snapshot { feed: FeedSnapshot, surface: Surface },

    /// Smoothly scroll the feed to a passage.
    ScrollTo(ScrollCommand),

    /// Show the account picker so the user can choose who to sign in as.
    AccountPickerRequested { force_select: bool },

    /// The submission was rejected; the form keeps its values.
    ValidationFailed { message: String, missing: Vec<&'static str> },

    /// Sign-in did not complete; the client stays signed out.
    AuthFailed { message: String },

    /// Reports a protocol error to the client.
    Error { message: String },
}
