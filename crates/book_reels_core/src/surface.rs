//! crates/book_reels_core/src/surface.rs
//!
//! View-model for the panels around the feed: the profile drawer and the
//! add-passage form. They change only through `SurfaceCommand`s.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::domain::{Passage, PassageDraft, PassageId};
use crate::feed::{FeedController, FeedEvent, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    Text,
    Book,
    Author,
    Genre,
    Color,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCommand {
    OpenProfile,
    CloseProfile,
    OpenAddForm,
    CloseAddForm,
    EditDraft(DraftField, String),
    /// Sharing is not wired to anything yet.
    Share(PassageId),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Surface {
    pub profile_open: bool,
    pub add_form_open: bool,
    pub draft: PassageDraft,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `command`. Returns whether anything visible changed.
    ///
    /// The drawer and the form belong to a signed-in user and refuse to open otherwise.
    pub fn apply(&mut self, command: SurfaceCommand, signed_in: bool) -> bool {
        let before = self.clone();
        match command {
            SurfaceCommand::OpenProfile => self.profile_open = signed_in,
            SurfaceCommand::CloseProfile => self.profile_open = false,
            SurfaceCommand::OpenAddForm => self.add_form_open = signed_in,
            SurfaceCommand::CloseAddForm => self.add_form_open = false,
            SurfaceCommand::EditDraft(field, value) => {
                let slot = match field {
                    DraftField::Text => &mut self.draft.text,
                    DraftField::Book => &mut self.draft.book,
                    DraftField::Author => &mut self.draft.author,
                    DraftField::Genre => &mut self.draft.genre,
                    DraftField::Color => &mut self.draft.color,
                };
                *slot = value;
            }
            SurfaceCommand::Share(id) => debug!("Share requested for passage {}", id),
        }
        *self != before
    }

    /// Everything resets when the signed-in user changes.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Follows the feed: a `Reset` means the signed-in user changed, which closes
    /// the drawer and discards the form. Returns whether anything changed.
    pub fn observe(&mut self, event: &FeedEvent) -> bool {
        if *event != FeedEvent::Reset {
            return false;
        }
        let before = self.clone();
        self.reset();
        *self != before
    }

    /// Submits the current draft. On failure the form stays open with its values;
    /// on success it is cleared and closed.
    pub async fn submit(&mut self, feed: &Arc<FeedController>) -> Result<Passage, ValidationError> {
        let passage = feed.submit_passage(self.draft.clone()).await?;
        self.draft = PassageDraft::default();
        self.add_form_open = false;
        Ok(passage)
    }
}
