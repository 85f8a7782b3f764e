//! crates/book_reels_core/src/domain.rs
//!
//! Defines the core data structures for the feed.
//! The serde shapes here are exactly what the remote `users` documents hold.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Genre assigned to submissions that leave the genre blank.
pub const USER_SUBMITTED_GENRE: &str = "User Submitted";

/// Style token applied to new drafts.
pub const DEFAULT_DRAFT_COLOR: &str = "from-indigo-900 to-purple-900";

/// Identifier of a passage. Built-in passages use small integers and
/// submissions use millisecond timestamps, but stored documents may also
/// carry string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PassageId {
    Number(i64),
    Text(String),
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassageId::Number(n) => write!(f, "{}", n),
            PassageId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PassageId {
    fn from(value: i64) -> Self {
        PassageId::Number(value)
    }
}

impl From<&str> for PassageId {
    /// Only canonical integers become numbers, so `"007"` or `"+3"` keep their text.
    fn from(value: &str) -> Self {
        match value.parse::<i64>() {
            Ok(n) if n.to_string() == value => PassageId::Number(n),
            _ => PassageId::Text(value.to_string()),
        }
    }
}

impl Serialize for PassageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PassageId::Number(n) => serializer.serialize_i64(*n),
            PassageId::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct PassageIdVisitor;

impl<'de> Visitor<'de> for PassageIdVisitor {
    type Value = PassageId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an integer or string passage id")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<PassageId, E> {
        Ok(PassageId::Number(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<PassageId, E> {
        i64::try_from(v)
            .map(PassageId::Number)
            .map_err(|_| E::custom(format!("passage id {} out of range", v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<PassageId, E> {
        if v.fract() == 0.0 && v >= i64::MIN as f64 && v <= i64::MAX as f64 {
            Ok(PassageId::Number(v as i64))
        } else {
            Ok(PassageId::Text(v.to_string()))
        }
    }

    // Object keys always arrive as strings, so "3" must map back to 3.
    fn visit_str<E: de::Error>(self, v: &str) -> Result<PassageId, E> {
        Ok(PassageId::from(v))
    }
}

impl<'de> Deserialize<'de> for PassageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PassageIdVisitor)
    }
}

/// A single short text passage shown as one reel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    pub text: String,
    pub book: String,
    pub author: String,
    #[serde(default)]
    pub genre: String,
    /// Opaque style token, rendered by the presentation layer.
    #[serde(default)]
    pub color: String,
}

/// The signed-in user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
}

/// Per-passage boolean flags (likes or bookmarks).
pub type FlagMap = BTreeMap<PassageId, bool>;

/// The remote per-user document stored under `users/{uid}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfileDocument {
    #[serde(default)]
    pub likes: FlagMap,
    #[serde(default)]
    pub bookmarks: FlagMap,
    #[serde(default)]
    pub posts: Vec<Passage>,
}

/// A partial document for merge-writes. Only the fields that are set get written,
/// and each one replaces the stored field as a whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfilePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub likes: Option<FlagMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmarks: Option<FlagMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posts: Option<Vec<Passage>>,
}

impl ProfilePatch {
    pub fn likes(likes: FlagMap) -> Self {
        Self { likes: Some(likes), ..Default::default() }
    }

    pub fn bookmarks(bookmarks: FlagMap) -> Self {
        Self { bookmarks: Some(bookmarks), ..Default::default() }
    }

    pub fn posts(posts: Vec<Passage>) -> Self {
        Self { posts: Some(posts), ..Default::default() }
    }

    /// Applies this patch onto a stored document, field by field.
    pub fn apply_to(&self, document: &mut UserProfileDocument) {
        if let Some(likes) = &self.likes {
            document.likes = likes.clone();
        }
        if let Some(bookmarks) = &self.bookmarks {
            document.bookmarks = bookmarks.clone();
        }
        if let Some(posts) = &self.posts {
            document.posts = posts.clone();
        }
    }
}

/// The contents of the add-passage form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageDraft {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub book: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub genre: String,
    #[serde(default = "default_draft_color")]
    pub color: String,
}

fn default_draft_color() -> String {
    DEFAULT_DRAFT_COLOR.to_string()
}

impl Default for PassageDraft {
    fn default() -> Self {
        Self {
            text: String::new(),
            book: String::new(),
            author: String::new(),
            genre: String::new(),
            color: default_draft_color(),
        }
    }
}
