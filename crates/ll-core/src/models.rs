//! # Domain Models
//!
//! These structs represent the entities Living Library caches locally and
//! moves across the proxy. Persisted records use camelCase field names so the
//! stored JSON matches what the browser client writes. Comment and report
//! timestamps are stored as epoch milliseconds for the same reason.

use std::collections::{BTreeMap, BTreeSet};

use bytes::Bytes;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Current time at the millisecond precision community records persist with.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// Avatar used when neither the identity provider nor a profile override has one.
pub fn default_avatar_url(uid: &str) -> String {
    format!("https://picsum.photos/seed/{uid}/200/200")
}

/// An identity-provider session, as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub uid: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl Session {
    /// Display name, else the local part of the email, else "User".
    pub fn fallback_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }
}

/// The authenticated user as rendered by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub name: String,
    pub email: Option<String>,
    pub image_url: String,
}

/// Locally persisted name/avatar that wins over the identity provider's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOverride {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Lifecycle of a story. Only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoryStatus {
    Processing,
    PendingReview,
    /// Curated resources carry no lifecycle and are treated as published.
    #[default]
    Published,
}

impl StoryStatus {
    /// Whether a story in `self` may move to `next`. Staying put is allowed.
    pub fn can_transition_to(self, next: StoryStatus) -> bool {
        use StoryStatus::*;
        self == next
            || matches!(
                (self, next),
                (Processing, PendingReview) | (PendingReview, Published)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StoryStatus::Processing => "processing",
            StoryStatus::PendingReview => "pending_review",
            StoryStatus::Published => "published",
        }
    }
}

/// A unit of library content, curated or user-submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub title: String,
    pub category: String,
    pub short_description: String,
    pub content: String,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_name: Option<String>,
    /// Name of the uploaded file the story was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default)]
    pub status: StoryStatus,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Story {
    /// Shallow-merges `update` into the story.
    ///
    /// The status check runs before any field is touched, so a rejected
    /// update leaves the story unchanged.
    pub fn apply(&mut self, update: StoryUpdate) -> Result<()> {
        if let Some(next) = update.status {
            if !self.status.can_transition_to(next) {
                return Err(AppError::InvalidTransition {
                    from: self.status,
                    to: next,
                });
            }
            self.status = next;
        }
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(category) = update.category {
            self.category = category;
        }
        if let Some(short_description) = update.short_description {
            self.short_description = short_description;
        }
        if let Some(content) = update.content {
            self.content = content;
        }
        if let Some(image_url) = update.image_url {
            self.image_url = image_url;
        }
        if let Some(tags) = update.tags {
            self.tags = tags;
        }
        Ok(())
    }
}

/// Partial story edit. `None` fields are left as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub short_description: Option<String>,
    pub content: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<StoryStatus>,
    pub tags: Option<Vec<String>>,
}

/// Raw file handed to the ingestion workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

const DOCUMENT_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "text/plain",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
];

impl UploadedFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }

    /// PDF, plain text, Word documents, or any audio type.
    pub fn is_supported(&self) -> bool {
        match self.mime_type.parse::<mime::Mime>() {
            Ok(parsed) => {
                parsed.type_() == mime::AUDIO
                    || DOCUMENT_MIME_TYPES.contains(&parsed.essence_str())
            }
            Err(_) => false,
        }
    }
}

/// Form input for a new story upload.
#[derive(Debug, Clone)]
pub struct NewStory {
    pub title: String,
    pub category: String,
    pub short_description: String,
    pub file: UploadedFile,
}

/// Append-only remark on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub resource_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_image_url: String,
    pub text: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// A user's flag against a resource. One per (resource, reporter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub resource_id: String,
    pub reporter_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Title at the time of the report.
    pub resource_title: String,
}

/// Resource id → ids of the users who liked it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikeRegistry(BTreeMap<String, BTreeSet<String>>);

impl LikeRegistry {
    /// Flips `user_id`'s membership for `resource_id`. Returns `true` if the
    /// user now likes the resource.
    pub fn toggle(&mut self, resource_id: &str, user_id: &str) -> bool {
        let likers = self.0.entry(resource_id.to_string()).or_default();
        if likers.remove(user_id) {
            false
        } else {
            likers.insert(user_id.to_string());
            true
        }
    }

    pub fn count(&self, resource_id: &str) -> usize {
        self.0.get(resource_id).map_or(0, BTreeSet::len)
    }

    pub fn contains(&self, resource_id: &str, user_id: &str) -> bool {
        self.0
            .get(resource_id)
            .is_some_and(|likers| likers.contains(user_id))
    }

    pub fn likers(&self, resource_id: &str) -> Option<&BTreeSet<String>> {
        self.0.get(resource_id)
    }
}

/// Globally shared comments, likes, and reports. Persisted as one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityData {
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub likes: LikeRegistry,
    #[serde(default)]
    pub reports: Vec<Report>,
}

/// Durable record of an ingestion that has not reached a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionJob {
    pub story_id: String,
    pub file_name: String,
    pub mime_type: String,
    /// Base64 (standard alphabet) file bytes.
    pub file_data: String,
    pub enqueued_at: DateTime<Utc>,
}

/// What the AI gateway extracted from an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedFile {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One text part of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

/// A turn of conversation history in gateway form (`user` / `model`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub parts: Vec<ChatPart>,
}

impl ChatTurn {
    pub fn text(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            parts: vec![ChatPart { text: text.into() }],
        }
    }
}

/// Claims the proxy extracted from a verified identity token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
}
