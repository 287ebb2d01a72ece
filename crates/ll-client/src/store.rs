//! # LibraryStore
//!
//! Client-side state: the signed-in user, their stories and bookmarks, and
//! the global community data (comments, likes, reports). Every mutation is applied in
//! memory first and then written back to its `KvStore` slot.
//!
//! The store is an explicitly owned object. `open` is its initialization
//! contract; share it behind an `Arc` with whichever component needs it.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use ll_core::error::{AppError, Result};
use ll_core::models::{
    default_avatar_url, now_millis, Comment, CommunityData, IngestionJob, ProfileOverride, Report, Session,
    Story, StoryStatus, StoryUpdate, UploadedFile, User,
};
use ll_core::traits::{FileProcessor, IdentityProvider, KvStore};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::profile::avatar_data_url;
use crate::slots::{self, bookmarks_slot, jobs_slot, profile_slot, stories_slot, COMMUNITY_SLOT};

pub struct LibraryStore {
    pub(crate) kv: Arc<dyn KvStore>,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    pub(crate) processor: Arc<dyn FileProcessor>,
    pub(crate) state: Mutex<StoreState>,
    /// Story ids whose processing call is running in this process.
    pub(crate) in_flight: StdMutex<HashSet<String>>,
}

/// Marks a story as being processed until dropped.
pub(crate) struct InFlight<'a> {
    ids: &'a StdMutex<HashSet<String>>,
    story_id: String,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.story_id);
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) user: Option<User>,
    pub(crate) stories: Vec<Story>,
    /// Ingestions of the current user that have not settled yet.
    pub(crate) jobs: Vec<IngestionJob>,
    pub(crate) bookmarks: BTreeSet<String>,
    pub(crate) community: CommunityData,
    /// Set once the first session sync has run.
    pub(crate) hydrated: bool,
}

impl StoreState {
    /// Whether the in-memory story list belongs to `uid`.
    pub(crate) fn holds_user(&self, uid: &str) -> bool {
        self.hydrated && self.user.as_ref().is_some_and(|u| u.uid == uid)
    }
}

fn hydrate_user(session: &Session, profile: Option<ProfileOverride>) -> User {
    let profile = profile.unwrap_or_default();
    User {
        uid: session.uid.clone(),
        email: session.email.clone(),
        name: profile
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| session.fallback_name()),
        image_url: profile
            .image_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| default_avatar_url(&session.uid)),
    }
}

/// Shallow-merges `update` into the story with `id`.
pub(crate) fn apply_update(stories: &mut [Story], id: &str, update: StoryUpdate) -> Result<Story> {
    let story = stories
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound("Story".to_string(), id.to_string()))?;
    story.apply(update)?;
    Ok(story.clone())
}

impl LibraryStore {
    /// Loads community data, then hydrates from the identity provider's
    /// current session.
    pub async fn open(
        kv: Arc<dyn KvStore>,
        identity: Arc<dyn IdentityProvider>,
        processor: Arc<dyn FileProcessor>,
    ) -> Self {
        let community: CommunityData = slots::load(kv.as_ref(), COMMUNITY_SLOT)
            .await
            .unwrap_or_default();
        tracing::debug!(
            comments = community.comments.len(),
            reports = community.reports.len(),
            "community data loaded"
        );

        let store = Self {
            kv,
            identity,
            processor,
            state: Mutex::new(StoreState {
                community,
                ..Default::default()
            }),
            in_flight: StdMutex::new(HashSet::new()),
        };
        store.sync_session().await;
        store
    }

    /// Re-reads the identity provider's session. Call after any session change.
    pub async fn sync_session(&self) {
        let session = self.identity.current_session();
        let mut state = self.state.lock().await;

        match session {
            Some(session) => {
                let kv = self.kv.as_ref();
                let profile: Option<ProfileOverride> = slots::load(kv, &profile_slot(&session.uid)).await;
                state.user = Some(hydrate_user(&session, profile));
                state.stories = slots::load(kv, &stories_slot(&session.uid))
                    .await
                    .unwrap_or_default();
                state.jobs = slots::load(kv, &jobs_slot(&session.uid))
                    .await
                    .unwrap_or_default();
                state.bookmarks = slots::load(kv, &bookmarks_slot(&session.uid))
                    .await
                    .unwrap_or_default();
                tracing::info!(uid = %session.uid, stories = state.stories.len(), "session hydrated");
            }
            None => {
                state.user = None;
                state.stories.clear();
                state.jobs.clear();
                state.bookmarks.clear();
            }
        }
        state.hydrated = true;
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<User> {
        self.identity.sign_up(email, password).await?;
        self.sync_session().await;
        self.require_user("sign up").await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<User> {
        self.identity.sign_in(email, password).await?;
        self.sync_session().await;
        self.require_user("sign in").await
    }

    /// Ends the session and drops user state from memory. Persisted stories
    /// and pending jobs stay in their slots for the next sign-in.
    pub async fn sign_out(&self) -> Result<()> {
        self.identity.sign_out().await?;
        self.sync_session().await;
        Ok(())
    }

    /// Claims `story_id` for processing. `None` if a call for it is already
    /// running.
    pub(crate) fn claim(&self, story_id: &str) -> Option<InFlight<'_>> {
        let mut ids = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(story_id.to_string()) {
            return None;
        }
        Some(InFlight {
            ids: &self.in_flight,
            story_id: story_id.to_string(),
        })
    }

    async fn require_user(&self, action: &str) -> Result<User> {
        self.current_user()
            .await
            .ok_or_else(|| AppError::login_required(action))
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    pub async fn current_user(&self) -> Option<User> {
        self.state.lock().await.user.clone()
    }

    pub async fn stories(&self) -> Vec<Story> {
        self.state.lock().await.stories.clone()
    }

    pub async fn story(&self, id: &str) -> Option<Story> {
        self.state.lock().await.stories.iter().find(|s| s.id == id).cloned()
    }

    pub async fn published_stories(&self) -> Vec<Story> {
        self.state
            .lock()
            .await
            .stories
            .iter()
            .filter(|s| s.status == StoryStatus::Published)
            .cloned()
            .collect()
    }

    pub async fn pending_jobs(&self) -> Vec<IngestionJob> {
        self.state.lock().await.jobs.clone()
    }

    pub async fn community(&self) -> CommunityData {
        self.state.lock().await.community.clone()
    }

    pub async fn comments_for(&self, resource_id: &str) -> Vec<Comment> {
        self.state
            .lock()
            .await
            .community
            .comments
            .iter()
            .filter(|c| c.resource_id == resource_id)
            .cloned()
            .collect()
    }

    pub async fn like_count(&self, resource_id: &str) -> usize {
        self.state.lock().await.community.likes.count(resource_id)
    }

    pub async fn has_liked(&self, resource_id: &str) -> bool {
        let state = self.state.lock().await;
        state
            .user
            .as_ref()
            .is_some_and(|u| state.community.likes.contains(resource_id, &u.uid))
    }

    pub async fn reports(&self) -> Vec<Report> {
        self.state.lock().await.community.reports.clone()
    }

    /// Comments written by the signed-in user, oldest first.
    pub async fn my_comments(&self) -> Vec<Comment> {
        let state = self.state.lock().await;
        let Some(user) = state.user.as_ref() else {
            return Vec::new();
        };
        state
            .community
            .comments
            .iter()
            .filter(|c| c.author_id == user.uid)
            .cloned()
            .collect()
    }

    /// Reports filed by the signed-in user.
    pub async fn my_reports(&self) -> Vec<Report> {
        let state = self.state.lock().await;
        let Some(user) = state.user.as_ref() else {
            return Vec::new();
        };
        state
            .community
            .reports
            .iter()
            .filter(|r| r.reporter_id == user.uid)
            .cloned()
            .collect()
    }

    pub async fn bookmarks(&self) -> BTreeSet<String> {
        self.state.lock().await.bookmarks.clone()
    }

    pub async fn is_bookmarked(&self, resource_id: &str) -> bool {
        self.state.lock().await.bookmarks.contains(resource_id)
    }

    // ── Persistence ──────────────────────────────────────────────────────────

    pub(crate) async fn persist_stories(&self, state: &StoreState) {
        if let (Some(user), true) = (&state.user, state.hydrated) {
            slots::save(self.kv.as_ref(), &stories_slot(&user.uid), &state.stories).await;
        }
    }

    pub(crate) async fn persist_jobs(&self, state: &StoreState) {
        if let (Some(user), true) = (&state.user, state.hydrated) {
            slots::save(self.kv.as_ref(), &jobs_slot(&user.uid), &state.jobs).await;
        }
    }

    async fn persist_bookmarks(&self, state: &StoreState) {
        if let (Some(user), true) = (&state.user, state.hydrated) {
            slots::save(self.kv.as_ref(), &bookmarks_slot(&user.uid), &state.bookmarks).await;
        }
    }

    async fn persist_community(&self, state: &StoreState) {
        slots::save(self.kv.as_ref(), COMMUNITY_SLOT, &state.community).await;
    }

    // ── Community mutations ──────────────────────────────────────────────────

    /// Flips the current user's like. Returns `true` if the resource is now liked.
    pub async fn toggle_like(&self, resource_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let uid = state
            .user
            .as_ref()
            .map(|u| u.uid.clone())
            .ok_or_else(|| AppError::login_required("like"))?;

        let liked = state.community.likes.toggle(resource_id, &uid);
        self.persist_community(&state).await;
        Ok(liked)
    }

    /// Flips a bookmark for the current user. Returns `true` if the resource
    /// is now bookmarked.
    pub async fn toggle_bookmark(&self, resource_id: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        if state.user.is_none() {
            return Err(AppError::login_required("bookmark content"));
        }

        let bookmarked = if state.bookmarks.remove(resource_id) {
            false
        } else {
            state.bookmarks.insert(resource_id.to_string());
            true
        };
        self.persist_bookmarks(&state).await;
        Ok(bookmarked)
    }

    /// Files a report for the current user. A second report for the same
    /// resource yields `AlreadyExists` and changes nothing.
    pub async fn report_content(&self, resource_id: &str, resource_title: &str) -> Result<Report> {
        let mut state = self.state.lock().await;
        let uid = state
            .user
            .as_ref()
            .map(|u| u.uid.clone())
            .ok_or_else(|| AppError::login_required("report content"))?;

        if state
            .community
            .reports
            .iter()
            .any(|r| r.resource_id == resource_id && r.reporter_id == uid)
        {
            tracing::info!(resource_id, "content already reported by this user");
            return Err(AppError::AlreadyExists(format!(
                "report for {resource_id} by {uid}"
            )));
        }

        let report = Report {
            resource_id: resource_id.to_string(),
            reporter_id: uid,
            timestamp: now_millis(),
            resource_title: resource_title.to_string(),
        };
        state.community.reports.push(report.clone());
        self.persist_community(&state).await;
        Ok(report)
    }

    /// Appends a comment. Identical comments are allowed.
    pub async fn add_comment(&self, resource_id: &str, text: &str) -> Result<Comment> {
        let mut state = self.state.lock().await;
        let user = state
            .user
            .clone()
            .ok_or_else(|| AppError::login_required("comment"))?;
        if text.trim().is_empty() {
            return Err(AppError::Validation("comment text is required".to_string()));
        }

        let comment = Comment {
            id: Uuid::now_v7().to_string(),
            resource_id: resource_id.to_string(),
            author_id: user.uid,
            author_name: if user.name.is_empty() {
                "Anonymous".to_string()
            } else {
                user.name
            },
            author_image_url: user.image_url,
            text: text.to_string(),
            timestamp: now_millis(),
        };
        state.community.comments.push(comment.clone());
        self.persist_community(&state).await;
        Ok(comment)
    }

    // ── Story and profile mutations ──────────────────────────────────────────

    /// Shallow-merges `update` into one of the current user's stories.
    pub async fn update_story(&self, id: &str, update: StoryUpdate) -> Result<Story> {
        let mut state = self.state.lock().await;
        if state.user.is_none() {
            return Err(AppError::login_required("edit a story"));
        }
        let story = apply_update(&mut state.stories, id, update)?;
        self.persist_stories(&state).await;
        Ok(story)
    }

    /// The author's manual pending_review → published step.
    pub async fn publish_story(&self, id: &str) -> Result<Story> {
        let story = self
            .update_story(
                id,
                StoryUpdate {
                    status: Some(StoryStatus::Published),
                    ..Default::default()
                },
            )
            .await?;
        tracing::info!(story_id = id, "story published");
        Ok(story)
    }

    /// Renames the user and optionally replaces the avatar with an embedded
    /// thumbnail of `image`.
    pub async fn update_user_profile(&self, name: &str, image: Option<UploadedFile>) -> Result<User> {
        if name.trim().is_empty() {
            return Err(AppError::Validation("name is required".to_string()));
        }
        let current = self.require_user("update the profile").await?;
        let image_url = match image {
            Some(file) => avatar_data_url(&file)?,
            None => current.image_url.clone(),
        };

        self.identity.update_display_name(name).await?;

        let mut state = self.state.lock().await;
        let user = state
            .user
            .as_mut()
            .filter(|u| u.uid == current.uid)
            .ok_or_else(|| AppError::login_required("update the profile"))?;
        user.name = name.to_string();
        user.image_url = image_url.clone();
        let updated = user.clone();

        let profile = ProfileOverride {
            name: Some(name.to_string()),
            image_url: Some(image_url),
        };
        slots::save(self.kv.as_ref(), &profile_slot(&updated.uid), &profile).await;
        Ok(updated)
    }
}
