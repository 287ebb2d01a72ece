//! # Story ingestion
//!
//! `add_story` inserts a placeholder story, records a durable job, calls the
//! proxy, and reconciles the outcome. A story lands in `pending_review`
//! whether processing succeeds or fails; only the author publishes it.
//!
//! Jobs live in the `jobs_<uid>` slot until their story settles, so an
//! ingestion interrupted by a crash or shutdown is picked up again by
//! [`LibraryStore::recover_pending`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use ll_core::error::{AppError, Result};
use ll_core::models::{
    IngestionJob, NewStory, ProcessedFile, Session, Story, StoryStatus, StoryUpdate, UploadedFile,
};
use uuid::Uuid;

use crate::slots::{self, jobs_slot, stories_slot};
use crate::store::{apply_update, LibraryStore};

pub const PROCESSING_PLACEHOLDER: &str = "Processing in progress...";
pub const PROCESSING_ERROR_PLACEHOLDER: &str =
    "There was an error processing this story. Please review and publish or try uploading again.";

/// Outcome of a startup recovery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs re-run that settled with extracted content.
    pub resumed: usize,
    /// Jobs re-run that settled with the error placeholder.
    pub failed: usize,
    /// `processing` stories with no job, moved straight to the error placeholder.
    pub orphaned: usize,
    /// Jobs skipped because their upload is still running in this process.
    pub in_flight: usize,
}

fn validate(new_story: &NewStory) -> Result<()> {
    let missing = [
        ("title", new_story.title.trim().is_empty()),
        ("category", new_story.category.trim().is_empty()),
        ("short description", new_story.short_description.trim().is_empty()),
        ("file", new_story.file.bytes.is_empty()),
    ]
    .into_iter()
    .filter_map(|(field, empty)| empty.then_some(field))
    .collect::<Vec<_>>();

    if !missing.is_empty() {
        return Err(AppError::Validation(format!(
            "please fill in all fields: missing {}",
            missing.join(", ")
        )));
    }
    if !new_story.file.is_supported() {
        return Err(AppError::Validation(
            "please upload a valid PDF, DOC, TXT, or audio file".to_string(),
        ));
    }
    Ok(())
}

fn placeholder(session: &Session, new_story: &NewStory) -> Story {
    Story {
        id: Uuid::now_v7().to_string(),
        title: new_story.title.clone(),
        category: new_story.category.clone(),
        short_description: new_story.short_description.clone(),
        content: PROCESSING_PLACEHOLDER.to_string(),
        image_url: format!(
            "https://picsum.photos/seed/{}/400/300",
            Utc::now().timestamp_millis()
        ),
        author_id: Some(session.uid.clone()),
        author_name: Some(session.fallback_name()),
        file_name: Some(new_story.file.name.clone()),
        status: StoryStatus::Processing,
        tags: Vec::new(),
    }
}

fn settle_update(outcome: &Result<ProcessedFile>) -> StoryUpdate {
    match outcome {
        Ok(processed) => StoryUpdate {
            status: Some(StoryStatus::PendingReview),
            content: Some(processed.content.clone()),
            tags: Some(processed.tags.clone()),
            ..Default::default()
        },
        Err(_) => StoryUpdate {
            status: Some(StoryStatus::PendingReview),
            content: Some(PROCESSING_ERROR_PLACEHOLDER.to_string()),
            ..Default::default()
        },
    }
}

fn job_file(job: &IngestionJob) -> Result<UploadedFile> {
    let bytes = STANDARD
        .decode(&job.file_data)
        .map_err(|e| AppError::Storage(format!("corrupt job payload for {}: {e}", job.story_id)))?;
    Ok(UploadedFile::new(job.file_name.clone(), job.mime_type.clone(), bytes))
}

impl LibraryStore {
    /// Uploads a story for processing.
    ///
    /// The placeholder is visible through [`LibraryStore::stories`] as soon as
    /// this future has passed its first await on the proxy. On a processing
    /// failure the story still settles (with the error placeholder) and the
    /// error is returned.
    pub async fn add_story(&self, new_story: NewStory) -> Result<Story> {
        let session = self
            .identity
            .current_session()
            .ok_or_else(|| AppError::login_required("add a story"))?;
        validate(&new_story)?;

        let token = self.identity.id_token().await?;

        let story = placeholder(&session, &new_story);
        let _in_flight = self
            .claim(&story.id)
            .ok_or_else(|| AppError::Internal(format!("story {} is already processing", story.id)))?;
        let job = IngestionJob {
            story_id: story.id.clone(),
            file_name: new_story.file.name.clone(),
            mime_type: new_story.file.mime_type.clone(),
            file_data: STANDARD.encode(&new_story.file.bytes),
            enqueued_at: Utc::now(),
        };

        {
            let mut state = self.state.lock().await;
            if !state.holds_user(&session.uid) {
                return Err(AppError::login_required("add a story"));
            }
            state.stories.push(story.clone());
            state.jobs.push(job);
            self.persist_stories(&state).await;
            self.persist_jobs(&state).await;
        }
        tracing::info!(story_id = %story.id, file = %new_story.file.name, "story queued for processing");

        let outcome = self.processor.process_file(&new_story.file, &token).await;
        self.settle(&session.uid, &story.id, outcome).await
    }

    /// Applies a processing outcome and drops the job.
    ///
    /// If `uid` is no longer the signed-in user the outcome is applied to that
    /// user's persisted slots directly, so nothing is lost to a sign-out.
    async fn settle(
        &self,
        uid: &str,
        story_id: &str,
        outcome: Result<ProcessedFile>,
    ) -> Result<Story> {
        let update = settle_update(&outcome);
        let mut state = self.state.lock().await;

        let settled = if state.holds_user(uid) {
            let settled = apply_update(&mut state.stories, story_id, update);
            state.jobs.retain(|j| j.story_id != story_id);
            self.persist_stories(&state).await;
            self.persist_jobs(&state).await;
            settled
        } else {
            let kv = self.kv.as_ref();
            let mut stories: Vec<Story> = slots::load(kv, &stories_slot(uid)).await.unwrap_or_default();
            let mut jobs: Vec<IngestionJob> = slots::load(kv, &jobs_slot(uid)).await.unwrap_or_default();
            let settled = apply_update(&mut stories, story_id, update);
            jobs.retain(|j| j.story_id != story_id);
            slots::save(kv, &stories_slot(uid), &stories).await;
            slots::save(kv, &jobs_slot(uid), &jobs).await;
            settled
        };
        drop(state);

        match (&outcome, &settled) {
            (Ok(_), Ok(_)) => tracing::info!(story_id, "story ready for review"),
            (Err(e), _) => tracing::error!(story_id, error = %e, "failed to process story"),
            (Ok(_), Err(e)) => tracing::warn!(story_id, error = %e, "processed story could not be updated"),
        }

        outcome?;
        settled
    }

    /// Resumes the signed-in user's unsettled ingestions.
    ///
    /// Run after the store is opened. Queued jobs whose upload is still
    /// running in this process are left to it; every other job is processed
    /// again once. `processing` stories without a job can never settle and
    /// are moved to the error placeholder.
    pub async fn recover_pending(&self) -> Result<RecoveryReport> {
        let session = self
            .identity
            .current_session()
            .ok_or_else(|| AppError::login_required("recover uploads"))?;
        let mut report = RecoveryReport::default();

        let jobs = {
            let mut state = self.state.lock().await;
            if !state.holds_user(&session.uid) {
                return Err(AppError::login_required("recover uploads"));
            }
            let queued: Vec<String> = state.jobs.iter().map(|j| j.story_id.clone()).collect();
            let orphan_update = || StoryUpdate {
                status: Some(StoryStatus::PendingReview),
                content: Some(PROCESSING_ERROR_PLACEHOLDER.to_string()),
                ..Default::default()
            };
            for story in state
                .stories
                .iter_mut()
                .filter(|s| s.status == StoryStatus::Processing && !queued.contains(&s.id))
            {
                story.apply(orphan_update())?;
                report.orphaned += 1;
                tracing::warn!(story_id = %story.id, "orphaned processing story settled");
            }
            if report.orphaned > 0 {
                self.persist_stories(&state).await;
            }
            state.jobs.clone()
        };

        if jobs.is_empty() {
            return Ok(report);
        }
        tracing::info!(jobs = jobs.len(), "resuming interrupted ingestions");

        let token = self.identity.id_token().await?;
        for job in jobs {
            let Some(_in_flight) = self.claim(&job.story_id) else {
                tracing::debug!(story_id = %job.story_id, "upload still running, not resuming");
                report.in_flight += 1;
                continue;
            };
            let outcome = match job_file(&job) {
                Ok(file) => self.processor.process_file(&file, &token).await,
                Err(e) => Err(e),
            };
            match self.settle(&session.uid, &job.story_id, outcome).await {
                Ok(_) => report.resumed += 1,
                Err(_) => report.failed += 1,
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{identity_with, session};
    use ll_core::traits::{KvStore, MockFileProcessor};
    use ll_kv_local::MemoryKvStore;
    use std::sync::{Arc, Mutex as StdMutex};

    fn notes() -> NewStory {
        NewStory {
            title: "My Notes".to_string(),
            category: "Science".to_string(),
            short_description: "Lecture notes".to_string(),
            file: UploadedFile::new("notes.pdf", "application/pdf", b"%PDF-1.4 notes".to_vec()),
        }
    }

    async fn store_with(kv: Arc<MemoryKvStore>, processor: MockFileProcessor) -> LibraryStore {
        let cell = Arc::new(StdMutex::new(Some(session("u1"))));
        LibraryStore::open(kv, Arc::new(identity_with(cell)), Arc::new(processor)).await
    }

    #[tokio::test]
    async fn successful_processing_settles_for_review() {
        let mut processor = MockFileProcessor::new();
        processor
            .expect_process_file()
            .withf(|file, token| file.name == "notes.pdf" && token == "test-token")
            .times(1)
            .returning(|_, _| {
                Ok(ProcessedFile {
                    content: "Extracted text".to_string(),
                    tags: vec!["a".to_string(), "b".to_string()],
                })
            });
        let kv = Arc::new(MemoryKvStore::new());
        let store = store_with(kv.clone(), processor).await;

        let story = store.add_story(notes()).await.unwrap();
        assert_eq!(story.status, StoryStatus::PendingReview);
        assert_eq!(story.content, "Extracted text");
        assert_eq!(story.tags, vec!["a", "b"]);
        assert_eq!(story.file_name.as_deref(), Some("notes.pdf"));
        assert_eq!(story.author_name.as_deref(), Some("u1"));
        assert!(store.pending_jobs().await.is_empty());

        let persisted: Vec<Story> =
            serde_json::from_str(&kv.get("stories_u1").await.unwrap().unwrap()).unwrap();
        assert_eq!(persisted, vec![story]);
        assert_eq!(kv.get("jobs_u1").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn failed_processing_keeps_record_and_returns_error() {
        let mut processor = MockFileProcessor::new();
        processor
            .expect_process_file()
            .times(1)
            .returning(|_, _| Err(AppError::RemoteService("gateway down".to_string())));
        let store = store_with(Arc::new(MemoryKvStore::new()), processor).await;

        let err = store.add_story(notes()).await.unwrap_err();
        assert!(matches!(err, AppError::RemoteService(_)));

        let stories = store.stories().await;
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].status, StoryStatus::PendingReview);
        assert_eq!(stories[0].content, PROCESSING_ERROR_PLACEHOLDER);
        assert!(store.pending_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_uploads_never_reach_the_proxy() {
        let mut processor = MockFileProcessor::new();
        processor.expect_process_file().never();
        let store = store_with(Arc::new(MemoryKvStore::new()), processor).await;

        let mut blank = notes();
        blank.title = "  ".to_string();
        assert!(matches!(store.add_story(blank).await, Err(AppError::Validation(_))));

        let mut image = notes();
        image.file = UploadedFile::new("cat.png", "image/png", vec![1, 2, 3]);
        assert!(matches!(store.add_story(image).await, Err(AppError::Validation(_))));

        assert!(store.stories().await.is_empty());
    }

    #[tokio::test]
    async fn add_story_requires_session() {
        let cell = Arc::new(StdMutex::new(None));
        let store = LibraryStore::open(
            Arc::new(MemoryKvStore::new()),
            Arc::new(identity_with(cell)),
            Arc::new(MockFileProcessor::new()),
        )
        .await;
        assert!(matches!(
            store.add_story(notes()).await,
            Err(AppError::AuthenticationRequired(_))
        ));
    }

    #[tokio::test]
    async fn recovery_resumes_queued_jobs_and_settles_orphans() {
        let kv = Arc::new(MemoryKvStore::new());
        let queued = Story {
            id: "queued".to_string(),
            title: "Talk".to_string(),
            category: "Arts".to_string(),
            short_description: "a talk".to_string(),
            content: PROCESSING_PLACEHOLDER.to_string(),
            image_url: "https://example.test/i".to_string(),
            author_id: Some("u1".to_string()),
            author_name: Some("u1".to_string()),
            file_name: Some("talk.mp3".to_string()),
            status: StoryStatus::Processing,
            tags: vec![],
        };
        let mut orphan = queued.clone();
        orphan.id = "orphan".to_string();
        kv.set("stories_u1", &serde_json::to_string(&vec![queued, orphan]).unwrap())
            .await
            .unwrap();
        let job = IngestionJob {
            story_id: "queued".to_string(),
            file_name: "talk.mp3".to_string(),
            mime_type: "audio/mpeg".to_string(),
            file_data: STANDARD.encode(b"ID3 audio"),
            enqueued_at: Utc::now(),
        };
        kv.set("jobs_u1", &serde_json::to_string(&vec![job]).unwrap())
            .await
            .unwrap();

        let mut processor = MockFileProcessor::new();
        processor
            .expect_process_file()
            .withf(|file, _| file.bytes.as_ref() == b"ID3 audio" && file.mime_type == "audio/mpeg")
            .times(1)
            .returning(|_, _| {
                Ok(ProcessedFile {
                    content: "Transcript".to_string(),
                    tags: vec!["talk".to_string()],
                })
            });
        let store = store_with(kv, processor).await;

        let report = store.recover_pending().await.unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                resumed: 1,
                failed: 0,
                orphaned: 1,
                in_flight: 0,
            }
        );
        let queued = store.story("queued").await.unwrap();
        assert_eq!(queued.content, "Transcript");
        assert_eq!(queued.status, StoryStatus::PendingReview);
        let orphan = store.story("orphan").await.unwrap();
        assert_eq!(orphan.content, PROCESSING_ERROR_PLACEHOLDER);
        assert!(store.pending_jobs().await.is_empty());

        // A second pass has nothing left to do.
        assert_eq!(store.recover_pending().await.unwrap(), RecoveryReport::default());
    }
}
