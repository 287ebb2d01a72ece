mod common;

use std::sync::Arc;

use common::{extracted, identity, notes_upload, GatedProcessor, InstantProcessor, EMAIL, PASSWORD};
use ll_client::{LibraryStore, RecoveryReport, PROCESSING_ERROR_PLACEHOLDER, PROCESSING_PLACEHOLDER};
use ll_core::error::AppError;
use ll_core::models::StoryStatus;
use ll_core::traits::KvStore;
use ll_kv_local::{FileKvStore, MemoryKvStore};

#[tokio::test]
async fn placeholder_is_visible_while_processing() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let processor = GatedProcessor::new(Some(extracted()));
    let store = Arc::new(LibraryStore::open(kv.clone(), identity(kv), processor.clone()).await);
    store.sign_up(EMAIL, PASSWORD).await.unwrap();

    let upload = tokio::spawn({
        let store = store.clone();
        async move { store.add_story(notes_upload()).await }
    });
    processor.started.notified().await;

    let in_flight = store.stories().await;
    assert_eq!(in_flight.len(), 1);
    assert_eq!(in_flight[0].title, "My Notes");
    assert_eq!(in_flight[0].status, StoryStatus::Processing);
    assert_eq!(in_flight[0].content, PROCESSING_PLACEHOLDER);
    assert_eq!(in_flight[0].file_name.as_deref(), Some("notes.pdf"));
    assert_eq!(store.pending_jobs().await.len(), 1);

    processor.release.notify_one();
    let settled = upload.await.unwrap().unwrap();

    assert_eq!(settled.id, in_flight[0].id);
    assert_eq!(settled.status, StoryStatus::PendingReview);
    assert_eq!(settled.content, "Extracted text");
    assert_eq!(settled.tags, vec!["a", "b"]);
    assert!(store.pending_jobs().await.is_empty());
    assert!(store.published_stories().await.iter().all(|s| s.id != settled.id));
}

#[tokio::test]
async fn rejected_upload_settles_with_error_placeholder() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let processor = InstantProcessor::new(None);
    let store = LibraryStore::open(kv.clone(), identity(kv), processor.clone()).await;
    store.sign_up(EMAIL, PASSWORD).await.unwrap();

    let err = store.add_story(notes_upload()).await.unwrap_err();
    assert!(matches!(err, AppError::RemoteService(_)));

    let stories = store.stories().await;
    assert_eq!(stories.len(), 1);
    assert_eq!(stories[0].status, StoryStatus::PendingReview);
    assert_eq!(stories[0].content, PROCESSING_ERROR_PLACEHOLDER);

    let published = store.publish_story(&stories[0].id).await.unwrap();
    assert_eq!(published.status, StoryStatus::Published);
}

#[tokio::test]
async fn interrupted_upload_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();

    let story_id = {
        let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(dir.path().to_path_buf()));
        let processor = GatedProcessor::new(Some(extracted()));
        let store = Arc::new(LibraryStore::open(kv.clone(), identity(kv), processor.clone()).await);
        store.sign_up(EMAIL, PASSWORD).await.unwrap();

        let upload = tokio::spawn({
            let store = store.clone();
            async move { store.add_story(notes_upload()).await }
        });
        processor.started.notified().await;
        upload.abort();
        assert!(upload.await.unwrap_err().is_cancelled());

        store.stories().await[0].id.clone()
    };

    let kv: Arc<dyn KvStore> = Arc::new(FileKvStore::new(dir.path().to_path_buf()));
    let processor = InstantProcessor::new(Some(extracted()));
    let store = LibraryStore::open(kv.clone(), identity(kv), processor.clone()).await;
    store.sign_in(EMAIL, PASSWORD).await.unwrap();

    let before = store.story(&story_id).await.unwrap();
    assert_eq!(before.status, StoryStatus::Processing);

    let report = store.recover_pending().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            resumed: 1,
            failed: 0,
            orphaned: 0,
            in_flight: 0,
        }
    );
    assert_eq!(processor.calls(), 1);

    let after = store.story(&story_id).await.unwrap();
    assert_eq!(after.status, StoryStatus::PendingReview);
    assert_eq!(after.content, "Extracted text");
    assert!(store.pending_jobs().await.is_empty());
}

#[tokio::test]
async fn recovery_leaves_running_upload_alone() {
    let kv: Arc<dyn KvStore> = Arc::new(MemoryKvStore::new());
    let processor = GatedProcessor::new(Some(extracted()));
    let store = Arc::new(LibraryStore::open(kv.clone(), identity(kv), processor.clone()).await);
    store.sign_up(EMAIL, PASSWORD).await.unwrap();

    let upload = tokio::spawn({
        let store = store.clone();
        async move { store.add_story(notes_upload()).await }
    });
    processor.started.notified().await;

    let report = store.recover_pending().await.unwrap();
    assert_eq!(
        report,
        RecoveryReport {
            in_flight: 1,
            ..Default::default()
        }
    );
    assert_eq!(processor.calls(), 1);

    processor.release.notify_one();
    let settled = upload.await.unwrap().unwrap();
    assert_eq!(settled.content, "Extracted text");
    assert_eq!(processor.calls(), 1);
    assert!(store.pending_jobs().await.is_empty());

    assert_eq!(store.recover_pending().await.unwrap(), RecoveryReport::default());
}
