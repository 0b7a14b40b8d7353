use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::report::{ChapterFailure, SyncDirection, SyncReport, SyncStage};
use crate::manager::{ChapterManager, ChoiceManager, MediaManager, StoreContext};
use crate::models::{Chapter, Story};
use crate::storage::StoreResult;

/// Moves a whole story aggregate between the local and remote stores
///
/// Every row is upserted, so re-running a sync is safe. A chapter that
/// fails is recorded in the report and the next chapter is attempted;
/// only a failure on the story row itself fails the call.
#[derive(Clone)]
pub struct Synchronizer {
    ctx: Arc<StoreContext>,
    chapters: ChapterManager,
    choices: ChoiceManager,
    media: MediaManager,
    stage: Arc<watch::Sender<SyncStage>>,
    stage_rx: watch::Receiver<SyncStage>,
}

impl Synchronizer {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        let (stage, stage_rx) = watch::channel(SyncStage::Idle);
        Self {
            chapters: ChapterManager::new(Arc::clone(&ctx)),
            choices: ChoiceManager::new(Arc::clone(&ctx)),
            media: MediaManager::new(Arc::clone(&ctx)),
            ctx,
            stage: Arc::new(stage),
            stage_rx,
        }
    }

    /// Watch the current sync stage
    pub fn subscribe_stage(&self) -> watch::Receiver<SyncStage> {
        self.stage_rx.clone()
    }

    pub fn stage(&self) -> SyncStage {
        *self.stage_rx.borrow()
    }

    fn set_stage(&self, stage: SyncStage) {
        self.stage.send_replace(stage);
    }

    /// Store a story downloaded from the server in the local cache
    ///
    /// Transport media is written to image files on the way in.
    pub fn adopt(&self, story: &Story) -> StoreResult<SyncReport> {
        self.finish(self.sync_local(SyncDirection::Adopt, story))
    }

    /// Store an in-memory story aggregate locally
    pub fn save(&self, story: &Story) -> StoreResult<SyncReport> {
        self.finish(self.sync_local(SyncDirection::Save, story))
    }

    /// Send a local story aggregate to the server
    ///
    /// Every media item is re-encoded from its current image file.
    pub async fn publish(&self, story: &Story) -> StoreResult<SyncReport> {
        let result = self.sync_remote(story).await;
        self.finish(result)
    }

    /// Publish on a background task
    pub fn spawn_publish(&self, story: Story) -> JoinHandle<StoreResult<SyncReport>> {
        let synchronizer = self.clone();
        tokio::spawn(async move { synchronizer.publish(&story).await })
    }

    fn finish(&self, result: StoreResult<SyncReport>) -> StoreResult<SyncReport> {
        self.set_stage(SyncStage::Idle);
        match result {
            Ok(ref report) if report.is_complete() => info!("{}", report),
            Ok(ref report) => warn!("{}", report),
            Err(ref e) => warn!("Sync failed: {}", e),
        }
        result
    }

    fn sync_local(&self, direction: SyncDirection, story: &Story) -> StoreResult<SyncReport> {
        self.set_stage(SyncStage::SyncStory);
        if story.is_own(&self.ctx.device) {
            self.ctx.local.stories.upsert(story)?;
        } else {
            self.ctx.local.cached_stories.upsert(story)?;
        }

        let mut report = SyncReport::new(direction, story.id);
        for chapter in story.chapters().values() {
            match self.sync_local_chapter(chapter) {
                Ok(pruned) => {
                    report.chapters_synced += 1;
                    report.media_pruned += pruned;
                }
                Err(e) => record_failure(&mut report, chapter.id, e.to_string()),
            }
        }
        Ok(report)
    }

    fn sync_local_chapter(&self, chapter: &Chapter) -> StoreResult<usize> {
        self.set_stage(SyncStage::SyncChapters);
        self.chapters.upsert(chapter)?;

        self.set_stage(SyncStage::SyncMedia);
        let mut fresh = HashSet::new();
        for media in chapter.media() {
            self.media.upsert(media)?;
            fresh.insert(media.id);
        }

        self.set_stage(SyncStage::SyncChoices);
        for choice in chapter.choices() {
            self.choices.upsert(choice)?;
        }

        self.set_stage(SyncStage::PruneStaleMedia);
        self.media.prune_chapter(chapter.id, &fresh)
    }

    async fn sync_remote(&self, story: &Story) -> StoreResult<SyncReport> {
        self.set_stage(SyncStage::SyncStory);
        self.ctx.remote.stories.upsert(story).await?;

        let mut report = SyncReport::new(SyncDirection::Publish, story.id);
        for chapter in story.chapters().values() {
            match self.sync_remote_chapter(chapter).await {
                Ok(pruned) => {
                    report.chapters_synced += 1;
                    report.media_pruned += pruned;
                }
                Err(e) => record_failure(&mut report, chapter.id, e.to_string()),
            }
        }
        Ok(report)
    }

    async fn sync_remote_chapter(&self, chapter: &Chapter) -> StoreResult<usize> {
        self.set_stage(SyncStage::SyncChapters);
        self.chapters.publish(chapter).await?;

        self.set_stage(SyncStage::SyncMedia);
        let mut fresh = HashSet::new();
        for media in chapter.media() {
            let encoded = self.media.encode(media)?;
            self.media.publish(&encoded).await?;
            fresh.insert(media.id);
        }

        self.set_stage(SyncStage::SyncChoices);
        for choice in chapter.choices() {
            self.choices.publish(choice).await?;
        }

        self.set_stage(SyncStage::PruneStaleMedia);
        self.media
            .prune_published_chapter(chapter.id, &fresh)
            .await
    }
}

fn record_failure(report: &mut SyncReport, chapter_id: Uuid, error: String) {
    debug!("Chapter {} failed to sync: {}", chapter_id, error);
    report.failures.push(ChapterFailure { chapter_id, error });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::SearchCriteria;
    use crate::identity::DeviceId;
    use crate::manager::testing::{context, snapshot};
    use crate::models::{Choice, Media, MediaData, MediaKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn own_story(ctx: &StoreContext) -> Story {
        let mut story = Story::new("Seven Bugs", "Shamalan", "scary story", &ctx.device);
        let mut c1 = Chapter::new(story.id, "intro");
        let c2 = Chapter::new(story.id, "the end");
        c1.add_choice(Choice::new(c1.id, c2.id, "pick me"));
        c1.add_media(Media::from_image(c1.id, MediaKind::Photo, b"photo"));
        c1.add_media(Media::from_image(c1.id, MediaKind::Illustration, b"drawing"));
        story.add_chapter(c1);
        story.add_chapter(c2);
        story
    }

    fn counts(ctx: &StoreContext) -> [usize; 5] {
        let all = SearchCriteria::new();
        [
            ctx.local.stories.retrieve(&all).unwrap().len(),
            ctx.local.cached_stories.retrieve(&all).unwrap().len(),
            ctx.local.chapters.retrieve(&all).unwrap().len(),
            ctx.local.choices.retrieve(&all).unwrap().len(),
            ctx.local.media.retrieve(&all).unwrap().len(),
        ]
    }

    #[test]
    fn test_save_writes_every_row() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let story = own_story(&ctx);

        let report = sync.save(&story).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.chapters_synced, 2);
        assert_eq!(counts(&ctx), [1, 0, 2, 1, 2]);
        for media in ctx.local.media.retrieve(&SearchCriteria::new()).unwrap() {
            assert!(media.path().unwrap().exists());
        }
        assert_eq!(sync.stage(), SyncStage::Idle);
    }

    #[test]
    fn test_save_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let story = own_story(&ctx);

        sync.save(&story).unwrap();
        let once = counts(&ctx);
        let report = sync.save(&story).unwrap();

        assert_eq!(counts(&ctx), once);
        assert_eq!(report.media_pruned, 0);
    }

    #[test]
    fn test_adopt_routes_foreign_story_to_cache() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let mut story = Story::new("Borrowed", "Someone", "d", &DeviceId::new("device-b"));
        story.add_chapter(Chapter::new(story.id, "hello"));

        let report = sync.adopt(&story).unwrap();

        assert_eq!(report.direction, SyncDirection::Adopt);
        assert_eq!(counts(&ctx), [0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_adopt_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let mut story = Story::new("Borrowed", "Someone", "d", &DeviceId::new("device-b"));
        let mut c1 = Chapter::new(story.id, "hello");
        let c2 = Chapter::new(story.id, "goodbye");
        c1.add_choice(Choice::new(c1.id, c2.id, "wave"));
        c1.add_media(Media::from_image(c1.id, MediaKind::Photo, b"sunset"));
        c1.add_media(Media::from_image(c1.id, MediaKind::Illustration, b"doodle"));
        story.add_chapter(c1);
        story.add_chapter(c2);

        sync.adopt(&story).unwrap();
        let once = snapshot(&ctx);
        let report = sync.adopt(&story).unwrap();

        assert!(report.is_complete());
        assert_eq!(report.media_pruned, 0);
        assert_eq!(snapshot(&ctx), once);
        assert_eq!(counts(&ctx), [0, 1, 2, 1, 2]);
    }

    #[test]
    fn test_stale_media_pruned() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));

        let mut story = Story::new("t", "a", "d", &ctx.device);
        let mut chapter = Chapter::new(story.id, "c");
        let a = Media::from_image(chapter.id, MediaKind::Photo, b"a");
        let b = Media::from_image(chapter.id, MediaKind::Photo, b"b");
        let c = Media::from_image(chapter.id, MediaKind::Illustration, b"c");
        chapter.add_media(a.clone());
        chapter.add_media(b.clone());
        story.add_chapter(chapter.clone());
        sync.save(&story).unwrap();

        // Incoming set {B, C}
        chapter.set_media(MediaKind::Photo, vec![b.clone()]);
        chapter.set_media(MediaKind::Illustration, vec![c.clone()]);
        story.add_chapter(chapter.clone());
        let report = sync.save(&story).unwrap();

        let mut stored: Vec<Uuid> = ctx
            .local
            .media
            .retrieve(&SearchCriteria::new())
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        stored.sort();
        let mut expected = vec![b.id, c.id];
        expected.sort();
        assert_eq!(stored, expected);
        assert_eq!(report.media_pruned, 1);
        assert!(!ctx.images.path_for(a.id).exists());
    }

    #[test]
    fn test_chapter_failure_does_not_stop_sync() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));

        let mut story = Story::new("t", "a", "d", &ctx.device);
        let mut broken = Chapter::new(story.id, "broken");
        broken.add_media(Media::new(
            broken.id,
            MediaKind::Photo,
            MediaData::Transport("%%% not base64".to_string()),
        ));
        let good = Chapter::new(story.id, "good");
        let broken_id = broken.id;
        story.add_chapter(broken);
        story.add_chapter(good.clone());

        let report = sync.save(&story).unwrap();

        assert_eq!(report.chapters_synced, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].chapter_id, broken_id);
        assert!(ctx.local.chapters.get(good.id).unwrap().is_some());
        // Steps before the failure stay applied
        assert!(ctx.local.chapters.get(broken_id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_publish_encodes_current_files() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let story = own_story(&ctx);
        sync.save(&story).unwrap();

        // Publish what is stored locally, after the photo file changed
        let stored = ctx.local.media.retrieve(&SearchCriteria::new()).unwrap();
        let photo = stored.iter().find(|m| m.kind == MediaKind::Photo).unwrap();
        std::fs::write(photo.path().unwrap(), b"edited").unwrap();

        let mut local = story.clone();
        for chapter in story.chapters().values() {
            let mut chapter = chapter.clone();
            chapter.map_media(|m| {
                if let Some(s) = stored.iter().find(|s| s.id == m.id) {
                    *m = s.clone();
                }
            });
            local.add_chapter(chapter);
        }

        let report = sync.publish(&local).await.unwrap();
        assert!(report.is_complete());

        let remote = ctx.remote.media.get(photo.id).await.unwrap().unwrap();
        assert_eq!(remote.data, MediaData::from_bytes(b"edited"));
        assert_eq!(ctx.remote().as_memory().unwrap().len("chapters"), 2);
        assert_eq!(ctx.remote().as_memory().unwrap().len("choices"), 1);
    }

    #[tokio::test]
    async fn test_publish_prunes_remote_media() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        let mut story = own_story(&ctx);
        sync.publish(&story).await.unwrap();
        assert_eq!(ctx.remote().as_memory().unwrap().len("media"), 2);

        let first = story.first_chapter_id().unwrap();
        let chapter = story.chapter_mut(first).unwrap();
        chapter.set_media(MediaKind::Illustration, Vec::new());

        let report = sync.publish(&story).await.unwrap();
        assert_eq!(report.media_pruned, 1);
        assert_eq!(ctx.remote().as_memory().unwrap().len("media"), 1);
    }

    #[tokio::test]
    async fn test_publish_story_failure_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));
        ctx.remote().as_memory().unwrap().set_offline(true);

        let err = sync.publish(&own_story(&ctx)).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(sync.stage(), SyncStage::Idle);
    }

    #[tokio::test]
    async fn test_missing_image_fails_only_its_chapter() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir, "device-a");
        let sync = Synchronizer::new(Arc::clone(&ctx));

        let mut story = Story::new("t", "a", "d", &ctx.device);
        let mut chapter = Chapter::new(story.id, "c");
        chapter.add_media(Media::new(
            chapter.id,
            MediaKind::Photo,
            MediaData::Local(PathBuf::from("/nonexistent/image.img")),
        ));
        story.add_chapter(chapter);
        story.add_chapter(Chapter::new(story.id, "fine"));

        let report = sync.spawn_publish(story).await.unwrap().unwrap();
        assert_eq!(report.chapters_synced, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0]
            .error
            .starts_with("Image conversion failed"));
    }

    #[test]
    fn test_stage_watch_starts_idle() {
        let temp_dir = TempDir::new().unwrap();
        let sync = Synchronizer::new(context(&temp_dir, "device-a"));
        let rx = sync.subscribe_stage();
        assert_eq!(*rx.borrow(), SyncStage::Idle);
    }
}
