//! Per-entity managers
//!
//! The entry point for feature code. Each manager wraps the adapters for one
//! entity type, keeps parent/child rows consistent (cascading deletes,
//! first-chapter bookkeeping) and assembles aggregates from flat rows.
//!
//! Managers are cheap to clone; all of them share one `StoreContext`.

mod chapter;
mod choice;
mod media;
mod story;

use std::sync::Arc;

use uuid::Uuid;

use crate::identity::DeviceId;
use crate::models::EntityKind;
use crate::remote::{RemoteStore, RemoteTables};
use crate::storage::{ImageStore, LocalStore, LocalTables, StoreError, StoreResult};

pub use chapter::ChapterManager;
pub use choice::ChoiceManager;
pub use media::MediaManager;
pub use story::StoryManager;

/// The stores every manager works against
pub struct StoreContext {
    pub(crate) local: LocalTables,
    pub(crate) remote: RemoteTables,
    pub(crate) images: ImageStore,
    pub(crate) device: DeviceId,
}

impl StoreContext {
    pub fn new(
        local: Arc<LocalStore>,
        remote: Arc<RemoteStore>,
        images: ImageStore,
        device: DeviceId,
    ) -> Self {
        Self {
            local: LocalTables::new(local),
            remote: RemoteTables::new(remote),
            images,
            device,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    pub fn remote(&self) -> &RemoteStore {
        self.remote.store()
    }

    /// `NotFound` unless the story is stored, own or cached
    pub(crate) fn require_story(&self, id: Uuid) -> StoreResult<()> {
        if self.local.stories.exists(id)? || self.local.cached_stories.exists(id)? {
            return Ok(());
        }
        Err(StoreError::NotFound {
            kind: EntityKind::Story,
            id,
        })
    }

    /// `NotFound` unless the chapter is stored
    pub(crate) fn require_chapter(&self, id: Uuid) -> StoreResult<()> {
        if self.local.chapters.exists(id)? {
            return Ok(());
        }
        Err(StoreError::NotFound {
            kind: EntityKind::Chapter,
            id,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::criteria::SearchCriteria;
    use crate::models::{Chapter, Choice, Media, Story};
    use tempfile::TempDir;

    /// In-memory SQLite, in-memory remote, images under a temp dir
    pub(crate) fn context(temp_dir: &TempDir, device: &str) -> Arc<StoreContext> {
        Arc::new(StoreContext::new(
            Arc::new(LocalStore::open_in_memory().unwrap()),
            Arc::new(RemoteStore::memory()),
            ImageStore::new(temp_dir.path().join("images")),
            DeviceId::new(device),
        ))
    }

    /// Store an own story with one chapter row, returning the chapter id
    pub(crate) fn seed_chapter(ctx: &StoreContext) -> Uuid {
        let story = Story::new("seed", "a", "d", &ctx.device);
        ctx.local.stories.insert(&story).unwrap();
        seed_chapter_in(ctx, story.id)
    }

    /// Store a chapter row in an existing story
    pub(crate) fn seed_chapter_in(ctx: &StoreContext, story_id: Uuid) -> Uuid {
        let chapter = Chapter::new(story_id, "seed");
        ctx.local.chapters.insert(&chapter).unwrap();
        chapter.id
    }

    /// Every stored row plus the bytes of every media file
    #[derive(Debug, PartialEq)]
    pub(crate) struct Snapshot {
        stories: Vec<Story>,
        cached_stories: Vec<Story>,
        chapters: Vec<Chapter>,
        choices: Vec<Choice>,
        media: Vec<Media>,
        images: Vec<Vec<u8>>,
    }

    pub(crate) fn snapshot(ctx: &StoreContext) -> Snapshot {
        let all = SearchCriteria::new();
        let media = ctx.local.media.retrieve(&all).unwrap();
        let images = media
            .iter()
            .map(|m| std::fs::read(m.path().unwrap()).unwrap())
            .collect();
        Snapshot {
            stories: ctx.local.stories.retrieve(&all).unwrap(),
            cached_stories: ctx.local.cached_stories.retrieve(&all).unwrap(),
            chapters: ctx.local.chapters.retrieve(&all).unwrap(),
            choices: ctx.local.choices.retrieve(&all).unwrap(),
            media,
            images,
        }
    }
}
