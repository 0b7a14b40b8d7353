//! Story manager
//!
//! Stories authored on this device live in the own-stories table; stories
//! downloaded from the server live in the cache table. `StoryQuery::scope`
//! picks which side a query covers.
//!
//! Whole-aggregate operations (saving, caching, publishing) go through the
//! `Synchronizer`.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::models::{Criteria, EntityKind, Story, StoryQuery, StoryScope};
use crate::storage::{LocalAdapter, StoreError, StoreResult};
use crate::sync::{SyncReport, Synchronizer};

use super::{ChapterManager, StoreContext};

#[derive(Clone)]
pub struct StoryManager {
    ctx: Arc<StoreContext>,
    chapters: ChapterManager,
    sync: Synchronizer,
}

impl StoryManager {
    pub fn new(ctx: Arc<StoreContext>, sync: Synchronizer) -> Self {
        Self {
            chapters: ChapterManager::new(Arc::clone(&ctx)),
            ctx,
            sync,
        }
    }

    /// Own stories go to the own table, everything else to the cache
    fn table_for(&self, story: &Story) -> &LocalAdapter<Story> {
        if story.is_own(&self.ctx.device) {
            &self.ctx.local.stories
        } else {
            &self.ctx.local.cached_stories
        }
    }

    fn tables(&self, scope: StoryScope) -> Vec<&LocalAdapter<Story>> {
        match scope {
            StoryScope::Any => vec![&self.ctx.local.stories, &self.ctx.local.cached_stories],
            StoryScope::Own => vec![&self.ctx.local.stories],
            StoryScope::Cached => vec![&self.ctx.local.cached_stories],
        }
    }

    pub fn insert(&self, story: &Story) -> StoreResult<()> {
        self.table_for(story).insert(story)
    }

    pub fn update(&self, story: &Story) -> StoreResult<()> {
        self.table_for(story).update(story)
    }

    /// Story rows matching the query, own stories first
    pub fn retrieve(&self, query: &StoryQuery) -> StoreResult<Vec<Story>> {
        let criteria = query.search_criteria();
        let mut stories = Vec::new();
        for table in self.tables(query.scope) {
            stories.extend(table.retrieve(&criteria)?);
        }
        Ok(stories)
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<Story>> {
        Ok(self.retrieve(&StoryQuery::by_id(id))?.into_iter().next())
    }

    pub fn get_all(&self) -> StoreResult<Vec<Story>> {
        self.retrieve(&StoryQuery::all())
    }

    pub fn own_stories(&self) -> StoreResult<Vec<Story>> {
        self.retrieve(&StoryQuery::all().own())
    }

    pub fn cached_stories(&self) -> StoreResult<Vec<Story>> {
        self.retrieve(&StoryQuery::all().cached())
    }

    /// Own stories whose title contains every keyword in `title`
    pub fn search_own(&self, title: &str) -> StoreResult<Vec<Story>> {
        self.retrieve(&StoryQuery::titled(title).own())
    }

    /// Cached stories whose title contains every keyword in `title`
    pub fn search_cached(&self, title: &str) -> StoreResult<Vec<Story>> {
        self.retrieve(&StoryQuery::titled(title).cached())
    }

    /// A story with every chapter, choice and media item loaded
    ///
    /// Reads only; nothing is written back.
    pub fn get_full_story(&self, id: Uuid) -> StoreResult<Option<Story>> {
        let Some(mut story) = self.get(id)? else {
            return Ok(None);
        };
        for chapter in self.chapters.full_chapters_of_story(id)? {
            story.chapters.insert(chapter.id, chapter);
        }
        Ok(Some(story))
    }

    /// Delete a story and all of its chapters
    pub fn remove(&self, id: Uuid) -> StoreResult<()> {
        let table = self
            .tables(StoryScope::Any)
            .into_iter()
            .find_map(|table| match table.exists(id) {
                Ok(true) => Some(Ok(table)),
                Ok(false) => None,
                Err(e) => Some(Err(e)),
            })
            .transpose()?
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Story,
                id,
            })?;

        let chapters = self.chapters.remove_story_chapters(id)?;
        table.remove(id)?;
        info!("Removed story {} with {} chapters", id, chapters);
        Ok(())
    }

    /// Store an in-memory story aggregate, replacing what is stored
    pub fn save_full_story(&self, story: &Story) -> StoreResult<SyncReport> {
        self.sync.save(story)
    }

    // ==================== Server ====================

    /// Published stories whose title contains every keyword in `title`
    ///
    /// Empty when the server cannot be reached.
    pub async fn search_published(&self, title: &str) -> Vec<Story> {
        self.ctx
            .remote
            .stories
            .retrieve(&StoryQuery::titled(title).search_criteria())
            .await
    }

    /// Every published story
    pub async fn get_all_published(&self) -> Vec<Story> {
        self.ctx.remote.stories.retrieve(&SearchCriteria::new()).await
    }

    /// A published story with all chapters, choices and media
    ///
    /// Media comes back in transport form, ready to be cached.
    pub async fn get_published_story(&self, id: Uuid) -> StoreResult<Option<Story>> {
        let Some(mut story) = self.ctx.remote.stories.get(id).await? else {
            return Ok(None);
        };
        for chapter in self.chapters.published_chapters_of_story(id).await? {
            story.chapters.insert(chapter.id, chapter);
        }
        Ok(Some(story))
    }

    /// Download a published story into the local cache
    pub async fn cache(&self, id: Uuid) -> StoreResult<SyncReport> {
        let story = self
            .get_published_story(id)
            .await?
            .ok_or(StoreError::NotFound {
                kind: EntityKind::Story,
                id,
            })?;
        self.sync.adopt(&story)
    }

    /// Publish a locally stored story with everything in it
    pub async fn publish(&self, id: Uuid) -> StoreResult<SyncReport> {
        let story = self.get_full_story(id)?.ok_or(StoreError::NotFound {
            kind: EntityKind::Story,
            id,
        })?;
        self.sync.publish(&story).await
    }

    /// Remove a story and everything in it from the server
    pub async fn unpublish(&self, id: Uuid) -> StoreResult<()> {
        if self.ctx.remote.stories.get(id).await?.is_none() {
            return Err(StoreError::NotFound {
                kind: EntityKind::Story,
                id,
            });
        }
        for chapter in self.chapters.published_chapters_of_story(id).await? {
            self.chapters.unpublish(&chapter).await?;
        }
        self.ctx.remote.stories.remove(id).await?;
        info!("Unpublished story {}", id);
        Ok(())
    }
}
