//! Chapter manager
//!
//! Owns the chapter → choices/media relationship: full chapters are
//! assembled from the child tables, and removing a chapter removes its
//! children first.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::models::{Chapter, ChapterQuery, Criteria, EntityKind, MediaKind, Story};
use crate::storage::{LocalAdapter, StoreError, StoreResult};

use super::{ChoiceManager, MediaManager, StoreContext};

#[derive(Clone)]
pub struct ChapterManager {
    ctx: Arc<StoreContext>,
    choices: ChoiceManager,
    media: MediaManager,
}

impl ChapterManager {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self {
            choices: ChoiceManager::new(Arc::clone(&ctx)),
            media: MediaManager::new(Arc::clone(&ctx)),
            ctx,
        }
    }

    /// Store a new chapter row in a stored story
    ///
    /// If the story has no first chapter yet, this chapter becomes it.
    pub fn insert(&self, chapter: &Chapter) -> StoreResult<()> {
        self.ctx.require_story(chapter.story_id())?;
        self.ctx.local.chapters.insert(chapter)?;
        self.claim_first_chapter(chapter)
    }

    /// Replace a chapter's text and settings
    ///
    /// A chapter stays in the story it was created in.
    pub fn update(&self, chapter: &Chapter) -> StoreResult<()> {
        let stored = self.get(chapter.id)?.ok_or(StoreError::NotFound {
            kind: EntityKind::Chapter,
            id: chapter.id,
        })?;
        if stored.story_id() != chapter.story_id() {
            return Err(StoreError::ParentChanged {
                kind: EntityKind::Chapter,
                id: chapter.id,
                parent: EntityKind::Story,
            });
        }
        self.ctx.local.chapters.update(chapter)
    }

    pub(crate) fn upsert(&self, chapter: &Chapter) -> StoreResult<()> {
        self.ctx.local.chapters.upsert(chapter)
    }

    /// Flat chapter rows; use `get_full_chapter` for choices and media
    pub fn retrieve(&self, query: &ChapterQuery) -> StoreResult<Vec<Chapter>> {
        self.ctx.local.chapters.retrieve(&query.search_criteria())
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<Chapter>> {
        self.ctx.local.chapters.get(id)
    }

    pub fn get_all(&self) -> StoreResult<Vec<Chapter>> {
        self.ctx.local.chapters.retrieve(&SearchCriteria::new())
    }

    pub fn chapters_of_story(&self, story_id: Uuid) -> StoreResult<Vec<Chapter>> {
        self.retrieve(&ChapterQuery::in_story(story_id))
    }

    /// A chapter with its choices, photos and illustrations loaded
    pub fn get_full_chapter(&self, id: Uuid) -> StoreResult<Option<Chapter>> {
        let Some(chapter) = self.get(id)? else {
            return Ok(None);
        };
        self.load_children(chapter).map(Some)
    }

    /// Every chapter of a story, fully loaded
    pub(crate) fn full_chapters_of_story(&self, story_id: Uuid) -> StoreResult<Vec<Chapter>> {
        self.chapters_of_story(story_id)?
            .into_iter()
            .map(|chapter| self.load_children(chapter))
            .collect()
    }

    fn load_children(&self, mut chapter: Chapter) -> StoreResult<Chapter> {
        chapter.set_choices(self.choices.choices_of_chapter(chapter.id)?);
        chapter.set_media(MediaKind::Photo, self.media.photos_of_chapter(chapter.id)?);
        chapter.set_media(
            MediaKind::Illustration,
            self.media.illustrations_of_chapter(chapter.id)?,
        );
        Ok(chapter)
    }

    /// Delete a chapter along with its choices and media
    pub fn remove(&self, id: Uuid) -> StoreResult<()> {
        if !self.ctx.local.chapters.exists(id)? {
            return Err(StoreError::NotFound {
                kind: EntityKind::Chapter,
                id,
            });
        }

        let choices = self.choices.remove_chapter_choices(id)?;
        let media = self.media.remove_chapter_media(id)?;
        self.ctx.local.chapters.remove(id)?;
        debug!(
            "Removed chapter {} with {} choices and {} media",
            id, choices, media
        );
        Ok(())
    }

    /// Delete every chapter of a story, returning how many went
    pub(crate) fn remove_story_chapters(&self, story_id: Uuid) -> StoreResult<usize> {
        let chapters = self.chapters_of_story(story_id)?;
        for chapter in &chapters {
            self.remove(chapter.id)?;
        }
        Ok(chapters.len())
    }

    fn claim_first_chapter(&self, chapter: &Chapter) -> StoreResult<()> {
        let tables: [&LocalAdapter<Story>; 2] =
            [&self.ctx.local.stories, &self.ctx.local.cached_stories];
        for table in tables {
            if let Some(mut story) = table.get(chapter.story_id())? {
                if story.first_chapter_id().is_none() {
                    story.set_first_chapter_id(chapter.id);
                    table.update(&story)?;
                }
                break;
            }
        }
        Ok(())
    }

    pub(crate) async fn publish(&self, chapter: &Chapter) -> StoreResult<()> {
        self.ctx.remote.chapters.upsert(chapter).await
    }

    /// Published chapters of a story, with choices and transport media
    pub(crate) async fn published_chapters_of_story(
        &self,
        story_id: Uuid,
    ) -> StoreResult<Vec<Chapter>> {
        let chapters = self
            .ctx
            .remote
            .chapters
            .try_retrieve(&ChapterQuery::in_story(story_id).search_criteria())
            .await?;

        let mut full = Vec::with_capacity(chapters.len());
        for mut chapter in chapters {
            chapter.set_choices(self.choices.published_of_chapter(chapter.id).await?);
            for media in self.media.published_of_chapter(chapter.id).await? {
                chapter.add_media(media);
            }
            full.push(chapter);
        }
        Ok(full)
    }

    /// Remove a published chapter with its choices and media
    pub(crate) async fn unpublish(&self, chapter: &Chapter) -> StoreResult<()> {
        for choice in self.choices.published_of_chapter(chapter.id).await? {
            self.ctx.remote.choices.remove(choice.id).await?;
        }
        for media in self.media.published_of_chapter(chapter.id).await? {
            self.ctx.remote.media.remove(media.id).await?;
        }
        self.ctx.remote.chapters.remove(chapter.id).await
    }
}
