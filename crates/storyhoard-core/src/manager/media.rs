//! Media manager
//!
//! Locally a media row holds only a path into the image store. Inserting
//! media writes its image there first, whether it arrives as base64 or as a
//! file elsewhere; removing media deletes the stored copy.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::models::{Criteria, EntityKind, Media, MediaKind, MediaQuery};
use crate::storage::{StoreError, StoreResult};

use super::StoreContext;

#[derive(Clone)]
pub struct MediaManager {
    ctx: Arc<StoreContext>,
}

impl MediaManager {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    /// Store new media of a stored chapter, copying its image into the store
    ///
    /// Returns the media as stored, with a path derived from its id.
    pub fn insert(&self, media: &Media) -> StoreResult<Media> {
        self.ctx.require_chapter(media.chapter_id)?;
        if self.ctx.local.media.exists(media.id)? {
            return Err(StoreError::DuplicateKey {
                kind: EntityKind::Media,
                id: media.id,
            });
        }
        let local = self.ctx.images.localize(media)?;
        self.ctx.local.media.insert(&local)?;
        Ok(local)
    }

    /// Replace stored media, copying its image into the store if needed
    pub fn update(&self, media: &Media) -> StoreResult<Media> {
        self.ctx.require_chapter(media.chapter_id)?;
        if !self.ctx.local.media.exists(media.id)? {
            return Err(StoreError::NotFound {
                kind: EntityKind::Media,
                id: media.id,
            });
        }
        let local = self.ctx.images.localize(media)?;
        self.ctx.local.media.update(&local)?;
        Ok(local)
    }

    pub(crate) fn upsert(&self, media: &Media) -> StoreResult<Media> {
        let local = self.ctx.images.localize(media)?;
        self.ctx.local.media.upsert(&local)?;
        Ok(local)
    }

    pub fn retrieve(&self, query: &MediaQuery) -> StoreResult<Vec<Media>> {
        self.ctx.local.media.retrieve(&query.search_criteria())
    }

    pub fn get(&self, id: Uuid) -> StoreResult<Option<Media>> {
        self.ctx.local.media.get(id)
    }

    pub fn get_all(&self) -> StoreResult<Vec<Media>> {
        self.ctx.local.media.retrieve(&SearchCriteria::new())
    }

    pub fn photos_of_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Media>> {
        self.retrieve(&MediaQuery::in_chapter(chapter_id).of_kind(MediaKind::Photo))
    }

    pub fn illustrations_of_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Media>> {
        self.retrieve(&MediaQuery::in_chapter(chapter_id).of_kind(MediaKind::Illustration))
    }

    /// Delete media and its image file
    pub fn remove(&self, id: Uuid) -> StoreResult<()> {
        let media = self.get(id)?.ok_or(StoreError::NotFound {
            kind: EntityKind::Media,
            id,
        })?;
        self.ctx.local.media.remove(id)?;
        self.delete_file(&media);
        Ok(())
    }

    /// Delete every media item of a chapter, returning how many went
    pub(crate) fn remove_chapter_media(&self, chapter_id: Uuid) -> StoreResult<usize> {
        let media = self.retrieve(&MediaQuery::in_chapter(chapter_id))?;
        for item in &media {
            self.remove(item.id)?;
        }
        Ok(media.len())
    }

    /// Delete a chapter's media that is not in `keep`
    pub fn prune_chapter(&self, chapter_id: Uuid, keep: &HashSet<Uuid>) -> StoreResult<usize> {
        let mut pruned = 0;
        for media in self.retrieve(&MediaQuery::in_chapter(chapter_id))? {
            if !keep.contains(&media.id) {
                self.remove(media.id)?;
                pruned += 1;
            }
        }
        if pruned > 0 {
            debug!("Pruned {} stale media from chapter {}", pruned, chapter_id);
        }
        Ok(pruned)
    }

    /// Encode media for transport from its current image file
    pub fn encode(&self, media: &Media) -> StoreResult<Media> {
        self.ctx.images.encode(media)
    }

    /// Publish encoded media
    pub(crate) async fn publish(&self, media: &Media) -> StoreResult<()> {
        self.ctx.remote.media.upsert(media).await
    }

    /// Delete published media of a chapter that is not in `keep`
    pub(crate) async fn prune_published_chapter(
        &self,
        chapter_id: Uuid,
        keep: &HashSet<Uuid>,
    ) -> StoreResult<usize> {
        let published = self
            .ctx
            .remote
            .media
            .try_retrieve(&MediaQuery::in_chapter(chapter_id).search_criteria())
            .await?;

        let mut pruned = 0;
        for media in published {
            if !keep.contains(&media.id) {
                self.ctx.remote.media.remove(media.id).await?;
                pruned += 1;
            }
        }
        Ok(pruned)
    }

    /// Published media of a chapter, still in transport form
    pub(crate) async fn published_of_chapter(&self, chapter_id: Uuid) -> StoreResult<Vec<Media>> {
        self.ctx
            .remote
            .media
            .try_retrieve(&MediaQuery::in_chapter(chapter_id).search_criteria())
            .await
    }

    fn delete_file(&self, media: &Media) {
        let Some(path) = media.path() else {
            return;
        };
        // The row is already gone; a leftover file is only wasted space
        if let Err(e) = self.ctx.images.delete(path) {
            warn!("Failed to delete image {:?} of media {}: {}", path, media.id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::testing::{context, seed_chapter};
    use crate::models::MediaData;
    use std::fs;
    use tempfile::TempDir;

    fn manager(temp_dir: &TempDir) -> MediaManager {
        MediaManager::new(context(temp_dir, "device-a"))
    }

    #[test]
    fn test_insert_needs_stored_chapter() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let orphan = Media::from_image(Uuid::new_v4(), MediaKind::Photo, b"x");

        assert!(matches!(
            media.insert(&orphan),
            Err(StoreError::NotFound { kind: EntityKind::Chapter, .. })
        ));
        assert!(media.get_all().unwrap().is_empty());
        assert!(!media.ctx.images.path_for(orphan.id).exists());
    }

    #[test]
    fn test_insert_writes_image_and_stores_path() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let chapter = seed_chapter(&media.ctx);
        let photo = Media::from_image(chapter, MediaKind::Photo, b"\x89PNG");

        let stored = media.insert(&photo).unwrap();

        let path = stored.path().unwrap();
        assert_eq!(fs::read(path).unwrap(), b"\x89PNG");
        assert_eq!(media.get(photo.id).unwrap(), Some(stored.clone()));
        assert_eq!(
            media.retrieve(&MediaQuery::from(&photo)).unwrap(),
            vec![stored]
        );
    }

    #[test]
    fn test_insert_duplicate_keeps_original_image() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let photo = Media::from_image(seed_chapter(&media.ctx), MediaKind::Photo, b"first");
        let stored = media.insert(&photo).unwrap();

        let again = Media {
            data: MediaData::from_bytes(b"second"),
            ..photo.clone()
        };
        assert!(matches!(
            media.insert(&again),
            Err(StoreError::DuplicateKey { .. })
        ));
        assert_eq!(fs::read(stored.path().unwrap()).unwrap(), b"first");
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let photo = Media::from_image(seed_chapter(&media.ctx), MediaKind::Photo, b"x");

        assert!(matches!(
            media.update(&photo),
            Err(StoreError::NotFound { kind: EntityKind::Media, .. })
        ));
        assert!(!media.ctx.images.path_for(photo.id).exists());
    }

    #[test]
    fn test_insert_copies_user_file_into_store() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let holiday = temp_dir.path().join("my_holiday.png");
        fs::write(&holiday, b"\x89PNG beach").unwrap();
        let photo = Media::new(
            seed_chapter(&media.ctx),
            MediaKind::Photo,
            MediaData::Local(holiday.clone()),
        );

        let stored = media.insert(&photo).unwrap();
        assert_eq!(
            stored.path(),
            Some(media.ctx.images.path_for(photo.id).as_path())
        );
        assert_eq!(fs::read(stored.path().unwrap()).unwrap(), b"\x89PNG beach");

        media.remove(photo.id).unwrap();
        assert!(!media.ctx.images.path_for(photo.id).exists());
        assert_eq!(fs::read(&holiday).unwrap(), b"\x89PNG beach");
    }

    #[test]
    fn test_split_by_kind() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let chapter = seed_chapter(&media.ctx);
        let photo = media
            .insert(&Media::from_image(chapter, MediaKind::Photo, b"p"))
            .unwrap();
        let ill = media
            .insert(&Media::from_image(chapter, MediaKind::Illustration, b"i"))
            .unwrap();

        assert_eq!(media.photos_of_chapter(chapter).unwrap(), vec![photo]);
        assert_eq!(media.illustrations_of_chapter(chapter).unwrap(), vec![ill]);
        assert_eq!(media.get_all().unwrap().len(), 2);
    }

    #[test]
    fn test_remove_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let stored = media
            .insert(&Media::from_image(seed_chapter(&media.ctx), MediaKind::Photo, b"p"))
            .unwrap();
        let path = stored.path().unwrap().to_path_buf();

        media.remove(stored.id).unwrap();

        assert!(!path.exists());
        assert!(media.get(stored.id).unwrap().is_none());
        assert!(matches!(
            media.remove(stored.id),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn test_prune_keeps_fresh_set() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let chapter = seed_chapter(&media.ctx);
        let a = media
            .insert(&Media::from_image(chapter, MediaKind::Photo, b"a"))
            .unwrap();
        let b = media
            .insert(&Media::from_image(chapter, MediaKind::Illustration, b"b"))
            .unwrap();
        let elsewhere = media
            .insert(&Media::from_image(seed_chapter(&media.ctx), MediaKind::Photo, b"z"))
            .unwrap();

        let keep: HashSet<Uuid> = [b.id].into_iter().collect();
        assert_eq!(media.prune_chapter(chapter, &keep).unwrap(), 1);

        assert!(media.get(a.id).unwrap().is_none());
        assert!(!a.path().unwrap().exists());
        assert!(media.get(b.id).unwrap().is_some());
        assert!(media.get(elsewhere.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_prune_published_chapter() {
        let temp_dir = TempDir::new().unwrap();
        let media = manager(&temp_dir);
        let chapter = Uuid::new_v4();
        let a = Media::from_image(chapter, MediaKind::Photo, b"a");
        let b = Media::from_image(chapter, MediaKind::Photo, b"b");
        media.publish(&a).await.unwrap();
        media.publish(&b).await.unwrap();

        let keep: HashSet<Uuid> = [b.id].into_iter().collect();
        assert_eq!(media.prune_published_chapter(chapter, &keep).await.unwrap(), 1);

        let left = media.published_of_chapter(chapter).await.unwrap();
        assert_eq!(left, vec![b]);
    }
}
