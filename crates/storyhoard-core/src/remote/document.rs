//! Entity ↔ document translation for the remote store
//!
//! Documents are flat JSON objects using the shared field names. Media
//! documents carry the base64 image under `image` and never a path.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{fields, Chapter, Choice, EntityKind, Media, MediaData, MediaKind, Story};
use crate::storage::{StoreError, StoreResult};

pub const STORIES: &str = "stories";
pub const CHAPTERS: &str = "chapters";
pub const CHOICES: &str = "choices";
pub const MEDIA: &str = "media";

/// An entity stored as one document in a remote collection
pub trait Document: Sized {
    const KIND: EntityKind;
    const COLLECTION: &'static str;
    /// Field holding the document key
    const ID_FIELD: &'static str;

    fn id(&self) -> Uuid;

    fn to_document(&self) -> StoreResult<Value>;

    fn from_document(document: Value) -> StoreResult<Self>;
}

fn malformed(kind: EntityKind, error: serde_json::Error) -> StoreError {
    StoreError::Transport(format!("malformed {} document: {}", kind, error))
}

/// Serde-backed documents for entities whose fields map one to one
macro_rules! serde_document {
    ($ty:ty, $kind:expr, $collection:expr, $id_field:expr) => {
        impl Document for $ty {
            const KIND: EntityKind = $kind;
            const COLLECTION: &'static str = $collection;
            const ID_FIELD: &'static str = $id_field;

            fn id(&self) -> Uuid {
                self.id
            }

            fn to_document(&self) -> StoreResult<Value> {
                serde_json::to_value(self).map_err(|e| malformed(Self::KIND, e))
            }

            fn from_document(document: Value) -> StoreResult<Self> {
                serde_json::from_value(document).map_err(|e| malformed(Self::KIND, e))
            }
        }
    };
}

serde_document!(Story, EntityKind::Story, STORIES, fields::STORY_ID);
serde_document!(Chapter, EntityKind::Chapter, CHAPTERS, fields::CHAPTER_ID);
serde_document!(Choice, EntityKind::Choice, CHOICES, fields::CHOICE_ID);

/// Wire form of a media item
#[derive(Debug, Serialize, Deserialize)]
struct MediaDocument {
    media_id: Uuid,
    chapter_id: Uuid,
    kind: MediaKind,
    image: String,
}

impl Document for Media {
    const KIND: EntityKind = EntityKind::Media;
    const COLLECTION: &'static str = MEDIA;
    const ID_FIELD: &'static str = fields::MEDIA_ID;

    fn id(&self) -> Uuid {
        self.id
    }

    /// Only transport media can be sent; local paths never leave the device
    fn to_document(&self) -> StoreResult<Value> {
        let image = self.encoded().ok_or_else(|| StoreError::Conversion {
            id: self.id,
            details: "media must be encoded before it is sent".to_string(),
        })?;

        let document = MediaDocument {
            media_id: self.id,
            chapter_id: self.chapter_id,
            kind: self.kind,
            image: image.to_string(),
        };
        serde_json::to_value(document).map_err(|e| malformed(Self::KIND, e))
    }

    fn from_document(document: Value) -> StoreResult<Self> {
        let document: MediaDocument =
            serde_json::from_value(document).map_err(|e| malformed(Self::KIND, e))?;
        Ok(Media {
            id: document.media_id,
            chapter_id: document.chapter_id,
            kind: document.kind,
            data: MediaData::Transport(document.image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::DeviceId;
    use std::path::PathBuf;

    #[test]
    fn test_story_document_fields() {
        let mut story = Story::new("Seven Bugs", "Shamalan", "scary", &DeviceId::new("d1"));
        story.add_chapter(Chapter::new(story.id, "intro"));

        let doc = story.to_document().unwrap();
        assert_eq!(doc["story_id"], story.id.to_string());
        assert_eq!(doc["title"], "Seven Bugs");
        assert_eq!(doc["device_id"], "d1");
        assert!(doc.get("chapters").is_none());

        let back = Story::from_document(doc).unwrap();
        assert_eq!(back.id, story.id);
        assert_eq!(back.first_chapter_id(), story.first_chapter_id());
    }

    #[test]
    fn test_choice_document_fields() {
        let choice = Choice::dead_end(Uuid::new_v4(), "pick me");
        let doc = choice.to_document().unwrap();

        assert_eq!(doc["curr_chapter"], choice.from_chapter.to_string());
        assert!(doc["next_chapter"].is_null());
        assert_eq!(Choice::from_document(doc).unwrap(), choice);
    }

    #[test]
    fn test_media_document_carries_image() {
        let media = Media::from_image(Uuid::new_v4(), MediaKind::Illustration, b"\x89PNG");
        let doc = media.to_document().unwrap();

        assert_eq!(doc["image"], "iVBORw==");
        assert_eq!(doc["kind"], "illustration");
        assert!(doc.get("path").is_none());
        assert_eq!(Media::from_document(doc).unwrap(), media);
    }

    #[test]
    fn test_local_media_cannot_be_sent() {
        let media = Media::new(
            Uuid::new_v4(),
            MediaKind::Photo,
            MediaData::Local(PathBuf::from("/img/a.img")),
        );
        assert!(matches!(
            media.to_document(),
            Err(StoreError::Conversion { .. })
        ));
    }

    #[test]
    fn test_malformed_document_is_transport_error() {
        let err = Chapter::from_document(serde_json::json!({"chapter_id": "nope"})).unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("chapter"));
    }
}
