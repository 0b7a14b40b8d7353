//! Data models for StoryHoard
//!
//! A `Story` holds `Chapter`s; a chapter holds `Choice`s leading to other
//! chapters and `Media` (photos and illustrations). Every entity is stored
//! flat, by id, and reassembled by the managers.
//!
//! Each entity has a matching criteria type (`StoryQuery`, `ChapterQuery`,
//! `ChoiceQuery`, `MediaQuery`) whose unset fields mean "don't filter".

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::criteria::SearchCriteria;
use crate::identity::DeviceId;

/// Field names shared by local columns, remote documents and criteria
pub mod fields {
    pub const STORY_ID: &str = "story_id";
    pub const TITLE: &str = "title";
    pub const AUTHOR: &str = "author";
    pub const DESCRIPTION: &str = "description";
    pub const FIRST_CHAPTER: &str = "first_chapter";
    pub const DEVICE_ID: &str = "device_id";

    pub const CHAPTER_ID: &str = "chapter_id";
    pub const TEXT: &str = "text";
    pub const RANDOM_CHOICE: &str = "random_choice";

    pub const CHOICE_ID: &str = "choice_id";
    pub const CURR_CHAPTER: &str = "curr_chapter";
    pub const NEXT_CHAPTER: &str = "next_chapter";

    pub const MEDIA_ID: &str = "media_id";
    pub const KIND: &str = "kind";
    pub const PATH: &str = "path";
    pub const IMAGE: &str = "image";
}

/// Label given to the copy returned by a random choice pick
pub const RANDOM_CHOICE_LABEL: &str = "I'm feeling lucky...";

/// Entity types, used for error reporting and store routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Story,
    Chapter,
    Choice,
    Media,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Story => "story",
            Self::Chapter => "chapter",
            Self::Choice => "choice",
            Self::Media => "media",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Anything that can be flattened into search criteria
pub trait Criteria {
    fn search_criteria(&self) -> SearchCriteria;
}

// ==================== Story ====================

/// A branching story
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Story {
    #[serde(rename = "story_id")]
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Device that authored the story
    pub device_id: String,
    #[serde(rename = "first_chapter")]
    pub(crate) first_chapter_id: Option<Uuid>,
    /// Loaded lazily; empty unless the story was fetched in full
    #[serde(skip, default)]
    pub(crate) chapters: BTreeMap<Uuid, Chapter>,
}

impl Story {
    /// Author a new story on the given device
    pub fn new(
        title: impl Into<String>,
        author: impl Into<String>,
        description: impl Into<String>,
        device: &DeviceId,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into().trim().to_string(),
            author: author.into().trim().to_string(),
            description: description.into().trim().to_string(),
            device_id: device.to_string(),
            first_chapter_id: None,
            chapters: BTreeMap::new(),
        }
    }

    /// Whether this story was authored on `device`
    pub fn is_own(&self, device: &DeviceId) -> bool {
        self.device_id == device.as_str()
    }

    pub fn first_chapter_id(&self) -> Option<Uuid> {
        self.first_chapter_id
    }

    /// Chapters loaded into this story, keyed by id
    pub fn chapters(&self) -> &BTreeMap<Uuid, Chapter> {
        &self.chapters
    }

    pub fn chapter(&self, id: Uuid) -> Option<&Chapter> {
        self.chapters.get(&id)
    }

    pub fn chapter_mut(&mut self, id: Uuid) -> Option<&mut Chapter> {
        self.chapters.get_mut(&id)
    }

    /// Add a chapter; the first chapter ever added becomes the entry point
    ///
    /// Returns `true` if this chapter became the first chapter.
    pub fn add_chapter(&mut self, chapter: Chapter) -> bool {
        let is_first = self.first_chapter_id.is_none();
        if is_first {
            self.first_chapter_id = Some(chapter.id);
        }
        self.chapters.insert(chapter.id, chapter);
        is_first
    }

    /// Record the first chapter when the chapters live only in the store
    ///
    /// Has no effect once a first chapter is set.
    pub fn set_first_chapter_id(&mut self, id: Uuid) {
        if self.first_chapter_id.is_none() {
            self.first_chapter_id = Some(id);
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into().trim().to_string();
    }

    pub fn set_author(&mut self, author: impl Into<String>) {
        self.author = author.into().trim().to_string();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into().trim().to_string();
    }
}

/// Which local story space a query covers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StoryScope {
    /// Own and cached stories
    #[default]
    Any,
    /// Stories authored on this device
    Own,
    /// Stories cached from the server
    Cached,
}

/// Story search criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoryQuery {
    pub id: Option<Uuid>,
    /// Whitespace separated keywords, all of which must appear in the title
    pub title: Option<String>,
    pub device_id: Option<String>,
    pub scope: StoryScope,
}

impl StoryQuery {
    /// Every story, own and cached
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    /// Restrict to stories authored on this device
    pub fn own(mut self) -> Self {
        self.scope = StoryScope::Own;
        self
    }

    /// Restrict to stories cached from the server
    pub fn cached(mut self) -> Self {
        self.scope = StoryScope::Cached;
        self
    }

    pub fn from_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

impl Criteria for StoryQuery {
    fn search_criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new();
        criteria.exact_opt(fields::STORY_ID, self.id.as_ref());
        if let Some(ref title) = self.title {
            criteria.keywords(fields::TITLE, title);
        }
        criteria.exact_opt(fields::DEVICE_ID, self.device_id.as_ref());
        criteria
    }
}

impl From<&Story> for StoryQuery {
    fn from(story: &Story) -> Self {
        Self::by_id(story.id)
    }
}

// ==================== Chapter ====================

/// A page of a story, with the choices leading out of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    #[serde(rename = "chapter_id")]
    pub id: Uuid,
    story_id: Uuid,
    pub text: String,
    /// Pick a random choice at read time instead of showing all choices
    pub random_choice: bool,
    #[serde(skip, default)]
    pub(crate) choices: Vec<Choice>,
    #[serde(skip, default)]
    pub(crate) photos: Vec<Media>,
    #[serde(skip, default)]
    pub(crate) illustrations: Vec<Media>,
}

impl Chapter {
    /// Author a new chapter in a story
    pub fn new(story_id: Uuid, text: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), story_id, text)
    }

    /// Build a chapter with a known id (for loading from storage)
    pub fn with_id(id: Uuid, story_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            id,
            story_id,
            text: text.into(),
            random_choice: false,
            choices: Vec::new(),
            photos: Vec::new(),
            illustrations: Vec::new(),
        }
    }

    pub fn story_id(&self) -> Uuid {
        self.story_id
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn photos(&self) -> &[Media] {
        &self.photos
    }

    pub fn illustrations(&self) -> &[Media] {
        &self.illustrations
    }

    /// Photos followed by illustrations
    pub fn media(&self) -> impl Iterator<Item = &Media> {
        self.photos.iter().chain(self.illustrations.iter())
    }

    /// Add a choice, replacing any choice with the same id
    pub fn add_choice(&mut self, choice: Choice) {
        match self.choices.iter_mut().find(|c| c.id == choice.id) {
            Some(existing) => *existing = choice,
            None => self.choices.push(choice),
        }
    }

    /// Add media to the set matching its kind, replacing any with the same id
    pub fn add_media(&mut self, media: Media) {
        let set = match media.kind {
            MediaKind::Photo => &mut self.photos,
            MediaKind::Illustration => &mut self.illustrations,
        };
        match set.iter_mut().find(|m| m.id == media.id) {
            Some(existing) => *existing = media,
            None => set.push(media),
        }
    }

    pub fn set_choices(&mut self, choices: Vec<Choice>) {
        self.choices = choices;
    }

    /// Replace the media set of one kind
    pub fn set_media(&mut self, kind: MediaKind, media: Vec<Media>) {
        match kind {
            MediaKind::Photo => self.photos = media,
            MediaKind::Illustration => self.illustrations = media,
        }
    }

    /// Remove a media item from either set
    pub fn remove_media(&mut self, id: Uuid) -> bool {
        let before = self.photos.len() + self.illustrations.len();
        self.photos.retain(|m| m.id != id);
        self.illustrations.retain(|m| m.id != id);
        before != self.photos.len() + self.illustrations.len()
    }

    pub fn map_media<F>(&mut self, mut f: F)
    where
        F: FnMut(&mut Media),
    {
        self.photos.iter_mut().for_each(&mut f);
        self.illustrations.iter_mut().for_each(&mut f);
    }
}

/// Chapter search criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChapterQuery {
    pub id: Option<Uuid>,
    pub story_id: Option<Uuid>,
    pub random_choice: Option<bool>,
}

impl ChapterQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn in_story(story_id: Uuid) -> Self {
        Self {
            story_id: Some(story_id),
            ..Self::default()
        }
    }
}

impl Criteria for ChapterQuery {
    fn search_criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new();
        criteria.exact_opt(fields::CHAPTER_ID, self.id.as_ref());
        criteria.exact_opt(fields::STORY_ID, self.story_id.as_ref());
        criteria.exact_opt(fields::RANDOM_CHOICE, self.random_choice.as_ref());
        criteria
    }
}

impl From<&Chapter> for ChapterQuery {
    fn from(chapter: &Chapter) -> Self {
        Self::by_id(chapter.id)
    }
}

// ==================== Choice ====================

/// A link from one chapter to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    #[serde(rename = "choice_id")]
    pub id: Uuid,
    /// Chapter this choice is shown in
    #[serde(rename = "curr_chapter")]
    pub from_chapter: Uuid,
    /// Chapter this choice leads to; `None` until linked
    #[serde(rename = "next_chapter")]
    pub to_chapter: Option<Uuid>,
    pub text: String,
}

impl Choice {
    pub fn new(from_chapter: Uuid, to_chapter: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_chapter,
            to_chapter: Some(to_chapter),
            text: text.into(),
        }
    }

    /// A choice whose destination chapter is not written yet
    pub fn dead_end(from_chapter: Uuid, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_chapter,
            to_chapter: None,
            text: text.into(),
        }
    }

    pub fn link_to(&mut self, chapter: Uuid) {
        self.to_chapter = Some(chapter);
    }
}

/// Choice search criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceQuery {
    pub id: Option<Uuid>,
    pub from_chapter: Option<Uuid>,
}

impl ChoiceQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn from_chapter(chapter_id: Uuid) -> Self {
        Self {
            from_chapter: Some(chapter_id),
            ..Self::default()
        }
    }
}

impl Criteria for ChoiceQuery {
    fn search_criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new();
        criteria.exact_opt(fields::CHOICE_ID, self.id.as_ref());
        criteria.exact_opt(fields::CURR_CHAPTER, self.from_chapter.as_ref());
        criteria
    }
}

impl From<&Choice> for ChoiceQuery {
    fn from(choice: &Choice) -> Self {
        Self::by_id(choice.id)
    }
}

// ==================== Media ====================

/// Media classification within a chapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Photo,
    Illustration,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Illustration => "illustration",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(Self::Photo),
            "illustration" => Some(Self::Illustration),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a media item's pixels currently live
///
/// Locally the file path is canonical. The base64 form only exists while
/// the media travels to or from the server and is never stored locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaData {
    Local(PathBuf),
    Transport(String),
}

impl MediaData {
    /// Encode raw image bytes for transport
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::Transport(STANDARD.encode(bytes))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

/// An image attached to a chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub kind: MediaKind,
    pub data: MediaData,
}

impl Media {
    pub fn new(chapter_id: Uuid, kind: MediaKind, data: MediaData) -> Self {
        Self {
            id: Uuid::new_v4(),
            chapter_id,
            kind,
            data,
        }
    }

    /// New media from raw image bytes; the manager writes them to disk on insert
    pub fn from_image(chapter_id: Uuid, kind: MediaKind, bytes: &[u8]) -> Self {
        Self::new(chapter_id, kind, MediaData::from_bytes(bytes))
    }

    pub fn path(&self) -> Option<&Path> {
        match self.data {
            MediaData::Local(ref path) => Some(path),
            MediaData::Transport(_) => None,
        }
    }

    pub fn encoded(&self) -> Option<&str> {
        match self.data {
            MediaData::Transport(ref s) => Some(s),
            MediaData::Local(_) => None,
        }
    }
}

/// Media search criteria
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaQuery {
    pub id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
    pub kind: Option<MediaKind>,
}

impl MediaQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn in_chapter(chapter_id: Uuid) -> Self {
        Self {
            chapter_id: Some(chapter_id),
            ..Self::default()
        }
    }

    pub fn of_kind(mut self, kind: MediaKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

impl Criteria for MediaQuery {
    fn search_criteria(&self) -> SearchCriteria {
        let mut criteria = SearchCriteria::new();
        criteria.exact_opt(fields::MEDIA_ID, self.id.as_ref());
        criteria.exact_opt(fields::CHAPTER_ID, self.chapter_id.as_ref());
        criteria.exact_opt(fields::KIND, self.kind.as_ref());
        criteria
    }
}

impl From<&Media> for MediaQuery {
    fn from(media: &Media) -> Self {
        Self::by_id(media.id)
    }
}
