//! StoryHoard Core Library
//!
//! This crate provides storage and synchronization for StoryHoard, an app
//! for writing and reading branching, choice-driven stories.
//!
//! # Architecture
//!
//! - **SQLite**: stories authored on this device, plus cached copies of
//!   stories downloaded from the server
//! - **Server**: an indexed document store where stories are published
//! - **Images**: media files on disk; base64 only while in transit
//!
//! Managers give feature code one CRUD and search façade per entity type.
//! The synchronizer moves whole stories between the local store and the
//! server.
//!
//! # Quick Start
//!
//! ```text
//! let hoard = Hoard::open()?;
//!
//! let story = Story::new("Seven Bugs", "Shamalan", "scary story", hoard.device());
//! hoard.stories().insert(&story)?;
//!
//! let intro = Chapter::new(story.id, "intro");
//! hoard.chapters().insert(&intro)?;
//!
//! hoard.stories().publish(story.id).await?;
//! ```
//!
//! # Modules
//!
//! - `hoard`: composition root (main entry point)
//! - `models`: stories, chapters, choices, media and their queries
//! - `criteria`: search criteria shared by both stores
//! - `manager`: per-entity managers
//! - `sync`: story synchronization
//! - `storage`: SQLite store and image files
//! - `remote`: server document store
//! - `identity`: device id
//! - `config`: application configuration

pub mod config;
pub mod criteria;
pub mod hoard;
pub mod identity;
pub mod manager;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use criteria::SearchCriteria;
pub use hoard::{Hoard, HoardStatus};
pub use identity::{DeviceId, Identity};
pub use manager::{ChapterManager, ChoiceManager, MediaManager, StoryManager};
pub use models::{
    Chapter, ChapterQuery, Choice, ChoiceQuery, Media, MediaData, MediaKind, MediaQuery, Story,
    StoryQuery, StoryScope,
};
pub use remote::RemoteStore;
pub use storage::{StoreError, StoreResult};
pub use sync::{SyncReport, SyncStage, Synchronizer};
