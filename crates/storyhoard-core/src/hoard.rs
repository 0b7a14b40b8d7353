//! Composition root
//!
//! `Hoard` builds every store exactly once (local SQLite, remote server,
//! image files, device identity) and hands out managers that share them.
//!
//! ## Usage
//!
//! ```ignore
//! let hoard = Hoard::open()?;
//!
//! let story = Story::new("Seven Bugs", "Shamalan", "scary story", hoard.device());
//! hoard.stories().insert(&story)?;
//!
//! hoard.stories().publish(story.id).await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::Config;
use crate::identity::{DeviceId, Identity};
use crate::manager::{ChapterManager, ChoiceManager, MediaManager, StoreContext, StoryManager};
use crate::remote::RemoteStore;
use crate::storage::{schema, ImageStore, LocalStore, StoreResult};
use crate::sync::Synchronizer;

/// Row counts and settings, for status displays
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoardStatus {
    pub device_id: String,
    pub publishing_enabled: bool,
    pub own_stories: usize,
    pub cached_stories: usize,
    pub chapters: usize,
    pub choices: usize,
    pub media: usize,
}

/// The local story hoard and its connection to the server
pub struct Hoard {
    config: Config,
    local: Arc<LocalStore>,
    ctx: Arc<StoreContext>,
    stories: StoryManager,
    chapters: ChapterManager,
    choices: ChoiceManager,
    media: MediaManager,
    sync: Synchronizer,
}

impl Hoard {
    /// Open the hoard with the default configuration
    pub fn open() -> Result<Self> {
        let config = Config::load().context("Failed to load configuration")?;
        Self::open_with_config(config)
    }

    /// Open the hoard with a specific configuration
    ///
    /// On first run this creates the database and a device id.
    pub fn open_with_config(config: Config) -> Result<Self> {
        let local = LocalStore::open(&config).context("Failed to open SQLite database")?;
        let remote =
            RemoteStore::from_config(&config).context("Failed to set up the publishing server")?;
        let device = Identity::with_config(config.clone())
            .load_or_create()
            .context("Failed to load device id")?;
        let images = ImageStore::new(config.images_dir());

        Ok(Self::assemble(config, local, remote, images, device))
    }

    /// An in-memory hoard with an in-process server
    ///
    /// Image files still go to `data_dir`.
    pub fn in_memory(device: DeviceId, data_dir: &Path) -> Result<Self> {
        let config = Config {
            data_dir: data_dir.to_path_buf(),
            device_id: Some(device.to_string()),
            ..Config::default()
        };
        let local = LocalStore::open_in_memory().context("Failed to open in-memory database")?;
        let images = ImageStore::new(config.images_dir());

        Ok(Self::assemble(
            config,
            local,
            RemoteStore::memory(),
            images,
            device,
        ))
    }

    fn assemble(
        config: Config,
        local: LocalStore,
        remote: RemoteStore,
        images: ImageStore,
        device: DeviceId,
    ) -> Self {
        let local = Arc::new(local);
        let ctx = Arc::new(StoreContext::new(
            Arc::clone(&local),
            Arc::new(remote),
            images,
            device,
        ));
        let sync = Synchronizer::new(Arc::clone(&ctx));

        Self {
            config,
            local,
            stories: StoryManager::new(Arc::clone(&ctx), sync.clone()),
            chapters: ChapterManager::new(Arc::clone(&ctx)),
            choices: ChoiceManager::new(Arc::clone(&ctx)),
            media: MediaManager::new(Arc::clone(&ctx)),
            sync,
            ctx,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// This device's id; stories carrying it are "own"
    pub fn device(&self) -> &DeviceId {
        self.ctx.device()
    }

    pub fn remote(&self) -> &RemoteStore {
        self.ctx.remote()
    }

    pub fn stories(&self) -> &StoryManager {
        &self.stories
    }

    pub fn chapters(&self) -> &ChapterManager {
        &self.chapters
    }

    pub fn choices(&self) -> &ChoiceManager {
        &self.choices
    }

    pub fn media(&self) -> &MediaManager {
        &self.media
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn status(&self) -> StoreResult<HoardStatus> {
        Ok(HoardStatus {
            device_id: self.device().to_string(),
            publishing_enabled: self.remote().is_enabled(),
            own_stories: self.local.count(schema::STORIES)?,
            cached_stories: self.local.count(schema::CACHED_STORIES)?,
            chapters: self.local.count(schema::CHAPTERS)?,
            choices: self.local.count(schema::CHOICES)?,
            media: self.local.count(schema::MEDIA)?,
        })
    }
}
