//! Sync progress and outcome

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

/// Where a story aggregate is being synced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Server copy into the local cache
    Adopt,
    /// In-memory aggregate into the local store
    Save,
    /// Local aggregate onto the server
    Publish,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adopt => "adopt",
            Self::Save => "save",
            Self::Publish => "publish",
        })
    }
}

/// Current step of a sync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncStage {
    #[default]
    Idle,
    SyncStory,
    SyncChapters,
    SyncMedia,
    SyncChoices,
    PruneStaleMedia,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::SyncStory => "syncing story",
            Self::SyncChapters => "syncing chapters",
            Self::SyncMedia => "syncing media",
            Self::SyncChoices => "syncing choices",
            Self::PruneStaleMedia => "pruning stale media",
        })
    }
}

/// A chapter whose sync stopped part way
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterFailure {
    pub chapter_id: Uuid,
    pub error: String,
}

/// Outcome of syncing one story aggregate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub direction: SyncDirection,
    pub story_id: Uuid,
    pub chapters_synced: usize,
    pub media_pruned: usize,
    pub failures: Vec<ChapterFailure>,
}

impl SyncReport {
    pub(crate) fn new(direction: SyncDirection, story_id: Uuid) -> Self {
        Self {
            direction,
            story_id,
            chapters_synced: 0,
            media_pruned: 0,
            failures: Vec::new(),
        }
    }

    /// Whether every chapter made it
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of story {}: {} chapter(s) synced",
            self.direction, self.story_id, self.chapters_synced
        )?;
        if self.media_pruned > 0 {
            write!(f, ", {} stale media removed", self.media_pruned)?;
        }
        if !self.failures.is_empty() {
            write!(f, ", {} chapter(s) failed", self.failures.len())?;
        }
        Ok(())
    }
}
