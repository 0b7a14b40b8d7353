//! Story synchronization
//!
//! Moves a whole story aggregate (story, chapters, choices, media) in one
//! of three directions:
//!
//! - **adopt**: a story downloaded from the server into the local cache
//! - **save**: an in-memory aggregate into the local store
//! - **publish**: a local aggregate onto the server
//!
//! Per chapter the order is: chapter row, media, choices, then pruning of
//! media that is stored for the chapter but absent from the synced set.

mod report;
mod synchronizer;

pub use report::{ChapterFailure, SyncDirection, SyncReport, SyncStage};
pub use synchronizer::Synchronizer;
