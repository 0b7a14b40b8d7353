//! Storage layer
//!
//! Handles the local SQLite store and the image files behind media.
//!
//! ## Architecture
//!
//! - **SQLite**: one flat table per entity type, plus `cached_stories` for
//!   stories downloaded from the server
//! - **Images**: one file per media item; rows hold only the path

pub mod error;
pub mod images;
pub mod local;
pub mod schema;

pub use error::{StoreError, StoreResult};
pub use images::{atomic_write, ImageStore};
pub use local::{LocalAdapter, LocalStore, LocalTables, Record};
pub use schema::{init_schema, needs_init, SCHEMA_VERSION};
