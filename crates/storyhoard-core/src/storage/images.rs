//! Image files backing media records
//!
//! Media rows store only a path. The pixels live in
//! `{data_dir}/images/{media_id}.img`, written atomically so a crash never
//! leaves a half-written image behind.
//!
//! `localize` and `encode` convert between the two `MediaData`
//! representations: base64 for transport, a file path for local storage.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Media, MediaData};
use crate::storage::error::{StoreError, StoreResult};

/// Extension of stored image files
const IMAGE_EXTENSION: &str = "img";

/// Filesystem store for media image bytes
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the image for a media id is kept
    pub fn path_for(&self, media_id: Uuid) -> PathBuf {
        self.dir
            .join(format!("{}.{}", media_id, IMAGE_EXTENSION))
    }

    /// Write image bytes for a media id, replacing any previous image
    pub fn save(&self, media_id: Uuid, bytes: &[u8]) -> StoreResult<PathBuf> {
        let path = self.path_for(media_id);
        atomic_write(&path, bytes)?;
        debug!("Saved image {:?} ({} bytes)", path, bytes.len());
        Ok(path)
    }

    pub fn read(&self, path: &Path) -> StoreResult<Vec<u8>> {
        fs::read(path).map_err(|e| StoreError::from_io_read(e, path.to_path_buf()))
    }

    /// Whether `path` lies inside this store's directory
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.dir)
    }

    /// Delete an image file kept by this store
    ///
    /// Returns `false` if there was nothing to delete. Paths outside the
    /// store are never touched.
    pub fn delete(&self, path: &Path) -> StoreResult<bool> {
        if !self.contains(path) {
            warn!("Refusing to delete {:?} outside {:?}", path, self.dir);
            return Ok(false);
        }
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::from_io(e, path.to_path_buf())),
        }
    }

    /// Bring media into the store, as a file at `path_for(media.id)`
    ///
    /// Transport media is decoded. Local media pointing anywhere else is
    /// copied in; the source file is left alone. Media already at its
    /// stored path is returned unchanged.
    pub fn localize(&self, media: &Media) -> StoreResult<Media> {
        let target = self.path_for(media.id);
        let bytes = match media.data {
            MediaData::Local(ref path) if *path == target => return Ok(media.clone()),
            MediaData::Local(ref path) => {
                self.read(path).map_err(|e| StoreError::Conversion {
                    id: media.id,
                    details: e.to_string(),
                })?
            }
            MediaData::Transport(ref encoded) => {
                STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(|e| StoreError::Conversion {
                        id: media.id,
                        details: format!("invalid base64: {}", e),
                    })?
            }
        };
        let path = self.save(media.id, &bytes)?;

        Ok(Media {
            data: MediaData::Local(path),
            ..media.clone()
        })
    }

    /// Turn local media into transport media by encoding its current file
    ///
    /// Media that is already encoded is returned unchanged.
    pub fn encode(&self, media: &Media) -> StoreResult<Media> {
        let path = match media.data {
            MediaData::Local(ref path) => path,
            MediaData::Transport(_) => return Ok(media.clone()),
        };

        let bytes = self.read(path).map_err(|e| StoreError::Conversion {
            id: media.id,
            details: e.to_string(),
        })?;

        Ok(Media {
            data: MediaData::from_bytes(&bytes),
            ..media.clone()
        })
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub fn atomic_write(path: &Path, data: &[u8]) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDirectory {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StoreError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        from: temp_path.clone(),
        to: path.to_path_buf(),
        source,
    })?;

    Ok(())
}
