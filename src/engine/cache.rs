// On-disk image cache: one JPEG file per key under a shared root, expired lazily on read.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use bytes::Bytes;
use image::DynamicImage;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::codec::{decode_image, encode_jpeg};
use crate::config::{CACHE_EXPIRY_MS, CACHE_JPEG_QUALITY};
use crate::error::EngineError;

const CLEAR_ATTEMPTS: usize = 3;

#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    expiry: Duration,
    quality: u8,
    clock: Arc<dyn Clock>,
    // Serialises the cancellation check with the rename that publishes an entry.
    commit: Arc<Mutex<()>>,
}

impl DiskCache {
    /// Root the cache at `root`, creating the directory if it does not exist.
    ///
    /// A `DiskCache` value only exists once configured, so every other
    /// operation can assume the root was set up.
    pub fn configure(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create cache root {}", root.display()))?;
        debug!("disk cache configured at {}", root.display());

        Ok(Self {
            root,
            expiry: Duration::from_millis(CACHE_EXPIRY_MS),
            quality: CACHE_JPEG_QUALITY,
            clock: Arc::new(SystemClock),
            commit: Arc::new(Mutex::new(())),
        })
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.clamp(1, 100);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    /// Path of the file backing `key`. Keys are single path components.
    pub fn entry_path(&self, key: &str) -> Result<PathBuf, EngineError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && !key.contains(['/', '\\', '\0']);
        if !valid {
            return Err(EngineError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    /// Whether an entry last written at `modified` is past the expiry window.
    pub fn is_expired(&self, modified: SystemTime) -> bool {
        // A timestamp in the future (clock skew) counts as age zero.
        let age = self
            .clock
            .now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age >= self.expiry
    }

    /// Stored bytes for `key`, or `None` when missing, empty, expired or unreadable.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        let path = match self.entry_path(key) {
            Ok(path) => path,
            Err(e) => {
                warn!("cache get rejected: {}", e);
                return None;
            }
        };

        let meta = tokio::fs::metadata(&path).await.ok()?;
        if !meta.is_file() || meta.len() == 0 {
            return None;
        }

        let modified = meta.modified().ok()?;
        if self.is_expired(modified) {
            debug!("cache entry {} expired", key);
            return None;
        }

        match tokio::fs::read(&path).await {
            // The entry may have been cleared between the stat and the read.
            Ok(data) if !data.is_empty() => Some(Bytes::from(data)),
            Ok(_) => None,
            Err(e) => {
                debug!("cache read {} failed: {}", key, e);
                None
            }
        }
    }

    /// Decoded image for `key`, if a valid entry exists.
    pub async fn load(&self, key: &str) -> Option<DynamicImage> {
        let data = self.get(key).await?;
        match tokio::task::spawn_blocking(move || decode_image(&data)).await {
            Ok(Ok(image)) => Some(image),
            Ok(Err(e)) => {
                warn!("cache entry {} is not decodable: {}", key, e);
                None
            }
            Err(e) => {
                warn!("cache decode task for {} failed: {}", key, e);
                None
            }
        }
    }

    /// Re-encode `image` as JPEG and store it under `key`, replacing any previous entry.
    ///
    /// The file is written to a temporary sibling and renamed into place, so
    /// readers never observe a partially written entry.
    pub async fn set(&self, key: &str, image: &DynamicImage) -> Result<()> {
        self.store(key, image, None).await.map(|_| ())
    }

    /// Like [`set`](Self::set), but the entry is only published if `cancel` has
    /// not fired by the time the encoded file is ready.
    ///
    /// Returns `Ok(false)` when the write was abandoned. The check and the rename
    /// happen under one lock, so once a call observes the token unfired its
    /// entry lands before any write that starts after the cancellation.
    pub async fn set_unless_cancelled(
        &self,
        key: &str,
        image: &DynamicImage,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        self.store(key, image, Some(cancel.clone())).await
    }

    async fn store(
        &self,
        key: &str,
        image: &DynamicImage,
        cancel: Option<CancellationToken>,
    ) -> Result<bool> {
        let path = self.entry_path(key)?;
        let image = image.clone();
        let quality = self.quality;
        let commit = Arc::clone(&self.commit);

        let written = tokio::task::spawn_blocking(move || -> Result<Option<usize>> {
            let encoded = encode_jpeg(&image, quality)?;
            let parent = path.parent().context("cache entry has no parent directory")?;
            std::fs::create_dir_all(parent)?;

            let mut tmp = NamedTempFile::with_prefix_in(".tmp-", parent)?;
            tmp.write_all(&encoded)?;
            tmp.flush()?;

            let _commit = commit.lock();
            if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
                // Dropping the temp file removes it.
                return Ok(None);
            }
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(Some(encoded.len()))
        })
        .await
        .context("cache write task failed")??;

        match written {
            Some(len) => {
                debug!("cache stored {} ({} bytes)", key, len);
                Ok(true)
            }
            None => {
                debug!("cache store {} abandoned after cancellation", key);
                Ok(false)
            }
        }
    }

    /// Delete every entry, then recreate the empty root. Idempotent.
    pub async fn clear(&self) -> Result<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tokio::fs::remove_dir_all(&self.root).await {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                // A concurrent write can repopulate the tree while it is being removed.
                Err(e) if attempt < CLEAR_ATTEMPTS => {
                    debug!("cache clear attempt {} failed: {}", attempt, e);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("remove cache root {}", self.root.display())
                    });
                }
            }
        }

        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("recreate cache root {}", self.root.display()))?;
        info!("disk cache cleared at {}", self.root.display());
        Ok(())
    }
}
