//! Cached access to decoded spectrum files.
//!
//! The library provides:
//! - LRU caching of decoded files so repeated lookups skip the decoder
//! - Invalidation when a file's size or modification time changes
//! - Format auto-detection through [`crate::format::open_path`]

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use lru::LruCache;
use tracing::debug;

use crate::config::{DecodeConfig, DEFAULT_CACHE_CAPACITY};
use crate::error::FormatError;
use crate::format::{open_path, SpectrumFormat};
use crate::spectrum::Decoded;

/// Identity of a file on disk at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FileKey {
    path: PathBuf,
    modified: Option<SystemTime>,
    len: u64,
}

impl FileKey {
    fn for_path(path: &Path) -> Result<Self, FormatError> {
        let path = path.canonicalize()?;
        let meta = path.metadata()?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
            path,
        })
    }
}

/// A decoded file held by the library.
#[derive(Debug)]
pub struct LibraryEntry {
    pub format: SpectrumFormat,
    pub decoded: Arc<Decoded>,
}

// =============================================================================
// SpectrumLibrary
// =============================================================================

/// LRU cache of decoded spectrum files.
pub struct SpectrumLibrary {
    config: DecodeConfig,
    cache: Mutex<LruCache<FileKey, (SpectrumFormat, Arc<Decoded>)>>,
}

impl SpectrumLibrary {
    /// Create a library sized by `config.cache_capacity`.
    pub fn new(config: DecodeConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .or(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Decoded contents of `path`, decoding on first access or after the
    /// file changed.
    pub fn get(&self, path: impl AsRef<Path>) -> Result<Arc<Decoded>, FormatError> {
        Ok(self.entry(path)?.decoded)
    }

    /// Like [`SpectrumLibrary::get`], also reporting the detected format.
    pub fn entry(&self, path: impl AsRef<Path>) -> Result<LibraryEntry, FormatError> {
        let key = FileKey::for_path(path.as_ref())?;

        if let Some((format, decoded)) = self.lock().get(&key) {
            debug!(path = %key.path.display(), "library hit");
            return Ok(LibraryEntry {
                format: *format,
                decoded: Arc::clone(decoded),
            });
        }

        // Decode without holding the lock
        let (format, decoded) = open_path(&key.path, &self.config)?;
        let decoded = Arc::new(decoded);

        let mut cache = self.lock();
        // Drop stale entries for the same path
        let stale: Vec<FileKey> = cache
            .iter()
            .filter(|(k, _)| k.path == key.path)
            .map(|(k, _)| k.clone())
            .collect();
        for k in stale {
            cache.pop(&k);
        }
        cache.put(key, (format, Arc::clone(&decoded)));

        Ok(LibraryEntry { format, decoded })
    }

    /// Whether `path` is cached in its current on-disk state.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        FileKey::for_path(path.as_ref())
            .map(|key| self.lock().contains(&key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<FileKey, (SpectrumFormat, Arc<Decoded>)>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SpectrumLibrary {
    fn default() -> Self {
        Self::new(DecodeConfig::default())
    }
}

// =============================================================================
// Tests
// =============================================================================
