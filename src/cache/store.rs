/// Storage for the single cache slot
///
/// The slot is injectable so tests can swap the on-disk store for an
/// in-memory one.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::CacheEntry;
use crate::error::PrayerError;

/// Fixed key the slot is persisted under
pub const CACHE_KEY: &str = "prayer-times-cache";

pub trait CacheStore: Send {
    /// Current entry, if any
    fn get(&self) -> Option<CacheEntry>;

    /// Replace the slot. The in-memory copy is replaced even when
    /// persisting fails.
    fn set(&mut self, entry: CacheEntry) -> Result<(), PrayerError>;
}

/// Slot held only in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entry: Option<CacheEntry>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(entry: CacheEntry) -> Self {
        Self {
            entry: Some(entry),
            writes: 0,
        }
    }

    /// Number of `set` calls so far
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CacheStore for MemoryStore {
    fn get(&self) -> Option<CacheEntry> {
        self.entry.clone()
    }

    fn set(&mut self, entry: CacheEntry) -> Result<(), PrayerError> {
        self.entry = Some(entry);
        self.writes += 1;
        Ok(())
    }
}

/// Slot persisted as JSON at `<dir>/prayer-times-cache.json`
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entry: Option<CacheEntry>,
}

impl FileStore {
    /// Open the store in `dir`, loading any existing entry. A missing,
    /// unreadable, or corrupt file leaves the slot empty.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        let path = dir.as_ref().join(format!("{}.json", CACHE_KEY));
        let entry = match read_entry(&path) {
            Ok(Some(entry)) => {
                info!(
                    "Loaded cached schedule for {}-{:02} (captured {})",
                    entry.schedule.year(),
                    entry.schedule.month(),
                    entry.captured_at.to_rfc3339()
                );
                Some(entry)
            }
            Ok(None) => {
                debug!("No cache file at {}", path.display());
                None
            }
            Err(e) => {
                warn!("Ignoring cache file {}: {}", path.display(), e);
                None
            }
        };
        Self { path, entry }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CacheStore for FileStore {
    fn get(&self) -> Option<CacheEntry> {
        self.entry.clone()
    }

    fn set(&mut self, entry: CacheEntry) -> Result<(), PrayerError> {
        let result = write_entry(&self.path, &entry);
        self.entry = Some(entry);
        result
    }
}

fn read_entry(path: &Path) -> Result<Option<CacheEntry>, PrayerError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PrayerError::Storage(format!("read failed: {}", e))),
    };

    let entry: CacheEntry = serde_json::from_str(&raw)
        .map_err(|e| PrayerError::Storage(format!("corrupt entry: {}", e)))?;
    entry.schedule.check()?;
    Ok(Some(entry))
}

/// Write to a sibling temp file and rename so a crash never leaves a torn entry
fn write_entry(path: &Path, entry: &CacheEntry) -> Result<(), PrayerError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| PrayerError::Storage(format!("cannot create {}: {}", parent.display(), e)))?;
    }

    let json = serde_json::to_string_pretty(entry)
        .map_err(|e| PrayerError::Storage(format!("serialize failed: {}", e)))?;

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| PrayerError::Storage(format!("write failed: {}", e)))?;
    fs::rename(&tmp, path).map_err(|e| PrayerError::Storage(format!("rename failed: {}", e)))?;

    debug!("Cache written to {}", path.display());
    Ok(())
}
