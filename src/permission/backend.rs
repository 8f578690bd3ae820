//! Durable permission storage
//!
//! The store hands a full [`PermissionSnapshot`] to its backend after every
//! mutation and reads one back on open and reload. Encoding is up to the
//! backend; the file backend speaks TOML or JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::permission::error::PermissionError;
use crate::permission::node::normalize;

/// Serialized form of both permission namespaces
///
/// Maps are ordered so encoded output is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    /// User id -> granted nodes
    #[serde(default)]
    pub users: BTreeMap<String, Vec<String>>,
    /// Role id -> granted nodes
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<String>>,
}

impl PermissionSnapshot {
    /// True if no actor holds any grant
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty()
    }

    /// Lower-case every node, drop duplicates and blank entries, and drop
    /// actors left without grants
    pub fn normalized(self) -> Self {
        Self {
            users: normalize_namespace(self.users),
            roles: normalize_namespace(self.roles),
        }
    }
}

fn normalize_namespace(map: BTreeMap<String, Vec<String>>) -> BTreeMap<String, Vec<String>> {
    // keys that differ only by surrounding whitespace merge into one actor
    let mut merged: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (actor, nodes) in map {
        let actor = actor.trim();
        if actor.is_empty() {
            continue;
        }
        merged
            .entry(actor.to_string())
            .or_default()
            .extend(nodes.iter().map(|n| normalize(n)).filter(|n| !n.is_empty()));
    }
    merged.retain(|_, nodes| {
        nodes.sort();
        nodes.dedup();
        !nodes.is_empty()
    });
    merged
}

/// Durable medium for permission snapshots
pub trait PermissionBackend: Send + Sync {
    /// Read the stored snapshot; a medium with nothing stored yields an empty one
    fn load(&self) -> Result<PermissionSnapshot, PermissionError>;

    /// Replace the stored snapshot
    fn save(&self, snapshot: &PermissionSnapshot) -> Result<(), PermissionError>;

    /// Create an empty store if none exists yet
    fn create_if_missing(&self) -> Result<(), PermissionError> {
        Ok(())
    }

    /// Human-readable location, for logs
    fn describe(&self) -> String;
}

/// Encoding used by [`FileBackend`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Toml,
    Json,
}

impl FileFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(FileFormat::Toml),
            "json" => Some(FileFormat::Json),
            _ => None,
        }
    }
}

/// Permission file on local disk
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
    format: FileFormat,
}

impl FileBackend {
    /// Create a backend for `path`; the extension selects TOML or JSON
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, PermissionError> {
        let path = path.as_ref().to_path_buf();
        let format = FileFormat::from_path(&path)
            .ok_or_else(|| PermissionError::UnsupportedFormat(path.clone()))?;
        Ok(Self { path, format })
    }

    /// Path of the permission file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encoding in use
    pub fn format(&self) -> FileFormat {
        self.format
    }

    fn io_error(&self, source: std::io::Error) -> PermissionError {
        PermissionError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn decode(&self, contents: &str) -> Result<PermissionSnapshot, PermissionError> {
        let decoded = match self.format {
            FileFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
            FileFormat::Json => serde_json::from_str(contents).map_err(|e| e.to_string()),
        };
        decoded.map_err(|reason| PermissionError::Decode {
            path: self.path.clone(),
            reason,
        })
    }

    fn encode(&self, snapshot: &PermissionSnapshot) -> Result<String, PermissionError> {
        match self.format {
            FileFormat::Toml => {
                toml::to_string_pretty(snapshot).map_err(|e| PermissionError::Encode(e.to_string()))
            }
            FileFormat::Json => serde_json::to_string_pretty(snapshot)
                .map_err(|e| PermissionError::Encode(e.to_string())),
        }
    }

    /// Sibling temp file used for atomic replacement
    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "permissions".to_string());
        self.path.with_file_name(format!(".{}.tmp", name))
    }
}

impl PermissionBackend for FileBackend {
    fn load(&self) -> Result<PermissionSnapshot, PermissionError> {
        if !self.path.exists() {
            debug!("Permission file {:?} does not exist, starting empty", self.path);
            return Ok(PermissionSnapshot::default());
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if contents.trim().is_empty() {
            return Ok(PermissionSnapshot::default());
        }
        self.decode(&contents)
    }

    fn save(&self, snapshot: &PermissionSnapshot) -> Result<(), PermissionError> {
        let encoded = self.encode(snapshot)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }
        let tmp = self.temp_path();
        fs::write(&tmp, encoded).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
        debug!("Saved permissions to {:?}", self.path);
        Ok(())
    }

    fn create_if_missing(&self) -> Result<(), PermissionError> {
        if self.path.exists() {
            return Ok(());
        }
        info!("Creating permission file {:?}", self.path);
        self.save(&PermissionSnapshot::default())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory backend
///
/// Reads and writes can be made to fail on demand to exercise the store's
/// persistence-failure paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    stored: Mutex<PermissionSnapshot>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryBackend {
    /// Empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with a snapshot
    pub fn with_snapshot(snapshot: PermissionSnapshot) -> Self {
        Self {
            stored: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Make subsequent loads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent saves fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Replace the stored snapshot directly, as an external edit would
    pub fn replace(&self, snapshot: PermissionSnapshot) {
        *self.stored.lock().unwrap_or_else(|e| e.into_inner()) = snapshot;
    }

    /// Copy of what was last saved
    pub fn stored(&self) -> PermissionSnapshot {
        self.stored.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of successful saves
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PermissionBackend for MemoryBackend {
    fn load(&self) -> Result<PermissionSnapshot, PermissionError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PermissionError::Backend("simulated read failure".to_string()));
        }
        Ok(self.stored())
    }

    fn save(&self, snapshot: &PermissionSnapshot) -> Result<(), PermissionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PermissionError::Backend("simulated write failure".to_string()));
        }
        self.replace(snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
