use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::types::RecordKind;

/// Default directory (relative to the project root) holding state records.
pub const DEFAULT_STATE_DIR: &str = ".build_state";

/// Abstract storage for fingerprints and quality-gate baselines.
pub trait StateStore: Send + Sync {
    fn load(&self, kind: RecordKind, key: &str) -> Result<Option<String>>;
    fn save(&mut self, kind: RecordKind, key: &str, value: &str) -> Result<()>;
    /// Remove every record. Returns how many were removed; calling this on an
    /// empty store succeeds and returns 0.
    fn clear(&mut self) -> Result<usize>;
}

/// One file per record under a state directory.
///
/// - fingerprints: `<dir>/last_<task>.txt`
/// - baselines:    `<dir>/last_<check>.count.txt`
///
/// Keys are escaped so no two records share a file.
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, kind: RecordKind, key: &str) -> PathBuf {
        let key = encode_key(key);
        let file = match kind {
            RecordKind::Fingerprint => format!("last_{key}.txt"),
            RecordKind::Baseline => format!("last_{key}.count.txt"),
        };
        self.dir.join(file)
    }
}

impl StateStore for FileStateStore {
    fn load(&self, kind: RecordKind, key: &str) -> Result<Option<String>> {
        let path = self.record_path(kind, key);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading state record {:?}", path)),
        }
    }

    fn save(&mut self, kind: RecordKind, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating state directory at {:?}", self.dir))?;
        let path = self.record_path(kind, key);
        fs::write(&path, format!("{value}\n"))
            .with_context(|| format!("writing state record {:?}", path))?;
        debug!(%kind, key = %key, value = %value, "stored state record (file)");
        Ok(())
    }

    fn clear(&mut self) -> Result<usize> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = ?self.dir, "state directory missing; nothing to clear");
                return Ok(0);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading state directory {:?}", self.dir));
            }
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_record = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("last") && n.ends_with(".txt"));
            if !is_record || !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(e).with_context(|| format!("removing state record {:?}", path));
                }
            }
        }

        info!(removed, dir = ?self.dir, "cleared state records (file)");
        Ok(removed)
    }
}

/// Stores records in memory only (lost on exit).
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    map: HashMap<(RecordKind, String), String>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, kind: RecordKind, key: &str) -> Result<Option<String>> {
        Ok(self.map.get(&(kind, key.to_string())).cloned())
    }

    fn save(&mut self, kind: RecordKind, key: &str, value: &str) -> Result<()> {
        self.map.insert((kind, key.to_string()), value.to_string());
        debug!(%kind, key = %key, value = %value, "stored state record (memory)");
        Ok(())
    }

    fn clear(&mut self) -> Result<usize> {
        let removed = self.map.len();
        self.map.clear();
        info!(removed, "cleared state records (memory)");
        Ok(removed)
    }
}

/// Task and gate names end up in file names.
///
/// ASCII letters, digits, `_` and `-` pass through; every other byte becomes
/// `%XX`. The result is one path component without `.`, so a fingerprint key
/// can never produce a baseline's `.count.txt` name, and distinct keys give
/// distinct names.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-' => out.push(byte as char),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
