// src/cache/patterns.rs

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Set of tracked source files for a cache-gated task.
///
/// Mirrors the build file:
///
/// ```toml
/// [task.lint]
/// cache = { track = ["pkg/**/*.py"], exclude = ["pkg/**/*_fake.py"] }
/// ```
///
/// Paths are matched relative to the project root.
#[derive(Clone)]
pub struct SourceSet {
    track_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    track: GlobSet,
    exclude: GlobSet,
}

impl fmt::Debug for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSet")
            .field("track", &self.track_patterns)
            .field("exclude", &self.exclude_patterns)
            .finish()
    }
}

impl SourceSet {
    pub fn new(track: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            track_patterns: track.to_vec(),
            exclude_patterns: exclude.to_vec(),
            track: build_globset(track)?,
            exclude: build_globset(exclude)?,
        })
    }

    pub fn track_patterns(&self) -> &[String] {
        &self.track_patterns
    }

    /// Whether a root-relative path belongs to this set.
    pub fn matches<P: AsRef<Path>>(&self, rel_path: P) -> bool {
        let rel = rel_path.as_ref();
        self.track.is_match(rel) && !self.exclude.is_match(rel)
    }

    /// All files under `root` that belong to this set, sorted by path.
    ///
    /// Hidden directories (`.git`, `.build_state`, ...) are not descended into.
    pub fn collect_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        self.walk(root, root, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn walk(&self, root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        let entries =
            fs::read_dir(dir).with_context(|| format!("reading dir {:?}", dir))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                if is_hidden(&path) {
                    continue;
                }
                self.walk(root, &path, out)?;
            } else if file_type.is_file() {
                let rel = path.strip_prefix(root).unwrap_or(&path);
                if self.matches(rel) {
                    out.push(path);
                }
            }
        }

        Ok(())
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern '{}'", pat))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
