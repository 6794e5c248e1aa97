use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::debug;

use crate::cache::patterns::SourceSet;

/// How a cache-gated task summarises its relevant inputs/outputs.
#[derive(Debug, Clone)]
pub enum FingerprintSpec {
    /// blake3 digest over the contents of every tracked source file.
    Sources(SourceSet),
    /// Number of lines in a (usually generated) file.
    LineCount(PathBuf),
}

impl FingerprintSpec {
    /// Compute the current fingerprint. Relative paths resolve against `root`.
    pub fn compute(&self, root: &Path) -> Result<String> {
        match self {
            FingerprintSpec::Sources(set) => {
                let files = set.collect_files(root)?;
                compute_hash_for_paths(root, &files)
            }
            FingerprintSpec::LineCount(file) => {
                let path = root.join(file);
                Ok(count_lines(&path)?.to_string())
            }
        }
    }
}

/// Compute the hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file =
        File::open(path).with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute a deterministic hash over the contents of the given files.
///
/// Order of `paths` does not matter; they are sorted before hashing. Each
/// file's path relative to `root` participates too, so renaming a tracked
/// file changes the hash but moving the whole project does not.
pub fn compute_hash_for_paths<I, P>(root: &Path, paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut hasher = Hasher::new();

    let mut paths_vec: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    paths_vec.sort();

    for path in paths_vec {
        debug!("hashing file {:?}", path);
        let file_hash = compute_file_hash(&path)?;
        let rel = path.strip_prefix(root).unwrap_or(&path);
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update(file_hash.as_bytes());
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, "computed aggregate hash");
    Ok(hash)
}

/// Count the lines of a text file.
pub fn count_lines(path: &Path) -> Result<usize> {
    let file = File::open(path).with_context(|| format!("opening file {:?}", path))?;
    let mut count = 0;
    for line in BufReader::new(file).lines() {
        line.with_context(|| format!("reading {:?}", path))?;
        count += 1;
    }
    Ok(count)
}
