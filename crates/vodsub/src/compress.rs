use anyhow::{Context, Result};
use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use log::{info, warn};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Supported chat-artifact codecs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Gzip,
    Bzip2,
}

#[derive(Debug, Error)]
#[error("unsupported compression algorithm \"{0}\" (expected gz or bz2)")]
pub struct UnknownAlgorithm(String);

impl Algorithm {
    /// File suffix appended to the artifact name
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Gzip => "gz",
            Self::Bzip2 => "bz2",
        }
    }
}

impl std::str::FromStr for Algorithm {
    type Err = UnknownAlgorithm;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gz" | "gzip" => Ok(Self::Gzip),
            "bz2" | "bzip2" => Ok(Self::Bzip2),
            other => Err(UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Compress `input` into a sibling file with the algorithm suffix appended.
///
/// Returns the produced path, or `None` when the target already exists; in
/// that case nothing is written and the input is left alone. The original is
/// removed only after the compressed copy is fully flushed, and only when
/// `remove_original` is set.
pub fn compress_artifact(
    input: &Path,
    algo: Algorithm,
    remove_original: bool,
) -> Result<Option<PathBuf>> {
    let target = appended_suffix(input, algo.suffix());
    if target.exists() {
        warn!("{} already exists, skipping compression", target.display());
        return Ok(None);
    }

    let mut reader =
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let out =
        File::create(&target).with_context(|| format!("failed to create {}", target.display()))?;

    match algo {
        Algorithm::Gzip => {
            let mut encoder = GzEncoder::new(out, flate2::Compression::default());
            io::copy(&mut reader, &mut encoder)
                .with_context(|| format!("failed to compress {}", input.display()))?;
            encoder
                .finish()
                .with_context(|| format!("failed to finish {}", target.display()))?;
        }
        Algorithm::Bzip2 => {
            let mut encoder = BzEncoder::new(out, bzip2::Compression::best());
            io::copy(&mut reader, &mut encoder)
                .with_context(|| format!("failed to compress {}", input.display()))?;
            encoder
                .finish()
                .with_context(|| format!("failed to finish {}", target.display()))?;
        }
    }

    if remove_original {
        info!("removing original {}", input.display());
        fs::remove_file(input)
            .with_context(|| format!("failed to remove {}", input.display()))?;
    }

    Ok(Some(target))
}

/// Sweep a tree for `.json` chat artifacts and compress each one in place.
///
/// Originals are kept. Files whose first kilobyte does not look like text
/// are skipped, and per-file errors are logged without stopping the sweep.
pub fn compress_tree(root: &Path, algo: Algorithm) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("error reading directory entry: {e}");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if !is_json {
            continue;
        }
        match looks_binary(path) {
            Ok(true) => {
                warn!("{} looks like a binary file, skipping", path.display());
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                warn!("could not read {}: {e}", path.display());
                continue;
            }
        }
        match compress_artifact(path, algo, false) {
            Ok(Some(target)) => {
                info!("written {}", target.display());
                written.push(target);
            }
            Ok(None) => {}
            Err(e) => warn!("failed to compress {}: {e:#}", path.display()),
        }
    }
    Ok(written)
}

fn appended_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

/// Control bytes outside the usual text repertoire mark a file as binary.
fn looks_binary(path: &Path) -> io::Result<bool> {
    let mut head = [0u8; 1024];
    let mut file = File::open(path)?;
    let read = file.read(&mut head)?;
    Ok(head[..read].iter().any(|&b| !is_text_byte(b)))
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, 7..=10 | 12 | 13 | 27) || (b >= 0x20 && b != 0x7f)
}
