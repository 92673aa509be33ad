use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// One permanently failed identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub id: String,
    pub path: Option<PathBuf>,
    pub reason: Option<String>,
}

/// Append-only ledger of identifiers whose acquisition failed for good.
///
/// The lifecycle is an explicit scoped contract rather than a destructor
/// side effect. Records are flushed as soon as they are appended, and
/// [`close`](Self::close) removes a file that ended the run empty so dry
/// runs do not litter the cache directory.
#[derive(Debug)]
pub struct FailureCache {
    path: PathBuf,
    wrote: bool,
}

impl FailureCache {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            File::create(&path)
                .with_context(|| format!("failed to create failure ledger {}", path.display()))?;
        }
        Ok(Self { path, wrote: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the ledger into a map keyed by identifier.
    ///
    /// Lines are tab-separated `id`, `path`, `reason`; files from older runs
    /// carry only the first one or two fields. Duplicate identifiers
    /// collapse, last writer visible.
    pub fn load(&self) -> Result<HashMap<String, FailureRecord>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read failure ledger {}", self.path.display()))?;
        let mut records = HashMap::new();
        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split('\t');
            let Some(id) = fields.next().map(str::trim).filter(|id| !id.is_empty()) else {
                continue;
            };
            let path = fields
                .next()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from);
            let reason = fields
                .next()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(String::from);
            records.insert(
                id.to_string(),
                FailureRecord {
                    id: id.to_string(),
                    path,
                    reason,
                },
            );
        }
        Ok(records)
    }

    /// Append one record and flush it to disk immediately.
    ///
    /// Existing lines are never rewritten; a repeated identifier simply gets
    /// a newer line that wins on the next [`load`](Self::load).
    pub fn record(&mut self, id: &str, path: Option<&Path>, reason: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open failure ledger {}", self.path.display()))?;
        let path_field = path.map(|p| p.display().to_string()).unwrap_or_default();
        let line = format!("{}\t{}\t{}\n", id, path_field, sanitize(reason));
        file.write_all(line.as_bytes())
            .with_context(|| format!("failed to append to {}", self.path.display()))?;
        file.flush()?;
        self.wrote = true;
        Ok(())
    }

    /// Tear the ledger down, deleting the file if it ended the run empty.
    pub fn close(self) -> Result<()> {
        debug!("closing failure ledger {}", self.path.display());
        if self.wrote {
            return Ok(());
        }
        let len = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        if len == 0 && self.path.exists() {
            debug!("removing empty {}", self.path.display());
            fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Record fields share one line; strip the separators out of free text.
fn sanitize(text: &str) -> String {
    text.replace(['\t', '\n', '\r'], " ")
}

/// Write the pending worklist snapshot, one identifier per line.
///
/// An empty worklist removes the snapshot instead of leaving a zero-byte
/// file behind.
pub fn write_worklist<S: AsRef<str>>(path: &Path, ids: &[S]) -> Result<()> {
    if ids.is_empty() {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("failed to remove worklist {}", path.display()))?;
        }
        return Ok(());
    }
    let mut body = String::new();
    for id in ids {
        body.push_str(id.as_ref());
        body.push('\n');
    }
    fs::write(path, body).with_context(|| format!("failed to write worklist {}", path.display()))
}
