use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::{Path, PathBuf};

use crate::acquire::{
    run_invocation, FetchContext, Fetcher, Outcome, TwitchFetcher, YoutubeFetcher,
};
use crate::cache::{self, FailureCache};
use crate::compress::{compress_artifact, Algorithm};
use crate::config::SyncConfig;
use crate::scan::{ScanEntry, ScanStore, Scanner, TwitchScanner, YoutubeScanner};

/// One unit of acquisition work derived from a scan entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    /// Representative recording, first seen in traversal order
    pub source_path: PathBuf,
}

impl WorkItem {
    /// Derive the work item for a pending entry.
    ///
    /// Extra recordings carrying the same identifier are ignored beyond a
    /// warning; the first-seen path stays representative.
    pub fn from_entry(id: &str, entry: &ScanEntry) -> Option<Self> {
        let first = entry.media_paths.first()?;
        if entry.media_paths.len() > 1 {
            let listed = entry
                .media_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            warn!(
                "more than one recording carries identifier {id}: {listed}; \
                 the artifact will be placed next to the first"
            );
        }
        Some(Self {
            id: id.to_string(),
            source_path: first.clone(),
        })
    }
}

/// Outcome lists for one service run, consumed by the end-of-run summary.
#[derive(Debug, Default)]
pub struct ServiceReport {
    /// Distinct identifiers seen during the scan
    pub found: usize,
    /// Worklist size after satisfied and ledgered identifiers are removed
    pub worklist: usize,
    pub downloaded: Vec<String>,
    pub compressed: Vec<PathBuf>,
    pub failed: Vec<String>,
    pub already_present: Vec<String>,
    /// Identifiers suppressed by the failure ledger
    pub suppressed: usize,
}

/// Options applied to one acquisition batch.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub compression: Algorithm,
    pub remove_after_compress: bool,
    /// Global output override; default is next to each recording
    pub output_dir: Option<PathBuf>,
    pub cookie_file: Option<PathBuf>,
}

/// Drives one service from scan evidence to written artifacts.
pub struct ServiceHandler {
    scanner: Box<dyn Scanner>,
    fetcher: Box<dyn Fetcher>,
    failures: FailureCache,
    worklist_path: PathBuf,
}

impl ServiceHandler {
    pub fn new(
        scanner: Box<dyn Scanner>,
        fetcher: Box<dyn Fetcher>,
        failures: FailureCache,
        worklist_path: PathBuf,
    ) -> Self {
        Self {
            scanner,
            fetcher,
            failures,
            worklist_path,
        }
    }

    pub fn name(&self) -> &'static str {
        self.scanner.service()
    }

    pub fn store(&self) -> &ScanStore {
        self.scanner.store()
    }

    /// Feed one traversal entry to this service's scanner.
    pub fn match_file(&mut self, dir: &Path, filename: &str) -> bool {
        self.scanner.match_file(dir, filename)
    }

    /// Run the acquisition batch over every pending identifier.
    ///
    /// Each identifier is handled to completion before the next one starts.
    /// Permanent failures go to the ledger and the batch continues; only an
    /// unspawnable tool aborts the run.
    pub async fn download(&mut self, opts: &BatchOptions) -> Result<ServiceReport> {
        let name = self.name();
        let suppressed = self.failures.load()?;
        let mut report = ServiceReport {
            found: self.scanner.store().len(),
            ..ServiceReport::default()
        };

        let mut work = Vec::new();
        for (id, entry) in self.scanner.store().pending() {
            if suppressed.contains_key(id) {
                debug!("{}: {id} is in the failure ledger, skipping", name);
                report.suppressed += 1;
                continue;
            }
            if let Some(item) = WorkItem::from_entry(id, entry) {
                work.push(item);
            }
        }
        report.worklist = work.len();

        let ids: Vec<&str> = work.iter().map(|w| w.id.as_str()).collect();
        cache::write_worklist(&self.worklist_path, &ids)?;

        for item in &work {
            let out_dir = opts
                .output_dir
                .clone()
                .or_else(|| item.source_path.parent().map(Path::to_path_buf));
            let ctx = FetchContext {
                source_path: Some(item.source_path.clone()),
                out_dir: out_dir.clone(),
                cookie_file: opts.cookie_file.clone(),
            };
            let invocation = self.fetcher.build_invocation(&item.id, &ctx);
            let output = run_invocation(&invocation).await?;

            match self.fetcher.classify(&invocation, &output) {
                Outcome::Written(path) => {
                    let artifact = resolve_artifact(path, out_dir.as_deref());
                    info!("{}: {} written to {}", name, item.id, artifact.display());
                    report.downloaded.push(item.id.clone());
                    match compress_artifact(&artifact, opts.compression, opts.remove_after_compress)
                    {
                        Ok(Some(target)) => report.compressed.push(target),
                        Ok(None) => {
                            debug!("{}: compressed copy already existed for {}", name, item.id)
                        }
                        // The artifact itself landed; a compression problem
                        // never marks the identifier as failed.
                        Err(e) => error!(
                            "{}: failed to compress {}: {e:#}",
                            name,
                            artifact.display()
                        ),
                    }
                }
                Outcome::AlreadyPresent => {
                    info!(
                        "{}: chat log for {} already on disk according to {}",
                        name,
                        item.id,
                        self.fetcher.tool_name()
                    );
                    report.already_present.push(item.id.clone());
                }
                outcome => {
                    let reason = outcome
                        .failure_reason()
                        .unwrap_or_else(|| "unclassified failure".to_string());
                    warn!("{}: {} permanently failed: {reason}", name, item.id);
                    self.failures
                        .record(&item.id, Some(&item.source_path), &reason)?;
                    report.failed.push(item.id.clone());
                }
            }
        }

        let remaining: Vec<&str> = work
            .iter()
            .map(|w| w.id.as_str())
            .filter(|id| {
                !report.downloaded.iter().any(|d| d == id)
                    && !report.failed.iter().any(|f| f == id)
                    && !report.already_present.iter().any(|p| p == id)
            })
            .collect();
        cache::write_worklist(&self.worklist_path, &remaining)?;

        Ok(report)
    }

    /// Tear the handler down, releasing the ledger.
    pub fn finish(self) -> Result<()> {
        self.failures.close()
    }
}

fn resolve_artifact(path: PathBuf, out_dir: Option<&Path>) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match out_dir {
        Some(dir) => dir.join(path),
        None => path,
    }
}

/// Handler for Twitch recordings.
pub fn twitch_handler(cfg: &SyncConfig) -> Result<ServiceHandler> {
    let failures = FailureCache::open(cfg.cache_dir.join("twitch_chat_failed.txt"))?;
    Ok(ServiceHandler::new(
        Box::new(TwitchScanner::new()),
        Box::new(TwitchFetcher::new(cfg.twitch_bin.clone())),
        failures,
        cfg.cache_dir.join("twitch_chat_to_download.txt"),
    ))
}

/// Handler for YouTube recordings.
pub fn youtube_handler(cfg: &SyncConfig) -> Result<ServiceHandler> {
    let failures = FailureCache::open(cfg.cache_dir.join("yt_chat_failed.txt"))?;
    Ok(ServiceHandler::new(
        Box::new(YoutubeScanner::new()),
        Box::new(YoutubeFetcher::new(cfg.ytdlp_bin.clone())),
        failures,
        cfg.cache_dir.join("yt_chat_to_download.txt"),
    ))
}

/// All handlers in evaluation order.
///
/// Twitch runs first: the YouTube grammar is broader and would otherwise
/// claim `v`-prefixed ten-digit tokens as 11-char identifiers.
pub fn default_handlers(cfg: &SyncConfig) -> Result<Vec<ServiceHandler>> {
    Ok(vec![twitch_handler(cfg)?, youtube_handler(cfg)?])
}
