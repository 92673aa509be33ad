use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use regex::Regex;
use std::path::PathBuf;
use vodsub::compress::compress_tree;
use vodsub::handler::{self, BatchOptions, ServiceHandler};
use vodsub::{Algorithm, SyncConfig};
use walkdir::WalkDir;

/// Fetch missing chat logs for archived stream recordings
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory to scan for recordings and chat artifacts
    path: PathBuf,

    /// Download missing chat logs, or compress artifacts already on disk
    #[arg(long, value_enum, default_value_t = Mode::Download)]
    mode: Mode,

    /// Compression applied to fetched artifacts (gz or bz2)
    #[arg(long, value_name = "ALGO")]
    compression: Option<String>,

    /// Services to scan for
    #[arg(long, value_enum, default_value_t = ServiceChoice::All)]
    service: ServiceChoice,

    /// Put downloaded artifacts here instead of next to each recording
    #[arg(long, value_name = "DIR")]
    output_path: Option<PathBuf>,

    /// Path to configuration file (JSON or TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Download,
    Compress,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ServiceChoice {
    Youtube,
    Twitch,
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = env_logger::Builder::from_default_env();
    builder.format_timestamp_secs();
    if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    let mut cfg = SyncConfig::load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(output) = args.output_path {
        cfg.output_dir = Some(output);
    }
    if let Some(algo) = args.compression {
        cfg.compression = algo;
    }
    let compression: Algorithm = cfg.compression.parse()?;

    if !args.path.exists() {
        anyhow::bail!("supplied path does not exist: {}", args.path.display());
    }

    if let Mode::Compress = args.mode {
        let written = compress_tree(&args.path, compression)?;
        println!("Compressed {} chat artifact(s).", written.len());
        return Ok(());
    }

    let mut handlers: Vec<ServiceHandler> = match args.service {
        ServiceChoice::Youtube => vec![handler::youtube_handler(&cfg)?],
        ServiceChoice::Twitch => vec![handler::twitch_handler(&cfg)?],
        ServiceChoice::All => handler::default_handlers(&cfg)?,
    };

    let exclude = cfg
        .exclude
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("invalid exclude pattern in configuration")?;

    info!("Scanning directory: {}", args.path.display());
    let mut files_checked = 0usize;
    let mut unrecognized = 0usize;

    let walker = WalkDir::new(&args.path).follow_links(false).into_iter();
    for entry in walker.filter_entry(|e| {
        if e.file_type().is_dir() {
            if let Some(pattern) = &exclude {
                if pattern.is_match(&e.path().to_string_lossy()) {
                    return false;
                }
            }
        }
        true
    }) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Error reading directory entry: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            warn!("Skipping non-UTF-8 filename: {:?}", entry.file_name());
            unrecognized += 1;
            continue;
        };
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        files_checked += 1;

        // First scanner that claims the filename wins; the handler order
        // puts the stricter Twitch grammar before the broader YouTube one.
        let mut matched = false;
        for service in handlers.iter_mut() {
            if service.match_file(dir, filename) {
                debug!("{} identifier found in {filename}", service.name());
                matched = true;
                break;
            }
        }
        if !matched {
            debug!("no identifier found in {filename}");
            unrecognized += 1;
        }
    }

    info!("Scan complete: {files_checked} files checked, {unrecognized} unrecognized");

    let opts = BatchOptions {
        compression,
        remove_after_compress: cfg.remove_after_compress,
        output_dir: cfg.output_dir.clone(),
        cookie_file: cfg.cookie_file.clone(),
    };

    for mut service in handlers {
        let name = service.name();
        let report = service.download(&opts).await?;

        println!(
            "{name}: found {} identifier(s), {} missing a chat log ({} suppressed by the failure ledger).",
            report.found, report.worklist, report.suppressed
        );
        println!(
            "{name}: downloaded {} / {} chat log(s), compressed {}, {} already present.",
            report.downloaded.len(),
            report.worklist,
            report.compressed.len(),
            report.already_present.len()
        );
        if !report.failed.is_empty() {
            println!("{name}: failed identifiers:");
            for id in &report.failed {
                println!("  {id}");
            }
        }

        service.finish()?;
    }

    Ok(())
}
