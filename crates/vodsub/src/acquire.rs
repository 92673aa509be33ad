use anyhow::{Context, Result};
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Captured result of one external tool run
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// A fully prepared external tool invocation.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Artifact the tool will produce, when the name is chosen by us instead
    /// of being reported on stdout. Relative to `current_dir`.
    pub expected_artifact: Option<PathBuf>,
}

/// Everything an adapter may need to build an invocation.
#[derive(Debug, Default, Clone)]
pub struct FetchContext {
    /// Representative recording for the identifier being fetched
    pub source_path: Option<PathBuf>,
    /// Directory the artifact should land in
    pub out_dir: Option<PathBuf>,
    /// Cookie file for authenticated fetches
    pub cookie_file: Option<PathBuf>,
}

/// Classified result of one acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The tool wrote a new chat artifact at this path
    Written(PathBuf),
    /// The artifact was already on disk; nothing new was produced
    AlreadyPresent,
    /// The recording is gone upstream; retrying is pointless
    NotAvailableAnymore(String),
    /// The recording exists but carries no chat log
    NoCompanionAvailable(String),
    /// The platform wants credentials before handing out the artifact
    CredentialsRequired(String),
    /// Unrecognized tool output, including a clean exit with no marker
    UnknownFailure {
        exit_code: Option<i32>,
        detail: String,
    },
}

impl Outcome {
    /// Ledger reason for outcomes that are permanent failures.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Outcome::Written(_) | Outcome::AlreadyPresent => None,
            Outcome::NotAvailableAnymore(reason) => Some(format!("not available anymore: {reason}")),
            Outcome::NoCompanionAvailable(reason) => Some(format!("no chat log available: {reason}")),
            Outcome::CredentialsRequired(reason) => Some(format!("credentials required: {reason}")),
            Outcome::UnknownFailure { exit_code, detail } => Some(match exit_code {
                Some(code) => format!("tool failed with exit code {code}: {detail}"),
                None => format!("tool terminated by signal: {detail}"),
            }),
        }
    }
}

/// Per-service acquisition adapter: builds the external tool invocation for
/// an identifier and reads the tool's output back into an [`Outcome`].
pub trait Fetcher {
    fn tool_name(&self) -> &str;

    fn build_invocation(&self, id: &str, ctx: &FetchContext) -> Invocation;

    fn classify(&self, invocation: &Invocation, output: &ToolOutput) -> Outcome;
}

/// Run an invocation to completion, capturing all output.
///
/// A spawn failure (missing binary, permissions) is the one condition that
/// surfaces as an error instead of an [`Outcome`].
pub async fn run_invocation(invocation: &Invocation) -> Result<ToolOutput> {
    debug!(
        "running {} {:?} in {:?}",
        invocation.program.display(),
        invocation.args,
        invocation.current_dir
    );
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    if let Some(dir) = &invocation.current_dir {
        cmd.current_dir(dir);
    }
    let output = cmd
        .output()
        .await
        .with_context(|| format!("failed to spawn {}", invocation.program.display()))?;
    Ok(ToolOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const WRITING_MARKER: &str = "Writing video subtitles to:";

/// Fetches live_chat artifacts through yt-dlp.
pub struct YoutubeFetcher {
    bin: PathBuf,
    sub_lang: String,
}

impl YoutubeFetcher {
    pub fn new(bin: PathBuf) -> Self {
        Self {
            bin,
            sub_lang: "live_chat".to_string(),
        }
    }
}

impl Fetcher for YoutubeFetcher {
    fn tool_name(&self) -> &str {
        "yt-dlp"
    }

    fn build_invocation(&self, id: &str, ctx: &FetchContext) -> Invocation {
        let mut args = vec![
            "--skip-download".to_string(),
            "--no-write-thumbnail".to_string(),
            "--write-subs".to_string(),
            "--sub-langs".to_string(),
            self.sub_lang.clone(),
            "-o".to_string(),
            "%(upload_date)s %(uploader)s %(title)s_%(id)s.%(ext)s".to_string(),
        ];
        if let Some(cookies) = &ctx.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args.push(format!("{WATCH_URL}{id}"));
        Invocation {
            program: self.bin.clone(),
            args,
            current_dir: ctx.out_dir.clone(),
            expected_artifact: None,
        }
    }

    fn classify(&self, _invocation: &Invocation, output: &ToolOutput) -> Outcome {
        for line in output.stdout.lines() {
            if let Some(pos) = line.find(WRITING_MARKER) {
                let name = line[pos + WRITING_MARKER.len()..].trim();
                if !name.is_empty() {
                    return Outcome::Written(PathBuf::from(name));
                }
            }
            if line.contains("subtitle") && line.contains("is already present") {
                return Outcome::AlreadyPresent;
            }
            if line.contains("no subtitles for the requested languages") {
                return Outcome::NoCompanionAvailable(line.trim().to_string());
            }
        }
        if output.stderr.contains("members-only content") {
            return Outcome::CredentialsRequired("members-only content, cookies needed".to_string());
        }
        if output.stderr.contains("Video unavailable")
            || output.stderr.contains("This video is private")
        {
            return Outcome::NotAvailableAnymore(excerpt(&output.stderr));
        }
        Outcome::UnknownFailure {
            exit_code: output.exit_code,
            detail: excerpt(&output.stderr),
        }
    }
}

/// Fetches chat logs through TwitchDownloaderCLI.
pub struct TwitchFetcher {
    bin: PathBuf,
}

impl TwitchFetcher {
    pub fn new(bin: PathBuf) -> Self {
        Self { bin }
    }
}

impl Fetcher for TwitchFetcher {
    fn tool_name(&self) -> &str {
        "TwitchDownloaderCLI"
    }

    fn build_invocation(&self, id: &str, ctx: &FetchContext) -> Invocation {
        let output_name = match derive_date(ctx.source_path.as_deref()) {
            Some(date) => format!("{date}_{id}.json"),
            None => format!("{id}.json"),
        };
        let args = vec![
            "chatdownload".to_string(),
            "--id".to_string(),
            id.to_string(),
            "-o".to_string(),
            output_name.clone(),
        ];
        Invocation {
            program: self.bin.clone(),
            args,
            current_dir: ctx.out_dir.clone(),
            expected_artifact: Some(PathBuf::from(output_name)),
        }
    }

    fn classify(&self, invocation: &Invocation, output: &ToolOutput) -> Outcome {
        if output.exit_code == Some(0) {
            // The CLI is told where to write; there is no stdout marker.
            if let Some(artifact) = &invocation.expected_artifact {
                return Outcome::Written(artifact.clone());
            }
            return Outcome::UnknownFailure {
                exit_code: Some(0),
                detail: "invocation carried no expected artifact".to_string(),
            };
        }
        if output.stderr.contains("(404) Not Found.") {
            return Outcome::NotAvailableAnymore("upstream returned 404".to_string());
        }
        if output.stderr.contains("Unauthorized") {
            return Outcome::CredentialsRequired(excerpt(&output.stderr));
        }
        Outcome::UnknownFailure {
            exit_code: output.exit_code,
            detail: excerpt(&output.stderr),
        }
    }
}

/// First eight characters of the representative filename, when they form a
/// date stamp the `YYYYMMDD_<id>.json` template can use.
fn derive_date(source: Option<&Path>) -> Option<String> {
    let name = source?.file_name()?.to_str()?;
    let date: String = name.chars().take(8).collect();
    if date.len() == 8 && date.chars().all(|c| c.is_ascii_digit()) {
        Some(date)
    } else {
        warn!("no usable date prefix in {name:?}");
        None
    }
}

/// Last non-empty stderr line, bounded, for ledger reasons and logs.
fn excerpt(text: &str) -> String {
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .map(str::trim)
        .unwrap_or("");
    line.chars().take(200).collect()
}
