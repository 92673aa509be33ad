use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a sync run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// yt-dlp binary, as a bare name resolved via PATH or an absolute path
    pub ytdlp_bin: PathBuf,
    /// TwitchDownloaderCLI binary, bare name or absolute path
    pub twitch_bin: PathBuf,
    /// Directory holding the per-service failure ledger and worklist files
    pub cache_dir: PathBuf,
    /// Netscape cookie file handed to yt-dlp for member-only recordings
    pub cookie_file: Option<PathBuf>,
    /// Global output directory; default is next to each recording
    pub output_dir: Option<PathBuf>,
    /// Compression applied to fetched artifacts ("gz" or "bz2")
    pub compression: String,
    /// Delete the plain artifact once the compressed copy is on disk
    pub remove_after_compress: bool,
    /// Directories whose path matches this pattern are not descended into
    pub exclude: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl SyncConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            twitch_bin: PathBuf::from("TwitchDownloaderCLI"),
            cache_dir: PathBuf::from("."),
            cookie_file: None,
            output_dir: None,
            compression: "bz2".to_string(),
            remove_after_compress: false,
            exclude: None,
        }
    }

    /// Load configuration from a file, or return defaults if path is None or
    /// the file doesn't exist
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path).with_context(|| {
                    format!("Failed to read config file: {}", config_path.display())
                })?;

                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content).with_context(|| {
                        format!("Failed to parse TOML config: {}", config_path.display())
                    })?;
                } else {
                    config = serde_json::from_str(&content).with_context(|| {
                        format!("Failed to parse JSON config: {}", config_path.display())
                    })?;
                }
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn missing_file_yields_defaults() {
        let config = SyncConfig::load_config(Some(Path::new("/nonexistent/vodsub.toml")))
            .expect("defaults");
        assert_eq!(config.compression, "bz2");
        assert_eq!(config.ytdlp_bin, PathBuf::from("yt-dlp"));
    }

    #[test]
    fn partial_toml_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("vodsub.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(file, "compression = \"gz\"\ncache_dir = \"/tmp/ledgers\"").expect("write");

        let config = SyncConfig::load_config(Some(&path)).expect("load");
        assert_eq!(config.compression, "gz");
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/ledgers"));
        // untouched keys keep their defaults
        assert_eq!(config.twitch_bin, PathBuf::from("TwitchDownloaderCLI"));
    }
}
