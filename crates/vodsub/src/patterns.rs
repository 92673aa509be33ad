use regex::Regex;

/// Recording extensions recognized for both services
pub const MEDIA_EXTENSIONS: &[&str] = &["webm", "mkv", "mp4", "m4a", "opus"];

/// Base name of the chat artifact yt-dlp writes next to a recording
pub const YOUTUBE_COMPANION_BASE: &str = "live_chat";

/// Companion artifact suffixes for a base name, covering every supported
/// compression state. An empty base yields the bare json set used by Twitch
/// chat files.
pub fn companion_suffixes(base: &str) -> Vec<String> {
    let mut suffixes = Vec::new();
    if base.is_empty() {
        suffixes.extend(["json", "json.gz", "json.bz2"].map(String::from));
    } else {
        suffixes.push(format!("{base}.json"));
        suffixes.push(format!("{base}.json.gz"));
        suffixes.push(format!("{base}.json.bz2"));
        // A plain .json carrying a valid identifier still counts.
        suffixes.push("json".to_string());
    }
    suffixes
}

/// True when the filename ends in a recognized recording extension.
pub fn has_media_extension(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && MEDIA_EXTENSIONS.contains(&ext))
}

/// Structural rules for YouTube filenames.
///
/// One anchored pattern covers both recordings and chat artifacts: the
/// 11-char identifier sits directly before the final extension, optionally
/// closed by a `]` when the id was bracketed by the archiving template.
#[derive(Debug)]
pub struct YoutubeRules {
    pub recording: Regex,
    companion_suffixes: Vec<String>,
}

impl YoutubeRules {
    pub fn new() -> Self {
        let companion_suffixes = companion_suffixes(YOUTUBE_COMPANION_BASE);
        let media = MEDIA_EXTENSIONS.join("|");
        let companions = companion_suffixes
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let recording = Regex::new(&format!(
            r"^.*[\s_\[]?(?P<id>[0-9A-Za-z_-]{{11}})\]?\.(?i:(?P<ext>{media}|{companions}))$"
        ))
        .expect("hand-written youtube pattern compiles");
        Self {
            recording,
            companion_suffixes,
        }
    }

    /// Whether a matched extension denotes a chat artifact rather than a
    /// recording.
    pub fn is_companion_suffix(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.companion_suffixes.iter().any(|s| *s == ext)
    }
}

/// Structural rules for Twitch filenames.
///
/// Chat artifacts follow the `YYYYMMDD_<id>.json` template; recordings carry
/// one or more ten-digit identifiers delimited inside the archiving
/// template. The delimiter qualification itself lives in the scanner.
#[derive(Debug)]
pub struct TwitchRules {
    pub companion: Regex,
    pub digit_runs: Regex,
}

impl TwitchRules {
    pub fn new() -> Self {
        let companions = companion_suffixes("")
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        let companion = Regex::new(&format!(
            r"^[0-9]{{8}}[\s_]?[vV]?(?P<id>[0-9]{{10}})\.(?i:{companions})$"
        ))
        .expect("hand-written twitch companion pattern compiles");
        let digit_runs = Regex::new(r"[0-9]+").expect("digit run pattern compiles");
        Self {
            companion,
            digit_runs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_extension_detection_is_case_insensitive() {
        assert!(has_media_extension("a video.MKV"));
        assert!(has_media_extension("a video.mp4"));
        assert!(!has_media_extension("notes.txt"));
        assert!(!has_media_extension(".mp4"));
        assert!(!has_media_extension("mp4"));
    }

    #[test]
    fn youtube_companion_suffixes_cover_compression_states() {
        let suffixes = companion_suffixes(YOUTUBE_COMPANION_BASE);
        assert!(suffixes.contains(&"live_chat.json".to_string()));
        assert!(suffixes.contains(&"live_chat.json.gz".to_string()));
        assert!(suffixes.contains(&"live_chat.json.bz2".to_string()));
    }

    #[test]
    fn twitch_companion_suffixes_have_no_base_name() {
        assert_eq!(companion_suffixes(""), ["json", "json.gz", "json.bz2"]);
    }
}
