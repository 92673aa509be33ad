use log::debug;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::patterns::{self, TwitchRules, YoutubeRules};

/// Paths recorded for one identifier during a single traversal.
#[derive(Debug, Default, Clone)]
pub struct ScanEntry {
    /// Files recognized as the primary recording
    pub media_paths: Vec<PathBuf>,
    /// Files recognized as the chat artifact, in any compression state
    pub companion_paths: Vec<PathBuf>,
}

impl ScanEntry {
    /// A chat artifact already exists on disk for this identifier.
    pub fn is_satisfied(&self) -> bool {
        !self.companion_paths.is_empty()
    }

    /// Eligible for acquisition: a recording exists and no chat artifact does.
    pub fn is_pending(&self) -> bool {
        !self.media_paths.is_empty() && self.companion_paths.is_empty()
    }
}

/// Identifier-keyed accumulation of scan evidence.
///
/// Keeps the order in which identifiers were first seen so the worklist
/// follows traversal order. Entries are created only through
/// [`get_or_insert`](Self::get_or_insert); lookups never create.
#[derive(Debug, Default)]
pub struct ScanStore {
    entries: HashMap<String, ScanEntry>,
    order: Vec<String>,
}

impl ScanStore {
    pub fn get_or_insert(&mut self, id: &str) -> &mut ScanEntry {
        match self.entries.entry(id.to_string()) {
            Entry::Occupied(occupied) => occupied.into_mut(),
            Entry::Vacant(vacant) => {
                self.order.push(id.to_string());
                vacant.insert(ScanEntry::default())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&ScanEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identifiers in first-seen order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Identifiers with a recording but no chat artifact, in first-seen order.
    pub fn pending(&self) -> Vec<(&str, &ScanEntry)> {
        self.order
            .iter()
            .filter_map(|id| {
                let entry = self.entries.get(id)?;
                entry.is_pending().then_some((id.as_str(), entry))
            })
            .collect()
    }
}

/// Filename classification for one service.
pub trait Scanner {
    /// Service name used in logs and reports.
    fn service(&self) -> &'static str;

    /// Try to classify `filename` found under `dir`. On a match the
    /// identifier's entry is updated and `true` is returned; otherwise the
    /// store is left untouched and the caller tallies the file as
    /// unrecognized.
    fn match_file(&mut self, dir: &Path, filename: &str) -> bool;

    fn store(&self) -> &ScanStore;
}

/// Scanner for YouTube recordings and their live_chat artifacts.
pub struct YoutubeScanner {
    rules: YoutubeRules,
    store: ScanStore,
}

impl YoutubeScanner {
    pub fn new() -> Self {
        Self {
            rules: YoutubeRules::new(),
            store: ScanStore::default(),
        }
    }
}

impl Scanner for YoutubeScanner {
    fn service(&self) -> &'static str {
        "youtube"
    }

    fn match_file(&mut self, dir: &Path, filename: &str) -> bool {
        let Some(caps) = self.rules.recording.captures(filename) else {
            return false;
        };
        let id = &caps["id"];
        let ext = &caps["ext"];
        let path = dir.join(filename);
        if self.rules.is_companion_suffix(ext) {
            debug!("youtube chat artifact for {id}: {filename}");
            self.store.get_or_insert(id).companion_paths.push(path);
        } else {
            debug!("youtube recording for {id}: {filename}");
            self.store.get_or_insert(id).media_paths.push(path);
        }
        true
    }

    fn store(&self) -> &ScanStore {
        &self.store
    }
}

/// Scanner for Twitch recordings and their `YYYYMMDD_<id>.json` chat files.
pub struct TwitchScanner {
    rules: TwitchRules,
    store: ScanStore,
}

impl TwitchScanner {
    pub fn new() -> Self {
        Self {
            rules: TwitchRules::new(),
            store: ScanStore::default(),
        }
    }

    /// Extract every delimited ten-digit identifier from a filename.
    ///
    /// A digit run only qualifies when it is introduced by `[` or `_`, or by
    /// a `v` marker that itself follows a bracket, underscore, space or the
    /// start of the name, and when the run is not part of a longer token.
    /// Digit runs embedded in free-running title text never qualify.
    fn extract_ids<'a>(&self, filename: &'a str) -> Vec<&'a str> {
        let mut ids = Vec::new();
        for run in self.rules.digit_runs.find_iter(filename) {
            if run.as_str().len() != 10 {
                continue;
            }
            let mut before = filename[..run.start()].chars().rev();
            let introduced = match before.next() {
                Some('[' | '_') => true,
                Some('v' | 'V') => matches!(before.next(), None | Some('[' | '_' | ' ')),
                _ => false,
            };
            if !introduced {
                continue;
            }
            let after = filename[run.end()..].chars().next();
            if matches!(after, None | Some(']' | '_' | '.' | ' ')) {
                ids.push(run.as_str());
            }
        }
        ids
    }
}

impl Scanner for TwitchScanner {
    fn service(&self) -> &'static str {
        "twitch"
    }

    fn match_file(&mut self, dir: &Path, filename: &str) -> bool {
        if let Some(caps) = self.rules.companion.captures(filename) {
            let id = caps["id"].to_string();
            debug!("twitch chat artifact for {id}: {filename}");
            self.store
                .get_or_insert(&id)
                .companion_paths
                .push(dir.join(filename));
            return true;
        }

        if !patterns::has_media_extension(filename) {
            return false;
        }
        let ids = self.extract_ids(filename);
        if ids.is_empty() {
            return false;
        }
        let path = dir.join(filename);
        for id in ids {
            debug!("twitch recording for {id}: {filename}");
            self.store.get_or_insert(id).media_paths.push(path.clone());
        }
        true
    }

    fn store(&self) -> &ScanStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn dir() -> &'static Path {
        Path::new(".")
    }

    #[test]
    fn twitch_recording_with_plain_id() {
        let mut scanner = TwitchScanner::new();
        let name = "20220121 AmarisYuri PARANORMAL-SCARY VIDEOS [270]_1271243650.mp4";
        assert!(scanner.match_file(dir(), name));
        let entry = scanner.store().get("1271243650").expect("entry");
        assert_eq!(entry.media_paths, [dir().join(name)]);
        assert!(entry.companion_paths.is_empty());
    }

    #[test]
    fn twitch_recording_with_v_prefixed_id() {
        let mut scanner = TwitchScanner::new();
        let name = "20211223 AmarisYuri You want to do WHAT with the bear! [270]_v1241120429.mp4";
        assert!(scanner.match_file(dir(), name));
        assert!(scanner.store().get("1241120429").is_some());
    }

    #[test]
    fn twitch_chat_file_is_a_companion() {
        let mut scanner = TwitchScanner::new();
        assert!(scanner.match_file(dir(), "20220121_1271243650.json"));
        let entry = scanner.store().get("1271243650").expect("entry");
        assert!(entry.is_satisfied());
        assert!(entry.media_paths.is_empty());
    }

    #[test]
    fn twitch_compressed_chat_file_is_a_companion() {
        let mut scanner = TwitchScanner::new();
        assert!(scanner.match_file(dir(), "20220121_1271243650.json.bz2"));
        assert!(scanner.store().get("1271243650").expect("entry").is_satisfied());
    }

    #[test]
    fn twitch_multiple_ids_are_all_extracted() {
        let mut scanner = TwitchScanner::new();
        let name = "20220210 [Matsuro Meru] EAT EAT EAT EAT EAT nuggie & appo juice #016 [270]_v1293952620_v1294022479.mp4";
        assert!(scanner.match_file(dir(), name));
        for id in ["1293952620", "1294022479"] {
            let entry = scanner.store().get(id).expect("entry");
            assert_eq!(entry.media_paths, [dir().join(name)]);
        }
    }

    #[test]
    fn twitch_multiple_ids_without_v_marker() {
        let mut scanner = TwitchScanner::new();
        let name = "20220210 [Matsuro Meru] EAT EAT EAT EAT EAT nuggie & appo juice #016 [270]_v1293952620_v1294022479_1234567890.mp4";
        assert!(scanner.match_file(dir(), name));
        for id in ["1293952620", "1294022479", "1234567890"] {
            assert!(scanner.store().get(id).is_some(), "missing {id}");
        }
    }

    #[test]
    fn twitch_bracketed_id() {
        let mut scanner = TwitchScanner::new();
        let name = "20230323 [Amaris Yuri] drawing stickers [180][1773634033].mp4";
        assert!(scanner.match_file(dir(), name));
        assert!(scanner.store().get("1773634033").is_some());
    }

    #[test]
    fn twitch_bracketed_v_prefixed_id() {
        let mut scanner = TwitchScanner::new();
        let name = "20230323 [Amaris Yuri] drawing stickers [180][v1773634033].mp4";
        assert!(scanner.match_file(dir(), name));
        assert!(scanner.store().get("1773634033").is_some());
    }

    #[test]
    fn twitch_bracketed_multiple_ids() {
        let mut scanner = TwitchScanner::new();
        let name = "20230323 [Amaris Yuri] drawing stickers [180][1773634033_v1234567890].mp4";
        assert!(scanner.match_file(dir(), name));
        assert!(scanner.store().get("1773634033").is_some());
        assert!(scanner.store().get("1234567890").is_some());
    }

    #[test]
    fn twitch_free_text_digit_run_is_not_an_id() {
        let mut scanner = TwitchScanner::new();
        let name = "20220101 weird title :3333333333.mp4";
        assert!(!scanner.match_file(dir(), name));
        assert!(scanner.store().is_empty());
    }

    #[test]
    fn twitch_overlong_digit_run_is_not_an_id() {
        let mut scanner = TwitchScanner::new();
        assert!(!scanner.match_file(dir(), "20220101 stream_127124365099.mp4"));
        assert!(scanner.store().is_empty());
    }

    #[test]
    fn twitch_ignores_non_media_extensions() {
        let mut scanner = TwitchScanner::new();
        assert!(!scanner.match_file(dir(), "20220121 notes_1271243650.txt"));
        assert!(scanner.store().is_empty());
    }

    #[test]
    fn youtube_recording_detected() {
        let mut scanner = YoutubeScanner::new();
        let name = "20220106 Gawr Gura Ch. hololive-EN chat with mee_[240]_zp0sfEVWH9A.mkv";
        assert!(scanner.match_file(dir(), name));
        let entry = scanner.store().get("zp0sfEVWH9A").expect("entry");
        assert_eq!(entry.media_paths, [dir().join(name)]);
        assert!(entry.is_pending());
    }

    #[test]
    fn youtube_chat_artifact_detected() {
        let mut scanner = YoutubeScanner::new();
        let name = "20230127 Purin 【Project Zomboid】Play with me~ ：3_Emb76dePufw.live_chat.json";
        assert!(scanner.match_file(dir(), name));
        let entry = scanner.store().get("Emb76dePufw").expect("entry");
        assert!(entry.is_satisfied());
    }

    #[test]
    fn youtube_compressed_chat_artifact_detected() {
        let mut scanner = YoutubeScanner::new();
        let name = "20230127 Purin 【Project Zomboid】Play with me~ ：3_Emb76dePufw.live_chat.json.bz2";
        assert!(scanner.match_file(dir(), name));
        assert!(scanner.store().get("Emb76dePufw").expect("entry").is_satisfied());
    }

    #[test]
    fn youtube_bracketed_id_detected() {
        let mut scanner = YoutubeScanner::new();
        let name = "20230330 [Gawr Gura Ch. hololive-EN] 【MINECRAFT】i love minecraft [240p][dh4s0bBrPx0].mp4";
        assert!(scanner.match_file(dir(), name));
        let entry = scanner.store().get("dh4s0bBrPx0").expect("entry");
        assert_eq!(entry.media_paths.len(), 1);
    }

    #[test]
    fn youtube_rejects_short_stem() {
        let mut scanner = YoutubeScanner::new();
        assert!(!scanner.match_file(dir(), "short.mp4"));
        assert!(scanner.store().is_empty());
    }

    /// A filename valid under both grammars belongs to whichever scanner
    /// runs first. The orchestration order (Twitch before YouTube) decides
    /// ownership; this documents the ambiguity rather than hiding it.
    #[test]
    fn ambiguous_filename_is_claimed_by_either_grammar() {
        let name = "20220204 stream vod_v1286818234.mp4";

        let mut twitch = TwitchScanner::new();
        assert!(twitch.match_file(dir(), name));
        assert!(twitch.store().get("1286818234").is_some());

        let mut youtube = YoutubeScanner::new();
        assert!(youtube.match_file(dir(), name));
        assert!(youtube.store().get("v1286818234").is_some());
    }

    #[test]
    fn satisfied_entry_is_not_pending() {
        let mut scanner = YoutubeScanner::new();
        scanner.match_file(
            dir(),
            "20220106 Gawr Gura Ch. hololive-EN chat with mee_[240]_zp0sfEVWH9A.mkv",
        );
        scanner.match_file(
            dir(),
            "20220106 Gawr Gura Ch. hololive-EN chat with mee_[240]_zp0sfEVWH9A.live_chat.json",
        );
        assert!(scanner.store().pending().is_empty());
    }

    #[test]
    fn lone_recording_is_pending() {
        let mut scanner = YoutubeScanner::new();
        scanner.match_file(
            dir(),
            "20220106 Gawr Gura Ch. hololive-EN chat with mee_[240]_zp0sfEVWH9A.mkv",
        );
        let pending = scanner.store().pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, "zp0sfEVWH9A");
    }

    #[test]
    fn store_preserves_first_seen_order() {
        let mut store = ScanStore::default();
        store.get_or_insert("bbb");
        store.get_or_insert("aaa");
        store.get_or_insert("bbb");
        let ids: Vec<_> = store.ids().collect();
        assert_eq!(ids, ["bbb", "aaa"]);
        assert_eq!(store.len(), 2);
    }

    proptest! {
        /// Ten-digit runs sitting in free title text, next to characters the
        /// archiving template never produces, must not become identifiers.
        #[test]
        fn free_text_digit_runs_are_never_identifiers(
            title in "[a-z][a-z ]{0,16}",
            digits in 1_000_000_000u64..=9_999_999_999u64,
            sep in prop_oneof![Just(':'), Just('~'), Just('x'), Just(')')],
        ) {
            let name = format!("20220101 {title}{sep}{digits}.mp4");
            let mut scanner = TwitchScanner::new();
            prop_assert!(!scanner.match_file(Path::new("."), &name));
            prop_assert!(scanner.store().is_empty());
        }
    }
}
