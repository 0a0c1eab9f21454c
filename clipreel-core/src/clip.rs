use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Longest stem taken from a clip title when naming its local file.
pub const MAX_TITLE_STEM: usize = 50;

pub const CLIP_EXTENSION: &str = "mp4";

/// One clip as listed by the platform. `window_position` is its index in the
/// catalog response and is the ordering every later stage follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClipDescriptor {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub video_id: Option<String>,
    pub window_position: usize,
}

impl ClipDescriptor {
    pub fn file_name(&self) -> String {
        clip_file_name(&self.title, &self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub clip_id: String,
    pub media_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadRecord {
    pub clip_id: String,
    pub local_path: PathBuf,
    pub sequence_index: usize,
}

impl DownloadRecord {
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

fn non_word() -> &'static Regex {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    NON_WORD.get_or_init(|| Regex::new("[^A-Za-z0-9_]+").expect("static pattern"))
}

/// Collapses every run of non-word characters into a single `-`.
pub fn sanitize_component(raw: &str) -> String {
    non_word().replace_all(raw, "-").into_owned()
}

/// `<title stem>_<clip id>.mp4`, with the stem cut to [`MAX_TITLE_STEM`] characters.
pub fn clip_file_name(title: &str, clip_id: &str) -> String {
    let stem: String = sanitize_component(title)
        .chars()
        .take(MAX_TITLE_STEM)
        .collect();
    format!(
        "{stem}_{id}.{CLIP_EXTENSION}",
        id = sanitize_component(clip_id)
    )
}

pub fn clip_path(run_dir: &Path, clip: &ClipDescriptor) -> PathBuf {
    run_dir.join(clip.file_name())
}
