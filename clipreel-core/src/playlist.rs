use std::path::Path;

use tokio::fs;
use tracing::info;

use crate::clip::DownloadRecord;

pub const PLAYLIST_HEADER: &str = "#EXTM3U";
pub const PLAYLIST_FILE_NAME: &str = "playlist.m3u";

/// Placeholder duration written for every entry; clips are not probed.
pub const DEFAULT_ENTRY_SECONDS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub duration_seconds: u32,
    pub file_name: String,
    pub sequence_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlaylistDocument {
    entries: Vec<PlaylistEntry>,
}

impl PlaylistDocument {
    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn render(&self) -> String {
        let mut lines = Vec::with_capacity(1 + self.entries.len() * 2);
        lines.push(PLAYLIST_HEADER.to_string());
        for entry in &self.entries {
            lines.push(format!(
                "#EXTINF:{},{}",
                entry.duration_seconds, entry.file_name
            ));
            lines.push(entry.file_name.clone());
        }
        lines.join("\n")
    }

    pub async fn write_to(&self, path: &Path) -> std::io::Result<()> {
        fs::write(path, self.render()).await?;
        info!(path = %path.display(), entries = self.entries.len(), "wrote playlist");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlaylistBuilder {
    entry_seconds: u32,
}

impl Default for PlaylistBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_SECONDS)
    }
}

impl PlaylistBuilder {
    pub fn new(entry_seconds: u32) -> Self {
        Self { entry_seconds }
    }

    /// Entries follow `sequence_index`, whatever order the records arrive in.
    pub fn build(&self, records: &[DownloadRecord]) -> PlaylistDocument {
        let mut ordered: Vec<&DownloadRecord> = records.iter().collect();
        ordered.sort_by_key(|record| record.sequence_index);
        let entries = ordered
            .into_iter()
            .map(|record| PlaylistEntry {
                duration_seconds: self.entry_seconds,
                file_name: record.file_name(),
                sequence_index: record.sequence_index,
            })
            .collect();
        PlaylistDocument { entries }
    }
}
