use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::SpeedMap;

/// File extensions handled by the batch, matched case-insensitively.
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a"];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Recursively collect all supported audio files under `root`.
///
/// Unreadable entries are logged and skipped. The result is sorted so
/// repeated runs visit files in the same order.
pub fn discover_audio_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = Vec::new();

    for entry in WalkDir::new(root) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() && is_audio_file(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(e) => warn!("skipping unreadable entry: {}", e),
        }
    }

    files.sort();
    files
}

/// Group files by the nearest ancestor folder with a configured speed.
///
/// The walk starts at each file's own parent and stops at the input root,
/// so every file lands in exactly one group.
pub fn group_by_speed_folder(
    files: Vec<PathBuf>,
    speeds: &SpeedMap,
) -> BTreeMap<PathBuf, Vec<PathBuf>> {
    let mut groups: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();

    for file in files {
        let parent = file.parent().unwrap_or_else(|| speeds.root());
        let key = speeds.group_key(parent).to_path_buf();
        groups.entry(key).or_default().push(file);
    }

    groups
}
