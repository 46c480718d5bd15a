use std::path::{Path, PathBuf};

use log::warn;
use walkdir::WalkDir;

/// Lists the `*.log` files under `root` in path order.
///
/// A `root` that is itself a file is returned as-is, whatever its extension.
pub fn collect_log_files(root: &Path, recursive: bool) -> Vec<PathBuf> {
    if root.is_file() {
        return vec![root.to_path_buf()];
    }

    let mut walker = WalkDir::new(root).min_depth(1).follow_links(true);
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files: Vec<PathBuf> = walker
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_log_file(path))
        .collect();
    files.sort();
    files
}

fn is_log_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "log")
}
