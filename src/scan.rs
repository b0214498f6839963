use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DocumentsConfig;
use crate::error::{Error, Result};
use crate::extract::DocumentKind;

/// A file selected for indexing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub path: PathBuf,
    /// Path relative to the scanned directory.
    pub filename: String,
    pub kind: DocumentKind,
}

/// List indexable files under `root` in directory-listing order (sorted by
/// file name). Descends into subdirectories only when `recursive` is set.
pub fn scan_directory(root: &Path, config: &DocumentsConfig) -> Result<Vec<ScannedFile>> {
    if !root.is_dir() {
        return Err(Error::DirectoryMissing(root.to_path_buf()));
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name();
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        // One unreadable entry (dangling link, permission denied) must not
        // abort the pass. Only the root itself is fatal.
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(e.into()),
            Err(e) => {
                warn!(
                    path = %e.path().map(|p| p.display().to_string()).unwrap_or_default(),
                    error = %e,
                    "skipping unreadable entry"
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        // Hidden files and office lock files (`~$ata.docx`)
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || name.starts_with("~$") {
            continue;
        }

        if !include_set.is_match(&rel_str) {
            continue;
        }

        let Some(kind) = DocumentKind::from_path(path) else {
            debug!(file = %rel_str, "unsupported extension, skipping");
            continue;
        };

        files.push(ScannedFile {
            path: path.to_path_buf(),
            filename: rel_str,
            kind,
        });
    }

    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}
