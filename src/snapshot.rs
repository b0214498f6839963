//! JSON snapshot of the document store.
//!
//! The file holds the full document array (chunks included) and is only a
//! cold-start cache: it is rewritten wholesale after every index pass and
//! read once at startup. A missing or unreadable snapshot means an empty
//! store, never a startup failure.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::Result;
use crate::models::Document;

/// Load documents from `path`, or nothing if the file is absent or does
/// not parse.
pub fn load(path: &Path) -> Vec<Document> {
    if !path.exists() {
        debug!(path = %path.display(), "no snapshot, starting empty");
        return Vec::new();
    }
    match read(path) {
        Ok(documents) => documents,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable snapshot");
            Vec::new()
        }
    }
}

pub fn read(path: &Path) -> Result<Vec<Document>> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Write `documents` to a sibling temp file, then rename it over `path`.
pub fn save(path: &Path, documents: &[Document]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(documents)?;
    let tmp = temp_path(path);
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn document(id: u64) -> Document {
        Document {
            id,
            filename: format!("ata{id}.txt"),
            content: "Reunião do conselho.".to_string(),
            chunks: vec!["Reunião do conselho.".to_string()],
            source_path: format!("/atas/ata{id}.txt"),
            indexed_at: NaiveDate::from_ymd_opt(2024, 1, 12)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("index.json");
        let docs = vec![document(1), document(2)];
        save(&path, &docs).unwrap();
        assert_eq!(load(&path), docs);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_field_names() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        save(&path, &[document(1)]).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entry = &value[0];
        for field in ["id", "filename", "content", "chunks", "file_path", "indexed_at"] {
            assert!(entry.get(field).is_some(), "missing field {field}");
        }
        assert_eq!(entry["indexed_at"], "2024-01-12T09:30:00");
    }

    #[test]
    fn test_missing_or_corrupt_snapshot_is_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("index.json");
        assert!(load(&path).is_empty());

        std::fs::write(&path, "{ not json").unwrap();
        assert!(load(&path).is_empty());
        assert!(read(&path).is_err());

        std::fs::write(&path, r#"[{"id": 1, "filename": "a.txt"}]"#).unwrap();
        assert!(load(&path).is_empty());
    }
}
