//! Atomic JSON object files on disk.
//!
//! Loading is forgiving: anything that is not a readable JSON object of sane
//! size is logged and treated as empty. Saving goes through a temporary file
//! in the destination directory that is renamed over the target, so readers
//! only ever see the old or the new content.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Files larger than this are never parsed.
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

pub type JsonObject = BTreeMap<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Data is not JSON serializable: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Expected a JSON object in {path}, got {found}")]
    NotAnObject { path: PathBuf, found: &'static str },

    #[error("File too large: {size} bytes (max: {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn try_load(path: &Path) -> Result<JsonObject, StoreError> {
    let size = fs::metadata(path).map_err(io_error(path))?.len();
    if size > MAX_FILE_SIZE {
        return Err(StoreError::TooLarge {
            size,
            max: MAX_FILE_SIZE,
        });
    }

    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let value: Value = serde_json::from_str(&content).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => Err(StoreError::NotAnObject {
            path: path.to_path_buf(),
            found: json_type_name(&other),
        }),
    }
}

/// Reads the JSON object stored at `path`, or an empty one.
pub fn load(path: &Path) -> JsonObject {
    if !path.exists() {
        debug!("No file at {}, starting empty", path.display());
        return JsonObject::new();
    }
    match try_load(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load JSON file");
            JsonObject::new()
        }
    }
}

fn write_synced(temp: &mut NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    temp.write_all(bytes)?;
    temp.write_all(b"\n")?;
    temp.flush()?;
    temp.as_file().sync_all()
}

/// Atomically replaces the file at `path` with `data` as indented JSON.
pub fn save<T: Serialize>(path: &Path, data: &BTreeMap<String, T>) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(data).map_err(StoreError::Serialize)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(io_error(dir))?;

    // Dropping an unpersisted temp file deletes it
    let mut temp = tempfile::Builder::new()
        .prefix(".fxwatch-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_error(dir))?;
    if let Err(source) = write_synced(&mut temp, json.as_bytes()) {
        return Err(StoreError::Io {
            path: temp.path().to_path_buf(),
            source,
        });
    }

    temp.persist(path).map_err(|e| StoreError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    debug!("Saved {} entries to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        assert!(load(&dir.path().join("absent.json")).is_empty());
    }

    #[test]
    fn test_invalid_json_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{\"USD_EUR\": ").unwrap();
        assert!(load(&path).is_empty());
    }

    #[test]
    fn test_non_object_root_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2, 3]").unwrap();
        assert!(load(&path).is_empty());
        assert!(matches!(
            try_load(&path),
            Err(StoreError::NotAnObject { found: "array", .. })
        ));
    }

    #[test]
    fn test_oversized_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.json");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_FILE_SIZE + 1).unwrap();
        assert!(load(&path).is_empty());
        assert!(matches!(try_load(&path), Err(StoreError::TooLarge { .. })));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");
        let mut data = BTreeMap::new();
        data.insert("USD_EUR".to_string(), json!({"rate": "0.8500"}));
        data.insert("GBP_JPY".to_string(), json!({"rate": "190.1"}));

        save(&path, &data).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("\n  \"GBP_JPY\""), "indented output: {content}");
        assert_eq!(load(&path), data);
    }

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let data: BTreeMap<String, Value> = BTreeMap::new();
        save(&path, &data).unwrap();
        save(&path, &data).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("data.json")]);
    }

    struct Unserializable;

    impl Serialize for Unserializable {
        fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
            Err(S::Error::custom("not representable"))
        }
    }

    #[test]
    fn test_unserializable_data_never_touches_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "{\"keep\": true}").unwrap();

        let mut data = BTreeMap::new();
        data.insert("bad".to_string(), Unserializable);
        assert!(matches!(save(&path, &data), Err(StoreError::Serialize(_))));

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"keep\": true}");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_failure_reports_io_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be replaced by the renamed temp file
        let path = dir.path().join("occupied");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), "x").unwrap();

        let data: BTreeMap<String, Value> = BTreeMap::new();
        assert!(matches!(save(&path, &data), Err(StoreError::Io { .. })));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
