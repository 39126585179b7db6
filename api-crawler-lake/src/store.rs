//! Append-only JSON call logs with file locking
//!
//! Each `component.operation` key owns one file holding a pretty-printed JSON
//! array of [`CallLogEntry`] values. Appends hold an exclusive lock on a
//! sidecar `<file>.lock` for the whole read-modify-write and replace the log
//! through a temp file renamed into place, so concurrent writers in this or
//! other processes never lose entries and readers never see a half-written
//! file.

use crate::entry::{log_file_name, CallLogEntry};
use crate::error::{LakeError, LakeResult};
use api_crawler_config::LakeConfig;
use fs2::FileExt;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};
use ulid::Ulid;

/// Directory of per-operation call logs
#[derive(Debug, Clone)]
pub struct DataLake {
    base_dir: PathBuf,
}

impl DataLake {
    /// Create a lake rooted at `base_dir`. The directory is created on first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn from_config(config: &LakeConfig) -> Self {
        Self::new(config.base_dir.clone())
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of the log for a `component.operation` key
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.base_dir.join(log_file_name(key))
    }

    /// Append one entry to the log for `key`
    ///
    /// A log that cannot be read or parsed is treated as empty and replaced,
    /// dropping its previous contents.
    pub fn append(&self, key: &str, entry: &CallLogEntry) -> LakeResult<()> {
        fs::create_dir_all(&self.base_dir)
            .map_err(|e| LakeError::io("create lake directory", &self.base_dir, e))?;

        let path = self.path_for(key);
        let _lock = acquire_lock(&path)?;

        let mut entries = load_for_append(&path);
        entries.push(serde_json::to_value(entry)?);

        let content = serde_json::to_vec_pretty(&entries)?;
        atomic_write(&path, &content)?;

        trace!(
            "Appended entry {} to {} ({} total)",
            entry.id,
            path.display(),
            entries.len()
        );
        Ok(())
    }

    /// Every entry recorded under `key`, oldest first
    ///
    /// Unlike [`append`](Self::append), a corrupt log is an error here.
    pub fn entries(&self, key: &str) -> LakeResult<Vec<CallLogEntry>> {
        read_log(&self.path_for(key))
    }

    /// Sanitized keys of every log in the lake, sorted
    ///
    /// `Demo.fetch` is listed as `Demo_fetch`; [`entries`](Self::entries)
    /// accepts either form.
    pub fn keys(&self) -> LakeResult<Vec<String>> {
        let dir = match fs::read_dir(&self.base_dir) {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(LakeError::io("list lake directory", &self.base_dir, e)),
        };

        let mut keys = Vec::new();
        for item in dir {
            let item = item.map_err(|e| LakeError::io("list lake directory", &self.base_dir, e))?;
            let path = item.path();

            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                if !stem.starts_with('.') {
                    keys.push(stem.to_string());
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Read a call log file
///
/// A missing file is an empty log. Invalid JSON is [`LakeError::Corrupt`].
pub fn read_log(path: &Path) -> LakeResult<Vec<CallLogEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LakeError::io("read call log", path, e)),
    };

    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(&content).map_err(|source| LakeError::Corrupt {
        path: path.to_path_buf(),
        source,
    })
}

/// Existing entries for an append, kept as raw JSON so older entries survive
/// untouched. Anything unreadable counts as an empty log.
fn load_for_append(path: &Path) -> Vec<Value> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(
                "Call log '{}' is unreadable, starting a new one: {}",
                path.display(),
                e
            );
            return Vec::new();
        }
    };

    if content.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<Vec<Value>>(&content) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Call log '{}' is not a JSON array, starting a new one: {}",
                path.display(),
                e
            );
            Vec::new()
        }
    }
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".lock");
    path.with_file_name(name)
}

/// Acquire an exclusive lock for a log file.
///
/// The lock is released when the returned handle is dropped.
fn acquire_lock(path: &Path) -> LakeResult<File> {
    let lock_path = lock_path(path);

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| LakeError::io("open call log lock", &lock_path, e))?;

    // Blocks until every other writer has released it
    lock_file
        .lock_exclusive()
        .map_err(|e| LakeError::io("lock call log", &lock_path, e))?;

    trace!("Acquired lock {}", lock_path.display());
    Ok(lock_file)
}

/// Write to a temp file in the same directory then rename over `path`.
fn atomic_write(path: &Path, data: &[u8]) -> LakeResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| {
            LakeError::io(
                "resolve call log directory",
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "no parent dir"),
            )
        })?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));

    if let Err(e) = fs::write(&tmp, data) {
        let _ = fs::remove_file(&tmp);
        return Err(LakeError::io("write call log", &tmp, e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(LakeError::io("replace call log", path, e));
    }

    debug!("Wrote call log {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::PendingCall;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn setup_test_lake() -> (DataLake, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let lake = DataLake::new(temp_dir.path().join("lakes"));
        (lake, temp_dir)
    }

    fn entry(n: i64) -> CallLogEntry {
        PendingCall::start(&json!({ "n": n })).succeed(json!(n))
    }

    #[test]
    fn test_entries_of_missing_log_is_empty() {
        let (lake, _temp_dir) = setup_test_lake();
        assert!(lake.entries("Demo.fetch").unwrap().is_empty());
        assert!(lake.keys().unwrap().is_empty());
    }

    #[test]
    fn test_append_creates_directory_and_file() {
        let (lake, _temp_dir) = setup_test_lake();

        lake.append("Demo.fetch", &entry(1)).unwrap();

        let path = lake.base_dir().join("Demo_fetch.json");
        assert!(path.is_file());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_append_preserves_order() {
        let (lake, _temp_dir) = setup_test_lake();

        for n in 0..5 {
            lake.append("Demo.fetch", &entry(n)).unwrap();
        }

        let outputs: Vec<Value> = lake
            .entries("Demo.fetch")
            .unwrap()
            .into_iter()
            .map(|e| e.output)
            .collect();
        assert_eq!(outputs, vec![json!(0), json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_keys_lists_sanitized_names() {
        let (lake, _temp_dir) = setup_test_lake();

        lake.append("GithubApi.get_repo_pulls", &entry(1)).unwrap();
        lake.append("Demo.fetch", &entry(2)).unwrap();

        assert_eq!(
            lake.keys().unwrap(),
            vec!["Demo_fetch".to_string(), "GithubApi_get_repo_pulls".to_string()]
        );
        assert_eq!(lake.entries("Demo_fetch").unwrap().len(), 1);
    }

    #[test_log::test]
    fn test_corrupt_log_is_replaced_on_append() {
        let (lake, _temp_dir) = setup_test_lake();
        fs::create_dir_all(lake.base_dir()).unwrap();
        fs::write(lake.path_for("Demo.fetch"), "{not json").unwrap();

        assert!(matches!(
            lake.entries("Demo.fetch"),
            Err(LakeError::Corrupt { .. })
        ));

        lake.append("Demo.fetch", &entry(7)).unwrap();

        let entries = lake.entries("Demo.fetch").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].output, json!(7));
    }

    #[test]
    fn test_foreign_entries_survive_append() {
        let (lake, _temp_dir) = setup_test_lake();
        fs::create_dir_all(lake.base_dir()).unwrap();
        fs::write(lake.path_for("Demo.fetch"), r#"[{"legacy": true}]"#).unwrap();

        lake.append("Demo.fetch", &entry(1)).unwrap();

        let raw: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(lake.path_for("Demo.fetch")).unwrap())
                .unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0], json!({"legacy": true}));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let (lake, _temp_dir) = setup_test_lake();
        lake.append("Demo.fetch", &entry(1)).unwrap();

        let leftovers: Vec<_> = fs::read_dir(lake.base_dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp_"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_concurrent_appends_lose_nothing() {
        let (lake, _temp_dir) = setup_test_lake();
        let lake = Arc::new(lake);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let lake = Arc::clone(&lake);
                thread::spawn(move || {
                    for n in 0..10 {
                        lake.append("Demo.fetch", &entry(t * 100 + n)).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let entries = lake.entries("Demo.fetch").unwrap();
        assert_eq!(entries.len(), 80);

        let mut ids: Vec<_> = entries.iter().map(|e| e.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 80);
    }

    #[test]
    fn test_lock_path_is_sidecar() {
        assert_eq!(
            lock_path(Path::new("/tmp/lakes/Demo_fetch.json")),
            PathBuf::from("/tmp/lakes/Demo_fetch.json.lock")
        );
    }

    #[test]
    fn test_from_config() {
        let config = LakeConfig {
            base_dir: PathBuf::from("/data/lakes"),
        };
        assert_eq!(
            DataLake::from_config(&config).path_for("Demo.fetch"),
            PathBuf::from("/data/lakes/Demo_fetch.json")
        );
    }
}
