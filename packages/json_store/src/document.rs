//! One JSON document on disk and the marker-file protocol around it.
//!
//! Next to `db.json` live two companions:
//!
//! - `db.avail` - the lock marker, holding `in use` or `available`
//! - `db.json_backup` - a copy of the document as it was before the last
//!   write started
//!
//! A writer waits for the marker to read `available` (or be absent), sets
//! it to `in use`, parses the document, copies it to the backup, rewrites
//! it, and sets the marker back to `available` no matter how the rewrite
//! went. A document that fails to parse is never copied to the backup; the
//! backup is copied back over it instead, as it is when the rewrite fails.
//! Readers wait on the marker the same way but never set it.
//!
//! The check and the set are two separate filesystem operations, so two
//! writers can still both get in; the lock is advisory. A writer that dies
//! while holding the marker leaves it `in use` and every later access waits
//! until a human resets it, or until a [`LockPolicy::timeout`] runs out.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

use crate::Error;

const IN_USE: &str = "in use";
const AVAILABLE: &str = "available";

/// Waits between marker polls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How long to wait for the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for LockPolicy {
    fn default() -> Self {
        LockPolicy {
            poll_interval: Duration::from_millis(100),
            timeout: None,
        }
    }
}

/// Marker file for a document: `db.json` -> `db.avail`.
pub fn marker_path(document: &Path) -> PathBuf {
    let name = document
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let marker = match name.strip_suffix(".json") {
        Some(stem) => format!("{}.avail", stem),
        None => format!("{}.avail", name),
    };
    document.with_file_name(marker)
}

/// Backup file for a document: `db.json` -> `db.json_backup`.
pub fn backup_path(document: &Path) -> PathBuf {
    let mut name = document.as_os_str().to_owned();
    name.push("_backup");
    PathBuf::from(name)
}

#[derive(Clone)]
pub struct JsonDocument {
    path: PathBuf,
    marker: PathBuf,
    backup: PathBuf,
    policy: LockPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for JsonDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDocument")
            .field("path", &self.path)
            .field("policy", &self.policy)
            .finish()
    }
}

impl JsonDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        JsonDocument {
            marker: marker_path(&path),
            backup: backup_path(&path),
            path,
            policy: LockPolicy::default(),
            sleeper: Arc::new(ThreadSleeper),
        }
    }

    pub fn with_policy(mut self, policy: LockPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn marker(&self) -> &Path {
        &self.marker
    }

    pub fn backup(&self) -> &Path {
        &self.backup
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn marker_in_use(&self) -> Result<bool, Error> {
        match fs::read_to_string(&self.marker) {
            Ok(state) => Ok(state.trim() == IN_USE),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::io(&self.marker, e)),
        }
    }

    fn wait_available(&self) -> Result<(), Error> {
        let mut waited = Duration::ZERO;
        while self.marker_in_use()? {
            if let Some(limit) = self.policy.timeout {
                if waited >= limit {
                    return Err(Error::LockTimeout {
                        marker: self.marker.clone(),
                        waited,
                    });
                }
            }
            log::trace!("{} in use, waiting", self.path.display());
            self.sleeper.sleep(self.policy.poll_interval);
            waited += self.policy.poll_interval;
        }
        Ok(())
    }

    fn set_marker(&self, state: &str) -> Result<(), Error> {
        fs::write(&self.marker, state).map_err(|e| Error::io(&self.marker, e))
    }

    /// Put the backup back in place of a document that failed to read or
    /// write.
    fn recover(&self, message: String) -> Error {
        if !self.backup.is_file() {
            return Error::DocumentCorrupt {
                path: self.path.clone(),
                message,
            };
        }

        log::warn!(
            "Failure on {}, falling back to {}: {}",
            self.path.display(),
            self.backup.display(),
            message
        );
        match fs::copy(&self.backup, &self.path) {
            Ok(_) => Error::DocumentRestored {
                path: self.path.clone(),
                message,
            },
            Err(e) => Error::DocumentCorrupt {
                path: self.path.clone(),
                message: format!("{}; restoring backup also failed: {}", message, e),
            },
        }
    }

    fn load(&self) -> Result<Map<String, JsonValue>, String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.to_string()),
        };
        match serde_json::from_str(&text).map_err(|e| e.to_string())? {
            JsonValue::Object(map) => Ok(map),
            other => Err(format!("top level is not an object: {}", other)),
        }
    }

    /// The document's top-level object, or `None` if there is no document.
    pub fn read(&self) -> Result<Option<Map<String, JsonValue>>, Error> {
        if !self.exists() {
            return Ok(None);
        }
        self.wait_available()?;

        log::debug!("Reading {}...", self.path.display());
        match self.load() {
            Ok(map) => Ok(Some(map)),
            Err(message) => Err(self.recover(message)),
        }
    }

    /// Read-modify-write under the marker.
    ///
    /// `modify` sees the current top-level object (empty if there is no
    /// document yet). If it fails, its error is returned and the document is
    /// left as it was. If the document cannot be read or written, the backup
    /// is restored.
    pub fn update<F, R>(&self, modify: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Map<String, JsonValue>) -> Result<R, Error>,
    {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.is_dir() {
                return Err(locfs_series::Error::MissingDirectory {
                    path: dir.to_path_buf(),
                }
                .into());
            }
        }

        self.wait_available()?;
        self.set_marker(IN_USE)?;

        let result = self.rewrite(modify);
        let reset = self.set_marker(AVAILABLE);

        let value = result?;
        reset?;
        Ok(value)
    }

    fn rewrite<F, R>(&self, modify: F) -> Result<R, Error>
    where
        F: FnOnce(&mut Map<String, JsonValue>) -> Result<R, Error>,
    {
        // A document that does not parse must not replace the backup.
        let mut map = self.load().map_err(|message| self.recover(message))?;
        if self.exists() {
            fs::copy(&self.path, &self.backup).map_err(|e| Error::io(&self.backup, e))?;
        }

        // Nothing has been written yet, so the document is intact.
        let value = modify(&mut map)?;

        log::debug!("Writing {}...", self.path.display());
        let written = serde_json::to_string_pretty(&JsonValue::Object(map))
            .map_err(|e| e.to_string())
            .and_then(|text| fs::write(&self.path, text).map_err(|e| e.to_string()));
        match written {
            Ok(()) => Ok(value),
            Err(message) => Err(self.recover(message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Runs one scripted action per sleep, standing in for whatever another
    /// process does while this one waits.
    #[derive(Default)]
    struct Scripted {
        actions: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl Scripted {
        fn then(self, action: impl FnOnce() + Send + 'static) -> Self {
            self.actions.lock().unwrap().insert(0, Box::new(action));
            self
        }
    }

    impl Sleeper for Scripted {
        fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
            let action = self.actions.lock().unwrap().pop();
            if let Some(action) = action {
                action();
            }
        }
    }

    fn put(map: &mut Map<String, JsonValue>, key: &str, value: i64) {
        map.insert(key.to_string(), JsonValue::from(value));
    }

    #[test]
    fn companion_names() {
        let doc = Path::new("/data/SPC/db.json");
        assert_eq!(marker_path(doc), PathBuf::from("/data/SPC/db.avail"));
        assert_eq!(backup_path(doc), PathBuf::from("/data/SPC/db.json_backup"));
        assert_eq!(
            marker_path(Path::new("/data/entries")),
            PathBuf::from("/data/entries.avail")
        );
    }

    #[test]
    fn missing_document_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        assert!(doc.read().unwrap().is_none());
    }

    #[test]
    fn update_leaves_marker_available() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        doc.update(|map| {
            put(map, "a", 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(fs::read_to_string(doc.marker()).unwrap(), "available");
        assert!(!doc.backup().exists());

        doc.update(|map| {
            put(map, "b", 2);
            Ok(())
        })
        .unwrap();
        let map = doc.read().unwrap().unwrap();
        assert_eq!(map["a"], 1);
        assert_eq!(map["b"], 2);

        // The backup holds the document as it was before the last write.
        let backup: JsonValue =
            serde_json::from_str(&fs::read_to_string(doc.backup()).unwrap()).unwrap();
        assert_eq!(backup, serde_json::json!({"a": 1}));
    }

    #[test]
    fn failed_modify_keeps_document_and_error() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        let conflict = || {
            Err::<(), _>(Error::NotAnObject {
                path: PathBuf::from("db.json"),
                key: "b".to_string(),
            })
        };

        // No document and no backup yet: still not a corruption.
        let err = doc.update(|_| conflict()).unwrap_err();
        assert!(matches!(err, Error::NotAnObject { .. }), "{:?}", err);
        assert!(!doc.exists());

        doc.update(|map| {
            put(map, "a", 1);
            Ok(())
        })
        .unwrap();

        let err = doc
            .update(|map| {
                put(map, "b", 2);
                conflict()
            })
            .unwrap_err();
        assert!(matches!(err, Error::NotAnObject { .. }), "{:?}", err);
        assert_eq!(doc.read().unwrap().unwrap().len(), 1);
        assert_eq!(fs::read_to_string(doc.marker()).unwrap(), "available");
    }

    #[test]
    fn torn_document_does_not_replace_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        doc.update(|map| {
            put(map, "a", 1);
            Ok(())
        })
        .unwrap();
        doc.update(|map| {
            put(map, "b", 2);
            Ok(())
        })
        .unwrap();

        // A writer died halfway through the next rewrite.
        fs::write(doc.path(), r#"{"a": 1, "b"#).unwrap();

        let err = doc
            .update(|map| {
                put(map, "c", 3);
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, Error::DocumentRestored { .. }), "{:?}", err);

        let backup: JsonValue =
            serde_json::from_str(&fs::read_to_string(doc.backup()).unwrap()).unwrap();
        assert_eq!(backup, serde_json::json!({"a": 1}));
        let map = doc.read().unwrap().unwrap();
        assert_eq!(map["a"], 1);
        assert!(!map.contains_key("c"));
        assert_eq!(fs::read_to_string(doc.marker()).unwrap(), "available");
    }

    #[test]
    fn corrupt_read_restores_backup() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        fs::write(doc.backup(), r#"{"a": 1}"#).unwrap();
        fs::write(doc.path(), r#"{"a": 1, "b":"#).unwrap();

        let err = doc.read().unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(doc.read().unwrap().unwrap()["a"], 1);
    }

    #[test]
    fn corrupt_without_backup_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("db.json"));
        fs::write(doc.path(), "[1, 2").unwrap();
        assert!(matches!(
            doc.read(),
            Err(Error::DocumentCorrupt { .. })
        ));
    }

    #[test]
    fn waits_for_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db.json");
        let marker = marker_path(&path);
        fs::write(&marker, "in use").unwrap();

        let release = marker.clone();
        let sleeper = Arc::new(
            Scripted::default()
                .then(|| {})
                .then(move || fs::write(&release, "available").unwrap()),
        );
        let doc = JsonDocument::new(&path).with_sleeper(sleeper.clone());
        doc.update(|map| {
            put(map, "a", 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_millis(100); 2]
        );
    }

    #[test]
    fn wedged_marker_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db.json");
        fs::write(marker_path(&path), "in use").unwrap();

        let doc = JsonDocument::new(&path)
            .with_sleeper(Arc::new(Scripted::default()))
            .with_policy(LockPolicy {
                poll_interval: Duration::from_millis(50),
                timeout: Some(Duration::from_millis(200)),
            });
        let err = doc.update(|_| Ok(())).unwrap_err();
        match err {
            Error::LockTimeout { waited, .. } => assert_eq!(waited, Duration::from_millis(200)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!path.exists());
    }

    #[test]
    fn missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let doc = JsonDocument::new(tmp.path().join("SPC").join("db.json"));
        assert!(matches!(
            doc.update(|_| Ok(())),
            Err(Error::Series(locfs_series::Error::MissingDirectory { .. }))
        ));
    }
}
