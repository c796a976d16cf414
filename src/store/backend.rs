use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::Result;

/// Key-value persistence underneath the record store. Each key holds one
/// JSON array.
pub trait StorageBackend {
    fn load(&self, key: &str) -> Result<Option<String>>;

    fn save(&mut self, key: &str, value: &str) -> Result<()>;

    /// Write several keys as one unit. Implementations should not leave a
    /// mix of old and new values behind when they can avoid it.
    fn save_all(&mut self, entries: &[(&str, String)]) -> Result<()> {
        for (key, value) in entries {
            self.save(key, value)?;
        }
        Ok(())
    }
}

/// In-process backend, used by tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    entries: HashMap<String, String>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl StorageBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per collection inside a data directory.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    dir: PathBuf,
}

impl JsonFileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn staging_path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.tmp"))
    }
}

impl StorageBackend for JsonFileBackend {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let staging = self.staging_path_for(key);
        fs::write(&staging, value)?;
        fs::rename(staging, self.path_for(key))?;
        Ok(())
    }

    /// Stage every file before renaming any of them, so a failed write
    /// leaves all the old files in place. The renames themselves are not
    /// atomic as a group: if one fails, keys already renamed keep their new
    /// contents, and the staging files that were not renamed are removed.
    fn save_all(&mut self, entries: &[(&str, String)]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        for (key, value) in entries {
            if let Err(e) = fs::write(self.staging_path_for(key), value) {
                self.discard_staging(entries);
                return Err(e.into());
            }
        }

        for (i, (key, _)) in entries.iter().enumerate() {
            if let Err(e) = fs::rename(self.staging_path_for(key), self.path_for(key)) {
                warn!(key = %key, error = %e, "rename failed, collections may be partially written");
                self.discard_staging(&entries[i..]);
                return Err(e.into());
            }
        }
        Ok(())
    }
}

impl JsonFileBackend {
    fn discard_staging(&self, entries: &[(&str, String)]) {
        for (key, _) in entries {
            let _ = fs::remove_file(self.staging_path_for(key));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_backend_round_trips_and_cleans_staging() {
        let temp = TempDir::new().unwrap();
        let mut backend = JsonFileBackend::new(temp.path().join("data"));

        assert_eq!(backend.load("courses").unwrap(), None);

        backend
            .save_all(&[("courses", "[1]".to_string()), ("students", "[]".to_string())])
            .unwrap();

        assert_eq!(backend.load("courses").unwrap().as_deref(), Some("[1]"));
        assert_eq!(backend.load("students").unwrap().as_deref(), Some("[]"));
        assert!(!temp.path().join("data/courses.json.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_leftover_staging_files() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("data");
        let mut backend = JsonFileBackend::new(&dir);

        // A non-empty directory where students.json should go makes its rename fail
        fs::create_dir_all(dir.join("students.json/keep")).unwrap();

        let result = backend.save_all(&[
            ("courses", "[1]".to_string()),
            ("students", "[]".to_string()),
            ("courseFees", "[]".to_string()),
        ]);

        assert!(result.is_err());
        assert!(!dir.join("students.json.tmp").exists());
        assert!(!dir.join("courseFees.json.tmp").exists());
        assert!(!dir.join("courseFees.json").exists());
    }
}
