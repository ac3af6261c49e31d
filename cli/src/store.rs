//! Record store persisted as one JSON document per agent.

use std::path::{Path, PathBuf};

use kotoba_core::request::Fields;
use kotoba_core::{MemoryStore, Record, RecordId, RecordStore, StoreError};

pub struct JsonFileStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), records = inner.len(), "opened record file");
        Ok(Self { path, inner })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(&self.inner)?;
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn create(&mut self, fields: &Fields) -> Result<RecordId, StoreError> {
        let id = self.inner.create(fields)?;
        self.save()?;
        Ok(id)
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        self.inner.get(id)
    }

    fn list(&self, filters: &Fields) -> Result<Vec<Record>, StoreError> {
        self.inner.list(filters)
    }

    fn update(&mut self, id: RecordId, fields: &Fields) -> Result<bool, StoreError> {
        let updated = self.inner.update(id, fields)?;
        if updated {
            self.save()?;
        }
        Ok(updated)
    }

    fn delete(&mut self, id: RecordId) -> Result<bool, StoreError> {
        let deleted = self.inner.delete(id)?;
        if deleted {
            self.save()?;
        }
        Ok(deleted)
    }

    fn search(&self, keyword: &str) -> Result<Vec<Record>, StoreError> {
        self.inner.search(keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch(name: &str) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("kotoba-{}", std::process::id()))
            .join(format!("{name}.json"));
        let _ = std::fs::remove_file(&path);
        path
    }

    #[test]
    fn records_survive_reopening() {
        let path = scratch("reopen");
        let mut fields = Fields::new();
        fields.insert("title".to_string(), json!("coffee"));

        let mut store = JsonFileStore::open(&path).expect("open");
        let id = store.create(&fields).expect("create");

        let reopened = JsonFileStore::open(&path).expect("reopen");
        let record = reopened.get(id).expect("get").expect("persisted");
        assert_eq!(record.text("title"), Some("coffee"));

        let mut reopened = reopened;
        assert!(reopened.delete(id).expect("delete"));
        let again = JsonFileStore::open(&path).expect("reopen");
        assert!(again.get(id).expect("get").is_none());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn ids_keep_increasing_after_reopen() {
        let path = scratch("ids");
        let fields = Fields::new();
        let mut store = JsonFileStore::open(&path).expect("open");
        store.create(&fields).expect("create");
        store.create(&fields).expect("create");
        assert!(store.delete(2).expect("delete"));

        let mut store = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(store.create(&fields).expect("create"), 3);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let path = scratch("corrupt");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("scratch dir");
        }
        std::fs::write(&path, "not json").expect("write");
        assert!(matches!(JsonFileStore::open(&path), Err(StoreError::Corrupt(_))));
        let _ = std::fs::remove_file(&path);
    }
}
