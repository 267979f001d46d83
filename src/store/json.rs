use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::domain::todo::{TodoDocument, TodoItem};
use crate::store::repo::TodoRepository;
use crate::{Error, Result};

/// Task store backed by a single JSON document (an array of task
/// records).
///
/// Changes stay in memory until [`TodoRepository::save`] is called.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    items: HashMap<String, TodoItem>,
}

impl JsonStore {
    /// Loads the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("no task store at {}, starting empty", path.display());
                return Ok(Self {
                    path,
                    items: HashMap::new(),
                });
            }
            Err(err) => return Err(Error::ReadStore(path, err)),
        };

        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(err) => return Err(Error::CorruptStore(path, err)),
        };

        let mut items = HashMap::with_capacity(values.len());
        for (index, value) in values.into_iter().enumerate() {
            let item = match TodoItem::from_json(value) {
                Ok(item) => item,
                Err(err) => return Err(Error::CorruptStoreEntry(path, index, Box::new(err))),
            };
            items.insert(item.message_id().to_owned(), item);
        }

        debug!("loaded {} task(s) from {}", items.len(), path.display());
        Ok(Self { path, items })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl TodoRepository for JsonStore {
    fn add(&mut self, item: TodoItem, overwrite: bool) -> Result<()> {
        if !overwrite && self.items.contains_key(item.message_id()) {
            return Err(Error::DuplicateKey(item.message_id().to_owned()));
        }
        self.items.insert(item.message_id().to_owned(), item);
        Ok(())
    }

    fn get(&self, message_id: &str) -> Option<&TodoItem> {
        self.items.get(message_id)
    }

    fn update(&mut self, item: TodoItem) -> Result<()> {
        match self.items.get_mut(item.message_id()) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(Error::NotFound(item.message_id().to_owned())),
        }
    }

    fn remove(&mut self, message_id: &str) {
        self.items.remove(message_id);
    }

    fn contains(&self, message_id: &str) -> bool {
        self.items.contains_key(message_id)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn all(&self) -> Vec<TodoItem> {
        let mut out: Vec<TodoItem> = self.items.values().cloned().collect();
        out.sort_by(|a, b| {
            a.scheduled_for()
                .cmp(&b.scheduled_for())
                .then_with(|| a.message_id().cmp(b.message_id()))
        });
        out
    }

    fn save(&self) -> Result<()> {
        let docs: Vec<TodoDocument> = self.all().iter().map(TodoItem::to_document).collect();
        let data = serde_json::to_string_pretty(&docs).map_err(Error::SerializeStore)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| Error::WriteStore(self.path.clone(), err))?;
        }

        // write aside then swap, a crash never leaves a half-written store
        let tmp = self.temp_path();
        fs::write(&tmp, data).map_err(|err| Error::WriteStore(tmp.clone(), err))?;
        fs::rename(&tmp, &self.path).map_err(|err| Error::WriteStore(self.path.clone(), err))?;

        info!("saved {} task(s) to {}", self.items.len(), self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use tempfile::tempdir;

    use super::*;
    use crate::domain::todo::Timestamp;

    fn at(hour: u32) -> Timestamp {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2023, 1, 1, hour, 0, 0)
            .unwrap()
    }

    fn item(id: &str, hour: u32) -> TodoItem {
        TodoItem::new(id, "Subject", "sender@example.com", at(hour), at(hour))
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempdir().unwrap();
        let store = JsonStore::load(dir.path().join("state.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let mut store = JsonStore::load(&path).unwrap();
        store.add(item("abc", 12), false).unwrap();
        store.save().unwrap();

        let loaded = JsonStore::load(&path).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.get("abc").unwrap().subject(), "Subject");
        assert_eq!(loaded.get("abc"), store.get("abc"));
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[test]
    fn add_rejects_duplicates_unless_overwrite() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load(dir.path().join("state.json")).unwrap();

        store.add(item("dup", 9), false).unwrap();
        let err = store.add(item("dup", 10), false).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(id) if id == "dup"));

        store.add(item("dup", 11), true).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("dup").unwrap().scheduled_for(), at(11));
    }

    #[test]
    fn update_requires_existing_item() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load(dir.path().join("state.json")).unwrap();

        let err = store.update(item("ghost", 9)).unwrap_err();
        assert!(matches!(err, Error::NotFound(id) if id == "ghost"));

        store.add(item("real", 9), false).unwrap();
        let mut done = item("real", 9);
        done.complete();
        store.update(done).unwrap();
        assert!(store.get("real").unwrap().is_completed());
    }

    #[test]
    fn remove_is_noop_when_absent() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load(dir.path().join("state.json")).unwrap();
        store.add(item("a", 9), false).unwrap();

        store.remove("missing");
        assert!(store.contains("a"));
        store.remove("a");
        assert!(!store.contains("a"));
    }

    #[test]
    fn all_is_sorted_by_schedule_then_id() {
        let dir = tempdir().unwrap();
        let mut store = JsonStore::load(dir.path().join("state.json")).unwrap();
        store
            .extend(vec![item("c", 12), item("b", 9), item("a", 12)], false)
            .unwrap();

        let ids: Vec<_> = store.all().iter().map(|i| i.message_id().to_owned()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn invalid_json_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let err = JsonStore::load(&path).unwrap_err();
        assert!(matches!(err, Error::CorruptStore(..)));
    }

    #[test]
    fn invalid_record_is_corrupt_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, r#"[{"message_id": "a", "subject": "s"}]"#).unwrap();

        let err = JsonStore::load(&path).unwrap_err();
        match err {
            Error::CorruptStoreEntry(_, index, inner) => {
                assert_eq!(index, 0);
                assert!(matches!(*inner, Error::MalformedRecord(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
