//! Persistent device storage using sled: the introspection blob (so a
//! reconnect after a crash sends the same canonical string) and the
//! property value cache (so `unset_property` and session-resume purges
//! have something to diff against).

use sled::Db;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage backend for a device's local state.
pub struct Storage {
    db: Db,
    introspection: sled::Tree,
    properties: sled::Tree,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        let introspection = db.open_tree("introspection")?;
        let properties = db.open_tree("properties")?;
        Ok(Storage {
            db,
            introspection,
            properties,
        })
    }

    pub fn put_introspection(&self, canonical: &str) -> Result<(), StorageError> {
        self.introspection.insert("canonical", canonical.as_bytes())?;
        Ok(())
    }

    pub fn get_introspection(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .introspection
            .get("canonical")?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    /// Key is `<interface>/<path>`.
    pub fn put_property(&self, key: &str, json_value: &str) -> Result<(), StorageError> {
        self.properties.insert(key, json_value.as_bytes())?;
        Ok(())
    }

    pub fn get_property(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .properties
            .get(key)?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }

    pub fn remove_property(&self, key: &str) -> Result<(), StorageError> {
        self.properties.remove(key)?;
        Ok(())
    }

    pub fn property_keys(&self) -> Result<Vec<String>, StorageError> {
        self.properties
            .iter()
            .keys()
            .map(|r| r.map(|k| String::from_utf8_lossy(&k).into_owned()).map_err(StorageError::from))
            .collect()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn introspection_round_trips() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        assert_eq!(storage.get_introspection().unwrap(), None);
        storage.put_introspection("org.example.Sensors:1:0").unwrap();
        assert_eq!(
            storage.get_introspection().unwrap(),
            Some("org.example.Sensors:1:0".to_string())
        );
    }

    #[test]
    fn property_cache_round_trips_and_removes() {
        let dir = tempdir().unwrap();
        let storage = Storage::open(dir.path()).unwrap();
        storage.put_property("org.example.Cfg/enabled", "true").unwrap();
        assert_eq!(
            storage.get_property("org.example.Cfg/enabled").unwrap(),
            Some("true".to_string())
        );
        storage.remove_property("org.example.Cfg/enabled").unwrap();
        assert_eq!(storage.get_property("org.example.Cfg/enabled").unwrap(), None);
    }
}
