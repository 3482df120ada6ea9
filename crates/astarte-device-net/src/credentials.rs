//! Persisted credential material: the device's private key and the most
//! recently paired client certificate (§6).

use crate::error::{NetError, Result};

/// The capability that hides how/where a device's key and certificate are
/// stored (on-disk PEM files, a secrets service, a sled tree, ...).
pub trait CredentialStore: Send + Sync {
    fn load_private_key(&self) -> Result<Option<String>>;
    fn store_private_key(&self, key_pem: &str) -> Result<()>;

    fn load_certificate(&self) -> Result<Option<String>>;
    fn store_certificate(&self, cert_pem: &str) -> Result<()>;
}

/// An in-memory `CredentialStore` double for tests.
#[derive(Default)]
pub struct MemoryCredentialStore {
    key: parking_lot::Mutex<Option<String>>,
    cert: parking_lot::Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        MemoryCredentialStore::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load_private_key(&self) -> Result<Option<String>> {
        Ok(self.key.lock().clone())
    }

    fn store_private_key(&self, key_pem: &str) -> Result<()> {
        *self.key.lock() = Some(key_pem.to_string());
        Ok(())
    }

    fn load_certificate(&self) -> Result<Option<String>> {
        Ok(self.cert.lock().clone())
    }

    fn store_certificate(&self, cert_pem: &str) -> Result<()> {
        *self.cert.lock() = Some(cert_pem.to_string());
        Ok(())
    }
}

/// A `sled`-backed `CredentialStore`, for real device deployments.
pub struct SledCredentialStore {
    tree: sled::Tree,
}

impl SledCredentialStore {
    const KEY_KEY: &'static str = "private_key_pem";
    const CERT_KEY: &'static str = "client_cert_pem";

    pub fn open(db: &sled::Db, tree_name: &str) -> Result<Self> {
        let tree = db
            .open_tree(tree_name)
            .map_err(|e| NetError::CredentialStore(e.to_string()))?;
        Ok(SledCredentialStore { tree })
    }
}

impl CredentialStore for SledCredentialStore {
    fn load_private_key(&self) -> Result<Option<String>> {
        load_string(&self.tree, Self::KEY_KEY)
    }

    fn store_private_key(&self, key_pem: &str) -> Result<()> {
        store_string(&self.tree, Self::KEY_KEY, key_pem)
    }

    fn load_certificate(&self) -> Result<Option<String>> {
        load_string(&self.tree, Self::CERT_KEY)
    }

    fn store_certificate(&self, cert_pem: &str) -> Result<()> {
        store_string(&self.tree, Self::CERT_KEY, cert_pem)
    }
}

fn load_string(tree: &sled::Tree, key: &str) -> Result<Option<String>> {
    let bytes = tree.get(key).map_err(|e| NetError::CredentialStore(e.to_string()))?;
    Ok(bytes.map(|ivec| String::from_utf8_lossy(&ivec).into_owned()))
}

fn store_string(tree: &sled::Tree, key: &str, value: &str) -> Result<()> {
    tree.insert(key, value.as_bytes())
        .map_err(|e| NetError::CredentialStore(e.to_string()))?;
    tree.flush().map_err(|e| NetError::CredentialStore(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryCredentialStore::new();
        assert_eq!(store.load_certificate().unwrap(), None);
        store.store_certificate("cert-pem").unwrap();
        assert_eq!(store.load_certificate().unwrap(), Some("cert-pem".to_string()));
    }

    #[test]
    fn sled_store_round_trips() {
        let db = sled::Config::new().temporary(true).open().unwrap();
        let store = SledCredentialStore::open(&db, "credentials").unwrap();
        assert_eq!(store.load_private_key().unwrap(), None);
        store.store_private_key("key-pem").unwrap();
        assert_eq!(store.load_private_key().unwrap(), Some("key-pem".to_string()));
    }
}
