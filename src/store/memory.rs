use super::BlobStore;
use crate::error::{Result, StoreError};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// In-memory storage for testing.
/// Does NOT persist data. Listings are returned in name order, like the
/// real service.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    containers: RefCell<BTreeMap<String, BTreeMap<String, Vec<u8>>>>,
    failing: RefCell<BTreeSet<String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, container: &str) -> Self {
        self.containers
            .borrow_mut()
            .entry(container.to_string())
            .or_default();
        self
    }

    pub fn with_blob(self, container: &str, blob: &str, data: &[u8]) -> Self {
        self.containers
            .borrow_mut()
            .entry(container.to_string())
            .or_default()
            .insert(blob.to_string(), data.to_vec());
        self
    }

    /// Make every upload, download or delete of `blob` fail.
    pub fn fail_on(self, blob: &str) -> Self {
        self.failing.borrow_mut().insert(blob.to_string());
        self
    }

    /// Current content of a blob, if present.
    pub fn blob(&self, container: &str, blob: &str) -> Option<Vec<u8>> {
        self.containers
            .borrow()
            .get(container)
            .and_then(|c| c.get(blob))
            .cloned()
    }

    fn check_failure(&self, operation: &'static str, blob: &str) -> Result<()> {
        if self.failing.borrow().contains(blob) {
            return Err(StoreError::Http {
                operation,
                status: 500,
                body: format!("injected failure for {blob}"),
            });
        }
        Ok(())
    }

    fn missing_container(container: &str) -> StoreError {
        StoreError::NotFound {
            kind: "container",
            name: container.to_string(),
        }
    }
}

impl BlobStore for InMemoryStore {
    fn account_name(&self) -> &str {
        "memory"
    }

    fn container_exists(&self, container: &str) -> Result<bool> {
        Ok(self.containers.borrow().contains_key(container))
    }

    fn create_container(&self, container: &str) -> Result<()> {
        let mut containers = self.containers.borrow_mut();
        if containers.contains_key(container) {
            return Err(StoreError::CreationRejected {
                name: container.to_string(),
                reason: "ContainerAlreadyExists".to_string(),
            });
        }
        containers.insert(container.to_string(), BTreeMap::new());
        Ok(())
    }

    fn list_containers(&self) -> Result<Vec<String>> {
        Ok(self.containers.borrow().keys().cloned().collect())
    }

    fn list_blobs(&self, container: &str) -> Result<Vec<String>> {
        self.containers
            .borrow()
            .get(container)
            .map(|blobs| blobs.keys().cloned().collect())
            .ok_or_else(|| Self::missing_container(container))
    }

    fn upload_blob(&self, container: &str, blob: &str, source: &Path) -> Result<()> {
        self.check_failure("upload", blob)?;
        let data = std::fs::read(source)?;
        self.containers
            .borrow_mut()
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?
            .insert(blob.to_string(), data);
        Ok(())
    }

    fn download_blob(&self, container: &str, blob: &str, dest: &Path) -> Result<()> {
        self.check_failure("download", blob)?;
        let data = self.blob(container, blob).ok_or_else(|| StoreError::NotFound {
            kind: "blob",
            name: blob.to_string(),
        })?;
        let mut file = OpenOptions::new().write(true).create_new(true).open(dest)?;
        file.write_all(&data)?;
        Ok(())
    }

    fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        self.check_failure("delete", blob)?;
        self.containers
            .borrow_mut()
            .get_mut(container)
            .ok_or_else(|| Self::missing_container(container))?
            .remove(blob)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                kind: "blob",
                name: blob.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_existing_container_is_rejected() {
        let store = InMemoryStore::new().with_container("main");
        let err = store.create_container("main").unwrap_err();
        assert!(matches!(err, StoreError::CreationRejected { .. }));
        store.create_container("other").unwrap();
        assert_eq!(store.list_containers().unwrap(), vec!["main", "other"]);
    }

    #[test]
    fn listing_missing_container_is_not_found() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.list_blobs("nope"),
            Err(StoreError::NotFound { kind: "container", .. })
        ));
    }

    #[test]
    fn injected_failure_only_hits_named_blob() {
        let store = InMemoryStore::new()
            .with_blob("main", "ok", b"1")
            .with_blob("main", "bad", b"2")
            .fail_on("bad");
        assert!(store.delete_blob("main", "bad").is_err());
        store.delete_blob("main", "ok").unwrap();
        assert_eq!(store.list_blobs("main").unwrap(), vec!["bad"]);
    }
}
