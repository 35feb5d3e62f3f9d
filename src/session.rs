// Session context handed to every menu command: the store, the local
// directories and the active container. It is the only state that lives
// across commands.

use crate::config::Settings;
use crate::error::Result;
use crate::store::BlobStore;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug)]
pub struct Session<S> {
    store: S,
    active_container: String,
    upload_dir: PathBuf,
    download_dir: PathBuf,
}

/// Whether the default container had to be created at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultContainer {
    Found,
    Created,
}

impl<S: BlobStore> Session<S> {
    pub fn new(store: S, settings: &Settings) -> Self {
        Session {
            store,
            active_container: settings.default_container.clone(),
            upload_dir: settings.upload_dir.clone(),
            download_dir: settings.download_dir.clone(),
        }
    }

    /// Make sure the default container exists, creating it if needed. The
    /// session is only usable once this returns `Ok`.
    pub fn ensure_default_container(&self) -> Result<DefaultContainer> {
        if self.store.container_exists(&self.active_container)? {
            return Ok(DefaultContainer::Found);
        }
        self.store.create_container(&self.active_container)?;
        info!(container = %self.active_container, "created default container");
        Ok(DefaultContainer::Created)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn active_container(&self) -> &str {
        &self.active_container
    }

    /// Switch to a container the service has confirmed exists.
    pub fn set_active_container(&mut self, name: impl Into<String>) {
        self.active_container = name.into();
        info!(container = %self.active_container, "active container changed");
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn settings() -> Settings {
        Settings {
            connection_string: "UseDevelopmentStorage=true".into(),
            default_container: "main-container".into(),
            upload_dir: PathBuf::from("/tmp/up"),
            download_dir: PathBuf::from("/tmp/up/downloads"),
        }
    }

    #[test]
    fn creates_missing_default_container() {
        let session = Session::new(InMemoryStore::new(), &settings());
        assert_eq!(session.ensure_default_container().unwrap(), DefaultContainer::Created);
        assert!(session.store().container_exists("main-container").unwrap());
        assert_eq!(session.ensure_default_container().unwrap(), DefaultContainer::Found);
    }

    #[test]
    fn switching_container_changes_active_name() {
        let mut session = Session::new(InMemoryStore::new(), &settings());
        assert_eq!(session.active_container(), "main-container");
        session.set_active_container("photos");
        assert_eq!(session.active_container(), "photos");
    }
}
