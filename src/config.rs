// Runtime settings, read once from the environment at startup.
//
// Only the connection string is required. Everything else falls back to a
// default so the tool works out of the box against a fresh account.

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const CONNECTION_STRING_VAR: &str = "AZURE_STORAGE_CONNECTION_STRING";
pub const CONTAINER_VAR: &str = "BLOBSTORE_CONTAINER";
pub const UPLOAD_DIR_VAR: &str = "BLOBSTORE_UPLOAD_DIR";
pub const DOWNLOAD_DIR_VAR: &str = "BLOBSTORE_DOWNLOAD_DIR";

pub const DEFAULT_CONTAINER: &str = "main-container";

#[derive(Debug, Clone)]
pub struct Settings {
    pub connection_string: String,
    pub default_container: String,
    /// Files placed here are offered for upload.
    pub upload_dir: PathBuf,
    /// Downloads land here, never overwriting anything.
    pub download_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup. `from_env` passes
    /// the process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connection_string = lookup(CONNECTION_STRING_VAR)
            .filter(|s| !s.trim().is_empty())
            .with_context(|| format!("{CONNECTION_STRING_VAR} is not set"))?;

        let default_container =
            lookup(CONTAINER_VAR).unwrap_or_else(|| DEFAULT_CONTAINER.into());

        let upload_dir = lookup(UPLOAD_DIR_VAR).map(PathBuf::from).unwrap_or_else(|| {
            let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
            home.join("blobstore-data")
        });
        let download_dir = lookup(DOWNLOAD_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| upload_dir.join("downloads"));

        Ok(Settings {
            connection_string,
            default_container,
            upload_dir,
            download_dir,
        })
    }
}
