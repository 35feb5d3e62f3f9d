// Storage seam.
//
// Everything the console does against the remote account goes through the
// `BlobStore` trait. There are two implementations:
//
// - `crate::api::AzureClient`: blocking Azure Blob REST client.
// - `memory::InMemoryStore`: in-process store for tests, with per-blob
//   failure injection.
//
// All calls are fallible and synchronous. Listings come back in the order
// the service returns them; callers number that order for the user and must
// not re-fetch between displaying a listing and resolving a selection.

use crate::error::Result;
use std::path::Path;

pub mod memory;

pub trait BlobStore {
    /// Name of the storage account, for the greeting.
    fn account_name(&self) -> &str;

    fn container_exists(&self, container: &str) -> Result<bool>;

    /// Create a container and wait for the service to confirm it.
    fn create_container(&self, container: &str) -> Result<()>;

    fn list_containers(&self) -> Result<Vec<String>>;

    fn list_blobs(&self, container: &str) -> Result<Vec<String>>;

    /// Upload a local file as `blob`, replacing any existing blob of that name.
    fn upload_blob(&self, container: &str, blob: &str, source: &Path) -> Result<()>;

    /// Download `blob` into a new local file at `dest`.
    fn download_blob(&self, container: &str, blob: &str, dest: &Path) -> Result<()>;

    fn delete_blob(&self, container: &str, blob: &str) -> Result<()>;
}

impl<T: BlobStore + ?Sized> BlobStore for &T {
    fn account_name(&self) -> &str {
        (**self).account_name()
    }

    fn container_exists(&self, container: &str) -> Result<bool> {
        (**self).container_exists(container)
    }

    fn create_container(&self, container: &str) -> Result<()> {
        (**self).create_container(container)
    }

    fn list_containers(&self) -> Result<Vec<String>> {
        (**self).list_containers()
    }

    fn list_blobs(&self, container: &str) -> Result<Vec<String>> {
        (**self).list_blobs(container)
    }

    fn upload_blob(&self, container: &str, blob: &str, source: &Path) -> Result<()> {
        (**self).upload_blob(container, blob, source)
    }

    fn download_blob(&self, container: &str, blob: &str, dest: &Path) -> Result<()> {
        (**self).download_blob(container, blob, dest)
    }

    fn delete_blob(&self, container: &str, blob: &str) -> Result<()> {
        (**self).delete_blob(container, blob)
    }
}
