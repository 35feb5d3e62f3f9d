// Batch execution of upload, download and delete.
//
// Items are processed one at a time, in selection order. Each job is
// announced as "Job i of N". A failing job is reported and recorded, and
// the next job still runs: a batch never stops early. The caller gets a
// `BatchReport` with one outcome per item.

use crate::console::Console;
use crate::error::StoreError;
use crate::store::BlobStore;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
    Delete,
}

impl Operation {
    fn progress(self, name: &str, job: usize, total: usize) -> String {
        match self {
            Operation::Upload => {
                format!("Uploading file {name} to Blob storage (Job {job} of {total})...")
            }
            Operation::Download => {
                format!("Downloading file {name} from Blob storage (Job {job} of {total})...")
            }
            Operation::Delete => {
                format!("Deleting file {name} from Blob storage (Job {job} of {total})...")
            }
        }
    }

    fn gerund(self) -> &'static str {
        match self {
            Operation::Upload => "Uploading",
            Operation::Download => "Downloading",
            Operation::Delete => "Deleting",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Upload => "Upload",
            Operation::Download => "Download",
            Operation::Delete => "Delete",
        })
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    /// Blob name (or file name for uploads).
    pub name: String,
    /// Where a download was written.
    pub saved_to: Option<PathBuf>,
    pub error: Option<StoreError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct BatchReport {
    pub operation: Operation,
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.succeeded()
    }
}

/// Run `job` for every item, in order, isolating failures.
fn run<C, T, N, F>(
    operation: Operation,
    items: &[T],
    name_of: N,
    console: &mut C,
    mut job: F,
) -> BatchReport
where
    N: Fn(&T) -> String,
    C: Console,
    F: FnMut(&T, &str) -> Result<Option<PathBuf>, StoreError>,
{
    console.say(&format!("{} files...\n", operation.gerund()));
    let total = items.len();
    let mut outcomes = Vec::with_capacity(total);

    for (i, item) in items.iter().enumerate() {
        let name = name_of(item);
        console.say(&operation.progress(&name, i + 1, total));
        match job(item, &name) {
            Ok(saved_to) => outcomes.push(JobOutcome {
                name,
                saved_to,
                error: None,
            }),
            Err(e) => {
                warn!(%operation, item = %name, error = %e, "job failed");
                console.warn(&format!("{operation} of {name} failed: {e}"));
                outcomes.push(JobOutcome {
                    name,
                    saved_to: None,
                    error: Some(e),
                });
            }
        }
    }

    BatchReport {
        operation,
        outcomes,
    }
}

/// Destination for a downloaded blob: a fresh UUID prefix keeps every
/// download distinct from existing files and from each other. Path
/// separators in the blob name are flattened so the file stays in `dir`.
pub fn download_destination(dir: &Path, blob: &str) -> PathBuf {
    let flat: String = blob
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    dir.join(format!("{}-{}", Uuid::new_v4(), flat))
}

/// Upload local files into `container`, each under its base name.
pub fn upload_files<S, C>(
    store: &S,
    container: &str,
    files: &[PathBuf],
    console: &mut C,
) -> BatchReport
where
    S: BlobStore,
    C: Console,
{
    let base_name = |p: &PathBuf| {
        p.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| p.display().to_string())
    };
    run(Operation::Upload, files, base_name, console, |path, name| {
        store.upload_blob(container, name, path).map(|_| None)
    })
}

/// Download blobs from `container` into `dir`, never overwriting.
pub fn download_blobs<S, C>(
    store: &S,
    container: &str,
    blobs: &[String],
    dir: &Path,
    console: &mut C,
) -> BatchReport
where
    S: BlobStore,
    C: Console,
{
    run(Operation::Download, blobs, String::clone, console, |blob, _| {
        let dest = download_destination(dir, blob);
        store.download_blob(container, blob, &dest).map(|_| Some(dest))
    })
}

pub fn delete_blobs<S, C>(
    store: &S,
    container: &str,
    blobs: &[String],
    console: &mut C,
) -> BatchReport
where
    S: BlobStore,
    C: Console,
{
    run(Operation::Delete, blobs, String::clone, console, |blob, _| {
        store.delete_blob(container, blob).map(|_| None)
    })
}
