use blobstore_cli::config::Settings;
use blobstore_cli::console::{read_plain_line, Console, ScriptedConsole};
use blobstore_cli::store::memory::InMemoryStore;
use blobstore_cli::store::BlobStore;
use blobstore_cli::ui::{run, start_session};
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

fn settings(root: &Path) -> Settings {
    Settings {
        connection_string: "UseDevelopmentStorage=true".into(),
        default_container: "main-container".into(),
        upload_dir: root.join("data"),
        download_dir: root.join("data").join("downloads"),
    }
}

/// Reads replies from a byte buffer the way the terminal console reads a
/// piped stdin.
struct PipedConsole {
    input: Cursor<Vec<u8>>,
    prompts: usize,
}

impl Console for PipedConsole {
    fn read_line(&mut self, _prompt: &str) -> io::Result<Option<String>> {
        self.prompts += 1;
        read_plain_line(&mut self.input)
    }

    fn pause(&mut self, message: &str) -> io::Result<()> {
        self.read_line(message).map(|_| ())
    }

    fn say(&mut self, _line: &str) {}

    fn warn(&mut self, _line: &str) {}
}

#[test]
fn piped_input_ending_without_exit_stops_the_menu() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let mut console = PipedConsole {
        input: Cursor::new(b"7\nnope\n".to_vec()),
        prompts: 0,
    };
    let session = start_session(InMemoryStore::new(), &settings, &mut console).unwrap();

    run(session, &mut console).unwrap();

    assert_eq!(console.prompts, 3);
}

#[test]
fn wildcard_upload_then_download_everything() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    fs::create_dir_all(&settings.upload_dir).unwrap();
    fs::write(settings.upload_dir.join("a.txt"), b"alpha").unwrap();
    fs::write(settings.upload_dir.join("b.txt"), b"beta").unwrap();

    let mut console = ScriptedConsole::new(["1", "*", "3", "*", "0"]);
    let session = start_session(InMemoryStore::new(), &settings, &mut console).unwrap();
    run(session, &mut console).unwrap();

    let out = console.transcript();
    let first = out
        .find("Uploading file a.txt to Blob storage (Job 1 of 2)")
        .unwrap();
    let second = out
        .find("Uploading file b.txt to Blob storage (Job 2 of 2)")
        .unwrap();
    assert!(first < second);
    assert!(out.contains("Upload complete!"));
    assert!(out.contains("Download complete!"));

    let downloaded: Vec<_> = fs::read_dir(&settings.download_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(downloaded.len(), 2);
    assert!(downloaded.iter().any(|n| n.ends_with("-a.txt")));
    assert!(downloaded.iter().any(|n| n.ends_with("-b.txt")));
}

#[test]
fn missing_upload_directory_is_created_and_reported_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let mut console = ScriptedConsole::new(["1", "0"]);
    let session = start_session(InMemoryStore::new(), &settings, &mut console).unwrap();

    run(session, &mut console).unwrap();

    assert!(settings.upload_dir.is_dir());
    let out = console.transcript();
    assert!(out.contains("successfully created!"));
    assert!(out.contains("No files found."));
}

#[test]
fn failing_items_are_reported_and_the_rest_proceed() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    let store = InMemoryStore::new()
        .with_blob("main-container", "one", b"1")
        .with_blob("main-container", "two", b"2")
        .with_blob("main-container", "three", b"3")
        .fail_on("three");
    let mut console = ScriptedConsole::new(["4", "*", "2", "0"]);
    let session = start_session(store, &settings, &mut console).unwrap();

    run(session, &mut console).unwrap();

    let out = console.transcript();
    assert!(out.contains("(Job 3 of 3)"));
    assert!(out.contains("1 of 3 jobs failed."));
    assert!(out.contains("Operation complete!"));
    let (_, after_view) = out.split_once("Viewing files in container").unwrap();
    assert!(after_view.contains("File #1 - three"));
    assert!(!after_view.contains("File #2"));
}

#[test]
fn created_container_becomes_active_for_uploads() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    fs::create_dir_all(&settings.upload_dir).unwrap();
    fs::write(settings.upload_dir.join("only.bin"), b"x").unwrap();

    let mut console = ScriptedConsole::new(["5", "*", "archive-2024", "1", "1", "0"]);
    let store = InMemoryStore::new();
    let session = start_session(store, &settings, &mut console).unwrap();
    run(session, &mut console).unwrap();

    assert!(console
        .transcript()
        .contains("Active Container: archive-2024"));
    assert!(console.transcript().contains("Uploading file only.bin"));
}

#[test]
fn upload_overwrites_blob_of_same_name() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = settings(tmp.path());
    fs::create_dir_all(&settings.upload_dir).unwrap();
    fs::write(settings.upload_dir.join("report.csv"), b"new").unwrap();

    let store = InMemoryStore::new().with_blob("main-container", "report.csv", b"old");
    let mut console = ScriptedConsole::new(["1", "1", "0"]);
    let session = start_session(&store, &settings, &mut console).unwrap();
    run(session, &mut console).unwrap();

    assert!(console.transcript().contains("Container main-container was found."));
    assert_eq!(console.remaining(), 0);
    assert_eq!(store.blob("main-container", "report.csv").unwrap(), b"new");
    assert_eq!(store.list_blobs("main-container").unwrap(), vec!["report.csv"]);
}
