// UI layer: the numbered menu loop and one handler per command.
// Handlers take the session and a `Console`; they never touch stdin/stdout
// directly, so tests drive the whole loop with a scripted console.

use crate::batch::{self, BatchReport};
use crate::config::Settings;
use crate::console::{Console, TermConsole};
use crate::error::StoreError;
use crate::naming::{self, validate_container_name};
use crate::selector::{parse_selection, Selection};
use crate::session::{DefaultContainer, Session};
use crate::store::BlobStore;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{error, warn};

const RULE: &str = "-----------------------------------------------";

const BANNER: &str = r"
  ____  _       _       ____  _
 | __ )| | ___ | |__   / ___|| |_ ___  _ __ ___
 |  _ \| |/ _ \| '_ \  \___ \| __/ _ \| '__/ _ \
 | |_) | | (_) | |_) |  ___) | || (_) | | |  __/
 |____/|_|\___/|_.__/  |____/ \__\___/|_|  \___|
";

/// A validated menu choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuCommand {
    Exit,
    Upload,
    View,
    Download,
    Delete,
    ChangeContainer,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid input. Please input a valid number (0-5).")]
pub struct CommandParseError;

impl FromStr for MenuCommand {
    type Err = CommandParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().parse::<i64>().map_err(|_| CommandParseError)? {
            0 => Ok(MenuCommand::Exit),
            1 => Ok(MenuCommand::Upload),
            2 => Ok(MenuCommand::View),
            3 => Ok(MenuCommand::Download),
            4 => Ok(MenuCommand::Delete),
            5 => Ok(MenuCommand::ChangeContainer),
            _ => Err(CommandParseError),
        }
    }
}

/// What the loop does after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Entry point used by the binary: greet, make sure the default container
/// exists, then run the menu on the terminal until the user exits.
pub fn main_menu<S: BlobStore>(store: S, settings: &Settings) -> Result<()> {
    let mut console = TermConsole::new();
    let session = start_session(store, settings, &mut console)?;
    console.say(BANNER);
    run(session, &mut console)
}

/// Connect the session to its default container, creating it if missing.
pub fn start_session<S: BlobStore, C: Console>(
    store: S,
    settings: &Settings,
    console: &mut C,
) -> Result<Session<S>> {
    console.say(&format!("Connection established to {}!", store.account_name()));
    let session = Session::new(store, settings);
    console.say(&format!(
        "Getting default container {}...",
        session.active_container()
    ));
    let outcome = session
        .ensure_default_container()
        .with_context(|| format!("opening container {}", session.active_container()))?;
    match outcome {
        DefaultContainer::Found => console.say(&format!(
            "Container {} was found.",
            session.active_container()
        )),
        DefaultContainer::Created => console.say(&format!(
            "Container {} was not found. Created a new container.",
            session.active_container()
        )),
    }
    Ok(session)
}

/// The menu loop. Returns when the user exits, input runs out, or a
/// required local directory cannot be created.
pub fn run<S: BlobStore, C: Console>(mut session: Session<S>, console: &mut C) -> Result<()> {
    loop {
        show_menu(&session, console);
        let Some(command) = read_command(console)? else {
            return Ok(());
        };
        let flow = match command {
            MenuCommand::Exit => Flow::Exit,
            MenuCommand::Upload => upload(&session, console)?,
            MenuCommand::View => view(&session, console),
            MenuCommand::Download => download(&session, console)?,
            MenuCommand::Delete => delete(&session, console)?,
            MenuCommand::ChangeContainer => change_container(&mut session, console)?,
        };
        if flow == Flow::Exit {
            return Ok(());
        }
    }
}

fn show_menu<S: BlobStore, C: Console>(session: &Session<S>, console: &mut C) {
    console.say(&format!(
        "\nActive Container: {}\nWhat would you like to do?\n{RULE}\n\
         Input 1 to Upload a Blob to Storage\n\
         Input 2 to View Blobs in Storage\n\
         Input 3 to Download a Blob from Storage\n\
         Input 4 to Delete a Blob from Storage\n\
         Input 5 to Change Active Container\n\
         Input 0 to Exit\n{RULE}\n",
        session.active_container()
    ));
}

/// Read until a valid menu number arrives. `None` when input is exhausted.
fn read_command<C: Console>(console: &mut C) -> Result<Option<MenuCommand>> {
    loop {
        let Some(line) = console.read_line("Input")? else {
            return Ok(None);
        };
        match line.parse::<MenuCommand>() {
            Ok(command) => return Ok(Some(command)),
            Err(e) => console.warn(&e.to_string()),
        }
    }
}

/// Print a numbered listing and read a selection against it, re-prompting
/// until it is valid. `None` when input is exhausted.
fn select<C: Console>(
    console: &mut C,
    items: &[String],
    operation: &str,
) -> Result<Option<Selection>> {
    console.say(&format!("\nWhich file would you like to {operation}?\n{RULE}"));
    for (i, item) in items.iter().enumerate() {
        console.say(&format!("File #{} - {item}", i + 1));
    }
    console.say(RULE);
    console.say(&format!(
        "\nInput a File Number to {operation} the specified file, or * to {operation} all files."
    ));

    loop {
        let Some(line) = console.read_line("Input")? else {
            return Ok(None);
        };
        match parse_selection(&line, items.len()) {
            Ok(selection) => return Ok(Some(selection)),
            Err(e) => console.warn(&format!(
                "Invalid input: File {e}.\nPlease provide a digit representing a file number, \
                 or a \"*\" character to select All Files"
            )),
        }
    }
}

/// Create `dir` if it is missing. `Ok(true)` if it had to be created.
fn ensure_dir<C: Console>(dir: &Path, console: &mut C) -> std::io::Result<bool> {
    if dir.is_dir() {
        console.say(&format!("Directory \"{}\" found!", dir.display()));
        return Ok(false);
    }
    console.say(&format!(
        "Directory \"{}\" could not be found. Creating new directory...",
        dir.display()
    ));
    match fs::create_dir_all(dir) {
        Ok(()) => {
            console.say(&format!("Directory \"{}\" successfully created!", dir.display()));
            Ok(true)
        }
        Err(e) => {
            error!(dir = %dir.display(), error = %e, "cannot create local directory");
            console.warn(&format!(
                "Failed to create directory. Error Message: {e}\nExiting application..."
            ));
            Err(e)
        }
    }
}

/// Regular files directly inside `dir`, sorted by name.
fn local_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Fetch the blob listing of the active container, reporting failures.
fn fetch_blobs<S: BlobStore, C: Console>(
    session: &Session<S>,
    console: &mut C,
) -> Option<Vec<String>> {
    console.busy("Fetching blobs...");
    let result = session.store().list_blobs(session.active_container());
    console.done();
    match result {
        Ok(blobs) => Some(blobs),
        Err(e) => {
            warn!(container = session.active_container(), error = %e, "listing blobs failed");
            console.warn(&format!(
                "Could not list container \"{}\": {e}",
                session.active_container()
            ));
            None
        }
    }
}

fn report<C: Console>(report: &BatchReport, done: &str, console: &mut C) {
    console.say(&format!("\n{done}\n"));
    if report.failed() > 0 {
        console.warn(&format!(
            "{} of {} jobs failed.",
            report.failed(),
            report.attempted()
        ));
    }
}

fn upload<S: BlobStore, C: Console>(session: &Session<S>, console: &mut C) -> Result<Flow> {
    let dir = session.upload_dir();
    console.pause(&format!(
        "Before proceeding, please ensure the file to be uploaded is located in the \"{}\" folder. \
         Press Enter to continue",
        dir.display()
    ))?;

    let files = match ensure_dir(dir, console) {
        Err(_) => return Ok(Flow::Exit),
        Ok(true) => Vec::new(),
        Ok(false) => match local_files(dir) {
            Ok(files) => files,
            Err(e) => {
                console.warn(&format!("Could not read \"{}\": {e}", dir.display()));
                return Ok(Flow::Continue);
            }
        },
    };
    if files.is_empty() {
        console.say(&format!(
            "No files found. Please place files to upload in {} and try again.",
            dir.display()
        ));
        return Ok(Flow::Continue);
    }

    let names: Vec<String> = files
        .iter()
        .filter_map(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .collect();
    let Some(selection) = select(console, &names, "upload")? else {
        return Ok(Flow::Exit);
    };
    let chosen = selection.resolve(&files);
    let result = batch::upload_files(
        session.store(),
        session.active_container(),
        &chosen,
        console,
    );
    report(&result, "Upload complete!", console);
    Ok(Flow::Continue)
}

fn view<S: BlobStore, C: Console>(session: &Session<S>, console: &mut C) -> Flow {
    let Some(blobs) = fetch_blobs(session, console) else {
        return Flow::Continue;
    };
    let container = session.active_container();
    if blobs.is_empty() {
        console.say(&format!(
            "\nContainer \"{container}\" is empty. Upload files to view them.\n"
        ));
        return Flow::Continue;
    }
    console.say(&format!("\nViewing files in container: {container}\n{RULE}"));
    for (i, blob) in blobs.iter().enumerate() {
        console.say(&format!("File #{} - {blob}", i + 1));
    }
    console.say(RULE);
    Flow::Continue
}

fn download<S: BlobStore, C: Console>(session: &Session<S>, console: &mut C) -> Result<Flow> {
    let dir = session.download_dir();
    if ensure_dir(dir, console).is_err() {
        return Ok(Flow::Exit);
    }

    let Some(blobs) = fetch_blobs(session, console) else {
        return Ok(Flow::Continue);
    };
    if blobs.is_empty() {
        console.say(&format!(
            "Container \"{}\" has nothing to download. Aborting download.",
            session.active_container()
        ));
        return Ok(Flow::Continue);
    }

    let Some(selection) = select(console, &blobs, "download")? else {
        return Ok(Flow::Exit);
    };
    let chosen = selection.resolve(&blobs);
    let result = batch::download_blobs(
        session.store(),
        session.active_container(),
        &chosen,
        dir,
        console,
    );
    for outcome in &result.outcomes {
        if let Some(path) = &outcome.saved_to {
            console.say(&format!("Saved {} to {}", outcome.name, path.display()));
        }
    }
    report(&result, "Download complete!", console);
    Ok(Flow::Continue)
}

fn delete<S: BlobStore, C: Console>(session: &Session<S>, console: &mut C) -> Result<Flow> {
    let Some(blobs) = fetch_blobs(session, console) else {
        return Ok(Flow::Continue);
    };
    if blobs.is_empty() {
        console.say(&format!(
            "Container \"{}\" has nothing to delete.",
            session.active_container()
        ));
        return Ok(Flow::Continue);
    }

    let Some(selection) = select(console, &blobs, "delete")? else {
        return Ok(Flow::Exit);
    };
    let chosen = selection.resolve(&blobs);
    let result = batch::delete_blobs(session.store(), session.active_container(), &chosen, console);
    report(&result, "Operation complete!", console);
    Ok(Flow::Continue)
}

fn change_container<S: BlobStore, C: Console>(
    session: &mut Session<S>,
    console: &mut C,
) -> Result<Flow> {
    console.busy("Fetching containers...");
    let listed = session.store().list_containers();
    console.done();
    let containers = match listed {
        Ok(containers) => containers,
        Err(e) => {
            warn!(error = %e, "listing containers failed");
            console.warn(&format!("Could not list containers: {e}"));
            return Ok(Flow::Continue);
        }
    };

    console.say(&format!("\nAvailable containers\n{RULE}"));
    for (i, name) in containers.iter().enumerate() {
        console.say(&format!("#{} - {name}", i + 1));
    }
    console.say(RULE);
    console.say(
        "\nInput a Container Number to set the Active Container, or * to create new Container.",
    );

    loop {
        let Some(line) = console.read_line("Input")? else {
            return Ok(Flow::Exit);
        };
        match parse_selection(&line, containers.len()) {
            Ok(Selection::All) => return create_container(session, console),
            Ok(Selection::One(k)) => {
                session.set_active_container(containers[k - 1].clone());
                return Ok(Flow::Continue);
            }
            Err(e) => console.warn(&format!(
                "Invalid input: Container {e}.\nPlease provide a digit representing a Container \
                 number, or a \"*\" character to create a new Container"
            )),
        }
    }
}

/// Prompt for a new container name until one is valid and the service
/// has created it; only then does it become active.
fn create_container<S: BlobStore, C: Console>(
    session: &mut Session<S>,
    console: &mut C,
) -> Result<Flow> {
    console.say(&format!(
        "Please input the new Container name. Container names must adhere to the following:\n\n{}",
        naming::RULES
    ));

    loop {
        let Some(name) = console.read_line("Container Name")? else {
            return Ok(Flow::Exit);
        };
        let name = name.trim().to_string();
        if let Err(e) = validate_container_name(&name) {
            console.warn(&format!(
                "Invalid container name: {e}. Please ensure the provided name follows all naming rules."
            ));
            continue;
        }

        match session.store().create_container(&name) {
            Ok(()) => {
                console.say(&format!(
                    "New container \"{name}\" was successfully created and set to active..."
                ));
                session.set_active_container(name);
                return Ok(Flow::Continue);
            }
            Err(e @ StoreError::CreationRejected { .. }) => {
                console.warn(&format!("{e}. Please choose another name."));
            }
            Err(e) => {
                warn!(container = %name, error = %e, "container creation failed");
                console.warn(&format!("Could not create container \"{name}\": {e}"));
                return Ok(Flow::Continue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::ScriptedConsole;
    use crate::store::memory::InMemoryStore;

    fn session_in(store: InMemoryStore, dir: &Path) -> Session<InMemoryStore> {
        let settings = Settings {
            connection_string: "UseDevelopmentStorage=true".into(),
            default_container: "main-container".into(),
            upload_dir: dir.join("data"),
            download_dir: dir.join("data").join("downloads"),
        };
        Session::new(store.with_container("main-container"), &settings)
    }

    #[test]
    fn menu_numbers_parse() {
        assert_eq!("0".parse::<MenuCommand>(), Ok(MenuCommand::Exit));
        assert_eq!(" 5 ".parse::<MenuCommand>(), Ok(MenuCommand::ChangeContainer));
        for bad in ["6", "7", "-1", "", "one", "1.0"] {
            assert_eq!(bad.parse::<MenuCommand>(), Err(CommandParseError), "{bad}");
        }
    }

    #[test]
    fn out_of_range_command_reprompts() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_in(InMemoryStore::new(), tmp.path());
        let mut console = ScriptedConsole::new(["7", "0"]);

        run(session, &mut console).unwrap();

        assert_eq!(console.remaining(), 0);
        assert_eq!(
            console
                .output
                .iter()
                .filter(|l| l.contains("Please input a valid number (0-5)"))
                .count(),
            1
        );
        assert_eq!(
            console
                .output
                .iter()
                .filter(|l| l.contains("Active Container: main-container"))
                .count(),
            1
        );
    }

    #[test]
    fn end_of_input_exits() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_in(InMemoryStore::new(), tmp.path());
        let mut console = ScriptedConsole::new(Vec::<String>::new());
        run(session, &mut console).unwrap();
    }

    #[test]
    fn view_of_empty_container_prints_no_listing() {
        let tmp = tempfile::tempdir().unwrap();
        let session = session_in(InMemoryStore::new(), tmp.path());
        let mut console = ScriptedConsole::new(["2", "0"]);

        run(session, &mut console).unwrap();

        let out = console.transcript();
        assert!(out.contains("Container \"main-container\" is empty"));
        assert!(!out.contains("File #"));
    }

    #[test]
    fn view_lists_blobs_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new()
            .with_blob("main-container", "b.txt", b"")
            .with_blob("main-container", "a.txt", b"");
        let session = session_in(store, tmp.path());
        let mut console = ScriptedConsole::new(["2", "0"]);

        run(session, &mut console).unwrap();

        let out = console.transcript();
        let a = out.find("File #1 - a.txt").unwrap();
        let b = out.find("File #2 - b.txt").unwrap();
        assert!(a < b);
    }

    #[test]
    fn bad_selection_reprompts_then_deletes_one() {
        let tmp = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new()
            .with_blob("main-container", "a", b"")
            .with_blob("main-container", "b", b"");
        let session = session_in(store, tmp.path());
        let mut console = ScriptedConsole::new(["4", "x", "3", "0", "2", "2", "0"]);

        run(session, &mut console).unwrap();

        let out = console.transcript();
        assert_eq!(out.matches("Please provide a digit representing a file number").count(), 3);
        assert!(out.contains("Deleting file b from Blob storage (Job 1 of 1)"));
        let (_, after_view) = out.split_once("Viewing files in container").unwrap();
        assert!(after_view.contains("File #1 - a"));
        assert!(!after_view.contains("File #2"));
    }

    #[test]
    fn download_directory_failure_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        // A file where the data directory should be makes creation fail.
        fs::write(tmp.path().join("data"), b"not a dir").unwrap();
        let session = session_in(
            InMemoryStore::new().with_blob("main-container", "a", b""),
            tmp.path(),
        );
        let mut console = ScriptedConsole::new(["3", "1", "0"]);

        run(session, &mut console).unwrap();

        assert!(console.transcript().contains("Exiting application..."));
        assert_eq!(console.remaining(), 2);
    }

    #[test]
    fn change_to_existing_container() {
        let tmp = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new().with_container("photos");
        let session = session_in(store, tmp.path());
        let mut console = ScriptedConsole::new(["5", "9", "2", "0"]);

        run(session, &mut console).unwrap();

        let out = console.transcript();
        assert!(out.contains("#1 - main-container"));
        assert!(out.contains("#2 - photos"));
        assert!(out.contains("Container number 9 not found"));
        assert!(out.contains("Active Container: photos"));
    }

    #[test]
    fn create_container_rejects_bad_and_taken_names() {
        let tmp = tempfile::tempdir().unwrap();
        let store = InMemoryStore::new().with_container("taken");
        let session = session_in(store, tmp.path());
        let mut console = ScriptedConsole::new([
            "5",
            "*",
            "my--container",
            "Bad",
            "taken",
            "fresh-one",
            "0",
        ]);

        run(session, &mut console).unwrap();

        let out = console.transcript();
        assert!(out.contains("every dash must be preceded and followed"));
        assert!(out.contains("'B' is not allowed"));
        assert!(out.contains("service rejected its creation"));
        assert!(out.contains("New container \"fresh-one\" was successfully created"));
        assert!(out.contains("Active Container: fresh-one"));
    }

    #[test]
    fn startup_creates_default_container() {
        let tmp = tempfile::tempdir().unwrap();
        let settings = Settings {
            connection_string: "UseDevelopmentStorage=true".into(),
            default_container: "main-container".into(),
            upload_dir: tmp.path().to_path_buf(),
            download_dir: tmp.path().join("downloads"),
        };
        let mut console = ScriptedConsole::new(Vec::<String>::new());
        let session = start_session(InMemoryStore::new(), &settings, &mut console).unwrap();
        assert!(session.store().container_exists("main-container").unwrap());
        assert!(console.transcript().contains("was not found. Created a new container."));
    }
}
