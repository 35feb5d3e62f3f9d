// Library root
// -----------
// This crate exposes a small library surface for the CLI. The binary
// (`main.rs`) wires these modules together to run the interactive menu.
//
// Module responsibilities:
// - `api`: Blocking Azure Blob REST client (connection strings, request
//   signing, the eight remote calls).
// - `store`: The `BlobStore` trait every command talks to, plus an
//   in-memory implementation for tests.
// - `selector`, `naming`: Parsing of user replies and container names.
// - `batch`: Runs upload/download/delete over a selection, one job at a time.
// - `session`, `config`: Active container and environment settings.
// - `console`, `ui`: Terminal I/O and the menu loop.
//
// Keeping the remote client behind `BlobStore` and the terminal behind
// `Console` lets the menu run end to end in tests without a network.
pub mod api;
pub mod batch;
pub mod config;
pub mod console;
pub mod error;
pub mod naming;
pub mod selector;
pub mod session;
pub mod store;
pub mod ui;
