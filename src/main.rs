// Entrypoint for the CLI application.
// - Keeps `main` small: read settings, build the storage client and hand it
//   to the menu loop.
// - Returns `anyhow::Result` so startup failures exit non-zero with context.

use anyhow::Context;
use blobstore_cli::{api::AzureClient, config::Settings, ui::main_menu};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so they never interleave with the menu on stdout.
    // `RUST_LOG` overrides the default level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let settings = Settings::from_env()?;

    println!("Connecting to storage account...");
    let client = AzureClient::from_connection_string(&settings.connection_string)
        .context("Failed to configure storage client")?;

    // Start the interactive menu. This call blocks until the user exits.
    main_menu(client, &settings)?;
    Ok(())
}
