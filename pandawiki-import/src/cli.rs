/// # pandawiki-import CLI interface
///
/// Command parsing and orchestration glue for the `pandawiki-import` binary.
///
/// All pipeline logic (queueing, parsing, polling, node creation) lives in
/// the [`pandawiki-import-core`] crate. This module loads config, reads
/// input files, wires the HTTP client into the importer, and reports.
///
/// ## How To Use
/// - From the shell: `pandawiki-import import --config import.yaml [--dry-run]`.
/// - Programmatically or from integration tests: call [`run`] with a constructed [`Cli`].
///
/// [`pandawiki-import-core`]: ../../pandawiki-import-core/
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::{Parser, Subcommand};
use pandawiki_import_core::contract::UploadFile;
use pandawiki_import_core::{ImportList, Importer, ItemStatus};
use tracing::{debug, error, info};

use crate::client::PandaWikiClient;
use crate::load_config::load_config;

/// CLI for pandawiki-import: bulk-import files and web pages into PandaWiki.
#[derive(Parser)]
#[clap(
    name = "pandawiki-import",
    version,
    about = "Upload, parse and import documents into a PandaWiki knowledge base"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Import every input listed in the given config file
    Import {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Stop after parsing and print the items that would be imported
        #[clap(long)]
        dry_run: bool,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    info!("trace_initialised");

    match cli.command {
        Commands::Import { config, dry_run } => import(&config, dry_run).await,
    }
}

async fn import(config_path: &Path, dry_run: bool) -> Result<()> {
    let config = load_config(config_path)?;
    config.import.trace_loaded();

    let client = PandaWikiClient::new(config.api.base_url.clone(), config.token.clone())?;
    let importer = Importer::new(Arc::new(client), config.import.clone());

    let files = read_input_files(&config.inputs.files).await?;
    importer.add_files(files);
    importer.add_urls(config.inputs.urls.clone());
    spawn_progress_logger(importer.list());

    info!(command = "import", dry_run, items = importer.list().len(), "Starting import");

    if dry_run {
        let outcome = importer.prepare().await;
        println!("{}", serde_json::to_string_pretty(&importer.list().snapshot())?);
        if outcome.failed > 0 {
            error!(command = "import", failed = outcome.failed, "Dry run finished with failures");
            bail!("{} item(s) failed to upload or parse", outcome.failed);
        }
        info!(command = "import", parsed = outcome.succeeded, "Dry run complete");
        return Ok(());
    }

    let report = importer.run().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.is_success() {
        for failed in &report.failed {
            error!(command = "import", title = %failed.title, status = ?failed.status, message = %failed.message, "Item failed");
        }
        bail!("{} item(s) failed to import", report.failed.len());
    }
    info!(command = "import", imported = report.imported.len(), "Import complete");
    Ok(())
}

async fn read_input_files(paths: &[PathBuf]) -> Result<Vec<UploadFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read input file {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!(filename = %filename, bytes = data.len(), "Read input file");
        files.push(UploadFile {
            filename,
            data: Bytes::from(data),
        });
    }
    Ok(files)
}

/// Log a status summary whenever the item list changes. Ends with the importer.
fn spawn_progress_logger(list: &ImportList) {
    let mut rx = list.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let items = rx.borrow_and_update().clone();
            let count = |status: ItemStatus| items.iter().filter(|i| i.status == status).count();
            debug!(
                total = items.len(),
                parsing = count(ItemStatus::Parsing),
                parsed = count(ItemStatus::Parsed),
                importing = count(ItemStatus::Importing),
                imported = count(ItemStatus::Imported),
                failed = items.iter().filter(|i| i.status.is_error()).count(),
                "[IMPORT][PROGRESS] Item list changed"
            );
        }
    });
}
