//! CLI command implementations

use std::path::PathBuf;

use clap::Subcommand;
use stowage_core::config::StowageConfig;
use stowage_core::storage::PutOutcome;
use stowage_core::{FileStore, PutOptions, Result, StowageError};
use tokio::io::{AsyncWriteExt, BufWriter};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Store a file under PATH/NAME
    Put {
        /// Directory path inside the store
        path: String,
        /// File name inside the directory
        name: String,
        /// Source file, or `-` for stdin
        source: String,
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
        /// Fail if the data could not be written to disk
        #[arg(long)]
        strict: bool,
    },
    /// Read a stored file
    Get {
        /// Directory path inside the store
        path: String,
        /// File name inside the directory
        name: String,
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Remove a stored file
    Delete {
        /// Directory path inside the store
        path: String,
        /// File name inside the directory
        name: String,
    },
    /// Show store location and activity counters
    Stat,
}

/// Handle the CLI command
///
/// # Errors
/// Returns appropriate error based on the command that fails
pub async fn handle_command(command: Commands, config: StowageConfig) -> Result<()> {
    let store = FileStore::new(config.store);

    match command {
        Commands::Put {
            path,
            name,
            source,
            force,
            strict,
        } => put_file(&store, &path, &name, &source, force, strict).await,
        Commands::Get { path, name, output } => get_file(&store, &path, &name, output).await,
        Commands::Delete { path, name } => delete_file(&store, &path, &name).await,
        Commands::Stat => show_stats(&store),
    }
}

/// Store a file from disk or stdin
///
/// # Errors
/// - `StowageError::Store` - Key invalid, file already exists, or strict write failed
/// - `StowageError::Io` - Source could not be opened
pub async fn put_file(
    store: &FileStore,
    path: &str,
    name: &str,
    source: &str,
    force: bool,
    strict: bool,
) -> Result<()> {
    let options = PutOptions { force };

    let outcome = if source == "-" {
        store
            .put_reader(path, name, tokio::io::stdin(), options)
            .await?
    } else {
        let file = tokio::fs::File::open(source).await?;
        store.put_reader(path, name, file, options).await?
    };

    match outcome {
        PutOutcome::Persisted { path, bytes } => {
            println!("Stored {bytes} bytes at {}", path.display());
        }
        PutOutcome::NotPersisted { path, error } => {
            if strict {
                return Err(StowageError::Io(error));
            }
            println!("Accepted but not written to {}: {error}", path.display());
        }
    }

    Ok(())
}

/// Copy a stored file to a destination file or stdout
///
/// # Errors
/// - `StowageError::Store` - File not found or key invalid
/// - `StowageError::Io` - Reading or writing failed
pub async fn get_file(
    store: &FileStore,
    path: &str,
    name: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut reader = store.get_async(path, name)?;

    let bytes = match output {
        Some(output) => {
            let mut writer = BufWriter::new(tokio::fs::File::create(&output).await?);
            let bytes = tokio::io::copy(&mut reader, &mut writer).await?;
            writer.flush().await?;
            bytes
        }
        None => {
            let mut stdout = tokio::io::stdout();
            let bytes = tokio::io::copy(&mut reader, &mut stdout).await?;
            stdout.flush().await?;
            bytes
        }
    };

    tracing::info!("Read {} bytes from {}/{} ({:?})", bytes, path, name, reader.source());
    Ok(())
}

/// Delete a stored file
///
/// # Errors
/// - `StowageError::Store` - Key invalid or removal failed
pub async fn delete_file(store: &FileStore, path: &str, name: &str) -> Result<()> {
    if store.delete(path, name).await? {
        println!("Deleted {path}/{name}");
    } else {
        println!("Nothing stored at {path}/{name}");
    }
    Ok(())
}

/// Print store location and counters
///
/// # Errors
/// Currently infallible; returns `Result` for command dispatch symmetry
pub fn show_stats(store: &FileStore) -> Result<()> {
    let stats = store.stats();

    println!("Store");
    println!("{:-<40}", "");
    println!("Base directory:   {}", store.base_dir().display());
    println!("Staged entries:   {}", stats.staged_entries);
    println!("Staged bytes:     {}", stats.staged_bytes);
    println!("Cache reads:      {}", stats.cache_reads);
    println!("Disk reads:       {}", stats.disk_reads);
    println!("Persisted writes: {}", stats.persisted_writes);
    println!("Failed writes:    {}", stats.failed_writes);
    println!("Rejected writes:  {}", stats.rejected_writes);

    Ok(())
}
