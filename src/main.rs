//! musync: keep a portable music player in step with a music library

use anyhow::{Context, Result};
use clap::Parser;
use musync::cli::Args;
use musync::{sync_library, LoftyBackend};
use tracing::{info, Level};

#[compio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging based on verbosity and quiet mode
    if !args.quiet {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(match args.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        // In quiet mode, only log errors
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(Level::ERROR)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)?;
    }

    // Validate arguments
    args.validate().context("Invalid arguments")?;
    let options = args.to_options()?;

    info!("Starting musync v{}", env!("CARGO_PKG_VERSION"));
    info!("Library: {}", options.library.display());
    info!("Device: {}", options.device.display());
    info!("Track extension: {}", options.extension);
    info!("Similarity threshold: {}", options.similarity_threshold);
    info!("On error: {:?}", options.on_failure);

    let backend = LoftyBackend::new();
    match sync_library(&options, &backend).await {
        Ok(stats) => {
            if !args.quiet {
                println!("{stats}");
            }
            info!("Files copied: {}", stats.files_copied);
            info!("Files renamed: {}", stats.files_renamed);
            info!("Files removed: {}", stats.files_removed);
            info!("Songs checked: {}", stats.songs_checked);
            info!("Songs repaired: {}", stats.songs_repaired);
            info!("Songs skipped: {}", stats.songs_skipped);
            info!("Bytes copied: {}", stats.bytes_copied);
            info!("Duration: {:?}", stats.duration);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
