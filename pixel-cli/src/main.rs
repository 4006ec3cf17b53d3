mod commands;
mod file_type;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pixel_core::{Category, CategoryFilter};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::StorageArgs;

#[derive(Parser)]
#[command(name = "pixel")]
#[command(about = "Image gallery CLI for S3-backed uploads, listing and search", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload images (JPEG, PNG, GIF, WebP up to 10 MiB each)
    Upload {
        /// Directories or files to upload
        #[arg(required = true)]
        paths: Vec<String>,

        /// Category assigned to every uploaded image
        #[arg(short, long)]
        category: Option<Category>,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// List stored images with their metadata
    List {
        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Delete a stored image by path or name
    Delete {
        /// Full storage path, or a name under the gallery prefix
        path: String,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Load the gallery and show a filtered view
    View {
        /// Category to show, or "All"
        #[arg(short, long, default_value = "All")]
        filter: CategoryFilter,

        /// Album id to restrict to
        #[arg(short, long)]
        album: Option<String>,

        /// Case-insensitive title/tag search
        #[arg(short, long, default_value = "")]
        query: String,

        /// Print records as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        storage: StorageArgs,
    },

    /// Print the records saved in a snapshot file
    Snapshot {
        /// Snapshot file
        #[arg(env = "PIXEL_SNAPSHOT")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pixel_cli=info,pixel_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload { paths, category, storage } => {
            commands::upload::execute(storage, paths, category).await?;
        }
        Commands::List { storage } => {
            commands::list::execute(storage).await?;
        }
        Commands::Delete { path, storage } => {
            commands::delete::execute(storage, path).await?;
        }
        Commands::View {
            filter,
            album,
            query,
            json,
            storage,
        } => {
            commands::view::execute(storage, filter, album, query, json).await?;
        }
        Commands::Snapshot { path } => {
            commands::snapshot::execute(path).await?;
        }
    }

    Ok(())
}
