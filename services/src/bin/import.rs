//! Loads the ingredient and tag catalogs into the database.
//!
//! ```text
//! foodgram-import ingredients data/ingredients.csv
//! foodgram-import tags data/tags.json
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use foodgram_services::{
    catalog_import::{import_ingredients, import_tags},
    database::{self, PgStorage},
};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "foodgram-import", about = "Load catalog data into Foodgram")]
struct Cli {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Apply pending migrations before importing.
    #[arg(long)]
    migrate: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// CSV `name,unit` lines or a JSON array of `{name, measurement_unit}`.
    Ingredients { path: PathBuf },
    /// JSON array of `{name, color, slug}`.
    Tags { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let pool = database::create_pool(&cli.database_url).await?;
    if cli.migrate {
        database::run_migrations(&pool).await?;
    }
    let storage = PgStorage::new(pool);

    match cli.command {
        Command::Ingredients { path } => {
            let inserted = import_ingredients(&storage, &path).await?;
            info!(inserted, path = %path.display(), "Ingredients imported");
        }
        Command::Tags { path } => {
            let inserted = import_tags(&storage, &path).await?;
            info!(inserted, path = %path.display(), "Tags imported");
        }
    }

    Ok(())
}
