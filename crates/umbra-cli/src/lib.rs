//! Umbra CLI - command-line control of view-schema migrations.
//!
//! The stock `umbra` binary covers the control plane: inspecting the
//! current version and replay run (`status`) and recovering a wedged run
//! (`abort`). The migration commands need the application's projector
//! declarations, so applications embed [`CliApp`] in their own binary:
//!
//! ```no_run
//! fn migrations() -> umbra::MigrationSet {
//!     // declare projectors / alter-table targets per version
//!     umbra::MigrationSet::new()
//! }
//!
//! fn main() -> anyhow::Result<()> {
//!     umbra_cli::CliApp::new(migrations()).run()
//! }
//! ```

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use umbra::{MigrationSet, PostgresStore, StoreConfig, Version};

#[derive(Parser)]
#[command(name = "umbra")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,

    /// Directory holding the versioned SQL artifacts
    #[arg(long, default_value = "db/view_schema")]
    migrations_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the current view-schema version and any active replay run
    Status,

    /// Abort the active replay run and drop its shadow schema
    Abort {
        /// Skip the confirmation prompt
        #[arg(long)]
        force: bool,
    },

    /// Two-phase view-schema migration
    #[command(subcommand)]
    Migrate(MigrateCommands),
}

#[derive(Subcommand)]
pub enum MigrateCommands {
    /// Show what migrating to a version would do
    Plan {
        /// Target version (defaults to the latest declared)
        #[arg(long)]
        to: Option<Version>,
    },

    /// Online phase: create suffixed tables and replay history into them
    Online {
        #[arg(long)]
        to: Option<Version>,
    },

    /// Offline phase: catch up, swap tables into place, bump the version
    Offline {
        #[arg(long)]
        to: Option<Version>,
    },
}

/// Embeddable CLI carrying the application's migration declarations
pub struct CliApp {
    migrations: MigrationSet,
}

impl CliApp {
    pub fn new(migrations: MigrationSet) -> Self {
        Self { migrations }
    }

    pub fn run(self) -> anyhow::Result<()> {
        let cli = Cli::parse();

        let filter = if cli.verbose { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| filter.into()),
            )
            .init();

        let store = PostgresStore::new(StoreConfig::new(&cli.database_url));
        match cli.command {
            Commands::Status => commands::status::execute(&store),
            Commands::Abort { force } => commands::replay::abort(&store, force),
            Commands::Migrate(command) => {
                commands::migrate::execute(&store, self.migrations, &cli.migrations_dir, command)
            }
        }
    }
}
