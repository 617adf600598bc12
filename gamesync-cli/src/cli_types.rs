//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gamesync")]
#[command(about = "Keep EmulationStation gamelists in sync with scraped metadata", long_about = None)]
pub(crate) struct Cli {
    /// Settings file (defaults to ~/.config/gamesync/settings.toml)
    #[arg(short = 'c', long, global = true)]
    pub settings: Option<PathBuf>,

    /// System registry (defaults to systems.toml next to the settings file)
    #[arg(short = 's', long, global = true)]
    pub systems: Option<PathBuf>,

    /// Only show warnings and errors (suppress normal output)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable verbose/debug logging (timestamps + debug-level messages)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Restricts a command to some of the configured systems.
#[derive(Args, Clone, Default)]
pub(crate) struct SystemFilterArgs {
    /// System names (e.g., mame,snes); all systems when omitted
    #[arg(long = "system", value_delimiter = ',')]
    pub systems: Option<Vec<String>>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List configured systems with their game counts and pending changes
    Systems {
        #[command(flatten)]
        filter: SystemFilterArgs,
    },

    /// Write pending metadata changes into gamelist.xml
    Update {
        #[command(flatten)]
        filter: SystemFilterArgs,
    },

    /// Repair gamelist.xml against the files on disk
    Cleanup {
        #[command(flatten)]
        filter: SystemFilterArgs,
    },

    /// Scrape metadata and media for supported systems
    Scrape {
        #[command(flatten)]
        filter: SystemFilterArgs,

        /// Only scrape games that lack media the scraper can provide
        #[arg(long)]
        missing_only: bool,

        /// Leave results in the recovery journal instead of updating gamelists
        #[arg(long)]
        no_write: bool,

        /// Scrape a single ROM file
        #[arg(long)]
        game: Option<PathBuf>,

        /// Search under this name instead of the file name (requires --game)
        #[arg(long, requires = "game")]
        name: Option<String>,
    },

    /// Inspect or discard the recovery journal
    Recovery {
        #[command(subcommand)]
        action: RecoveryAction,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum RecoveryAction {
    /// Show journaled entries per system
    Status {
        #[command(flatten)]
        filter: SystemFilterArgs,
    },

    /// Delete journaled entries without applying them
    Clear {
        #[command(flatten)]
        filter: SystemFilterArgs,
    },
}

#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Show the effective settings and their sources
    Show,

    /// Print the settings and systems file paths
    Path,
}
