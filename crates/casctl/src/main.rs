//! casctl - inspect, populate, and repair a sharded content store
//!
//! Subcommands:
//! - `casctl init [--force]` - Create the 256-shard layout
//! - `casctl put <FILE>...` - Store files and print their keys
//! - `casctl get <KEY>` - Write an object to stdout or a file
//! - `casctl verify` / `repair` / `purge --yes` - Integrity scan and repair
//!
//! Every command except `init` refuses to create a store, so a mistyped
//! `--store` path fails instead of leaving an empty store behind.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use cas::{ContentHash, HashAlgorithm};
use clap::{ArgAction, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "casctl")]
#[command(about = "Content-addressed storage on a sharded directory")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
pub struct GlobalArgs {
    /// Root directory of the store
    #[arg(short, long, global = true, env = "CAS_PATH")]
    pub store: Option<PathBuf>,

    /// TOML file with a [cas] section
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Digest algorithm the store was written with (sha256, blake3)
    #[arg(short, long, global = true, env = "CAS_ALGORITHM")]
    pub algorithm: Option<HashAlgorithm>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the shard layout if it is missing
    Init {
        /// Delete everything at the store path first
        #[arg(long)]
        force: bool,
    },

    /// Report whether the store path holds a valid store
    Check,

    /// Store files, printing one key per line (`-` reads stdin)
    Put {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Store a literal string
    PutBytes {
        text: String,
    },

    /// Retrieve an object
    Get {
        key: ContentHash,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Exit 0 if the key is present, 1 if not
    Exists {
        key: ContentHash,
    },

    /// Print the size of an object in bytes
    Size {
        key: ContentHash,
    },

    /// Remove an object
    Rm {
        key: ContentHash,
    },

    /// Print the key a file would be stored under, without storing it
    Hash {
        file: PathBuf,
    },

    /// List every key in the store
    Ls,

    /// List keys whose content no longer matches (reads every object)
    Verify,

    /// Rename mismatched objects to the key of their current content
    Repair,

    /// Delete mismatched objects
    Purge {
        /// Confirm that invalid objects should be deleted
        #[arg(long)]
        yes: bool,
    },
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Init { force } => commands::init(global, force),
        Commands::Check => commands::check(global),
        Commands::Put { files } => commands::put(global, &files),
        Commands::PutBytes { text } => commands::put_bytes(global, &text),
        Commands::Get { key, output } => commands::get(global, &key, output.as_deref()),
        Commands::Exists { key } => commands::exists(global, &key),
        Commands::Size { key } => commands::size(global, &key),
        Commands::Rm { key } => commands::rm(global, &key),
        Commands::Hash { file } => commands::hash(global, &file),
        Commands::Ls => commands::ls(global),
        Commands::Verify => commands::verify(global),
        Commands::Repair => commands::repair(global),
        Commands::Purge { yes } => commands::purge(global, yes),
    }
}
