//! relkit - release engineering from the command line
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! Mirrors trees between the local disk and an S3-compatible bucket using
//! content-hash comparison, and rebuilds signed RPM repositories.
//!
//! # Environment
//!
//! ```text
//! RELKIT_STORE_ENDPOINT     S3-compatible endpoint
//! RELKIT_STORE_ACCESS_KEY   access key id
//! RELKIT_STORE_SECRET_KEY   secret access key
//! RELKIT_STORE_REGION       region (default: auto)
//! RELKIT_STORE_BUCKET       bucket for sync commands
//! RELKIT_SIGNING_KEY        base64 ed25519 secret key
//! RELKIT_WORKSPACE          workspace for repository builds
//! ```

pub mod cmd;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use relkit_core::bucket::DEFAULT_PARALLEL;

#[derive(Debug, Parser)]
#[command(name = "relkit")]
#[command(author, version, about = "relkit - bucket sync and RPM repository builds")]
pub struct Cli {
    /// Log what would change without changing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Number of sync jobs run at once
    #[arg(long, global = true, default_value_t = DEFAULT_PARALLEL)]
    pub parallel: usize,

    #[command(subcommand)]
    pub command: Commands,
}

/// Flags shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct Global {
    pub dry_run: bool,
    pub parallel: usize,
}

impl From<&Cli> for Global {
    fn from(cli: &Cli) -> Self {
        Self {
            dry_run: cli.dry_run,
            parallel: cli.parallel,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Mirror a bucket prefix into a local directory
    SyncFrom(SyncArgs),
    /// Mirror a local directory into a bucket prefix
    SyncTo(SyncArgs),
    /// Add packages to a distro's repositories and rebuild their metadata
    BuildRepo(BuildArgs),
    /// Generate an ed25519 signing key pair
    Keygen {
        /// Where to write the secret key
        #[arg(long, default_value = "relkit.key")]
        output: PathBuf,
    },
    /// Sign a file with the key in RELKIT_SIGNING_KEY
    Sign {
        /// File to sign
        file: PathBuf,
        /// Signature path (default: <file>.sig)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Bucket name
    #[arg(long, env = "RELKIT_STORE_BUCKET")]
    pub bucket: String,
    /// Key prefix within the bucket
    #[arg(long, default_value = "")]
    pub prefix: String,
    /// Local directory
    #[arg(long)]
    pub local: PathBuf,
    /// Remove files that have no counterpart on the source side
    #[arg(long)]
    pub delete: bool,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    /// Repository configuration
    #[arg(long, short, default_value = "relkit.toml")]
    pub config: PathBuf,
    /// Repository definition name
    #[arg(long)]
    pub distro: String,
    /// Release version, e.g. 4.4.2
    #[arg(long)]
    pub version: String,
    /// Architecture; repeat to build several concurrently
    #[arg(long = "arch", required = true)]
    pub arches: Vec<String>,
    /// Build profile substituted into repository paths
    #[arg(long, default_value = "default")]
    pub profile: String,
    /// Workspace for local repository trees
    #[arg(long)]
    pub workspace: Option<PathBuf>,
    /// Packages to add
    pub packages: Vec<PathBuf>,
}
