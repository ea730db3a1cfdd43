//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// narkeep - maintain Nix NAR binary caches
///
/// Checks, repairs, recompresses and replicates directory-based NAR
/// stores and their .narinfo records.
#[derive(Parser, Debug)]
#[command(name = "narkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the NAR store directory
    #[arg(value_name = "STORE")]
    pub store: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(long, global = true, env = "NARKEEP_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check records for missing payload files
    Check(CheckArgs),

    /// List closure members or their files
    Get(GetArgs),

    /// List producer (deriver) references of a closure
    Drvs(DrvsArgs),

    /// Find payload files no record points at
    Orphans(OrphansArgs),

    /// Check remote caches for availability
    Cache(CacheArgs),

    /// Fetch records and payloads from remote caches
    Fetch(FetchArgs),

    /// (Re)compress payload files and update their records
    Compress(CompressArgs),

    /// Copy a closure from the local nix installation into the store
    Nixcopy(NixcopyArgs),
}

/// Arguments for the check command
#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Only check the closure of this store hash
    #[arg(short = 'a', long)]
    pub hash: Option<String>,
}

/// Arguments for the get command
#[derive(Parser, Debug)]
pub struct GetArgs {
    /// Only list the closure of this store hash
    #[arg(short = 'a', long)]
    pub hash: Option<String>,

    /// List store hashes instead of file paths
    #[arg(short, long)]
    pub listhashes: bool,

    /// Print paths relative to the store directory
    #[arg(short, long)]
    pub relative: bool,
}

/// Arguments for the drvs command
#[derive(Parser, Debug)]
pub struct DrvsArgs {
    /// Only list derivers for the closure of this store hash
    #[arg(short = 'a', long)]
    pub hash: Option<String>,

    /// List store hashes instead of deriver names
    #[arg(short, long)]
    pub listhashes: bool,
}

/// Arguments for the orphans command
#[derive(Parser, Debug)]
pub struct OrphansArgs {
    /// Payload subdirectory relative to the store
    #[arg(short, long)]
    pub nardir: Option<String>,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Only probe the closure of this store hash
    #[arg(short = 'a', long)]
    pub hash: Option<String>,

    /// Comma separated cache endpoints (URL or mirror directory)
    #[arg(short, long, value_delimiter = ',')]
    pub caches: Vec<String>,

    /// Probe the closure's missing references instead of its members
    #[arg(short = 'r', long)]
    pub checkrefs: bool,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// Comma separated cache endpoints (URL or mirror directory)
    #[arg(short, long, value_delimiter = ',')]
    pub caches: Vec<String>,

    /// File with one store hash per line (stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Arguments for the compress command
#[derive(Parser, Debug)]
pub struct CompressArgs {
    /// Target compression: xz, zstd or none
    #[arg(short, long)]
    pub compression: Option<String>,

    /// File with one store hash per line (stdin when omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Arguments for the nixcopy command
#[derive(Parser, Debug)]
pub struct NixcopyArgs {
    /// Store path whose closure is copied in
    #[arg(value_name = "PATH")]
    pub path: String,

    /// Target compression: xz, zstd or none
    #[arg(short, long)]
    pub compression: Option<String>,

    /// Skip paths already present in a remote cache
    #[arg(short, long)]
    pub skipcached: bool,

    /// Comma separated cache endpoints checked by --skipcached
    #[arg(long, value_delimiter = ',')]
    pub caches: Vec<String>,

    /// Write the list of copied hashes to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
