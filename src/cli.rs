use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "utilities")]
#[command(version)]
#[command(about = "Filesystem, archive and HTTP utilities provider", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to $UTILITIES_CONFIG or ./utilities.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Give up on running operations after this many seconds
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what apply would change
    Plan(TargetArgs),

    /// Make the filesystem match the configuration
    Apply(ApplyArgs),

    /// Re-read every recorded instance and record drift
    Refresh(TargetArgs),

    /// Delete every recorded instance
    Destroy(DestroyArgs),

    /// Inspect the state file
    #[command(subcommand)]
    State(StateCommand),

    /// Query a data source
    #[command(subcommand)]
    Data(DataCommand),

    /// Call a provider function
    #[command(subcommand)]
    Fn(FnCommand),

    /// List resource types, data sources and functions
    Schema {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Lifecycle Commands
// ============================================================================

#[derive(Parser)]
pub struct TargetArgs {
    /// Only act on these addresses or instance names
    #[arg(short, long)]
    pub target: Vec<String>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Show what would be done without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Number of instances worked on in parallel
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Only act on these addresses or instance names
    #[arg(short, long)]
    pub target: Vec<String>,
}

#[derive(Parser)]
pub struct DestroyArgs {
    /// Don't ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Only act on these addresses or instance names
    #[arg(short, long)]
    pub target: Vec<String>,
}

// ============================================================================
// State Commands
// ============================================================================

#[derive(Subcommand)]
pub enum StateCommand {
    /// List recorded addresses
    List,

    /// Show one recorded instance
    Show {
        /// Address such as utilities_extract_zip.app
        address: String,
    },
}

// ============================================================================
// Data Source Commands
// ============================================================================

#[derive(Subcommand)]
pub enum DataCommand {
    /// Existence, permissions and ownership of a directory
    LocalDirectory {
        path: PathBuf,
    },

    /// Stable bcrypt hash of a plaintext
    BcryptHash {
        plaintext: String,

        /// bcrypt cost (4-31)
        #[arg(long)]
        cost: Option<u32>,
    },
}

// ============================================================================
// Function Commands
// ============================================================================

#[derive(Subcommand)]
pub enum FnCommand {
    /// Check if a path exists
    PathExists {
        path: String,
    },

    /// Owner of a path
    PathOwner {
        path: String,
    },

    /// Octal permission bits of a path
    PathPermission {
        path: String,
    },

    /// Make an HTTP request
    HttpRequest {
        url: String,

        /// HTTP method
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request body
        #[arg(short, long, default_value = "")]
        body: String,

        /// Header as NAME=VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once(['=', ':'])
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    Ok((name.trim().to_string(), value.trim().to_string()))
}
