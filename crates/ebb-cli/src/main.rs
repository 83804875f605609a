//! Ebb CLI - Command-line interface for Ebb
//!
//! Loads edges into a decaying graph cache and prints the pruned
//! neighborhood of a seed vertex.

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "ebb")]
#[command(author = "Ebb Contributors")]
#[command(version)]
#[command(about = "A weighted graph cache where edges fade over time", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to .ebb/config.json, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Neighborhood query options shared by `demo` and `walk`.
#[derive(Args, Clone, Debug)]
pub struct QueryArgs {
    /// Number of hops to expand
    #[arg(long, default_value = "3")]
    pub steps: usize,

    /// Outgoing edges kept per vertex
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,

    /// Dampen heads that many vertices link to
    #[arg(long)]
    pub idf: bool,

    /// Print the node/edge list form instead of the raw snapshot
    #[arg(long)]
    pub view: bool,

    /// Write the result to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config to <path>/.ebb/config.json
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Fill the cache with random edges and query it
    Demo {
        /// Number of distinct vertex ids
        #[arg(long, default_value = "10000")]
        vertices: u32,

        /// Number of random edges to add
        #[arg(long, default_value = "100000")]
        edges: usize,

        /// Seed vertex id
        #[arg(short, long, default_value = "1")]
        seed: u32,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Load an edge list file and query it
    Walk {
        /// File with one `tail head [weight]` edge per line
        file: PathBuf,

        /// Seed vertex
        #[arg(short, long)]
        seed: String,

        #[command(flatten)]
        query: QueryArgs,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let result = match cli.command {
        Commands::Init { path } => commands::init(&path),
        Commands::Demo {
            vertices,
            edges,
            seed,
            query,
        } => commands::demo(cli.config.as_deref(), vertices, edges, seed, &query).await,
        Commands::Walk { file, seed, query } => {
            commands::walk(cli.config.as_deref(), &file, seed, &query)
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
