mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "skystack", about = "Sigma-clipped stacking of aligned astronomical frames")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack frames with iterative sigma clipping
    Stack(commands::stack::StackArgs),
    /// Set, show or delete per-frame offset records
    Offset(commands::offset::OffsetArgs),
    /// Print or save a default job config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Stack(args) => commands::stack::run(args),
        Commands::Offset(args) => commands::offset::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
