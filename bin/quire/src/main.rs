//! Quire CLI
//!
//! Static site generator with layout chains and Handlebars-style templates.
//!
//! This is the binary entry point. The library functionality is in `lib.rs`.

use clap::Parser;
use color_eyre::eyre::Result;

/// Command-line interface for Quire.
#[derive(Parser)]
#[command(name = "quire", version, about = "A static site generator")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "quire.toml")]
    config: std::path::PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(clap::Subcommand)]
enum Commands {
    /// Build the site into the destination directory
    Build {
        /// Output directory (overrides build.destination)
        #[arg(short, long)]
        destination: Option<std::path::PathBuf>,
        /// Include draft posts
        #[arg(long)]
        drafts: bool,
    },
    /// Build, watch for changes and serve the site
    Serve {
        /// Port to listen on (overrides serve.port)
        #[arg(short, long)]
        port: Option<u16>,
        /// Open browser automatically
        #[arg(long)]
        open: bool,
        /// Include draft posts
        #[arg(long)]
        drafts: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    quire::init_tracing(cli.verbose);

    match cli.command {
        Commands::Build {
            destination,
            drafts,
        } => {
            quire::cmd::build::run(&cli.config, destination.as_deref(), drafts)?;
        }
        Commands::Serve { port, open, drafts } => {
            quire::cmd::serve::run(&cli.config, port, open, drafts).await?;
        }
    }

    Ok(())
}
