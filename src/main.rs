//! CLI entry point for lux-rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lux-rs")]
#[command(version)]
#[command(about = "Build static sites from Markdown, reStructuredText and templates", long_about = None)]
struct Cli {
    /// Set the base directory (defaults to current directory)
    #[arg(short, long, global = true)]
    cwd: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the static site
    #[command(alias = "b")]
    Build {
        /// Watch for file changes
        #[arg(short, long)]
        watch: bool,
    },

    /// Start a local server
    #[command(alias = "s")]
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8060")]
        port: u16,

        /// IP address to bind to
        #[arg(short, long, default_value = "localhost")]
        ip: String,

        /// Build once and serve the static location
        #[arg(long)]
        r#static: bool,
    },

    /// Remove the static location
    Clean,

    /// List site information
    List {
        /// What to list (content, tag, category, author)
        #[arg(default_value = "content")]
        r#type: String,
    },

    /// Display version information
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        "lux_rs=debug,info"
    } else {
        "lux_rs=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let base_dir = match cli.cwd {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Commands::Build { watch } => {
            let lux = lux_rs::Lux::new(&base_dir)?;
            tracing::info!("Building static site...");
            let report = lux.build()?;

            if watch {
                lux_rs::commands::build::watch(&lux).await?;
            } else if !report.is_success() {
                for (source, error) in &report.failed {
                    eprintln!("{}: {}", source, error);
                }
                anyhow::bail!("{} files failed to build", report.failed.len());
            }
            println!("Built successfully!");
        }

        Commands::Serve {
            port,
            ip,
            r#static,
        } => {
            let lux = lux_rs::Lux::new(&base_dir)?;

            if r#static {
                tracing::info!("Building static site...");
                lux.build()?;
            }

            tracing::info!("Starting server at http://{}:{}", ip, port);
            lux_rs::server::start(&lux, &ip, port, r#static).await?;
        }

        Commands::Clean => {
            let lux = lux_rs::Lux::new(&base_dir)?;
            tracing::info!("Cleaning static location...");
            lux.clean()?;
            println!("Cleaned successfully!");
        }

        Commands::List { r#type } => {
            let lux = lux_rs::Lux::new(&base_dir)?;
            lux_rs::commands::list::run(&lux, &r#type)?;
        }

        Commands::Version => {
            println!("lux-rs version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
