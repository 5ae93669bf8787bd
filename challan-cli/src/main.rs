//! Challan CLI - run the traffic-violation pipeline from the command line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "challan")]
#[command(author, version, about = "Traffic-violation report pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one image for traffic violations
    Analyze {
        /// Image to analyze: a local file, URL, or data URI
        #[arg(value_name = "IMAGE")]
        image: String,

        /// Reporter identity to attach to the report (phone number)
        #[arg(short, long)]
        reporter: Option<String>,

        /// Use the deterministic mock backend instead of Gemini (for testing)
        #[arg(long)]
        mock: bool,

        /// Print the raw report as JSON instead of formatted output
        #[arg(long)]
        json: bool,
    },

    /// List the violation catalog with fines and legal sections
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            image,
            reporter,
            mock,
            json,
        } => commands::analyze::execute(image, reporter, mock, json).await,
        Commands::Catalog => commands::catalog::execute(),
    }
}
