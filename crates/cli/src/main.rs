//! Bodega CLI - developer tools for the storefront.
//!
//! # Usage
//!
//! ```bash
//! # Produce an x-signature header for a test webhook
//! bodega-cli sign --data-id 123 --request-id req-1
//!
//! # Price a cart offline
//! bodega-cli quote --items cart.json --rules discounts.json --at 2024-06-02T12:00:00-03:00
//! ```
//!
//! # Commands
//!
//! - `sign` - Sign a payment webhook with `MP_WEBHOOK_SECRET`
//! - `quote` - Apply discount rules to line items from JSON files

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bodega-cli")]
#[command(author, version, about = "Bodega CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a payment webhook for local testing
    Sign {
        /// Notification `data.id`
        #[arg(short, long)]
        data_id: Option<String>,

        /// `x-request-id` header value
        #[arg(short, long)]
        request_id: Option<String>,

        /// Signing timestamp (default: now)
        #[arg(long)]
        ts: Option<String>,
    },
    /// Price a cart offline
    Quote {
        /// JSON file with line items
        #[arg(short, long)]
        items: PathBuf,

        /// JSON file with discount rules
        #[arg(short, long)]
        rules: PathBuf,

        /// Instant to price at (RFC 3339, default: now)
        #[arg(long)]
        at: Option<String>,

        /// Store UTC offset for weekday rules
        #[arg(long, default_value = "-03:00", allow_hyphen_values = true)]
        offset: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing (stderr, so command output stays pipeable)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let output = match cli.command {
        Commands::Sign {
            data_id,
            request_id,
            ts,
        } => commands::sign::header(&commands::sign::SignArgs {
            data_id,
            request_id,
            ts,
        })?,
        Commands::Quote {
            items,
            rules,
            at,
            offset,
        } => {
            let quote = commands::quote::run(&commands::quote::QuoteArgs {
                items: &items,
                rules: &rules,
                at: at.as_deref(),
                offset: &offset,
            })
            .await?;
            serde_json::to_string_pretty(&quote)?
        }
    };

    writeln!(std::io::stdout(), "{output}")?;
    Ok(())
}
