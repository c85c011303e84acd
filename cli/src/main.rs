//! StealthSol CLI - stealth payments and payment scanning for Solana

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod ledger;
mod secure_storage;

use commands::*;
use config::{load_config, Paths};

#[derive(Parser)]
#[command(name = "stealthsol")]
#[command(author = "StealthSol Team")]
#[command(version)]
#[command(about = "Stealth payments for Solana with bloom-filtered scanning")]
#[command(long_about = r#"
StealthSol enables private payments on Solana using stealth addresses.

Each payment goes to a fresh one-time address that only the recipient can
link to their meta-address. Announcements ride in memo instructions with a
small bloom hint, so scanning skips most foreign payments without any
curve arithmetic.

Quick Start:
  1. stealthsol keygen           Generate your stealth keys
  2. stealthsol address          Share your meta-address
  3. stealthsol scan             Check for incoming payments
  4. stealthsol spend <ID>       Prepare a spend with its nullifier
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Solana RPC URL (overrides config.json)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Data directory (default: ~/.stealth)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new stealth key
    Keygen {
        /// Force overwrite existing keys
        #[arg(short, long)]
        force: bool,

        /// Skip the recovery phrase
        #[arg(long)]
        no_mnemonic: bool,

        /// Import from existing recovery phrase
        #[arg(long)]
        import_mnemonic: Option<String>,

        /// Passphrase for mnemonic (optional extra security)
        #[arg(long)]
        passphrase: Option<String>,

        /// Slot to start scanning from (default: current slot for new keys)
        #[arg(long)]
        start_slot: Option<u64>,
    },

    /// Show your stealth meta-address
    Address,

    /// Build a stealth payment announcement for a meta-address
    Send {
        /// Recipient's meta-address (base58 encoded or stealth:... format)
        #[arg(short, long)]
        to: String,

        /// Amount in the asset's smallest unit (lamports for SOL)
        #[arg(short, long)]
        amount: u64,

        /// Asset identifier
        #[arg(long, default_value = "SOL")]
        asset: String,
    },

    /// Scan for incoming stealth payments
    Scan {
        /// First slot of an explicit range
        #[arg(long)]
        from: Option<u64>,

        /// Last slot of an explicit range
        #[arg(long)]
        to: Option<u64>,

        /// Keep scanning in the background until Ctrl+C
        #[arg(short, long)]
        watch: bool,
    },

    /// List discovered payments and balances
    Payments {
        /// Include spent payments
        #[arg(short, long)]
        all: bool,
    },

    /// Prepare the spend of a discovered payment
    Spend {
        /// Payment id (a unique prefix is enough)
        id: String,

        /// Destination address
        #[arg(short, long)]
        to: String,

        /// Mark the payment as spent afterwards
        #[arg(long)]
        mark_spent: bool,

        /// Print the one-time private key
        #[arg(long)]
        reveal_key: bool,
    },

    /// Reset scan progress to the configured start slot
    Reset,

    /// Show configuration, key and scan info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stealthsol=warn,stealth_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let paths = Paths::resolve(cli.home.as_deref())?;
    let mut config = load_config(&paths)?;
    if let Some(rpc_url) = cli.rpc_url {
        config.rpc_url = rpc_url;
    }
    let ctx = CliContext { paths, config };

    match cli.command {
        Commands::Keygen { force, no_mnemonic, import_mnemonic, passphrase, start_slot } => {
            keygen::run(&ctx, keygen::KeygenOptions {
                force,
                no_mnemonic,
                import_mnemonic,
                passphrase,
                start_slot,
            })
            .await?;
        }
        Commands::Address => {
            address::run(&ctx)?;
        }
        Commands::Send { to, amount, asset } => {
            send::run(&ctx, &to, amount, &asset)?;
        }
        Commands::Scan { from, to, watch } => {
            scan::run(&ctx, scan::ScanOptions { from, to, watch }).await?;
        }
        Commands::Payments { all } => {
            payments::run(&ctx, all)?;
        }
        Commands::Spend { id, to, mark_spent, reveal_key } => {
            spend::run(&ctx, spend::SpendOptions {
                id,
                destination: to,
                mark_spent,
                reveal_key,
            })
            .await?;
        }
        Commands::Reset => {
            reset::run(&ctx).await?;
        }
        Commands::Info => {
            info::run(&ctx)?;
        }
    }

    Ok(())
}
