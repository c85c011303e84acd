//! Key generation command with encrypted storage and mnemonic support

use anyhow::{bail, Result};
use colored::Colorize;
use stealth_core::{LedgerClient, RecipientKeys};
use tracing::warn;

use crate::config::save_config;
use crate::ledger::SolanaLedger;
use crate::secure_storage::prompt_new_password;

use super::CliContext;

pub struct KeygenOptions {
    /// Overwrite existing keys
    pub force: bool,
    /// Skip the recovery phrase
    pub no_mnemonic: bool,
    pub import_mnemonic: Option<String>,
    pub passphrase: Option<String>,
    /// First slot the scanner looks at
    pub start_slot: Option<u64>,
}

/// Slot where scanning should begin for these keys
///
/// Fresh keys cannot have received anything yet, so the current slot is
/// enough. Imported keys start where the user says, or from the configured
/// start.
async fn scan_start(ctx: &CliContext, options: &KeygenOptions) -> Option<u64> {
    if options.start_slot.is_some() || options.import_mnemonic.is_some() {
        return options.start_slot;
    }
    match SolanaLedger::new(&ctx.config.rpc_url).chain_head().await {
        Ok(slot) => Some(slot),
        Err(e) => {
            warn!(error = %e, "could not read current slot");
            println!(
                "{}",
                "Could not reach the RPC endpoint. Scanning will start at the configured slot.".red()
            );
            None
        }
    }
}

pub async fn run(ctx: &CliContext, options: KeygenOptions) -> Result<()> {
    let storage = ctx.key_storage();
    if storage.exists() && !options.force {
        bail!(
            "Stealth keys already exist. Use --force to overwrite.\n\
             Warning: Overwriting keys will make any existing stealth payments unrecoverable!"
        );
    }

    println!("{}", "=== StealthSol Key Generation ===".cyan().bold());
    println!();

    let passphrase = options.passphrase.as_deref().unwrap_or("");
    let (keys, mnemonic) = if let Some(phrase) = &options.import_mnemonic {
        println!("{}", "Importing keys from mnemonic phrase...".cyan());
        (RecipientKeys::from_mnemonic(phrase, passphrase)?, None)
    } else if options.no_mnemonic {
        println!("{}", "Generating random keys (no recovery phrase)...".cyan());
        (RecipientKeys::generate(), None)
    } else {
        println!("{}", "Generating keys with recovery phrase...".cyan());
        let (keys, phrase) = RecipientKeys::generate_with_mnemonic()?;
        (keys, Some(phrase))
    };

    println!();
    println!("{}", "Choose a strong password to encrypt your keys.".cyan());
    println!("{}", "Requirements: 8+ chars, uppercase, lowercase, and numbers".dimmed());
    println!();
    let password = prompt_new_password("Enter password: ")?;
    storage.save(&keys, &password)?;

    let start = scan_start(ctx, &options).await;
    if let Some(slot) = start {
        let mut config = ctx.config.clone();
        config.scanner.start_checkpoint = slot;
        save_config(&ctx.paths, &config)?;
    } else if !ctx.paths.config_file().exists() {
        save_config(&ctx.paths, &ctx.config)?;
    }

    println!();
    println!("{}", "Keys generated and encrypted successfully!".green().bold());
    println!();

    if let Some(phrase) = mnemonic {
        println!("{}", "=== RECOVERY PHRASE - WRITE THIS DOWN! ===".red().bold());
        println!();
        let words: Vec<&str> = phrase.split_whitespace().collect();
        for (i, chunk) in words.chunks(4).enumerate() {
            let line: String = chunk
                .iter()
                .enumerate()
                .map(|(j, word)| format!("{:2}. {:<12}", i * 4 + j + 1, word))
                .collect::<Vec<_>>()
                .join(" ");
            println!("  {}", line.yellow());
        }
        println!();
        println!("{}", "Anyone with this phrase can recover your keys.".red());
        println!("{}", "You will NOT be shown this phrase again.".red());
        println!();
    }

    println!("{}:", "Public Key".yellow());
    println!("  {}", hex::encode(keys.public_key));
    println!();
    println!("{}:", "Meta-Address (share this to receive payments)".yellow());
    println!("  {}", keys.meta_address());
    println!();
    if let Some(slot) = start {
        println!("{}", format!("Scanning starts at slot {}", slot).dimmed());
    }
    println!(
        "{}",
        format!("Encrypted keys saved to: {}", ctx.paths.keys_file().display()).dimmed()
    );

    Ok(())
}
