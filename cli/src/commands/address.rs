//! Display stealth meta-address

use anyhow::Result;
use colored::Colorize;
use stealth_core::keys::format_meta_address;

use super::CliContext;

pub fn run(ctx: &CliContext) -> Result<()> {
    let public_key = ctx.key_storage().public_key()?;

    println!();
    println!("{}", "Your Stealth Meta-Address".yellow().bold());
    println!();
    println!("{}", format_meta_address(&public_key));
    println!();
    println!("{}:", "Components".dimmed());
    println!("  Public key: {}", hex::encode(public_key));
    println!();
    println!(
        "{}",
        "Share the meta-address above to receive private payments.".dimmed()
    );

    Ok(())
}
