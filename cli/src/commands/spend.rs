//! Prepare the spend of a discovered payment

use anyhow::{bail, Context, Result};
use colored::Colorize;
use solana_sdk::pubkey::Pubkey;
use stealth_core::prepare_spend;

use super::{format_amount, CliContext};

pub struct SpendOptions {
    /// Payment id or a unique prefix of it
    pub id: String,
    pub destination: String,
    /// Record the payment as spent once the bundle is built
    pub mark_spent: bool,
    pub reveal_key: bool,
}

pub async fn run(ctx: &CliContext, options: SpendOptions) -> Result<()> {
    let keys = ctx.unlock_keys()?;
    let seed = keys.seed().duplicate();
    let field = ctx.config.scanner.field;
    let scanner = ctx.open_scanner(keys)?;

    let candidates: Vec<_> = scanner
        .payments()
        .await
        .into_iter()
        .filter(|payment| payment.id.starts_with(&options.id))
        .collect();
    let payment = match candidates.as_slice() {
        [payment] => payment,
        [] => bail!("No payment matches '{}'. Run 'stealthsol payments --all'.", options.id),
        _ => bail!("'{}' matches {} payments. Use a longer id.", options.id, candidates.len()),
    };

    let bundle = prepare_spend(payment, &seed, &options.destination, &field)
        .context("Failed to prepare spend")?;

    println!();
    println!("{}", "Spend Bundle".yellow().bold());
    println!("  Payment:     {}", bundle.payment_id);
    println!("  Amount:      {}", format_amount(bundle.amount, &bundle.asset_id));
    println!(
        "  From:        {}",
        Pubkey::new_from_array(payment.stealth_public_key)
    );
    println!("  Destination: {}", bundle.destination);
    println!("  Commitment:  {}", hex::encode(bundle.commitment));
    println!("  Nullifier:   {}", hex::encode(bundle.nullifier).green());
    if options.reveal_key {
        println!();
        println!("{}", "Stealth private key (keep secret!):".red().bold());
        println!("  {}", hex::encode(bundle.stealth_private_key.expose()));
    }

    if options.mark_spent {
        scanner
            .mark_spent(&bundle.payment_id)
            .await
            .context("Failed to mark payment as spent")?;
        println!();
        println!("{}", "Payment marked as spent.".green());
    } else {
        println!();
        println!(
            "{}",
            "Publish the nullifier with the spend, then rerun with --mark-spent.".dimmed()
        );
    }

    Ok(())
}
