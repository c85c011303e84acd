//! Build a stealth payment announcement

use anyhow::{bail, Context, Result};
use colored::Colorize;
use solana_sdk::pubkey::Pubkey;
use stealth_core::build_payment;
use stealth_core::keys::parse_meta_address;

use crate::ledger::{encode_memo, MEMO_MAGIC};

use super::{format_amount, CliContext};

/// Upper bound for the memo program's instruction data
const MAX_MEMO_LEN: usize = 566;

pub fn run(ctx: &CliContext, recipient: &str, amount: u64, asset_id: &str) -> Result<()> {
    if amount == 0 {
        bail!("Payment amount must be greater than zero");
    }

    println!("{}", "Preparing stealth payment...".cyan());

    let recipient_key = parse_meta_address(recipient).context("Invalid meta-address format")?;
    let scanner = &ctx.config.scanner;
    let payload = build_payment(&recipient_key, amount, asset_id, &scanner.bloom, &scanner.field)
        .context("Failed to build stealth payment")?;

    let memo = encode_memo(&payload.commitment, &payload.metadata);
    if memo.len() > MAX_MEMO_LEN {
        bail!(
            "Announcement is {} bytes, above the {} byte memo limit. Use a shorter asset id.",
            memo.len(),
            MAX_MEMO_LEN
        );
    }

    let stealth_address = Pubkey::new_from_array(payload.stealth_public_key);

    println!();
    println!("{}", "Stealth Payment".yellow().bold());
    println!("  Amount:          {}", format_amount(amount, asset_id));
    println!("  Stealth address: {}", stealth_address.to_string().green());
    println!("  Ephemeral key:   {}", hex::encode(payload.ephemeral_public_key));
    println!("  Commitment:      {}", hex::encode(payload.commitment));
    println!();
    println!("{}:", "Announcement memo".yellow());
    println!("{}", memo);
    println!();
    println!(
        "{}",
        format!(
            "Transfer the funds to the stealth address and attach the memo above \
             (prefix {}) in the same transaction.",
            String::from_utf8_lossy(MEMO_MAGIC)
        )
        .dimmed()
    );

    Ok(())
}
