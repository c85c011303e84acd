//! List discovered payments and balances

use anyhow::Result;
use chrono::{TimeZone, Utc};
use colored::Colorize;
use solana_sdk::pubkey::Pubkey;
use stealth_core::{DiscoveredPayment, ScanStatus};

use super::{format_amount, CliContext};

fn format_time(unix: Option<i64>) -> String {
    unix.and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|time| time.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn print_payment(payment: &DiscoveredPayment) {
    let status = if payment.spent {
        "spent".dimmed()
    } else {
        "unspent".green()
    };
    println!(
        "{}  {}  [{}]",
        payment.id[..16].bold(),
        format_amount(payment.note.amount, &payment.note.asset_id),
        status
    );
    println!(
        "  Address: {}",
        Pubkey::new_from_array(payment.stealth_public_key)
    );
    println!(
        "  Slot {} | {} | tx {}",
        payment.slot,
        format_time(payment.block_time),
        payment.tx_ref.signature
    );
}

pub fn run(ctx: &CliContext, all: bool) -> Result<()> {
    let state = ctx.load_state()?;

    let mut payments: Vec<&DiscoveredPayment> = state
        .payments
        .values()
        .filter(|payment| all || !payment.spent)
        .collect();
    payments.sort_by(|a, b| {
        (a.slot, &a.tx_ref.signature, a.position).cmp(&(b.slot, &b.tx_ref.signature, b.position))
    });

    println!();
    println!("{}", "Stealth Payments".yellow().bold());
    match state.progress.last_scanned_checkpoint {
        Some(slot) => println!("{}", format!("Scanned through slot {}", slot).dimmed()),
        None => println!("{}", "Nothing scanned yet. Run 'stealthsol scan'.".dimmed()),
    }
    if state.progress.status == ScanStatus::Error {
        println!("{}", "The last scan failed. Run 'stealthsol scan' to resume.".red());
    }
    println!();

    if payments.is_empty() {
        println!("No {}payments found.", if all { "" } else { "unspent " });
        return Ok(());
    }

    for payment in &payments {
        print_payment(payment);
    }

    let mut balances = std::collections::BTreeMap::<&str, u64>::new();
    for payment in state.payments.values().filter(|payment| !payment.spent) {
        let total = balances.entry(payment.note.asset_id.as_str()).or_insert(0);
        *total = total.saturating_add(payment.note.amount);
    }

    println!();
    println!("{}", "Unspent balance".yellow().bold());
    if balances.is_empty() {
        println!("  none");
    }
    for (asset_id, amount) in balances {
        println!("  {}", format_amount(amount, asset_id));
    }

    Ok(())
}
