//! Scan the ledger for incoming stealth payments

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use stealth_core::{DiscoveredPayment, ScanReport};

use super::{format_amount, CliContext};

pub struct ScanOptions {
    pub from: Option<u64>,
    pub to: Option<u64>,
    /// Keep scanning in the background until interrupted
    pub watch: bool,
}

fn announce(payment: &DiscoveredPayment) {
    println!(
        "{} {} at slot {} ({})",
        "Found payment".green().bold(),
        format_amount(payment.note.amount, &payment.note.asset_id),
        payment.slot,
        &payment.id[..16]
    );
}

fn print_report(report: &ScanReport) {
    println!();
    println!("{}", "Scan Summary".yellow().bold());
    println!("  Slots:        {}..={}", report.from, report.to);
    println!("  Transactions: {}", report.transactions);
    println!("  Outputs:      {}", report.checked);
    println!("  Filtered out: {}", report.filtered_out);
    if report.commitment_mismatches > 0 || report.malformed > 0 {
        println!(
            "  {}",
            format!(
                "Rejected {} outputs with bad commitments and {} malformed outputs",
                report.commitment_mismatches, report.malformed
            )
            .red()
        );
    }
    println!("  New payments: {}", report.discovered.len().to_string().green());
}

pub async fn run(ctx: &CliContext, options: ScanOptions) -> Result<()> {
    let keys = ctx.unlock_keys()?;
    let scanner = ctx.open_scanner(keys)?.with_discovery_callback(announce);

    if options.watch {
        if options.from.is_some() || options.to.is_some() {
            bail!("--watch scans incrementally and cannot be combined with --from/--to");
        }

        println!(
            "{}",
            format!(
                "Watching for payments every {}s (Ctrl+C to stop)...",
                scanner.config().interval_secs
            )
            .cyan()
        );
        let handle = Arc::new(scanner).start();
        tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;
        println!("{}", "Stopping scanner...".cyan());
        handle.stop().await;
        return Ok(());
    }

    println!("{}", "Scanning for incoming stealth payments...".cyan());
    let report = match (options.from, options.to) {
        (None, None) => scanner.scan_incremental().await,
        (Some(from), Some(to)) => scanner.scan_range(from, to).await,
        _ => bail!("--from and --to must be given together"),
    }
    .context("Scan failed")?;

    print_report(&report);

    let balances = scanner.balances().await;
    if !balances.is_empty() {
        println!();
        println!("{}", "Unspent balance".yellow().bold());
        for (asset_id, amount) in &balances {
            println!("  {}", format_amount(*amount, asset_id));
        }
    }

    Ok(())
}
