//! Show configuration, key and scan status

use anyhow::Result;
use colored::Colorize;
use stealth_core::keys::format_meta_address;
use stealth_core::ScanStatus;

use super::CliContext;

pub fn run(ctx: &CliContext) -> Result<()> {
    println!();
    println!("{}", "StealthSol Configuration".yellow().bold());
    println!();

    println!("{}:", "Data Directory".cyan());
    println!("  {}", ctx.paths.root().display());
    println!();

    let storage = ctx.key_storage();
    match storage.read() {
        Ok(file) => {
            println!("{}", "Stealth Keys: CONFIGURED".green());
            println!("  Created: {}", file.created_at);
            let public_key = file.public_key()?;
            println!("  Meta-address: {}", format_meta_address(&public_key));
        }
        Err(_) => {
            println!("{}", "Stealth Keys: NOT CONFIGURED".red());
            println!("  Run 'stealthsol keygen' to generate keys");
        }
    }
    println!();

    println!("{}:", "RPC Endpoint".cyan());
    println!("  {}", ctx.config.rpc_url);
    println!();

    let scanner = &ctx.config.scanner;
    println!("{}:", "Scanner".cyan());
    println!("  Batch size:       {} slots", scanner.batch_size);
    println!("  Concurrency:      {}", scanner.concurrency);
    println!("  Interval:         {}s", scanner.interval_secs);
    println!("  Start slot:       {}", scanner.start_checkpoint);
    println!(
        "  Bloom hint:       {} bits, {} hashes",
        scanner.bloom.size_bits, scanner.bloom.hash_count
    );
    println!("  Field bytes:      {}", scanner.field.kept_bytes);
    println!();

    if storage.exists() {
        let state = ctx.load_state()?;
        let progress = &state.progress;
        println!("{}:", "Scan Progress".cyan());
        match progress.last_scanned_checkpoint {
            Some(slot) => println!("  Last slot:  {}", slot),
            None => println!("  Last slot:  {}", "never scanned".dimmed()),
        }
        println!("  Checked:    {}", progress.total_checked);
        println!("  Discovered: {}", progress.total_discovered);
        let status = match progress.status {
            ScanStatus::Idle => "idle".green(),
            ScanStatus::Scanning => "interrupted".yellow(),
            ScanStatus::Error => "error".red(),
        };
        println!("  Status:     {}", status);
        println!();
    }

    Ok(())
}
