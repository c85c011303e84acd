//! Forget scan progress so the next scan starts over

use anyhow::{Context, Result};
use colored::Colorize;

use super::CliContext;

pub async fn run(ctx: &CliContext) -> Result<()> {
    let keys = ctx.unlock_keys()?;
    let scanner = ctx.open_scanner(keys)?;

    scanner
        .reset_progress()
        .await
        .context("Failed to reset scan progress")?;

    println!("{}", "Scan progress reset.".green());
    println!(
        "{}",
        format!(
            "The next scan starts again at slot {}. Known payments are kept.",
            scanner.config().start_checkpoint
        )
        .dimmed()
    );
    Ok(())
}
