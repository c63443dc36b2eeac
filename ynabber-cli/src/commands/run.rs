//! Run command - one pipeline run from the terminal

use anyhow::Result;
use colored::Colorize;
use ynabber_core::YnabberContext;

pub async fn run(ctx: YnabberContext, bank_id: Option<&str>, json: bool) -> Result<()> {
    let report = ctx.sync_service.run(bank_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} {}", "Synced:".green(), report.bank_id);
    println!("  Run: {}", report.run_id);
    println!("  Readers: {}", report.sources.join(", "));
    println!("  Writers: {}", report.sinks.join(", "));
    println!("  Transactions: {}", report.transactions.to_string().bold());
    println!("  Took: {} ms", report.elapsed_ms);

    Ok(())
}
