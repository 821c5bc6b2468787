//! Balance command - previous month's closing balance

use super::balance_cache;
use crate::cli::args::{BalanceArgs, OutputFormat};
use crate::config::Config;
use crate::error::FintrackResult;
use crate::ui;

/// Execute the balance command
pub async fn execute(args: BalanceArgs, config: &Config) -> FintrackResult<()> {
    let cache = balance_cache(config).await?;

    if args.refresh {
        cache.invalidate(&args.user_id).await?;
    }

    let balance = cache.get(&args.user_id).await;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&balance)?),
        OutputFormat::Plain => match balance {
            Some(b) => {
                ui::key_value("User", &args.user_id);
                ui::key_value("Period", &format!("{}-{:02}", b.year, b.month));
                ui::key_value_status("Closing balance", &format!("{:.2}", b.closing_balance), true);
            }
            None => ui::step_warn_hint(
                &format!("No previous month balance for {}", args.user_id),
                "The month may have no activity, or the API is unreachable",
            ),
        },
    }

    Ok(())
}
