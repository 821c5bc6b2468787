//! Session command - inspect, renew or end the session

use super::session_client;
use crate::cli::args::{SessionAction, SessionArgs};
use crate::config::Config;
use crate::error::{FintrackError, FintrackResult};
use crate::ui;

/// Execute the session command
pub async fn execute(args: SessionArgs, config: &Config) -> FintrackResult<()> {
    let client = session_client(config);

    match args.action {
        SessionAction::Me => {
            let me = client.me().await?;
            println!("{}", serde_json::to_string_pretty(&me)?);
        }
        SessionAction::Refresh => {
            if !client.refresh_session().await {
                return Err(FintrackError::SessionExpired);
            }
            ui::step_ok("Session refreshed");
        }
        SessionAction::Logout => {
            client.logout().await?;
            ui::step_ok("Logged out");
        }
    }

    Ok(())
}
