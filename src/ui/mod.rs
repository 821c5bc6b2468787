//! Console output helpers shared by the CLI commands
//!
//! Colors come from `console` and switch off automatically when stdout is
//! not a terminal.

mod output;

pub use output::{key_value, key_value_status, note, step_info, step_ok, step_ok_detail, step_warn_hint};
