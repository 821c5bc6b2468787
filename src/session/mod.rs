//! Session handling: 401 recovery, single-flight refresh, login redirect

pub mod client;
pub mod navigator;
pub mod refresh;

pub use client::{ClientOptions, SessionClient};
pub use navigator::{LogNavigator, LoginNavigator};
pub use refresh::RefreshCoordinator;
