//! Login redirect hook
//!
//! Invoked once per failed session refresh, outside the error path of the
//! request that triggered it.

use tracing::warn;

/// Receives the "go to the login page" side effect
pub trait LoginNavigator: Send + Sync {
    fn redirect_to_login(&self, login_url: &str);
}

impl<F> LoginNavigator for F
where
    F: Fn(&str) + Send + Sync,
{
    fn redirect_to_login(&self, login_url: &str) {
        self(login_url)
    }
}

/// Navigator for headless use: reports the redirect through tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl LoginNavigator for LogNavigator {
    fn redirect_to_login(&self, login_url: &str) {
        warn!("Session expired, sign in again at {}", login_url);
    }
}
