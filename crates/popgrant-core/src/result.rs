use serde::{Deserialize, Serialize};

use crate::outcome::LoginOutcome;

/// Snapshot of the most recently completed flow.
///
/// One record per manager. It is replaced wholesale immediately before each
/// outcome notification fires, so a host reading it from inside a callback
/// always sees the fields of that callback's flow together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResult {
    pub logged_in: bool,
    pub auth_code: String,
    pub expires_in: u64,
    pub error_code: String,
    pub error_description: String,
    /// Full URL the window was last observed at, response parameters
    /// included. Empty when the flow never reached a redirect.
    pub redirected_to: String,
}

impl AuthResult {
    /// The record written for a finished login flow.
    pub(crate) fn from_login(outcome: &LoginOutcome, redirected_to: String) -> Self {
        match outcome {
            LoginOutcome::Success { code, expires_in } => Self {
                logged_in: true,
                auth_code: code.clone(),
                expires_in: *expires_in,
                error_code: String::new(),
                error_description: String::new(),
                redirected_to,
            },
            failure => Self {
                logged_in: false,
                auth_code: String::new(),
                expires_in: 0,
                error_code: failure.error_code().to_owned(),
                error_description: failure.error_description().to_owned(),
                redirected_to,
            },
        }
    }

    /// The record written when a logout flow reaches the redirect. Only the
    /// fields the logout path owns change; error fields carry over from
    /// `prev` untouched.
    pub(crate) fn from_logout(prev: &AuthResult, redirected_to: String) -> Self {
        Self {
            logged_in: false,
            auth_code: String::new(),
            redirected_to,
            ..prev.clone()
        }
    }
}
