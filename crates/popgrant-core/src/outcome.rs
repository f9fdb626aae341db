//! Classification of a matched redirect into one terminal outcome.

use crate::config::FlowConfig;
use crate::query::query_value;

/// Error code recorded when the state round-trip fails.
pub const CSRF_ERROR_CODE: &str = "CSRF";
/// Description recorded when the state round-trip fails.
pub const CSRF_ERROR_DESCRIPTION: &str = "Returned state does not match passed state: \
     possible attempted Cross Site Request Forgery attack";
/// Error code recorded when the opener produced no usable window.
pub const POPUP_BLOCKED_CODE: &str = "popup_blocked";
/// Error code recorded when the window disappeared before any redirect.
pub const WINDOW_CLOSED_CODE: &str = "window_closed";
/// Error code recorded when the flow deadline elapsed first.
pub const TIMEOUT_CODE: &str = "timeout";

/// Raw values read back off a matched redirect URL.
///
/// Absent parameters read as empty strings; emptiness is what classification
/// keys off, so no field here is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectFields {
    pub error_code: String,
    pub error_description: String,
    pub code: String,
    pub returned_state: String,
    pub expires_in: String,
}

impl RedirectFields {
    /// Pull the configured response parameters out of `url`.
    pub fn extract(url: &str, config: &FlowConfig) -> Self {
        let names = &config.response_params;
        Self {
            error_code: query_value(url, &names.error_code).to_owned(),
            error_description: query_value(url, &names.error_description).to_owned(),
            code: query_value(url, &names.auth_code).to_owned(),
            returned_state: query_value(url, &names.returned_state).to_owned(),
            expires_in: query_value(url, &names.expires_in).to_owned(),
        }
    }

    /// Expiry in seconds. Anything that does not parse as an integer reads
    /// as 0, meaning "provider gave no usable expiry".
    pub fn expires_in_secs(&self) -> u64 {
        self.expires_in.parse().unwrap_or(0)
    }
}

/// Terminal classification of one login flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The provider returned an authorization code and the state round-trip held.
    Success { code: String, expires_in: u64 },
    /// The provider reported an error, or the redirect carried no code.
    ProviderError { code: String, description: String },
    /// The returned state differs from the nonce sent at flow start.
    CsrfMismatch,
    /// The opener produced no usable window.
    PopupBlocked,
    /// The window went away before any redirect was observed.
    WindowClosed,
    /// The configured flow deadline elapsed first.
    TimedOut,
}

impl LoginOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error code recorded for failure variants; empty for success.
    pub fn error_code(&self) -> &str {
        match self {
            Self::Success { .. } => "",
            Self::ProviderError { code, .. } => code,
            Self::CsrfMismatch => CSRF_ERROR_CODE,
            Self::PopupBlocked => POPUP_BLOCKED_CODE,
            Self::WindowClosed => WINDOW_CLOSED_CODE,
            Self::TimedOut => TIMEOUT_CODE,
        }
    }

    /// Error description recorded for failure variants; empty for success.
    pub fn error_description(&self) -> &str {
        match self {
            Self::Success { .. } => "",
            Self::ProviderError { description, .. } => description,
            Self::CsrfMismatch => CSRF_ERROR_DESCRIPTION,
            Self::PopupBlocked => "the authorization window could not be opened",
            Self::WindowClosed => "the authorization window was closed before redirecting",
            Self::TimedOut => "the flow deadline elapsed before the redirect came back",
        }
    }
}

/// Classify redirect fields against the nonce generated at flow start.
///
/// A provider-reported error dominates everything else; an absent code is
/// treated the same way, since the provider then has nothing to hand over.
/// The state is compared only once the provider has disclaimed an error, so
/// a provider error with a mangled state still reports as a provider error.
pub fn classify(fields: RedirectFields, expected_state: &str) -> LoginOutcome {
    if !fields.error_description.is_empty() || !fields.error_code.is_empty() || fields.code.is_empty()
    {
        return LoginOutcome::ProviderError {
            code: fields.error_code,
            description: fields.error_description,
        };
    }
    if fields.returned_state != expected_state {
        return LoginOutcome::CsrfMismatch;
    }
    let expires_in = fields.expires_in_secs();
    LoginOutcome::Success {
        code: fields.code,
        expires_in,
    }
}
