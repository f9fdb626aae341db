//! URL polling: the only mechanism for noticing that the provider sent the
//! browser back to our own origin.
//!
//! Until then every probe of the window fails cross-origin, so probe errors
//! are part of normal operation here, not failures.

use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};

use crate::window::{AuthWindow, ProbeError};

/// How one watched window ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The window reached a URL containing the redirect prefix. Carries the
    /// full URL, response parameters included.
    Matched(String),
    /// The window disappeared before any redirect was observed.
    Aborted,
    /// The deadline elapsed first.
    TimedOut,
}

/// Probe `window` every `interval` until its URL contains `redirect_prefix`,
/// the window goes away, or `deadline` (when set) elapses.
///
/// Returning is what stops the clock, so the caller's match handling can
/// never overlap another tick and a match is observed at most once.
pub async fn watch(
    window: &dyn AuthWindow,
    redirect_prefix: &str,
    interval: Duration,
    deadline: Option<Duration>,
) -> PollOutcome {
    match deadline {
        Some(limit) => time::timeout(limit, poll(window, redirect_prefix, interval))
            .await
            .unwrap_or(PollOutcome::TimedOut),
        None => poll(window, redirect_prefix, interval).await,
    }
}

async fn poll(window: &dyn AuthWindow, redirect_prefix: &str, interval: Duration) -> PollOutcome {
    loop {
        time::sleep(interval).await;
        if !window.is_open() {
            warn!("authorization window closed before redirecting");
            return PollOutcome::Aborted;
        }
        match window.current_url() {
            Ok(url) if url.contains(redirect_prefix) => {
                debug!(%url, "redirect detected");
                return PollOutcome::Matched(url);
            }
            Ok(_) => {} // same-origin page that is not the redirect target yet
            Err(ProbeError::CrossOrigin) => {} // provider still owns the window
            Err(ProbeError::Probe(err)) => {
                debug!(error = %err, "window probe failed; retrying");
            }
        }
    }
}
