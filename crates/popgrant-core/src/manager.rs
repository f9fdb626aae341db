use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, FlowConfig};
use crate::error::FlowError;
use crate::events::FlowEvents;
use crate::nonce::{NonceSource, RandomNonce};
use crate::outcome::{classify, LoginOutcome, RedirectFields};
use crate::poller::{self, PollOutcome};
use crate::result::AuthResult;
use crate::window::{AuthWindow, WindowOpener, WindowRequest};

/// Drives popup login and logout flows for one provider configuration.
///
/// `login` and `logout` are fire-and-forget: they return once the window is
/// open and the watcher is running, and the outcome arrives later through the
/// injected [`FlowEvents`]. One flow at a time; a second call while one is
/// pending is rejected rather than left to race the first.
///
/// Both entry points must be called from within a Tokio runtime.
pub struct FlowManager {
    config: FlowConfig,
    opener: Arc<dyn WindowOpener>,
    nonces: Arc<dyn NonceSource>,
    events: Arc<dyn FlowEvents>,
    result: Arc<Mutex<AuthResult>>,
    in_flight: Arc<AtomicBool>,
}

impl FlowManager {
    /// Validate `config` and build a manager around the injected
    /// collaborators. Nonces default to [`RandomNonce`].
    pub fn new(
        config: FlowConfig,
        opener: impl WindowOpener + 'static,
        events: impl FlowEvents + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            opener: Arc::new(opener),
            nonces: Arc::new(RandomNonce::default()),
            events: Arc::new(events),
            result: Arc::new(Mutex::new(AuthResult::default())),
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Replace the default random nonce source.
    pub fn with_nonce_source(mut self, source: impl NonceSource + 'static) -> Self {
        self.nonces = Arc::new(source);
        self
    }

    /// Snapshot of the record written by the most recently completed flow.
    pub fn result(&self) -> AuthResult {
        self.result.lock().clone()
    }

    /// Start a login flow: open the authorization window and watch it until
    /// it returns to the redirect URI.
    ///
    /// Returns as soon as the watcher is running. [`FlowError::PopupBlocked`]
    /// is also dispatched as a failed-login notification, so hosts driven
    /// purely by notifications see it either way.
    pub fn login(&self) -> Result<(), FlowError> {
        self.begin_flow()?;
        let nonce = self.nonces.next_nonce();
        let url = self.config.authorization_url(&nonce);
        debug!(%url, "built authorization request");
        let task = self.flow_task();
        let Some(window) = self.opener.open(&WindowRequest::login(url)) else {
            warn!("authorization window blocked");
            task.dispatch_login(&LoginOutcome::PopupBlocked, String::new());
            return Err(FlowError::PopupBlocked);
        };
        info!(interval = ?self.config.poll_interval, "login flow started");
        tokio::spawn(task.run_login(window, nonce));
        Ok(())
    }

    /// Start a logout flow: open the provider's end-session page and watch it
    /// until it returns to the redirect URI.
    ///
    /// A blocked window only returns an error here; the logout notification
    /// fires solely when the redirect actually comes back.
    pub fn logout(&self) -> Result<(), FlowError> {
        self.begin_flow()?;
        let url = self.config.logout_url();
        debug!(%url, "built logout request");
        let task = self.flow_task();
        let Some(window) = self.opener.open(&WindowRequest::logout(url)) else {
            warn!("logout window blocked");
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(FlowError::PopupBlocked);
        };
        info!(interval = ?self.config.poll_interval, "logout flow started");
        tokio::spawn(task.run_logout(window));
        Ok(())
    }

    fn begin_flow(&self) -> Result<(), FlowError> {
        let already_running = self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err();
        if already_running {
            warn!("rejected flow start while another flow is pending");
            return Err(FlowError::FlowInProgress);
        }
        Ok(())
    }

    fn flow_task(&self) -> FlowTask {
        FlowTask {
            config: self.config.clone(),
            events: Arc::clone(&self.events),
            result: Arc::clone(&self.result),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

/// Everything one spawned flow needs, detached from the manager's lifetime.
struct FlowTask {
    config: FlowConfig,
    events: Arc<dyn FlowEvents>,
    result: Arc<Mutex<AuthResult>>,
    in_flight: Arc<AtomicBool>,
}

impl FlowTask {
    async fn run_login(self, window: Box<dyn AuthWindow>, nonce: String) {
        let poll = poller::watch(
            window.as_ref(),
            &self.config.redirect_uri,
            self.config.poll_interval,
            self.config.flow_deadline,
        )
        .await;
        match poll {
            PollOutcome::Matched(url) => {
                let fields = RedirectFields::extract(&url, &self.config);
                window.close();
                let outcome = classify(fields, &nonce);
                self.dispatch_login(&outcome, url);
            }
            PollOutcome::Aborted => {
                self.dispatch_login(&LoginOutcome::WindowClosed, String::new());
            }
            PollOutcome::TimedOut => {
                window.close();
                self.dispatch_login(&LoginOutcome::TimedOut, String::new());
            }
        }
    }

    async fn run_logout(self, window: Box<dyn AuthWindow>) {
        let poll = poller::watch(
            window.as_ref(),
            &self.config.redirect_uri,
            self.config.poll_interval,
            self.config.flow_deadline,
        )
        .await;
        match poll {
            PollOutcome::Matched(url) => {
                window.close();
                self.dispatch_logout(url);
            }
            PollOutcome::Aborted => {
                warn!("logout window closed before redirecting; no notification sent");
                self.in_flight.store(false, Ordering::SeqCst);
            }
            PollOutcome::TimedOut => {
                warn!("logout deadline elapsed; no notification sent");
                window.close();
                self.in_flight.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Write the result record, release the flow slot, then notify. The slot
    /// is released first so a host may start the next flow from inside the
    /// callback.
    fn dispatch_login(&self, outcome: &LoginOutcome, redirected_to: String) {
        *self.result.lock() = AuthResult::from_login(outcome, redirected_to);
        self.in_flight.store(false, Ordering::SeqCst);
        if outcome.is_success() {
            info!("login flow succeeded");
            self.events.login_succeeded();
        } else {
            warn!(code = outcome.error_code(), "login flow failed");
            self.events.login_failed();
        }
    }

    fn dispatch_logout(&self, redirected_to: String) {
        {
            let mut guard = self.result.lock();
            let next = AuthResult::from_logout(&guard, redirected_to);
            *guard = next;
        }
        self.in_flight.store(false, Ordering::SeqCst);
        info!("logout flow completed");
        self.events.logout_done();
    }
}
