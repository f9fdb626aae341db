//! Detects completion of a popup-driven OAuth 2.0 authorization grant.
//!
//! The crate opens a provider page through an injected [`WindowOpener`],
//! polls the window's URL until the provider sends the browser back to the
//! configured redirect address, classifies what came back (provider errors
//! and the anti-CSRF state check included), and reports exactly one outcome
//! per flow through the host's [`FlowEvents`]. A logout flow reuses the same
//! machinery without the validation step.
//!
//! Token exchange is deliberately out of scope: the captured authorization
//! code is handed to the host, which trades it for tokens elsewhere.
//!
//! [`FlowManager`] is the entry point. Hosts embedded in a real browser
//! implement [`WindowOpener`] over their popup API; native processes can use
//! [`loopback::LoopbackOpener`], which stands a local HTTP listener in for
//! the popup.

pub mod config;
pub mod error;
pub mod events;
pub mod loopback;
pub mod manager;
pub mod nonce;
pub mod outcome;
pub mod poller;
pub mod query;
pub mod result;
pub mod window;

pub use config::{ConfigError, FlowConfig, QueryParam, ResponseParams, DEFAULT_POLL_INTERVAL};
pub use error::FlowError;
pub use events::FlowEvents;
pub use loopback::LoopbackOpener;
pub use manager::FlowManager;
pub use nonce::{NonceSource, RandomNonce};
pub use outcome::{classify, LoginOutcome, RedirectFields};
pub use poller::PollOutcome;
pub use query::query_value;
pub use result::AuthResult;
pub use window::{AuthWindow, ProbeError, WindowOpener, WindowRequest};
