//! The popup surface, reduced to what a flow can actually observe.

use thiserror::Error;

/// Failure to read a window's current location.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The window content still belongs to a foreign origin. Expected for as
    /// long as the provider owns the window; never ends a flow.
    #[error("window content belongs to a foreign origin")]
    CrossOrigin,
    /// Anything else went wrong while probing. Retried on the next tick.
    #[error("window probe failed: {0}")]
    Probe(String),
}

/// One open authorization window.
///
/// Implementations wrap whatever the host can observe: a browser popup, an
/// embedded webview, or the loopback listener in [`crate::loopback`].
pub trait AuthWindow: Send + Sync {
    /// The window's current location.
    fn current_url(&self) -> Result<String, ProbeError>;

    /// Whether the window still exists. Once this reports `false` the flow
    /// aborts.
    fn is_open(&self) -> bool;

    /// Ask the window to close. The window may already be gone; failures are
    /// ignored.
    fn close(&self);
}

/// Opens authorization windows on behalf of a flow.
pub trait WindowOpener: Send + Sync {
    /// Open a window for `request`. `None` means the host blocked it, which
    /// the caller reports as a popup-blocked failure.
    fn open(&self, request: &WindowRequest) -> Option<Box<dyn AuthWindow>>;
}

/// What the flow asks the opener to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowRequest {
    pub url: String,
    pub title: String,
    pub width: u32,
    pub height: u32,
}

const WINDOW_WIDTH: u32 = 800;
const WINDOW_HEIGHT: u32 = 800;

impl WindowRequest {
    /// Window for the provider's authorization page.
    pub fn login(url: String) -> Self {
        Self {
            url,
            title: "Login Window".into(),
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
        }
    }

    /// Window for the provider's end-session page.
    pub fn logout(url: String) -> Self {
        Self {
            url,
            title: "Logout Window".into(),
            width: WINDOW_WIDTH,
            height: WINDOW_HEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_carry_titles_and_geometry() {
        let login = WindowRequest::login("https://id.example.com/authorize".into());
        assert_eq!(login.title, "Login Window");
        assert_eq!((login.width, login.height), (800, 800));

        let logout = WindowRequest::logout("https://id.example.com/logout".into());
        assert_eq!(logout.title, "Logout Window");
        assert_eq!(logout.url, "https://id.example.com/logout");
    }
}
