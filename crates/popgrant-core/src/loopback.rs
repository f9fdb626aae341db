//! Loopback-listener deployment of the window contract.
//!
//! When the flow runs as a native process there is no popup to probe, so the
//! redirect URI points at a local HTTP listener instead and "reading the
//! window's URL" means checking whether the listener has captured the
//! redirect yet. Until it has, probes report cross-origin, exactly like a
//! popup still sitting on the provider's pages.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::window::{AuthWindow, ProbeError, WindowOpener, WindowRequest};

const LANDING_HTML: &str = r#"<html><body><h1>Authorization flow complete</h1><p>You may close this window and return to the application.</p></body></html>"#;
const NOT_FOUND_HTML: &str = r#"<html><body><h1>Not found</h1></body></html>"#;

/// Opens "windows" backed by a local HTTP listener plus the system browser.
///
/// The listener is bound eagerly so the redirect address is known before any
/// flow starts; later flows rebind the same address.
pub struct LoopbackOpener {
    addr: SocketAddr,
    path: String,
    initial: Mutex<Option<std::net::TcpListener>>,
    launch_browser: bool,
}

impl LoopbackOpener {
    /// Bind `host:port` (port 0 picks a free port) with the default
    /// `/callback` path.
    pub fn bind(host: &str, port: u16) -> io::Result<Self> {
        Self::bind_with_path(host, port, "/callback")
    }

    pub fn bind_with_path(host: &str, port: u16, path: &str) -> io::Result<Self> {
        let listener = std::net::TcpListener::bind((host, port))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        Ok(Self {
            addr,
            path: path.to_owned(),
            initial: Mutex::new(Some(listener)),
            launch_browser: true,
        })
    }

    /// Skip launching the system browser on open. Callers then show the
    /// request URL to the user themselves.
    pub fn without_browser_launch(mut self) -> Self {
        self.launch_browser = false;
        self
    }

    /// The redirect address flows against this opener must be configured with.
    pub fn redirect_uri(&self) -> String {
        format!("http://{}{}", self.addr, self.path)
    }

    fn take_listener(&self) -> io::Result<std::net::TcpListener> {
        if let Some(listener) = self.initial.lock().take() {
            return Ok(listener);
        }
        let listener = std::net::TcpListener::bind(self.addr)?;
        listener.set_nonblocking(true)?;
        Ok(listener)
    }
}

impl WindowOpener for LoopbackOpener {
    fn open(&self, request: &WindowRequest) -> Option<Box<dyn AuthWindow>> {
        let listener = match self.take_listener() {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, addr = %self.addr, "failed to bind loopback listener");
                return None;
            }
        };
        let listener = match TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(err) => {
                warn!(error = %err, "failed to register loopback listener");
                return None;
            }
        };

        let window = LoopbackWindow::new();
        let shared = window.shared.clone();
        let base = format!("http://{}", self.addr);
        let path = self.path.clone();
        tokio::spawn(shared.accept_redirect(listener, base, path));

        if self.launch_browser {
            if let Err(err) = open::that(&request.url) {
                warn!(error = %err, "failed to launch system browser");
                window.close();
                return None;
            }
        }
        Some(Box::new(window))
    }
}

/// One in-flight loopback "window".
pub struct LoopbackWindow {
    shared: Shared,
}

impl LoopbackWindow {
    fn new() -> Self {
        Self {
            shared: Shared {
                captured: Arc::new(Mutex::new(None)),
                closed: Arc::new(AtomicBool::new(false)),
                shutdown: Arc::new(Notify::new()),
            },
        }
    }
}

impl AuthWindow for LoopbackWindow {
    fn current_url(&self) -> Result<String, ProbeError> {
        match self.shared.captured.lock().clone() {
            Some(url) => Ok(url),
            // The redirect has not come back yet.
            None => Err(ProbeError::CrossOrigin),
        }
    }

    fn is_open(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shared.shutdown.notify_one();
    }
}

#[derive(Clone)]
struct Shared {
    captured: Arc<Mutex<Option<String>>>,
    closed: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Shared {
    /// Serve the listener until the redirect path is hit or the window is
    /// closed. Requests for other paths (favicons and friends) are answered
    /// with a 404 and listening continues.
    async fn accept_redirect(self, listener: TcpListener, base: String, path: String) {
        loop {
            let (stream, _addr) = tokio::select! {
                _ = self.shutdown.notified() => return,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = %err, "loopback accept failed");
                        self.closed.store(true, Ordering::SeqCst);
                        return;
                    }
                },
            };
            match handle_connection(stream, &base, &path).await {
                Ok(Some(url)) => {
                    debug!(%url, "captured redirect");
                    *self.captured.lock() = Some(url);
                    return;
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, "loopback connection error; still listening");
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    base: &str,
    path: &str,
) -> io::Result<Option<String>> {
    let mut buffer = [0u8; 4096];
    let n = stream.read(&mut buffer).await?;
    let request = String::from_utf8_lossy(&buffer[..n]);
    let Some(request_path) = parse_request_path(&request) else {
        respond(&mut stream, 400, NOT_FOUND_HTML).await?;
        return Ok(None);
    };
    if !request_path.starts_with(path) {
        respond(&mut stream, 404, NOT_FOUND_HTML).await?;
        return Ok(None);
    }
    respond(&mut stream, 200, LANDING_HTML).await?;
    let _ = stream.shutdown().await;
    Ok(Some(format!("{base}{request_path}")))
}

fn parse_request_path(request: &str) -> Option<&str> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let _method = parts.next()?;
    parts.next()
}

async fn respond(stream: &mut TcpStream, status: u16, body: &str) -> io::Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        404 => "HTTP/1.1 404 Not Found",
        _ => "HTTP/1.1 400 Bad Request",
    };
    let response = format!(
        "{status_line}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpStream;
    use tokio::sync::mpsc;
    use tokio::time::sleep;
    use url::Url;

    use super::*;
    use crate::config::FlowConfig;
    use crate::events::FlowEvents;
    use crate::manager::FlowManager;
    use crate::nonce::NonceSource;

    async fn get(addr: &str, target: &str) -> String {
        let url = Url::parse(addr).unwrap();
        let mut stream = TcpStream::connect((url.host_str().unwrap(), url.port().unwrap()))
            .await
            .unwrap();
        let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = Vec::new();
        let _ = stream.read_to_end(&mut response).await;
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn wait_for_capture(window: &dyn AuthWindow) -> String {
        for _ in 0..200 {
            if let Ok(url) = window.current_url() {
                return url;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("redirect was not captured in time");
    }

    #[tokio::test]
    async fn captures_the_redirect_and_serves_a_landing_page() {
        let opener = LoopbackOpener::bind("127.0.0.1", 0)
            .unwrap()
            .without_browser_launch();
        let redirect = opener.redirect_uri();
        let window = opener
            .open(&WindowRequest::login("https://id.example.com/authorize".into()))
            .unwrap();

        assert!(matches!(window.current_url(), Err(ProbeError::CrossOrigin)));

        let response = get(&redirect, "/callback?code=test-code&state=n1").await;
        assert!(response.contains("200 OK"));
        assert!(response.contains("Authorization flow complete"));

        let url = wait_for_capture(window.as_ref()).await;
        assert_eq!(url, format!("{redirect}?code=test-code&state=n1"));
        assert!(window.is_open());
    }

    #[tokio::test]
    async fn unrelated_paths_get_404_and_listening_continues() {
        let opener = LoopbackOpener::bind("127.0.0.1", 0)
            .unwrap()
            .without_browser_launch();
        let redirect = opener.redirect_uri();
        let window = opener
            .open(&WindowRequest::login("https://id.example.com/authorize".into()))
            .unwrap();

        let response = get(&redirect, "/favicon.ico").await;
        assert!(response.contains("404 Not Found"));
        assert!(matches!(window.current_url(), Err(ProbeError::CrossOrigin)));

        let response = get(&redirect, "/callback?code=x").await;
        assert!(response.contains("200 OK"));
        let url = wait_for_capture(window.as_ref()).await;
        assert_eq!(url, format!("{redirect}?code=x"));
    }

    #[tokio::test]
    async fn close_marks_the_window_gone() {
        let opener = LoopbackOpener::bind("127.0.0.1", 0)
            .unwrap()
            .without_browser_launch();
        let window = opener
            .open(&WindowRequest::login("https://id.example.com/authorize".into()))
            .unwrap();

        assert!(window.is_open());
        window.close();
        assert!(!window.is_open());
    }

    struct ChannelEvents(mpsc::UnboundedSender<&'static str>);

    impl FlowEvents for ChannelEvents {
        fn login_succeeded(&self) {
            let _ = self.0.send("succeeded");
        }

        fn login_failed(&self) {
            let _ = self.0.send("failed");
        }

        fn logout_done(&self) {
            let _ = self.0.send("logout");
        }
    }

    struct FixedNonce(&'static str);

    impl NonceSource for FixedNonce {
        fn next_nonce(&self) -> String {
            self.0.to_owned()
        }
    }

    #[tokio::test]
    async fn full_login_flow_over_the_loopback_listener() {
        let opener = LoopbackOpener::bind("127.0.0.1", 0)
            .unwrap()
            .without_browser_launch();
        let redirect = opener.redirect_uri();
        let config = FlowConfig::new(
            "https://id.example.com/authorize",
            "https://id.example.com/logout",
            "client-1",
            &redirect,
        )
        .with_poll_interval(Duration::from_millis(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = FlowManager::new(config, opener, ChannelEvents(tx))
            .unwrap()
            .with_nonce_source(FixedNonce("n1"));

        manager.login().unwrap();
        let response = get(&redirect, "/callback?code=test-code&state=n1").await;
        assert!(response.contains("200 OK"));

        assert_eq!(rx.recv().await, Some("succeeded"));
        let result = manager.result();
        assert!(result.logged_in);
        assert_eq!(result.auth_code, "test-code");
        assert_eq!(result.redirected_to, format!("{redirect}?code=test-code&state=n1"));
    }

    #[tokio::test]
    async fn state_mismatch_over_the_loopback_listener_fails() {
        let opener = LoopbackOpener::bind("127.0.0.1", 0)
            .unwrap()
            .without_browser_launch();
        let redirect = opener.redirect_uri();
        let config = FlowConfig::new(
            "https://id.example.com/authorize",
            "https://id.example.com/logout",
            "client-1",
            &redirect,
        )
        .with_poll_interval(Duration::from_millis(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        let manager = FlowManager::new(config, opener, ChannelEvents(tx))
            .unwrap()
            .with_nonce_source(FixedNonce("n1"));

        manager.login().unwrap();
        let _ = get(&redirect, "/callback?code=test-code&state=wrong").await;

        assert_eq!(rx.recv().await, Some("failed"));
        let result = manager.result();
        assert!(!result.logged_in);
        assert_eq!(result.error_code, "CSRF");
    }
}
