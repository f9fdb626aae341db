use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use popgrant_core::loopback::LoopbackOpener;
use popgrant_core::{
    AuthWindow, FlowConfig, FlowEvents, FlowManager, WindowOpener, WindowRequest,
};
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Drive popup-style OAuth 2.0 login and logout flows from the terminal,
/// with a local loopback listener standing in for the popup.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[command(flatten)]
    flow: FlowArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a login flow and wait for its outcome.
    Login,
    /// Start a logout flow and wait for the redirect.
    Logout,
}

#[derive(Args)]
struct FlowArgs {
    /// Provider authorization endpoint.
    #[arg(long)]
    authorize_url: String,
    /// Provider logout endpoint. Defaults to the authorization endpoint,
    /// which only matters to the logout command.
    #[arg(long)]
    logout_url: Option<String>,
    /// OAuth client identifier.
    #[arg(long)]
    client_id: String,
    /// Response type value sent to the provider.
    #[arg(long, default_value = "code")]
    response_type: String,
    /// Extra query parameter as NAME=VALUE; repeatable, order preserved.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,
    /// Delay between redirect checks, in milliseconds.
    #[arg(long, default_value_t = 500)]
    poll_interval_ms: u64,
    /// Give up after this many seconds; 0 waits indefinitely.
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,
    /// Interface the redirect listener binds.
    #[arg(long, default_value = "127.0.0.1")]
    listen_host: String,
    /// Port the redirect listener binds; 0 picks a free port.
    #[arg(long, default_value_t = 0)]
    listen_port: u16,
    /// Do not launch the system browser; just print the URL to open.
    #[arg(long)]
    no_browser: bool,
}

enum FlowSignal {
    Succeeded,
    Failed,
    LoggedOut,
}

struct ChannelEvents(mpsc::UnboundedSender<FlowSignal>);

impl FlowEvents for ChannelEvents {
    fn login_succeeded(&self) {
        let _ = self.0.send(FlowSignal::Succeeded);
    }

    fn login_failed(&self) {
        let _ = self.0.send(FlowSignal::Failed);
    }

    fn logout_done(&self) {
        let _ = self.0.send(FlowSignal::LoggedOut);
    }
}

/// Prints the request URL before delegating, so the user can open it by hand
/// when the browser launch is disabled or never surfaces.
struct AnnouncingOpener(LoopbackOpener);

impl WindowOpener for AnnouncingOpener {
    fn open(&self, request: &WindowRequest) -> Option<Box<dyn AuthWindow>> {
        println!("Open this URL to continue:\n  {}\n", request.url);
        self.0.open(request)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "popgrant_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(Cli::parse()).await {
        Ok(completed) => {
            if completed {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("{err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<bool> {
    let args = cli.flow;
    let mut opener = LoopbackOpener::bind(&args.listen_host, args.listen_port)
        .context("failed to bind the loopback redirect listener")?;
    if args.no_browser {
        opener = opener.without_browser_launch();
    }
    let redirect_uri = opener.redirect_uri();
    tracing::info!(%redirect_uri, "loopback redirect listener ready");

    let logout_url = args
        .logout_url
        .clone()
        .unwrap_or_else(|| args.authorize_url.clone());
    let mut config = FlowConfig::new(
        &args.authorize_url,
        &logout_url,
        &args.client_id,
        &redirect_uri,
    )
    .with_response_type(&args.response_type)
    .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    if args.timeout_secs > 0 {
        config = config.with_flow_deadline(Duration::from_secs(args.timeout_secs));
    }
    for param in &args.params {
        let (name, value) = param
            .split_once('=')
            .with_context(|| format!("--param {param:?} is not NAME=VALUE"))?;
        config = config.with_extra_param(name, value);
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = FlowManager::new(config, AnnouncingOpener(opener), ChannelEvents(tx))?;

    match cli.command {
        Commands::Login => manager.login().context("could not start the login flow")?,
        Commands::Logout => manager.logout().context("could not start the logout flow")?,
    }

    let signal = rx.recv().await.context("flow ended without an outcome")?;
    println!("{}", serde_json::to_string_pretty(&manager.result())?);

    Ok(!matches!(signal, FlowSignal::Failed))
}
