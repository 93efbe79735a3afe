use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;

use oelo::backend::oelo::OeloBackend;
use oelo::backend::oelo::client::{OeloClient, check_address};
use oelo::config::{self, ControllerConfig};
use oelo::error::ApiResult;
use oelo::model::command::ControllerEndpoint;
use oelo::model::state::StateStore;
use oelo::server;
use oelo::server::appstate::AppState;
use oelo::server::http::{self, HttpServer};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: Utf8PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that a controller answers at the given address, then exit
    Check { address: String },
}

/*
 * Formatter function to output in syslog format. This makes sense when running
 * as a service (where output might go to a log file, or the system journal)
 */
#[allow(clippy::match_same_arms)]
fn syslog_format(
    buf: &mut pretty_env_logger::env_logger::fmt::Formatter,
    record: &log::Record,
) -> std::io::Result<()> {
    writeln!(
        buf,
        "<{}>{}: {}",
        match record.level() {
            log::Level::Error => 3,
            log::Level::Warn => 4,
            log::Level::Info => 6,
            log::Level::Debug => 7,
            log::Level::Trace => 7,
        },
        record.target(),
        record.args()
    )
}

fn init_logging() -> ApiResult<()> {
    /* Try to provide reasonable default filters, when RUST_LOG is not specified */
    const DEFAULT_LOG_FILTERS: &[&str] = &[
        "debug",
        "hyper_util=info",
        "reqwest=info",
        "tower_http::trace::on_request=info",
        "axum::rejection=trace",
    ];

    let log_filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTERS.join(","));

    /* Detect if we need syslog or human-readable formatting */
    if std::env::var("SYSTEMD_EXEC_PID").is_ok_and(|pid| pid == std::process::id().to_string()) {
        Ok(pretty_env_logger::env_logger::builder()
            .format(syslog_format)
            .parse_filters(&log_filters)
            .try_init()?)
    } else {
        Ok(pretty_env_logger::formatted_timed_builder()
            .parse_filters(&log_filters)
            .try_init()?)
    }
}

fn install_signal_handlers(shutdown: &CancellationToken) -> ApiResult<()> {
    fn stop(msg: &str, token: &CancellationToken) {
        log::warn!("{msg}");
        let _ = std::io::stderr().flush();
        token.cancel();
    }

    let token = shutdown.clone();
    tokio::spawn(async move {
        if matches!(signal::ctrl_c().await, Ok(())) {
            stop("Ctrl-C pressed, exiting..", &token);
        }
    });

    let token = shutdown.clone();
    let mut signal = signal::unix::signal(SignalKind::terminate())?;
    tokio::spawn(async move {
        if matches!(signal.recv().await, Some(())) {
            stop("SIGTERM received, exiting..", &token);
        }
    });

    Ok(())
}

async fn check(address: &str) -> ApiResult<()> {
    let timeout = Duration::from_secs(u64::from(ControllerConfig::DEFAULT_TIMEOUT_SECS));
    let endpoint = check_address(address, reqwest::Client::new(), timeout).await?;
    log::info!("Found Oelo controller at {}", endpoint.host());
    Ok(())
}

async fn run() -> ApiResult<()> {
    init_logging()?;

    let args = Args::parse();

    if let Some(Command::Check { address }) = &args.command {
        return check(address).await;
    }

    let config = config::parse(&args.config)?;
    log::debug!("Configuration loaded successfully");

    let endpoint = ControllerEndpoint::parse(&config.controller.address)?;
    let store = StateStore::load(&config.oelo.state_file);
    let http_client = reqwest::Client::builder().build()?;

    let client = OeloClient::new(
        endpoint.clone(),
        http_client.clone(),
        config.controller.timeout(),
    );
    if let Err(err) = client.validate().await {
        log::warn!(
            "[{}] {err}. Zones stay unavailable until it answers.",
            endpoint.host()
        );
    }

    let backend = Arc::new(OeloBackend::new(
        &config.controller,
        endpoint,
        http_client,
        store,
    ));
    backend.poll().await;

    let shutdown = CancellationToken::new();
    install_signal_handlers(&shutdown)?;

    let addr = SocketAddr::from((config.server.listen, config.server.port));
    let appstate = AppState::new(backend.clone());

    let poller = tokio::spawn({
        let backend = backend.clone();
        let token = shutdown.clone();
        async move { backend.run(token).await }
    });

    let server = HttpServer::new(addr);
    let handle = server.handle();
    tokio::spawn({
        let token = shutdown.clone();
        async move {
            token.cancelled().await;
            http::signal_stop(&handle);
        }
    });

    let res = server.run(server::build_service(appstate)).await;

    shutdown.cancel();
    poller.await?;
    backend.shutdown().await?;
    log::info!("State saved, bye");

    res
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        log::error!("Oelo error: {err}");
        log::error!("Fatal error encountered, cannot continue.");
        std::process::exit(1);
    }
}
