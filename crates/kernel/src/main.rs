//! Tally Kernel
//!
//! HTTP server and token tooling.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::http::{HeaderName, HeaderValue, Method, header};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use tally_kernel::middleware::rate_limit::REMAINING_HEADER;
use tally_kernel::services::Role;
use tally_kernel::{AppState, Config, routes};

#[derive(Parser)]
#[command(name = "tally", version, about = "Expense tracking API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default).
    Serve,

    /// Issue a bearer token signed with JWT_SECRET and print it.
    IssueToken {
        /// User id to place in the token subject.
        #[arg(long)]
        subject: u64,

        /// USER or ADMIN.
        #[arg(long, default_value = "USER")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_tracing();

    let config = Config::from_env().context("failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::IssueToken { subject, role } => issue_token(&config, subject, role),
    }
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting Tally kernel");
    info!(port = config.port, "Configuration loaded");

    let state = AppState::new(&config).context("failed to initialize application state")?;
    let shutdown = CancellationToken::new();

    let eviction = config.eviction_threshold().map(|max_idle| {
        info!(max_idle_secs = max_idle.as_secs(), "Idle bucket eviction enabled");
        tokio::spawn(
            state
                .clone()
                .run_bucket_eviction(max_idle, shutdown.child_token()),
        )
    });

    // Middleware layers (last added = first executed in request flow):
    // TraceLayer → CORS → metrics → rate limit → bearer auth → routes
    let app = routes::app(state)
        .layer(build_cors_layer(&config))
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(wait_for_signal(shutdown.clone()))
    .await
    .context("server error")?;

    shutdown.cancel();
    if let Some(task) = eviction {
        task.await.context("eviction task panicked")?;
    }

    info!("Server stopped");
    Ok(())
}

fn issue_token(config: &Config, subject: u64, role: Role) -> Result<()> {
    let state = AppState::new(config).context("failed to initialize application state")?;
    let token = state.authenticator().issue(subject, role)?;
    println!("{token}");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM, or when `shutdown` is cancelled elsewhere.
async fn wait_for_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
        _ = shutdown.cancelled() => {}
    }

    info!("Shutting down, draining in-flight requests");
    shutdown.cancel();
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let allow_headers = [header::AUTHORIZATION, header::CONTENT_TYPE];
    let expose_headers = [
        header::RETRY_AFTER,
        HeaderName::from_static(REMAINING_HEADER),
    ];

    let layer = CorsLayer::new()
        .allow_methods(methods)
        .allow_headers(allow_headers)
        .expose_headers(expose_headers);

    if config.cors_allowed_origins.len() == 1 && config.cors_allowed_origins[0] == "*" {
        layer.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "ignoring unparseable CORS origin");
                    None
                }
            })
            .collect();

        layer.allow_origin(origins)
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
