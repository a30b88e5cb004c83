//! NEFOL backend server.
//!
//! One process serves both the storefront checkout and the admin panel
//! API (port 2000 by default). Schema migrations are applied separately
//! with `nefol-cli migrate`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::borrow::Cow;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use secrecy::ExposeSecret;
use sentry::integrations::tracing::{self as sentry_tracing, EventFilter};
use tracing::Level;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use nefol_backend::config::{BackendConfig, TlsConfig};
use nefol_backend::{db, routes, state::AppState};

/// How long in-flight requests get to finish after SIGTERM.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("rustls crypto provider already installed");

    let config = BackendConfig::from_env().expect("invalid configuration");

    // Sentry has to exist before the tracing layer that forwards to it.
    let _sentry = init_sentry(&config);
    init_tracing();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("cannot connect to PostgreSQL");

    let addr = config.socket_addr();
    let tls = config.tls.clone();

    let app = routes::app(AppState::new(config, pool))
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    match tls {
        Some(tls) => serve_tls(app, addr, &tls).await,
        None => serve_plain(app, addr).await,
    }
}

fn init_sentry(config: &BackendConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_deref()?;

    let options = sentry::ClientOptions {
        release: sentry::release_name!(),
        environment: config.sentry_environment.clone().map(Cow::Owned),
        sample_rate: config.sentry_sample_rate,
        traces_sample_rate: config.sentry_traces_sample_rate,
        attach_stacktrace: true,
        // Orders carry customer names and addresses
        send_default_pii: false,
        ..Default::default()
    };

    Some(sentry::init((dsn, options)))
}

/// `RUST_LOG` filtering, JSON output when `LOG_FORMAT=json`, and warnings
/// forwarded to Sentry as events.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("nefol_backend=info,tower_http=info"));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().flatten_event(true)))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .with(sentry_tracing::layer().event_filter(|meta| match *meta.level() {
            Level::ERROR | Level::WARN => EventFilter::Event,
            Level::INFO | Level::DEBUG => EventFilter::Breadcrumb,
            Level::TRACE => EventFilter::Ignore,
        }))
        .init();
}

async fn serve_plain(app: Router, addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("cannot bind listen address");
    tracing::info!(%addr, "NEFOL backend listening (http)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn serve_tls(app: Router, addr: SocketAddr, tls: &TlsConfig) {
    let rustls = RustlsConfig::from_pem(
        tls.cert_pem.as_bytes().to_vec(),
        tls.key_pem.expose_secret().as_bytes().to_vec(),
    )
    .await
    .expect("invalid TLS certificate or key");
    tracing::info!(%addr, "NEFOL backend listening (https)");

    let handle = Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal().await;
            handle.graceful_shutdown(Some(DRAIN_TIMEOUT));
        }
    });

    axum_server::bind_rustls(addr, rustls)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .expect("server error");
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }

    tracing::info!("Shutting down");
}
