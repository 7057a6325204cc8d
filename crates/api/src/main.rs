use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use marquee_api::config::Config;
use marquee_api::mail::{spawn_dispatcher, LogMailer, MAIL_QUEUE_CAPACITY};
use marquee_api::router;
use marquee_api::state::AppState;
use marquee_limiter::RateLimiter;
use marquee_store::{open_pool, Stores};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(true),
        )
        .with(LevelFilter::from_level(config.log_level))
        .init();

    let pool = open_pool(&config.db).await?;
    let stores = Stores::new(pool);

    let limiter = Arc::new(RateLimiter::new(config.limiter()));
    let _eviction = marquee_limiter::spawn_eviction(Arc::clone(&limiter));

    let (mailer, _mail_drain) = spawn_dispatcher(Arc::new(LogMailer), MAIL_QUEUE_CAPACITY);

    let state = AppState {
        env: config.env.clone(),
        stores,
        limiter,
        mailer,
    };

    let app = router::build(state);

    let listener = TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, env = %config.env, "server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("server stopped");
    Ok(())
}

/// Resolves once SIGINT or SIGTERM arrives, letting axum finish
/// in-flight requests before the process exits.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!(signal = "interrupt", "shutting down server"),
        () = terminate => info!(signal = "terminate", "shutting down server"),
    }
}
