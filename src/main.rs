use axum::{extract::Request, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shop_backend::{
    config::Config,
    error::install_panic_hook,
    services::{
        email::SmtpNotifier,
        notifications::{LogNotifier, Notifier},
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(&config.app.rust_log))
        .with(tracing_subscriber::fmt::layer())
        .init();
    install_panic_hook();

    info!("Starting shop backend");

    if !config.admin.is_configured() {
        warn!("ADMIN_PIN is not set, admin login will always fail");
    }

    let notifier: Arc<dyn Notifier> = match &config.notifications.smtp {
        Some(smtp) => {
            info!("Sending order confirmations through {}:{}", smtp.host, smtp.port);
            Arc::new(SmtpNotifier::new(smtp)?)
        }
        None => {
            info!("SMTP is not configured, order confirmations will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let app_state = AppState::new(config.clone(), notifier).await?;
    info!("Store ready at {}", app_state.db.path().display());
    info!(
        "Proxying {} to {}",
        config.checkout.prefix, config.checkout.upstream_url
    );

    let app = shop_backend::app(app_state);

    let addr = SocketAddr::new(config.app.host, config.app.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server running on port {}", config.app.port);

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
