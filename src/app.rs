use crate::config::Config;
use crate::data::PgMatchStore;
use crate::data::store::MatchStore;
use crate::services::Matchmaker;
use crate::services::notify::{Notifier, TableNotifier, WebhookNotifier};
use crate::state::AppState;
use crate::utils::fmt_duration;
use crate::web::create_router;
use anyhow::Context;
use figment::{Figment, providers::Env};
use sqlx::ConnectOptions;
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Main application struct containing all necessary components
pub struct App {
    config: Config,
    app_state: AppState,
}

/// Load configuration from the process environment.
pub fn load_config() -> Result<Config, anyhow::Error> {
    Figment::new()
        .merge(Env::raw())
        .extract()
        .context("Failed to load config")
}

impl App {
    /// Create a new App instance with all necessary components initialized
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        let slow_threshold = Duration::from_millis(500);

        let connect_options = sqlx::postgres::PgConnectOptions::from_str(&config.database_url)
            .context("Failed to parse database URL")?
            .log_statements(tracing::log::LevelFilter::Debug)
            .log_slow_statements(tracing::log::LevelFilter::Warn, Duration::from_secs(1));

        let db_pool = PgPoolOptions::new()
            .min_connections(0)
            .max_connections(8)
            .acquire_slow_threshold(slow_threshold)
            .acquire_timeout(Duration::from_secs(4))
            .idle_timeout(Duration::from_secs(60 * 2))
            .max_lifetime(Duration::from_secs(60 * 30))
            .connect_with(connect_options)
            .await
            .context("Failed to create database pool")?;

        info!(
            max_connections = 8,
            acquire_timeout = "4s",
            acquire_slow_threshold = fmt_duration(slow_threshold),
            "database pool established"
        );

        info!("Running database migrations...");
        sqlx::migrate!("./migrations")
            .run(&db_pool)
            .await
            .context("Failed to run database migrations")?;
        info!("Database migrations completed successfully");

        let store: Arc<dyn MatchStore> = Arc::new(PgMatchStore::new(db_pool));
        let notifier: Arc<dyn Notifier> = match &config.notify_webhook_url {
            Some(url) => {
                info!(host = url.host_str().unwrap_or("?"), "Notifications go to webhook");
                Arc::new(
                    WebhookNotifier::new(url.clone())
                        .context("Failed to create webhook notifier")?,
                )
            }
            None => Arc::new(TableNotifier::new(store.clone())),
        };

        let matchmaker = Matchmaker::new(store, notifier)
            .with_generation_notices(config.notify_on_generation);
        let app_state = AppState::new(matchmaker, CancellationToken::new());

        Ok(App { config, app_state })
    }

    /// Serve the API until a shutdown signal arrives, then drain in-flight
    /// requests for at most `SHUTDOWN_TIMEOUT`.
    pub async fn run(self) -> ExitCode {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(error = ?e, port = self.config.port, "Failed to bind web server");
                return ExitCode::FAILURE;
            }
        };
        info!(port = self.config.port, "web server listening");

        let shutdown = self.app_state.shutdown.clone();
        let router = create_router(self.app_state);
        let drain = shutdown.clone();
        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { drain.cancelled().await })
                .await
        });

        tokio::select! {
            result = &mut server => {
                error!(result = ?result, "Web server exited unexpectedly");
                return ExitCode::FAILURE;
            }
            _ = shutdown_signal() => {}
        }

        let timeout = self.config.shutdown_timeout;
        info!(timeout = fmt_duration(timeout), "Shutdown signal received, draining requests");
        shutdown.cancel();
        let start = Instant::now();

        match tokio::time::timeout(timeout, server).await {
            Ok(Ok(Ok(()))) => {
                info!(
                    duration = fmt_duration(start.elapsed()),
                    "Graceful shutdown complete"
                );
                ExitCode::SUCCESS
            }
            Ok(Ok(Err(e))) => {
                error!(error = ?e, "Web server failed during shutdown");
                ExitCode::FAILURE
            }
            Ok(Err(e)) => {
                error!(error = ?e, "Web server task panicked");
                ExitCode::FAILURE
            }
            Err(_) => {
                warn!(
                    timeout = fmt_duration(timeout),
                    "Graceful shutdown timed out, exiting"
                );
                ExitCode::FAILURE
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = ?e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = ?e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
