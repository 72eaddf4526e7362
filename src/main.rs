use clap::Parser;
use matchmaker::app::{App, load_config};
use matchmaker::cli::Args;
use matchmaker::logging::setup_logging;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config and setup logging before App::new() so startup logs are never silently dropped
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    setup_logging(&config, args.tracing);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = if cfg!(debug_assertions) {
            "development"
        } else {
            "production"
        },
        "starting matchmaker"
    );

    let app = match App::new(config).await {
        Ok(app) => app,
        Err(e) => {
            error!(error = ?e, "Failed to initialize application");
            return ExitCode::FAILURE;
        }
    };

    app.run().await
}
