use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pictoria_backend::api;
use pictoria_backend::auth::TokenVerifier;
use pictoria_backend::config::PictoriaConfig;
use pictoria_backend::database::Database;
use pictoria_backend::telemetry;
use pictoria_backend::utils;

#[derive(Parser)]
#[command(author, version, about = "Pictoria backend daemon")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (Axum) for REST/API access
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::print_banner();
    telemetry::init_tracing();

    let args = Args::parse();

    let config = PictoriaConfig::from_env()?;
    let database = Database::connect(&config.paths)?;
    let newly_created = database.ensure_migrations()?;
    tracing::info!(
        db_path = %config.paths.db_path.display(),
        newly_created,
        "database ready"
    );

    let http_client = reqwest::Client::builder()
        .user_agent(format!("Pictoria/{}", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .context("failed to build shared HTTP client")?;
    let verifier = TokenVerifier::from_config(&config.auth, &http_client)
        .await
        .context("failed to initialize the token verifier")?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => api::serve_http(config, database, verifier).await,
    }
}
