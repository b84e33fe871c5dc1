mod applications;
mod auth;
mod contact;
mod dashboard;
mod directory;
mod locale;
mod mailer;
mod offers;
mod problem;
mod profile;
mod router;
mod saved;
mod session;
mod signing;
mod telemetry;
mod uploads;

use std::{net::SocketAddr, time::Duration};

use tracing::{info, warn};

use empleaworks_storage::Database;
use empleaworks_util::{load_env_file, AppConfig};

const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let database = Database::connect(&config.database_url).await?;
    database.run_migrations().await?;
    info!(stage = "app", database_url = %config.database_url, "database ready");

    let http = reqwest::Client::builder().timeout(MAIL_TIMEOUT).build()?;
    let mailer = mailer::Mailer::from_config(&config.mail, http)?;
    if !config.mail.is_enabled() {
        warn!(stage = "app", "MAIL_API_KEY not set; outgoing mail will be logged and skipped");
    }

    let state = router::AppState::new(metrics, database, &config, mailer);

    let addr: SocketAddr = config.bind_addr;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
