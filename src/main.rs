use std::process::ExitCode;

use axum::Router;
use hidro_clean::{
    configuration::Configuration, configuration_handler::ConfigurationHandler, http::create_app,
    local_store::LocalStore,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "postgres")]
async fn database_app(database_url: String, configuration: ConfigurationHandler) -> Option<Router> {
    use hidro_clean::database_interface::DatabaseInterface;
    use std::time::Duration;
    use tokio::time::sleep;

    let backend = loop {
        match DatabaseInterface::new(&database_url) {
            Ok(backend) => {
                info!("Successfully connected to database");
                break backend;
            }
            Err(err) => {
                error!(?err, "Failed to establish database connection. Retry in 1 sec. You may want to restart without DATABASE_URL (appointments kept in memory).");
                sleep(Duration::from_secs(1)).await;
            }
        }
    };
    Some(create_app(backend, configuration))
}

#[cfg(not(feature = "postgres"))]
async fn database_app(_database_url: String, _configuration: ConfigurationHandler) -> Option<Router> {
    error!("DATABASE_URL is set but this build has no PostgreSQL support. Rebuild with `--features postgres` or unset it.");
    None
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("###############");
    println!("# Hidro Clean #");
    println!("###############");

    let configuration = match ConfigurationHandler::parse_arguments() {
        Ok(configuration) => configuration,
        Err(err) => {
            error!(%err, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let app = match configuration.database_url() {
        Some(database_url) => match database_app(database_url, configuration.clone()).await {
            Some(app) => app,
            None => return ExitCode::FAILURE,
        },
        None => {
            warn!("No database configured, appointments are kept in memory only");
            create_app(LocalStore::default(), configuration.clone())
        }
    };

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(%err, %address, "Failed to bind listener");
            return ExitCode::FAILURE;
        }
    };
    println!("Accessible at:\n{}", address);

    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "Server stopped");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
