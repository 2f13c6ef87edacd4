use std::net::TcpListener;
use std::sync::Arc;

use showroom::auth::SessionManager;
use showroom::configuration::get_configuration;
use showroom::startup::run;
use showroom::store::{connect_with_retry, CredentialStore, PgCredentialStore};
use showroom::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry("info");

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(startup_error(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    let pool = connect_with_retry(&configuration.database)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Max retries reached. Exiting");
            startup_error(
                std::io::ErrorKind::ConnectionRefused,
                "Database connection error",
            )
        })?;

    let store = Arc::new(PgCredentialStore::new(pool));
    store.migrate().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to migrate the database");
        startup_error(std::io::ErrorKind::Other, "Database migration error")
    })?;

    let credential_store: Arc<dyn CredentialStore> = store.clone();
    let session = SessionManager::from_settings(&configuration, credential_store).map_err(|e| {
        tracing::error!(error = %e, "Invalid authentication settings");
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let address = configuration.application.address();
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    // actix-web stops on SIGINT/SIGTERM and resolves this future
    run(listener, session)?.await?;

    store.close().await;
    tracing::info!("Shutdown complete");

    Ok(())
}
