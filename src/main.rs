use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{listen_addr_from_env_value, router, AppState};
use medforms_core::CoreConfig;
use medforms_core::config::{resolve_data_dir, signature_max_bytes_from_env_value};

/// Main entry point for the MedForms server
///
/// Serves the REST API, Swagger UI included, on a single address.
///
/// # Environment Variables
/// - `MEDFORMS_ADDR`: listen address (default: "127.0.0.1:5000")
/// - `MEDFORMS_DATA_DIR`: root of the templates, documents and signatures directories
///   (default: "./medforms_data")
/// - `MEDFORMS_SIGNATURE_MAX_BYTES`: largest accepted signature image (default: 2 MiB)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("medforms=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let data_dir = resolve_data_dir(std::env::var_os("MEDFORMS_DATA_DIR").map(PathBuf::from))?;
    let signature_max_bytes =
        signature_max_bytes_from_env_value(std::env::var("MEDFORMS_SIGNATURE_MAX_BYTES").ok())?;
    let cfg = Arc::new(CoreConfig::new(data_dir, signature_max_bytes)?);

    let state = AppState::new(cfg.clone())?;
    let addr = listen_addr_from_env_value(std::env::var("MEDFORMS_ADDR").ok());

    tracing::info!("++ Starting MedForms REST on {}", addr);
    tracing::info!("++ Data directory {}", cfg.data_dir().display());

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
