use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use asrp_auth::OidcVerifier;
use asrp_catalog_server::adapter::handler::{router, AppState};
use asrp_catalog_server::domain::entity::NewProduct;
use asrp_catalog_server::infrastructure::config::Config;
use asrp_catalog_server::infrastructure::in_memory_product_repository::InMemoryProductRepository;
use asrp_catalog_server::usecase::{CreateProductUseCase, ListProductsUseCase};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let cfg = Config::load(&config_path)?;

    // Logging
    asrp_telemetry::init_logger(&cfg.log, &cfg.app.environment)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting catalog server"
    );

    // Token verifier
    info!(
        discovery_url = %cfg.auth.normalized_discovery_url(),
        audience = %cfg.auth.rbac_client_id,
        "initializing OIDC verifier"
    );
    let verifier = Arc::new(OidcVerifier::from_config(&cfg.auth)?);

    // Product store
    let seed = vec![
        NewProduct::new("SKU-001", "Demo product 1").map_err(anyhow::Error::msg)?,
        NewProduct::new("SKU-002", "Demo product 2").map_err(anyhow::Error::msg)?,
    ];
    let repo = Arc::new(InMemoryProductRepository::with_products(seed));

    let state = AppState {
        service: Arc::new(cfg.app.clone()),
        rbac: Arc::new(cfg.rbac.clone()),
        verifier,
        list_products_uc: Arc::new(ListProductsUseCase::new(repo.clone())),
        create_product_uc: Arc::new(CreateProductUseCase::new(repo)),
    };
    let app = router(state);

    // REST server
    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port).parse()?;
    info!("REST server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("catalog server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
