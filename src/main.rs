use anyhow::{Context, Result};
use tracing::{info, warn};

use studio_media::{AppState, MediaConfig, MediaLibrary, logging, router};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let config = MediaConfig::from_env();
    let library = MediaLibrary::from_config(&config);
    library
        .store()
        .ensure_dir()
        .await
        .with_context(|| format!("create upload dir {}", config.upload_dir.display()))?;

    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN is not set; admin endpoints are unauthenticated");
    }
    match &config.content_snapshot {
        Some(path) => info!(path = %path.display(), "usage index reads content snapshot"),
        None => warn!("CONTENT_SNAPSHOT is not set; every asset will report zero usage"),
    }

    let state = AppState::new(library, config.admin_token.clone());
    let app = router(state, &config);

    let bind_address = config.bind_address();
    let tcp_listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("bind {bind_address}"))?;

    info!(
        address = %bind_address,
        api_root = %config.api_root,
        public_prefix = %config.public_prefix,
        upload_dir = %config.upload_dir.display(),
        "media server started"
    );

    axum::serve(tcp_listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
