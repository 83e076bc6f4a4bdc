use albumcap::{
    api::{router, AppState},
    caption::CaptionClient,
    config::Config,
    storage::AlbumStore,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("albumcap=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let store = AlbumStore::open(&config.upload_root).await?;
    let captions = CaptionClient::new(&config.caption);
    let router = router(AppState::new(store, captions), config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        root = %config.upload_root.display(),
        "serving albums"
    );
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;
    Ok(())
}
