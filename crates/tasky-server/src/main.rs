use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use tasky_api::AppStateInner;
use tasky_api::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasky_server=debug,tasky_api=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let host = std::env::var("TASKY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("TASKY_PORT")
        .unwrap_or_else(|_| "3001".into())
        .parse()?;

    let state = AppStateInner::new(Store::new());

    let app = tasky_api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Tasky dev backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
