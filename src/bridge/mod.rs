pub mod routes;
pub mod ws;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::store::ConfigStore;
use crate::supervisor::SupervisorHandle;

/// Window operations the UI may request through the bridge. The embedding
/// shell supplies the implementation; nothing else about the window layer
/// crosses this boundary.
pub trait WindowControl: Send + Sync + 'static {
    fn minimize(&self);
    fn maximize(&self);
    fn close(&self);
}

#[derive(Clone)]
pub struct BridgeState {
    pub supervisor: SupervisorHandle,
    pub store: ConfigStore,
    pub window: Arc<dyn WindowControl>,
}

/// Serve the UI bridge on localhost. Every call is request/response with
/// JSON scalar payloads; readiness is pushed one-way over `/ws`.
pub async fn start_bridge_server(
    port: u16,
    state: BridgeState,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let app = routes::api_router(state.clone())
        .merge(ws::ws_router(state))
        .layer(CorsLayer::permissive());

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "UI bridge listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    Ok(())
}
