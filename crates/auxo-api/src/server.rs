//! HTTP listener lifecycle.

use crate::control_plane::ControlPlane;
use crate::routes::build_router;
use auxo_types::config::ServerAddress;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// Bind the façade listener.
pub async fn bind(address: &ServerAddress) -> std::io::Result<TcpListener> {
    TcpListener::bind(address.authority()).await
}

/// Serve the façade on `listener` until shutdown is signalled.
pub async fn serve(
    listener: TcpListener,
    control: Arc<ControlPlane>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let local_addr = listener.local_addr()?;
    info!(%local_addr, "Hestia listening");

    axum::serve(listener, build_router(control))
        .with_graceful_shutdown(async move { auxo_wire::shutdown::signalled(&mut shutdown).await })
        .await?;

    info!("Hestia stopped");
    Ok(())
}
