pub mod query;
pub mod registry;
pub mod serve;

use auxo_wire::Shutdown;
use std::sync::Arc;
use tracing::{info, warn};

/// A shutdown signal triggered by Ctrl+C.
pub fn ctrl_c_shutdown() -> Arc<Shutdown> {
    let shutdown = Arc::new(Shutdown::new());
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received");
                trigger.trigger();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C"),
        }
    });
    shutdown
}
