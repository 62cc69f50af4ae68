use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::infrastructure::storage::ChunkStore;

/// How often the worker sweeps the staging area.
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Background worker purging upload sessions that were never finalized.
/// A student who closes the tab mid-upload leaves chunks behind; this is
/// the only thing that reclaims them.
pub fn start_cleanup_worker(store: ChunkStore, session_ttl: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            ttl_secs = session_ttl.as_secs(),
            "upload cleanup worker started"
        );
        let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
        // First tick fires immediately; reclaim leftovers from a previous run.
        loop {
            ticker.tick().await;
            match store.purge_stale(session_ttl).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged stale upload sessions"),
                Err(e) => warn!("upload cleanup sweep failed: {}", e),
            }
        }
    })
}
