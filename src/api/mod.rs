pub mod routes;

use crate::config::Settings;
use crate::core::{AuthService, UploadService};
use crate::infrastructure::database::Database;
use crate::infrastructure::jwt::JwtKeys;
use crate::infrastructure::storage::ChunkStore;

/// Shared application state, cloned into every worker.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub jwt: JwtKeys,
    pub auth: AuthService,
    pub uploads: UploadService,
    pub chunk_store: ChunkStore,
}
