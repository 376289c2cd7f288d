use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ProviderConfig;
use crate::gateway::Gateway;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub gateway: Gateway,
    pub config: Arc<ProviderConfig>,
}
