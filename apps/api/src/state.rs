use sqlx::PgPool;

use crate::config::Config;
use crate::nlp_client::NlpClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub nlp: NlpClient,
    pub config: Config,
}
