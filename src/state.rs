//! Shared application state handed to every handler.

use crate::descriptor::Registry;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub registry: Arc<Registry>,
}

impl AppState {
    pub fn new(pool: PgPool, registry: Registry) -> Self {
        AppState {
            pool,
            registry: Arc::new(registry),
        }
    }
}
