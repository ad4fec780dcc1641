use std::sync::Arc;

use crate::{cache::CartCache, config::AppConfig, db::DbPool, events::EventBus, gateway::GatewayClient};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: AppConfig,
    pub gateway: GatewayClient,
    pub cart_cache: Arc<CartCache>,
    pub events: EventBus,
}

impl AppState {
    pub fn new(pool: DbPool, config: AppConfig, gateway: GatewayClient) -> Self {
        let cart_cache = Arc::new(CartCache::new(config.cart_cache_ttl));
        Self {
            pool,
            config,
            gateway,
            cart_cache,
            events: EventBus::default(),
        }
    }
}
