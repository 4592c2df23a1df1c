//! Application state shared across routes

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::game::RaceRegistry;
use crate::util::rate_limit::AccelerateRateLimiter;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub race_registry: Arc<RaceRegistry>,
    pub accelerate_limiter: AccelerateRateLimiter,
}

impl AppState {
    pub fn new(config: Config, catalog: Catalog) -> Self {
        let config = Arc::new(config);
        let catalog = Arc::new(catalog);

        // Races share the catalog's tracks and copy its cars
        let race_registry = Arc::new(RaceRegistry::new(catalog.clone(), config.tick_period));

        let accelerate_limiter = AccelerateRateLimiter::new(config.accelerate_rate_limit);

        Self {
            config,
            catalog,
            race_registry,
            accelerate_limiter,
        }
    }
}
