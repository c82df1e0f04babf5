use super::breaker::CircuitBreaker;
use super::types::CircuitBreakerConfig;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Process-wide breakers, one per named call-site
#[derive(Debug, Clone)]
pub struct BreakerRegistry {
    /// Circuit breakers per call-site
    breakers: Arc<DashMap<String, CircuitBreaker>>,
    /// Configuration for newly created breakers
    config: CircuitBreakerConfig,
}

impl BreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Arc::new(DashMap::new()),
            config,
        }
    }

    /// Get or create the breaker guarding `name`
    pub fn get_or_create(&self, name: &str) -> CircuitBreaker {
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(breaker = name, "Registering circuit breaker");
                CircuitBreaker::named(name, self.config.clone())
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<CircuitBreaker> {
        self.breakers.get(name).map(|entry| entry.value().clone())
    }

    /// Drop the breaker for `name`; the next lookup starts closed
    pub fn remove(&self, name: &str) -> bool {
        self.breakers.remove(name).is_some()
    }

    /// Names of all registered call-sites
    pub fn names(&self) -> Vec<String> {
        self.breakers.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
