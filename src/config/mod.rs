use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::{Error, Result};
use crate::limiter::{Limiter, LimiterConfig};
use crate::policy::Chain;
use crate::retry::{Retry, RetryConfig};
use crate::timeout::{Timeout, TimeoutConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Ordered policy stack, outermost layer first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackConfig {
    /// Policy layers
    #[serde(default)]
    pub layers: Vec<LayerConfig>,
}

/// One layer of a policy stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerConfig {
    Retry(RetryConfig),
    CircuitBreaker(CircuitBreakerConfig),
    Limiter(LimiterConfig),
    Timeout(TimeoutConfig),
}

impl LayerConfig {
    fn kind(&self) -> &'static str {
        match self {
            LayerConfig::Retry(_) => "retry",
            LayerConfig::CircuitBreaker(_) => "circuit_breaker",
            LayerConfig::Limiter(_) => "limiter",
            LayerConfig::Timeout(_) => "timeout",
        }
    }
}

impl StackConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Parse configuration from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (index, layer) in self.layers.iter().enumerate() {
            match layer {
                LayerConfig::Retry(retry) => {
                    if retry.attempts == 0 {
                        return Err(Error::Config(format!(
                            "Retry attempts must be > 0 (layer {})",
                            index
                        )));
                    }
                    if !(0.0..=1.0).contains(&retry.jitter) {
                        return Err(Error::Config(format!(
                            "Retry jitter must be within [0, 1] (layer {})",
                            index
                        )));
                    }
                }
                LayerConfig::CircuitBreaker(breaker) => {
                    if breaker.failure_threshold == 0 {
                        return Err(Error::Config(format!(
                            "Circuit breaker failure threshold must be > 0 (layer {})",
                            index
                        )));
                    }
                }
                LayerConfig::Limiter(limiter) => {
                    if limiter.limit == 0 {
                        return Err(Error::Config(format!(
                            "Limiter limit must be > 0 (layer {})",
                            index
                        )));
                    }
                }
                LayerConfig::Timeout(timeout) => {
                    if timeout.duration_ms == 0 {
                        return Err(Error::Config(format!(
                            "Timeout duration must be > 0 (layer {})",
                            index
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Validate and build the stack as a chain.
    ///
    /// Every call creates fresh stateful policies, so build once and share the
    /// resulting chain between callers that should see the same breaker.
    pub fn build<T: Send + 'static>(&self) -> Result<Chain<T>> {
        self.validate()?;

        let chain = self
            .layers
            .iter()
            .fold(Chain::new(), |chain, layer| match layer {
                LayerConfig::Retry(config) => chain.push(Retry::from_config(config)),
                LayerConfig::CircuitBreaker(config) => {
                    chain.push(CircuitBreaker::with_config(config.clone()))
                }
                LayerConfig::Limiter(config) => chain.push(Limiter::from_config(config)),
                LayerConfig::Timeout(config) => chain.push(Timeout::from_config(config)),
            });

        info!(
            layers = ?self.layers.iter().map(LayerConfig::kind).collect::<Vec<_>>(),
            "Built policy stack"
        );

        Ok(chain)
    }
}
