use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use respgate_core::config::BreakerConfig;
use respgate_core::types::ProviderKind;

use super::{BreakerState, BreakerTransition, CircuitBreaker};

/// A breaker behind its own lock; one lock per provider id.
pub type SharedBreaker = Arc<Mutex<CircuitBreaker>>;

/// Receives every breaker transition.
pub trait TransitionSink: Send + Sync {
    fn on_transition(&self, event: &BreakerTransition);
}

/// Store of long-lived breakers keyed by provider.
///
/// Owned by the evidence collector. A breaker is created on first use;
/// later lookups return the same instance and ignore any config override.
pub struct BreakerRegistry {
    default_config: BreakerConfig,
    breakers: Mutex<HashMap<ProviderKind, SharedBreaker>>,
    sink: Option<Arc<dyn TransitionSink>>,
}

impl BreakerRegistry {
    pub fn new(default_config: BreakerConfig) -> Self {
        Self {
            default_config,
            breakers: Mutex::new(HashMap::new()),
            sink: None,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn get_or_create(&self, provider: ProviderKind) -> SharedBreaker {
        self.get_or_create_with(provider, None)
    }

    /// `config` only applies if this call creates the breaker.
    pub fn get_or_create_with(
        &self,
        provider: ProviderKind,
        config: Option<BreakerConfig>,
    ) -> SharedBreaker {
        let mut map = self.breakers.lock();
        map.entry(provider)
            .or_insert_with(|| {
                let cfg = config.unwrap_or_else(|| self.default_config.clone());
                Arc::new(Mutex::new(CircuitBreaker::new(provider, cfg)))
            })
            .clone()
    }

    pub fn get(&self, provider: ProviderKind) -> Option<SharedBreaker> {
        self.breakers.lock().get(&provider).cloned()
    }

    pub fn len(&self) -> usize {
        self.breakers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.lock().is_empty()
    }

    /// Drop every breaker. The next lookup starts from CLOSED.
    pub fn clear(&self) {
        self.breakers.lock().clear();
    }

    /// Current state of every known breaker, sorted by provider.
    pub fn snapshot(&self) -> Vec<(ProviderKind, BreakerState)> {
        let map = self.breakers.lock();
        let mut out: Vec<_> = map.iter().map(|(k, b)| (*k, b.lock().state())).collect();
        out.sort_by_key(|(k, _)| *k);
        out
    }

    /// Log and forward a transition.
    pub fn publish(&self, event: &BreakerTransition) {
        if event.to == BreakerState::Open {
            warn!(
                provider = %event.provider,
                from = %event.from,
                to = %event.to,
                open_count = event.open_count,
                cooldown_ms = event.cooldown_ms.unwrap_or_default(),
                "circuit breaker opened"
            );
        } else {
            info!(
                provider = %event.provider,
                from = %event.from,
                to = %event.to,
                open_count = event.open_count,
                "circuit breaker transition"
            );
        }
        if let Some(sink) = &self.sink {
            sink.on_transition(event);
        }
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}
