//! Per-provider circuit breaker.

mod registry;

pub use registry::{BreakerRegistry, SharedBreaker, TransitionSink};

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use respgate_core::config::BreakerConfig;
use respgate_core::types::ProviderKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        })
    }
}

/// Immutable record of one state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerTransition {
    pub provider: ProviderKind,
    pub from: BreakerState,
    pub to: BreakerState,
    pub at: DateTime<Utc>,
    pub open_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooldown_ms: Option<i64>,
}

/// Answer to [`CircuitBreaker::should_call`].
#[derive(Debug, Clone, PartialEq)]
pub struct CallPermit {
    pub allowed: bool,
    pub transition: Option<BreakerTransition>,
}

/// Health state machine for one provider.
///
/// Transitions:
/// 1. CLOSED -> OPEN after `timeout_threshold` consecutive recorded timeouts
/// 2. OPEN -> HALF_OPEN on the first `should_call` at or after the cooldown
///    expiry; that call counts as a probe
/// 3. HALF_OPEN -> CLOSED on a recorded success
/// 4. HALF_OPEN -> OPEN on a recorded timeout, with a longer cooldown
///
/// Cooldown on the n-th consecutive opening is
/// `min(initial × multiplier^(n-1), max)`. Reaching CLOSED resets n.
///
/// Not synchronized. Callers serialize access per provider; the
/// [`BreakerRegistry`] hands out each breaker behind its own mutex.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    provider: ProviderKind,
    config: BreakerConfig,
    state: BreakerState,
    consecutive_timeouts: u32,
    consecutive_successes: u32,
    open_count: u32,
    cooldown_until: Option<DateTime<Utc>>,
    last_cooldown: Option<Duration>,
    probes_in_flight: u32,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderKind, config: BreakerConfig) -> Self {
        Self {
            provider,
            config,
            state: BreakerState::Closed,
            consecutive_timeouts: 0,
            consecutive_successes: 0,
            open_count: 0,
            cooldown_until: None,
            last_cooldown: None,
            probes_in_flight: 0,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }

    pub fn open_count(&self) -> u32 {
        self.open_count
    }

    pub fn probes_in_flight(&self) -> u32 {
        self.probes_in_flight
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.cooldown_until
    }

    /// Cooldown applied on the most recent opening.
    pub fn last_cooldown(&self) -> Option<Duration> {
        self.last_cooldown
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Whether the provider may be called now.
    pub fn should_call(&mut self, now: DateTime<Utc>) -> CallPermit {
        match self.state {
            BreakerState::Closed => CallPermit {
                allowed: true,
                transition: None,
            },
            BreakerState::Open => {
                let expired = self.cooldown_until.map_or(true, |until| now >= until);
                if !expired {
                    return CallPermit {
                        allowed: false,
                        transition: None,
                    };
                }
                let transition = self.transition(BreakerState::HalfOpen, now);
                self.probes_in_flight = 1;
                CallPermit {
                    allowed: true,
                    transition: Some(transition),
                }
            }
            BreakerState::HalfOpen => {
                let allowed = self.probes_in_flight < self.config.half_open_max_probes;
                if allowed {
                    self.probes_in_flight += 1;
                }
                CallPermit {
                    allowed,
                    transition: None,
                }
            }
        }
    }

    /// Return a HALF_OPEN probe slot whose call was abandoned before its
    /// outcome was recorded. No-op in any other state.
    pub fn release_probe(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.probes_in_flight = self.probes_in_flight.saturating_sub(1);
        }
    }

    pub fn record_success(&mut self, now: DateTime<Utc>) -> Option<BreakerTransition> {
        self.consecutive_timeouts = 0;
        self.consecutive_successes = self.consecutive_successes.saturating_add(1);
        match self.state {
            BreakerState::HalfOpen => {
                self.probes_in_flight = 0;
                self.open_count = 0;
                self.cooldown_until = None;
                Some(self.transition(BreakerState::Closed, now))
            }
            _ => None,
        }
    }

    /// Timeouts and errors both land here.
    pub fn record_timeout(&mut self, now: DateTime<Utc>) -> Option<BreakerTransition> {
        self.consecutive_successes = 0;
        self.consecutive_timeouts = self.consecutive_timeouts.saturating_add(1);
        match self.state {
            BreakerState::Closed if self.consecutive_timeouts >= self.config.timeout_threshold => {
                Some(self.open(now))
            }
            BreakerState::HalfOpen => {
                self.probes_in_flight = 0;
                Some(self.open(now))
            }
            _ => None,
        }
    }

    fn open(&mut self, now: DateTime<Utc>) -> BreakerTransition {
        self.open_count = self.open_count.saturating_add(1);
        let cooldown = self.cooldown_for(self.open_count);
        self.cooldown_until = Some(now + cooldown);
        self.last_cooldown = Some(cooldown);
        self.consecutive_timeouts = 0;
        self.transition(BreakerState::Open, now)
    }

    /// `min(initial × multiplier^(n-1), max)`.
    pub fn cooldown_for(&self, open_count: u32) -> Duration {
        let exp = open_count.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw = self.config.initial_cooldown_ms as f64 * self.config.backoff_multiplier.powi(exp);
        let capped = raw.min(self.config.max_cooldown_ms as f64);
        Duration::milliseconds(capped as i64)
    }

    fn transition(&mut self, to: BreakerState, at: DateTime<Utc>) -> BreakerTransition {
        let from = self.state;
        self.state = to;
        BreakerTransition {
            provider: self.provider,
            from,
            to,
            at,
            open_count: self.open_count,
            cooldown_ms: (to == BreakerState::Open)
                .then(|| self.last_cooldown.map(|c| c.num_milliseconds()))
                .flatten(),
        }
    }
}
