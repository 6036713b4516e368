//! Circuit breaker for outbound dependencies.
//!
//! After repeated failures a dependency's circuit opens and calls to it are
//! refused immediately until the recovery timeout has passed.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::config::human_duration;

/// An external service guarded by its own circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Extraction,
    Enrichment,
    Webhook,
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dependency::Extraction => "extraction",
            Dependency::Enrichment => "enrichment",
            Dependency::Webhook => "webhook",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Failures before opening circuit
    pub failure_threshold: u32,

    /// Time before a trial call is let through
    #[serde(with = "human_duration")]
    pub recovery_timeout: Duration,

    /// Successes needed to close circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of a circuit.
#[derive(Debug, Clone)]
pub enum CircuitState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32 },
}

/// Per-dependency circuit breaker.
pub struct CircuitBreaker {
    states: RwLock<HashMap<Dependency, CircuitState>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Whether calls to `dep` should be refused right now.
    pub fn is_open(&self, dep: Dependency) -> bool {
        let states = self.states.read();
        match states.get(&dep) {
            Some(CircuitState::Open { opened_at }) => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    drop(states);
                    self.transition_to_half_open(dep);
                    false
                } else {
                    true
                }
            }
            _ => false,
        }
    }

    pub fn record_success(&self, dep: Dependency) {
        let mut states = self.states.write();
        match states.get(&dep).cloned() {
            Some(CircuitState::HalfOpen { successes }) => {
                if successes + 1 >= self.config.success_threshold {
                    states.insert(dep, CircuitState::Closed { failures: 0 });
                    tracing::info!(dependency = %dep, "Circuit closed after successful recovery");
                } else {
                    states.insert(
                        dep,
                        CircuitState::HalfOpen {
                            successes: successes + 1,
                        },
                    );
                }
            }
            Some(CircuitState::Closed { .. }) => {
                states.insert(dep, CircuitState::Closed { failures: 0 });
            }
            _ => {}
        }
    }

    pub fn record_failure(&self, dep: Dependency) {
        let mut states = self.states.write();
        let failures = match states.get(&dep).cloned() {
            Some(CircuitState::Closed { failures }) => failures + 1,
            None => 1,
            Some(CircuitState::HalfOpen { .. }) => {
                states.insert(
                    dep,
                    CircuitState::Open {
                        opened_at: Instant::now(),
                    },
                );
                tracing::warn!(dependency = %dep, "Circuit reopened after failed recovery attempt");
                return;
            }
            Some(CircuitState::Open { .. }) => return,
        };

        if failures >= self.config.failure_threshold {
            states.insert(
                dep,
                CircuitState::Open {
                    opened_at: Instant::now(),
                },
            );
            tracing::warn!(dependency = %dep, failures, "Circuit opened after repeated failures");
        } else {
            states.insert(dep, CircuitState::Closed { failures });
        }
    }

    fn transition_to_half_open(&self, dep: Dependency) {
        let mut states = self.states.write();
        if matches!(states.get(&dep), Some(CircuitState::Open { .. })) {
            states.insert(dep, CircuitState::HalfOpen { successes: 0 });
            tracing::info!(dependency = %dep, "Circuit half-open, allowing trial call");
        }
    }

    pub fn state(&self, dep: Dependency) -> CircuitState {
        self.states
            .read()
            .get(&dep)
            .cloned()
            .unwrap_or(CircuitState::Closed { failures: 0 })
    }

    pub fn reset(&self) {
        self.states.write().clear();
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circuit_opens_after_threshold() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 2,
            ..Default::default()
        });

        assert!(!cb.is_open(Dependency::Enrichment));
        cb.record_failure(Dependency::Enrichment);
        assert!(!cb.is_open(Dependency::Enrichment));
        cb.record_failure(Dependency::Enrichment);
        assert!(cb.is_open(Dependency::Enrichment));
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::default();
        cb.record_failure(Dependency::Extraction);
        cb.record_failure(Dependency::Extraction);
        cb.record_success(Dependency::Extraction);
        cb.record_failure(Dependency::Extraction);
        cb.record_failure(Dependency::Extraction);
        assert!(!cb.is_open(Dependency::Extraction));
    }

    #[test]
    fn test_dependencies_are_independent() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });
        cb.record_failure(Dependency::Webhook);
        assert!(cb.is_open(Dependency::Webhook));
        assert!(!cb.is_open(Dependency::Extraction));
    }

    #[test]
    fn test_half_open_after_recovery_timeout() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            recovery_timeout: Duration::ZERO,
            success_threshold: 1,
        });
        cb.record_failure(Dependency::Enrichment);

        assert!(!cb.is_open(Dependency::Enrichment));
        assert!(matches!(
            cb.state(Dependency::Enrichment),
            CircuitState::HalfOpen { successes: 0 }
        ));

        cb.record_success(Dependency::Enrichment);
        assert!(matches!(
            cb.state(Dependency::Enrichment),
            CircuitState::Closed { failures: 0 }
        ));
    }
}
