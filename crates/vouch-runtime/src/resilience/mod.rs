//! Resilience for outbound calls: circuit breaking and token budgets.

mod budget;
mod circuit_breaker;

pub use budget::{BudgetTracker, LlmUsage, TokenBudget};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState, Dependency};
