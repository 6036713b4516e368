//! Token budget for extraction calls.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::providers::TokenUsage;

/// A ceiling on tokens spent.
pub struct TokenBudget {
    pub max_tokens: u32,
    used: AtomicU32,
}

impl TokenBudget {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            max_tokens,
            used: AtomicU32::new(0),
        }
    }

    pub fn can_afford(&self, tokens: u32) -> bool {
        self.remaining() >= tokens
    }

    pub fn record(&self, tokens: u32) {
        self.used.fetch_add(tokens, Ordering::SeqCst);
    }

    pub fn remaining(&self) -> u32 {
        self.max_tokens.saturating_sub(self.used.load(Ordering::SeqCst))
    }

    pub fn used(&self) -> u32 {
        self.used.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.used.store(0, Ordering::SeqCst);
    }
}

/// Accumulated extraction usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub total_tokens: u32,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub llm_calls: u32,
    pub cache_read_tokens: u32,
    pub cache_creation_tokens: u32,
}

impl LlmUsage {
    pub fn add(&mut self, usage: &TokenUsage) {
        self.prompt_tokens += usage.prompt_tokens;
        self.completion_tokens += usage.completion_tokens;
        self.total_tokens += usage.total();
        self.cache_read_tokens += usage.cache_read_tokens;
        self.cache_creation_tokens += usage.cache_creation_tokens;
        self.llm_calls += 1;
    }
}

/// Budget plus running usage totals, shared by all extraction calls.
pub struct BudgetTracker {
    budget: TokenBudget,
    usage: RwLock<LlmUsage>,
}

impl BudgetTracker {
    pub fn new(max_tokens: u32) -> Self {
        Self {
            budget: TokenBudget::new(max_tokens),
            usage: RwLock::new(LlmUsage::default()),
        }
    }

    pub fn can_afford(&self, estimated_tokens: u32) -> bool {
        self.budget.can_afford(estimated_tokens)
    }

    pub fn record_usage(&self, usage: &TokenUsage) {
        self.budget.record(usage.total());
        self.usage.write().add(usage);
    }

    pub fn usage(&self) -> LlmUsage {
        self.usage.read().clone()
    }

    pub fn remaining(&self) -> u32 {
        self.budget.remaining()
    }

    pub fn reset(&self) {
        self.budget.reset();
        *self.usage.write() = LlmUsage::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_enforcement() {
        let budget = TokenBudget::new(100);
        assert!(budget.can_afford(100));
        assert!(!budget.can_afford(101));

        budget.record(60);
        assert_eq!(budget.remaining(), 40);
        assert_eq!(budget.used(), 60);
        assert!(!budget.can_afford(50));
    }

    #[test]
    fn test_tracker_accumulates() {
        let tracker = BudgetTracker::new(1_000);
        let usage = TokenUsage {
            prompt_tokens: 300,
            completion_tokens: 50,
            cache_read_tokens: 200,
            cache_creation_tokens: 0,
        };
        tracker.record_usage(&usage);
        tracker.record_usage(&usage);

        let totals = tracker.usage();
        assert_eq!(totals.llm_calls, 2);
        assert_eq!(totals.total_tokens, 700);
        assert_eq!(totals.cache_read_tokens, 400);
        assert_eq!(tracker.remaining(), 300);
        assert!(!tracker.can_afford(301));

        tracker.reset();
        assert_eq!(tracker.remaining(), 1_000);
        assert_eq!(tracker.usage(), LlmUsage::default());
    }
}
