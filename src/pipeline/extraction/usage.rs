//! Usage metering for the extraction service.
//!
//! One `UsageMeter` is shared (via `Arc`) by every pipeline instance that uses
//! the same adapter. Counters are atomics; reading a snapshot never blocks a
//! running extraction.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::types::TokenUsage;
use super::ExtractionError;

#[derive(Debug, Default)]
pub struct UsageMeter {
    calls: AtomicU64,
    failed_calls: AtomicU64,
    prompt_tokens: AtomicU64,
    completion_tokens: AtomicU64,
    total_tokens: AtomicU64,
    budget: Option<u64>,
}

/// Point-in-time copy of the meter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageSnapshot {
    pub calls: u64,
    pub failed_calls: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub budget: Option<u64>,
}

impl UsageSnapshot {
    pub fn remaining(&self) -> Option<u64> {
        self.budget.map(|b| b.saturating_sub(self.total_tokens))
    }
}

impl UsageMeter {
    pub fn new(budget: Option<u64>) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    /// Refuse new calls once the budget is spent.
    ///
    /// The budget is a soft limit. Token counts are only known after a reply,
    /// so calls admitted before the limit is reached still complete and are
    /// recorded. With `max_concurrent` cases in flight the total can pass the
    /// limit by up to that many replies.
    pub fn check_budget(&self) -> Result<(), ExtractionError> {
        match self.budget {
            Some(limit) => {
                let used = self.total_tokens.load(Ordering::Relaxed);
                if used >= limit {
                    Err(ExtractionError::BudgetExhausted { used, limit })
                } else {
                    Ok(())
                }
            }
            None => Ok(()),
        }
    }

    pub fn record_call(&self, usage: Option<&TokenUsage>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if let Some(u) = usage {
            self.prompt_tokens.fetch_add(u.prompt_tokens, Ordering::Relaxed);
            self.completion_tokens
                .fetch_add(u.completion_tokens, Ordering::Relaxed);
            self.total_tokens.fetch_add(u.total_tokens, Ordering::Relaxed);
        }
    }

    pub fn record_failure(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.failed_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            prompt_tokens: self.prompt_tokens.load(Ordering::Relaxed),
            completion_tokens: self.completion_tokens.load(Ordering::Relaxed),
            total_tokens: self.total_tokens.load(Ordering::Relaxed),
            budget: self.budget,
        }
    }
}
