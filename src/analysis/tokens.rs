//! Token counting
//!
//! Costs drive batch packing only; a counter that fails is logged and the
//! file is costed at zero rather than dropped.

use crate::analysis::client::ServiceError;
use async_trait::async_trait;

/// Characters per token assumed by the local estimate
pub const CHARS_PER_TOKEN: u64 = 4;

/// Maps text to a token cost
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Returns the token cost of `text`; blank text costs 0
    async fn count(&self, text: &str) -> Result<u64, ServiceError>;
}

/// Local approximation: one token per four characters, rounded up
#[derive(Debug, Clone, Copy, Default)]
pub struct EstimateTokenCounter;

impl EstimateTokenCounter {
    pub fn estimate(text: &str) -> u64 {
        if text.trim().is_empty() {
            return 0;
        }
        let chars = text.chars().count() as u64;
        chars.div_ceil(CHARS_PER_TOKEN)
    }
}

#[async_trait]
impl TokenCounter for EstimateTokenCounter {
    async fn count(&self, text: &str) -> Result<u64, ServiceError> {
        Ok(Self::estimate(text))
    }
}

/// Counts tokens, logging failures and treating them as zero
pub async fn count_or_zero(counter: &dyn TokenCounter, label: &str, text: &str) -> u64 {
    if text.trim().is_empty() {
        return 0;
    }
    match counter.count(text).await {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!("Error counting tokens for {}: {}", label, e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenCounter;

    #[async_trait]
    impl TokenCounter for BrokenCounter {
        async fn count(&self, _text: &str) -> Result<u64, ServiceError> {
            Err(ServiceError::Transport("offline".to_string()))
        }
    }

    #[test]
    fn test_estimate() {
        assert_eq!(EstimateTokenCounter::estimate(""), 0);
        assert_eq!(EstimateTokenCounter::estimate("   \n"), 0);
        assert_eq!(EstimateTokenCounter::estimate("abcd"), 1);
        assert_eq!(EstimateTokenCounter::estimate("abcde"), 2);
    }

    #[tokio::test]
    async fn test_failure_counts_as_zero() {
        assert_eq!(count_or_zero(&BrokenCounter, "a.js", "var a;").await, 0);
        assert_eq!(count_or_zero(&EstimateTokenCounter, "a.js", "var a;").await, 2);
    }
}
