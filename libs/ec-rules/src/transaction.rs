//! Single-use transaction tokens
//!
//! Every mutation is submitted with a token issued beforehand. A token is
//! accepted exactly once, so a repeated submission is ignored instead of
//! being applied twice.

use parking_lot::Mutex;
use std::collections::HashSet;
use tracing::debug;
use uuid::Uuid;

/// Issued, not yet consumed transaction tokens
#[derive(Debug, Default)]
pub struct TransactionLedger {
    pending: Mutex<HashSet<String>>,
}

impl TransactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh random token
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.pending.lock().insert(token.clone());
        token
    }

    /// Accept `token` if it was issued and not used yet
    pub fn consume(&self, token: &str) -> bool {
        let accepted = self.pending.lock().remove(token);
        if !accepted {
            debug!("Ignoring unknown or already used transaction {}", token);
        }
        accepted
    }

    /// Number of tokens still pending
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_token_is_single_use() {
        let ledger = TransactionLedger::new();
        let token = ledger.issue();
        assert_eq!(ledger.pending(), 1);
        assert!(ledger.consume(&token));
        assert!(!ledger.consume(&token));
        assert!(!ledger.consume("forged"));
        assert_eq!(ledger.pending(), 0);
    }

    #[test]
    fn test_tokens_are_distinct() {
        let ledger = TransactionLedger::new();
        let a = ledger.issue();
        let b = ledger.issue();
        assert_ne!(a, b);
        assert!(ledger.consume(&b));
        assert!(ledger.consume(&a));
    }
}
