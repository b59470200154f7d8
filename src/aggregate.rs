/// Per-account accumulation of page hits.
///
/// Accounts are kept in first-seen order so that ties in the report and
/// repeated runs over the same logs come out identical.
use crate::extract::Observation;
use std::collections::HashMap;

/// Everything observed for one account during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub account: String,
    /// Request times in arrival (file-scan) order. Never re-sorted.
    pub timestamps: Vec<i64>,
}

impl AccountRecord {
    fn new(account: String) -> Self {
        Self {
            account,
            timestamps: Vec::new(),
        }
    }

    /// Page hits; one per accepted observation.
    pub fn hits(&self) -> u64 {
        self.timestamps.len() as u64
    }
}

/// Owns every account record for one run.
#[derive(Debug, Default)]
pub struct Aggregator {
    index: HashMap<String, usize>,
    records: Vec<AccountRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one page hit, creating the account on first sight.
    pub fn observe(&mut self, obs: Observation) {
        let Observation { account, timestamp } = obs;
        let slot = match self.index.get(&account) {
            Some(&slot) => slot,
            None => {
                let slot = self.records.len();
                tracing::debug!(account = %account, "new account");
                self.index.insert(account.clone(), slot);
                self.records.push(AccountRecord::new(account));
                slot
            }
        };
        self.records[slot].timestamps.push(timestamp);
    }

    /// Number of distinct accounts.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, account: &str) -> Option<&AccountRecord> {
        self.index.get(account).map(|&slot| &self.records[slot])
    }

    /// Records in first-seen order.
    pub fn records(&self) -> &[AccountRecord] {
        &self.records
    }

    /// Sum of hits across all accounts.
    pub fn total_hits(&self) -> u64 {
        self.records.iter().map(AccountRecord::hits).sum()
    }
}
