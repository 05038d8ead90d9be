//! Aggregation audit log for post-hoc analysis.
//!
//! Records which clients each round kept and dropped, so filtering
//! decisions can be reviewed after a training run.

use serde::{Deserialize, Serialize};

use crate::error::FedGuardError;

/// Metadata for a single aggregation round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationAuditEntry {
    /// Round number (0-indexed).
    pub round: usize,
    /// Number of client updates received.
    pub n_clients: usize,
    /// Indices of updates that entered the average.
    pub selected: Vec<usize>,
    /// Indices of updates filtered out.
    pub rejected: Vec<usize>,
    /// Aggregation method used.
    pub method: String,
}

/// Append-only audit log of aggregation rounds.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<AggregationAuditEntry>,
}

impl AuditLog {
    /// Create a new, empty audit log.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry to the log.
    pub fn push(&mut self, entry: AggregationAuditEntry) {
        self.entries.push(entry);
    }

    /// Get all entries.
    pub fn entries(&self) -> &[AggregationAuditEntry] {
        &self.entries
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<&AggregationAuditEntry> {
        self.entries.last()
    }

    /// Number of recorded rounds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many rounds rejected client `index`.
    pub fn rejection_count(&self, index: usize) -> usize {
        self.entries
            .iter()
            .filter(|e| e.rejected.contains(&index))
            .count()
    }

    /// Serialize the audit log to JSON.
    pub fn to_json(&self) -> Result<String, FedGuardError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(round: usize, rejected: Vec<usize>) -> AggregationAuditEntry {
        AggregationAuditEntry {
            round,
            n_clients: 6,
            selected: (0..6).filter(|i| !rejected.contains(i)).collect(),
            rejected,
            method: "bicotti".to_string(),
        }
    }

    #[test]
    fn test_audit_log_push_and_len() {
        let mut log = AuditLog::new();
        assert!(log.is_empty());

        log.push(entry(0, vec![5]));

        assert_eq!(log.len(), 1);
        assert!(!log.is_empty());
        assert_eq!(log.entries()[0].round, 0);
        assert_eq!(log.entries()[0].selected, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_rejection_count() {
        let mut log = AuditLog::new();
        log.push(entry(0, vec![5]));
        log.push(entry(1, vec![2, 5]));
        log.push(entry(2, vec![]));
        assert_eq!(log.rejection_count(5), 2);
        assert_eq!(log.rejection_count(2), 1);
        assert_eq!(log.rejection_count(0), 0);
        assert_eq!(log.last().unwrap().round, 2);
    }

    #[test]
    fn test_audit_entry_serde() {
        let e = entry(3, vec![1]);
        let json = serde_json::to_string(&e).unwrap();
        let restored: AggregationAuditEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, e);
    }

    #[test]
    fn test_log_to_json() {
        let mut log = AuditLog::new();
        log.push(entry(0, vec![4]));
        let json = log.to_json().unwrap();
        assert!(json.contains("bicotti"));
        let restored: AuditLog = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.entries(), log.entries());
    }
}
