use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub message: Value,
}

/// FIFO of recent messages, oldest evicted first once `limit` is reached.
/// Diagnostic only.
#[derive(Debug)]
pub struct BoundedHistory {
    limit: usize,
    entries: Mutex<VecDeque<HistoryEntry>>,
}

impl BoundedHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: Mutex::new(VecDeque::with_capacity(limit.min(1024))),
        }
    }

    pub fn push(&self, message: Value) {
        if self.limit == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        while entries.len() >= self.limit {
            entries.pop_front();
        }
        entries.push_back(HistoryEntry {
            timestamp: Utc::now(),
            message,
        });
    }

    /// Copy of the current entries, oldest first.
    pub fn entries(&self) -> Vec<HistoryEntry> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_evicts_oldest() {
        let h = BoundedHistory::new(3);
        for i in 0..5 {
            h.push(json!(i));
        }
        let kept: Vec<Value> = h.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(kept, vec![json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn test_zero_limit_keeps_nothing() {
        let h = BoundedHistory::new(0);
        h.push(json!("x"));
        assert!(h.is_empty());
    }
}
