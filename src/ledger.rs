//! Capped, recent-first record of action invocations.
//!
//! New entries are pushed to the front; once the cap is exceeded the oldest
//! entry (the back) is evicted. Entries are never modified after insertion.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;

use crate::action::{ActionHistoryEntry, ActionType, NewActionEntry};

/// Number of entries kept when no cap is configured.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Number of entries returned by [`ActionLedger::recent_history`] when the
/// caller does not pass a limit.
pub const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Debug, Clone)]
pub struct ActionLedger {
    entries: VecDeque<ActionHistoryEntry>,
    max_entries: usize,
}

/// Per-action totals for the stats view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ActionSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl Default for ActionLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

impl ActionLedger {
    /// Create an empty ledger. A cap of 0 is raised to 1.
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(1024)),
            max_entries,
        }
    }

    /// Rebuild a ledger from previously persisted entries (recent-first).
    /// Anything beyond the cap is dropped from the old end.
    pub fn from_entries(entries: Vec<ActionHistoryEntry>, max_entries: usize) -> Self {
        let mut ledger = Self::new(max_entries);
        ledger.entries = entries.into();
        ledger.entries.truncate(ledger.max_entries);
        ledger
    }

    /// Record an invocation. Always succeeds.
    pub fn add_entry(&mut self, entry: NewActionEntry) -> &ActionHistoryEntry {
        let entry = ActionHistoryEntry::stamp(entry);
        tracing::debug!(
            id = %entry.id(),
            product_id = %entry.product_id(),
            action = %entry.action_type(),
            success = entry.success(),
            "ledger entry added"
        );
        self.entries.push_front(entry);
        while self.entries.len() > self.max_entries {
            if let Some(evicted) = self.entries.pop_back() {
                tracing::trace!(id = %evicted.id(), "ledger entry evicted");
            }
        }
        &self.entries[0]
    }

    /// Entries for one product, most recent first.
    pub fn history_by_product<'a>(
        &'a self,
        product_id: &'a str,
    ) -> impl Iterator<Item = &'a ActionHistoryEntry> + 'a {
        self.entries.iter().filter(move |e| e.product_id() == product_id)
    }

    /// At most `limit` entries across all products, most recent first.
    pub fn recent_history(&self, limit: Option<usize>) -> Vec<&ActionHistoryEntry> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT);
        self.entries.iter().take(limit).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// All entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &ActionHistoryEntry> {
        self.entries.iter()
    }

    /// Fraction of successful entries, optionally restricted to one product.
    /// `None` when there is nothing to measure.
    pub fn success_rate(&self, product_id: Option<&str>) -> Option<f64> {
        let (total, ok) = self
            .entries
            .iter()
            .filter(|e| product_id.map_or(true, |pid| e.product_id() == pid))
            .fold((0usize, 0usize), |(t, s), e| (t + 1, s + usize::from(e.success())));
        if total == 0 {
            None
        } else {
            Some(ok as f64 / total as f64)
        }
    }

    /// Totals grouped by action type, for the actions that appear in the ledger.
    pub fn count_by_action(&self) -> BTreeMap<ActionType, ActionSummary> {
        let mut out: BTreeMap<ActionType, ActionSummary> = BTreeMap::new();
        for e in &self.entries {
            let s = out.entry(e.action_type()).or_default();
            s.total += 1;
            if e.success() {
                s.succeeded += 1;
            } else {
                s.failed += 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(pid: &str, action: ActionType) -> NewActionEntry {
        NewActionEntry::success(pid, format!("Product {pid}"), action)
    }

    #[test]
    fn test_recent_history_is_most_recent_first() {
        let mut ledger = ActionLedger::new(10);
        let first = ledger.add_entry(ok("p1", ActionType::CopyInfo)).id().to_string();
        let second = ledger.add_entry(ok("p2", ActionType::CopyLink)).id().to_string();
        let third = ledger.add_entry(ok("p3", ActionType::Email)).id().to_string();

        let recent: Vec<_> = ledger.recent_history(Some(5)).iter().map(|e| e.id().to_string()).collect();
        assert_eq!(recent, vec![third, second, first]);
    }

    #[test]
    fn test_recent_history_returns_min_of_limit_and_count() {
        let mut ledger = ActionLedger::new(20);
        for i in 0..7 {
            ledger.add_entry(ok(&format!("p{i}"), ActionType::Tiktok));
        }
        assert_eq!(ledger.recent_history(Some(3)).len(), 3);
        assert_eq!(ledger.recent_history(Some(50)).len(), 7);
        assert_eq!(ledger.recent_history(Some(0)).len(), 0);
    }

    #[test]
    fn test_recent_history_default_limit() {
        let mut ledger = ActionLedger::new(80);
        for i in 0..60 {
            ledger.add_entry(ok(&format!("p{i}"), ActionType::Export));
        }
        assert_eq!(ledger.recent_history(None).len(), DEFAULT_RECENT_LIMIT);
    }

    #[test]
    fn test_exceeding_cap_evicts_exactly_the_oldest() {
        let mut ledger = ActionLedger::new(3);
        let oldest = ledger.add_entry(ok("p0", ActionType::Crm)).id().to_string();
        let kept: Vec<String> = (1..3)
            .map(|i| ledger.add_entry(ok(&format!("p{i}"), ActionType::Crm)).id().to_string())
            .collect();
        assert_eq!(ledger.len(), 3);

        ledger.add_entry(ok("p3", ActionType::Crm));
        assert_eq!(ledger.len(), 3);
        assert!(ledger.iter().all(|e| e.id() != oldest));
        for id in kept {
            assert!(ledger.iter().any(|e| e.id() == id));
        }
    }

    #[test]
    fn test_size_never_exceeds_cap() {
        let mut ledger = ActionLedger::new(5);
        for i in 0..40 {
            ledger.add_entry(ok(&format!("p{}", i % 4), ActionType::Youtube));
            assert!(ledger.len() <= 5);
        }
    }

    #[test]
    fn test_zero_cap_is_raised_to_one() {
        let mut ledger = ActionLedger::new(0);
        ledger.add_entry(ok("p1", ActionType::Schedule));
        ledger.add_entry(ok("p2", ActionType::Schedule));
        assert_eq!(ledger.max_entries(), 1);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.recent_history(None)[0].product_id(), "p2");
    }

    #[test]
    fn test_history_by_product_mixed_outcomes() {
        let mut ledger = ActionLedger::default();
        ledger.add_entry(ok("p1", ActionType::Whatsapp));
        ledger.add_entry(ok("p1", ActionType::Instagram));
        ledger.add_entry(NewActionEntry::failure("p1", "Product p1", ActionType::SellerBot, "bot offline"));
        ledger.add_entry(ok("p2", ActionType::Whatsapp));

        let p1: Vec<_> = ledger.history_by_product("p1").collect();
        assert_eq!(p1.len(), 3);
        assert!(p1.iter().all(|e| e.product_id() == "p1"));
        assert_eq!(p1[0].action_type(), ActionType::SellerBot);
        assert_eq!(p1[0].error_message(), Some("bot offline"));

        let recent = ledger.recent_history(Some(2));
        assert_eq!(recent[0].product_id(), "p2");
        assert_eq!(recent[1].action_type(), ActionType::SellerBot);

        assert_eq!(ledger.history_by_product("nope").count(), 0);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut ledger = ActionLedger::default();
        ledger.add_entry(ok("p1", ActionType::CopyInfo));
        ledger.clear();
        assert!(ledger.is_empty());
        ledger.clear();
        assert!(ledger.is_empty());
        assert!(ledger.recent_history(None).is_empty());
    }

    #[test]
    fn test_from_entries_truncates_to_cap() {
        let mut big = ActionLedger::new(10);
        for i in 0..10 {
            big.add_entry(ok(&format!("p{i}"), ActionType::Email));
        }
        let newest = big.recent_history(Some(1))[0].id().to_string();
        let restored = ActionLedger::from_entries(big.iter().cloned().collect(), 4);
        assert_eq!(restored.len(), 4);
        assert_eq!(restored.recent_history(Some(1))[0].id(), newest);
    }

    #[test]
    fn test_success_rate_and_counts() {
        let mut ledger = ActionLedger::default();
        assert_eq!(ledger.success_rate(None), None);

        ledger.add_entry(ok("p1", ActionType::Email));
        ledger.add_entry(NewActionEntry::failure("p1", "Product p1", ActionType::Email, "smtp"));
        ledger.add_entry(ok("p2", ActionType::Crm));
        ledger.add_entry(ok("p2", ActionType::Crm));

        assert_eq!(ledger.success_rate(Some("p1")), Some(0.5));
        assert_eq!(ledger.success_rate(Some("p2")), Some(1.0));
        assert_eq!(ledger.success_rate(None), Some(0.75));

        let counts = ledger.count_by_action();
        assert_eq!(
            counts[&ActionType::Email],
            ActionSummary { total: 2, succeeded: 1, failed: 1 }
        );
        assert_eq!(counts[&ActionType::Crm].total, 2);
        assert!(!counts.contains_key(&ActionType::Tiktok));
    }
}
