//! Translation of exchange status and type strings to unified values.
//!
//! Lookups are exact. A value the table does not know passes through unchanged,
//! so a new exchange status shows up in the output instead of failing the parse.

use std::collections::HashMap;

/// Exact-match translation table with identity fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusTable {
    entries: HashMap<String, String>,
}

impl StatusTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a mapping.
    pub fn with(mut self, raw: impl Into<String>, unified: impl Into<String>) -> Self {
        self.entries.insert(raw.into(), unified.into());
        self
    }

    /// The unified value for `raw`, or `raw` itself when unknown.
    pub fn translate<'a>(&'a self, raw: &'a str) -> &'a str {
        self.entries.get(raw).map(String::as_str).unwrap_or(raw)
    }

    pub fn translate_opt(&self, raw: Option<&str>) -> Option<String> {
        raw.map(|r| self.translate(r).to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Common spellings of order states across exchanges.
    pub fn order_status() -> Self {
        [
            ("NEW", "open"),
            ("new", "open"),
            ("OPEN", "open"),
            ("active", "open"),
            ("live", "open"),
            ("PARTIALLY_FILLED", "open"),
            ("partially_filled", "open"),
            ("partial-filled", "open"),
            ("pending", "open"),
            ("FILLED", "closed"),
            ("filled", "closed"),
            ("done", "closed"),
            ("CANCELED", "canceled"),
            ("CANCELLED", "canceled"),
            ("cancelled", "canceled"),
            ("PENDING_CANCEL", "canceled"),
            ("partial-canceled", "canceled"),
            ("EXPIRED", "expired"),
            ("EXPIRED_IN_MATCH", "expired"),
            ("REJECTED", "rejected"),
        ]
        .into_iter()
        .collect()
    }

    /// Deposit and withdrawal states.
    pub fn transaction_status() -> Self {
        [
            ("PENDING", "pending"),
            ("processing", "pending"),
            ("confirming", "pending"),
            ("wait_confirm", "pending"),
            ("SUCCESS", "ok"),
            ("success", "ok"),
            ("completed", "ok"),
            ("complete", "ok"),
            ("done", "ok"),
            ("confirmed", "ok"),
            ("FAILED", "failed"),
            ("fail", "failed"),
            ("rejected", "failed"),
            ("CANCELED", "canceled"),
            ("CANCELLED", "canceled"),
            ("cancelled", "canceled"),
        ]
        .into_iter()
        .collect()
    }

    /// Ledger entry types.
    pub fn ledger_entry_type() -> Self {
        [
            ("TRADE", "trade"),
            ("match", "trade"),
            ("FEE", "fee"),
            ("COMMISSION", "fee"),
            ("commission", "fee"),
            ("TRANSFER", "transfer"),
            ("DEPOSIT", "transaction"),
            ("deposit", "transaction"),
            ("WITHDRAW", "transaction"),
            ("withdrawal", "transaction"),
            ("FUNDING_FEE", "fee"),
            ("funding", "fee"),
            ("REBATE", "rebate"),
            ("CASHBACK", "cashback"),
            ("rollover", "fee"),
        ]
        .into_iter()
        .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StatusTable {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(raw, unified)| (raw.into(), unified.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values_translate() {
        let table = StatusTable::order_status();
        assert_eq!(table.translate("NEW"), "open");
        assert_eq!(table.translate("FILLED"), "closed");
        assert_eq!(table.translate("cancelled"), "canceled");
    }

    #[test]
    fn test_unknown_values_pass_through() {
        let table = StatusTable::order_status();
        assert_eq!(table.translate("AWAITING_TRIGGER"), "AWAITING_TRIGGER");
        assert_eq!(table.translate_opt(Some("weird")).as_deref(), Some("weird"));
        assert_eq!(table.translate_opt(None), None);
        assert_eq!(StatusTable::new().translate("x"), "x");
    }

    #[test]
    fn test_exchange_overrides() {
        let table = StatusTable::transaction_status().with("3", "ok").with("success", "done");
        assert_eq!(table.translate("3"), "ok");
        assert_eq!(table.translate("success"), "done");
        assert_eq!(StatusTable::ledger_entry_type().translate("match"), "trade");
    }
}
