//! Response normalization.
//!
//! Turns arbitrary exchange JSON into the canonical entities of [`crate::types`]:
//!
//! - `safe_*` accessors: lookups that never fail
//! - builders (`safe_ticker`, `safe_order`, ...) that derive missing fields
//! - [`FieldMap`] for configuration-driven parsing of tickers, trades and orders
//! - [`StatusTable`] for status and type translation
//! - precision helpers for order amounts and prices
//!
//! ```rust
//! use exchange_api_core::normalize::{FieldMap, StatusTable, parse_order};
//! use serde_json::json;
//!
//! let map = FieldMap::new().field("amount", ["origQty"]).field("filled", ["executedQty"]);
//! let raw = json!({"origQty": "2", "executedQty": "0.5", "status": "NEW"});
//! let order = parse_order(&raw, &map, &StatusTable::order_status(), None);
//! assert_eq!(order.remaining.unwrap().to_string(), "1.5");
//! assert_eq!(order.status.as_deref(), Some("open"));
//! ```

mod accessors;
mod builders;
mod mapping;
mod precision;
mod status;
pub mod time;

pub use accessors::{
    safe_bool, safe_bool_2, safe_bool_n, safe_dict, safe_dict_2, safe_integer, safe_integer_2,
    safe_integer_n, safe_integer_product, safe_list, safe_list_2, safe_number, safe_number_2,
    safe_number_n, safe_string, safe_string_2, safe_string_lower, safe_string_lower_2,
    safe_string_n, safe_string_upper, safe_string_upper_2, safe_timestamp, safe_timestamp_2,
    safe_timestamp_n, safe_value, safe_value_2, safe_value_n,
};
pub use builders::{
    reduce_fees_by_currency, safe_balance, safe_currency_structure, safe_ledger_entry,
    safe_market, safe_order, safe_ticker, safe_trade, safe_transaction,
};
pub use mapping::{FieldMap, TimestampUnit, parse_order, parse_ticker, parse_trade};
pub use precision::{amount_to_precision, cost_to_precision, price_to_precision};
pub use status::StatusTable;
pub use time::{iso8601, parse8601};

use crate::markets::MarketTable;
use crate::types::{LedgerEntry, Order, Ticker, Trade, Transaction};

/// Legacy tickers that exchanges still use for well-known currencies.
pub fn common_currency_code(code: &str) -> String {
    match code {
        "XBT" => "BTC",
        "BCC" => "BCH",
        "BCHABC" => "BCH",
        "BCHSV" => "BSV",
        "DRK" => "DASH",
        other => other,
    }
    .to_string()
}

/// Unified currency code for a raw currency id.
///
/// With a market table, ids it knows map to their codes. Everything else is
/// upper-cased and passed through [`common_currency_code`].
pub fn safe_currency_code(currency_id: Option<&str>, markets: Option<&MarketTable>) -> Option<String> {
    let id = currency_id.filter(|id| !id.is_empty())?;
    Some(match markets {
        Some(table) => table.safe_currency_code(id),
        None => common_currency_code(&id.to_uppercase()),
    })
}

/// Entities carrying an epoch-millisecond timestamp.
pub trait Timestamped {
    fn timestamp(&self) -> Option<i64>;
}

macro_rules! timestamped {
    ($($entity:ty),*) => {
        $(impl Timestamped for $entity {
            fn timestamp(&self) -> Option<i64> {
                self.timestamp
            }
        })*
    };
}

timestamped!(Ticker, Trade, Order, Transaction, LedgerEntry);

/// Sort by timestamp, keep entries at or after `since`, then cap at `limit`.
///
/// `tail` keeps the newest `limit` entries instead of the oldest. Entries without
/// a timestamp sort first and are dropped when `since` is set.
pub fn filter_by_since_limit<T: Timestamped>(
    mut items: Vec<T>,
    since: Option<i64>,
    limit: Option<usize>,
    tail: bool,
) -> Vec<T> {
    items.sort_by_key(|item| item.timestamp());
    if let Some(since) = since {
        items.retain(|item| item.timestamp().is_some_and(|ts| ts >= since));
    }
    if let Some(limit) = limit {
        if items.len() > limit {
            if tail {
                items.drain(..items.len() - limit);
            } else {
                items.truncate(limit);
            }
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(ts: Option<i64>) -> Trade {
        Trade {
            timestamp: ts,
            ..Trade::default()
        }
    }

    #[test]
    fn test_common_currency_code() {
        assert_eq!(common_currency_code("XBT"), "BTC");
        assert_eq!(common_currency_code("BCC"), "BCH");
        assert_eq!(common_currency_code("ETH"), "ETH");
        assert_eq!(safe_currency_code(Some("xbt"), None).as_deref(), Some("BTC"));
        assert_eq!(safe_currency_code(Some(""), None), None);
        assert_eq!(safe_currency_code(None, None), None);
    }

    #[test]
    fn test_filter_by_since_limit() {
        let trades = vec![trade(Some(30)), trade(None), trade(Some(10)), trade(Some(20))];

        let kept = filter_by_since_limit(trades.clone(), Some(15), None, false);
        assert_eq!(kept.iter().map(|t| t.timestamp).collect::<Vec<_>>(), [Some(20), Some(30)]);

        let head = filter_by_since_limit(trades.clone(), None, Some(2), false);
        assert_eq!(head.iter().map(|t| t.timestamp).collect::<Vec<_>>(), [None, Some(10)]);

        let tail = filter_by_since_limit(trades, None, Some(2), true);
        assert_eq!(tail.iter().map(|t| t.timestamp).collect::<Vec<_>>(), [Some(20), Some(30)]);
    }
}
