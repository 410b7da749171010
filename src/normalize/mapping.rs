//! Field mappings from raw exchange JSON to canonical entities.
//!
//! An exchange configuration lists, for each canonical field, the raw keys that
//! may hold it. Keys are tried in order and the first present one wins; a field
//! with no mapping is looked up under its canonical name.
//!
//! ```rust
//! use exchange_api_core::normalize::{FieldMap, parse_ticker};
//! use serde_json::json;
//!
//! let map = FieldMap::new()
//!     .field("last", ["lastPrice", "c"])
//!     .field("baseVolume", ["volume"]);
//! let ticker = parse_ticker(&json!({"lastPrice": "101.5", "volume": "3"}), &map, None);
//! assert_eq!(ticker.last.unwrap().to_string(), "101.5");
//! assert!(ticker.bid.is_none());
//! ```

use std::collections::HashMap;

use serde_json::Value;

use crate::normalize::accessors::{
    safe_bool_n, safe_integer_n, safe_number_n, safe_string_n, safe_timestamp_n,
};
use crate::normalize::builders::{safe_order, safe_ticker, safe_trade};
use crate::normalize::status::StatusTable;
use crate::precise::Precise;
use crate::types::{Fee, Market, Order, OrderSide, TakerOrMaker, Ticker, Trade};

/// How raw timestamps are expressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampUnit {
    #[default]
    Milliseconds,
    Seconds,
}

/// Canonical field name → ordered raw keys.
#[derive(Debug, Clone, Default)]
pub struct FieldMap {
    fields: HashMap<String, Vec<String>>,
    timestamp_unit: TimestampUnit,
}

impl FieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map a canonical field to the raw keys that may carry it.
    pub fn field<I, S>(mut self, canonical: &str, raw_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields
            .insert(canonical.to_string(), raw_keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn timestamp_unit(mut self, unit: TimestampUnit) -> Self {
        self.timestamp_unit = unit;
        self
    }

    fn keys<'a>(&'a self, canonical: &'a str) -> Vec<&'a str> {
        match self.fields.get(canonical) {
            Some(keys) => keys.iter().map(String::as_str).collect(),
            None => vec![canonical],
        }
    }

    pub fn string(&self, raw: &Value, canonical: &str) -> Option<String> {
        safe_string_n(raw, self.keys(canonical))
    }

    pub fn number(&self, raw: &Value, canonical: &str) -> Option<Precise> {
        safe_number_n(raw, self.keys(canonical))
    }

    pub fn bool(&self, raw: &Value, canonical: &str) -> Option<bool> {
        safe_bool_n(raw, self.keys(canonical))
    }

    /// A timestamp field, converted to epoch milliseconds.
    pub fn timestamp(&self, raw: &Value, canonical: &str) -> Option<i64> {
        match self.timestamp_unit {
            TimestampUnit::Milliseconds => safe_integer_n(raw, self.keys(canonical)),
            TimestampUnit::Seconds => safe_timestamp_n(raw, self.keys(canonical)),
        }
    }

    fn fee(&self, raw: &Value, market: Option<&Market>) -> Option<Fee> {
        let cost = self.number(raw, "fee")?;
        Some(Fee {
            currency: self
                .string(raw, "feeCurrency")
                .or_else(|| market.map(|m| m.quote.clone())),
            cost: Some(cost),
            rate: self.number(raw, "feeRate"),
        })
    }

    fn symbol(&self, raw: &Value, market: Option<&Market>) -> Option<String> {
        market
            .map(|m| m.symbol.clone())
            .or_else(|| self.string(raw, "symbol"))
    }
}

/// Build a [`Ticker`] from raw JSON and run [`safe_ticker`] on it.
pub fn parse_ticker(raw: &Value, map: &FieldMap, market: Option<&Market>) -> Ticker {
    let ticker = Ticker {
        symbol: map.symbol(raw, market),
        timestamp: map.timestamp(raw, "timestamp"),
        datetime: None,
        high: map.number(raw, "high"),
        low: map.number(raw, "low"),
        bid: map.number(raw, "bid"),
        bid_volume: map.number(raw, "bidVolume"),
        ask: map.number(raw, "ask"),
        ask_volume: map.number(raw, "askVolume"),
        vwap: map.number(raw, "vwap"),
        open: map.number(raw, "open"),
        close: map.number(raw, "close"),
        last: map.number(raw, "last"),
        previous_close: map.number(raw, "previousClose"),
        change: map.number(raw, "change"),
        percentage: map.number(raw, "percentage"),
        average: map.number(raw, "average"),
        base_volume: map.number(raw, "baseVolume"),
        quote_volume: map.number(raw, "quoteVolume"),
        info: raw.clone(),
    };
    safe_ticker(ticker, market)
}

/// Build a [`Trade`] from raw JSON and run [`safe_trade`] on it.
pub fn parse_trade(raw: &Value, map: &FieldMap, market: Option<&Market>) -> Trade {
    let trade = Trade {
        id: map.string(raw, "id"),
        order: map.string(raw, "order"),
        timestamp: map.timestamp(raw, "timestamp"),
        datetime: None,
        symbol: map.symbol(raw, market),
        order_type: map.string(raw, "type"),
        side: map.string(raw, "side").as_deref().and_then(OrderSide::parse),
        taker_or_maker: map
            .string(raw, "takerOrMaker")
            .as_deref()
            .and_then(TakerOrMaker::parse),
        price: map.number(raw, "price"),
        amount: map.number(raw, "amount"),
        cost: map.number(raw, "cost"),
        fee: map.fee(raw, market),
        fees: Vec::new(),
        info: raw.clone(),
    };
    safe_trade(trade, market)
}

/// Build an [`Order`] from raw JSON, translating its status, and run
/// [`safe_order`] on it. Raw fills under the `trades` field are parsed with the
/// same map.
pub fn parse_order(
    raw: &Value,
    map: &FieldMap,
    statuses: &StatusTable,
    market: Option<&Market>,
) -> Order {
    let trades = map
        .keys("trades")
        .into_iter()
        .find_map(|key| raw.get(key).and_then(Value::as_array))
        .map(|fills| fills.iter().map(|t| parse_trade(t, map, market)).collect())
        .unwrap_or_default();
    let order = Order {
        id: map.string(raw, "id"),
        client_order_id: map.string(raw, "clientOrderId"),
        timestamp: map.timestamp(raw, "timestamp"),
        datetime: None,
        last_trade_timestamp: map.timestamp(raw, "lastTradeTimestamp"),
        symbol: map.symbol(raw, market),
        order_type: map.string(raw, "type").map(|t| t.to_lowercase()),
        time_in_force: map.string(raw, "timeInForce").map(|t| t.to_uppercase()),
        post_only: map.bool(raw, "postOnly"),
        side: map.string(raw, "side").as_deref().and_then(OrderSide::parse),
        price: map.number(raw, "price"),
        average: map.number(raw, "average"),
        amount: map.number(raw, "amount"),
        filled: map.number(raw, "filled"),
        remaining: map.number(raw, "remaining"),
        cost: map.number(raw, "cost"),
        status: statuses.translate_opt(map.string(raw, "status").as_deref()),
        fee: map.fee(raw, market),
        fees: Vec::new(),
        trades,
        info: raw.clone(),
    };
    safe_order(order, market)
}
