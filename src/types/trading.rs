//! Market data and order entities.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnNull, serde_as};

use crate::precise::Precise;
use crate::types::{Fee, OrderSide, TakerOrMaker};

/// A 24h ticker.
///
/// Missing fields are `None` and serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Ticker {
    pub symbol: Option<String>,
    /// Epoch milliseconds
    pub timestamp: Option<i64>,
    /// ISO 8601 rendering of `timestamp`
    pub datetime: Option<String>,
    pub high: Option<Precise>,
    pub low: Option<Precise>,
    pub bid: Option<Precise>,
    pub bid_volume: Option<Precise>,
    pub ask: Option<Precise>,
    pub ask_volume: Option<Precise>,
    pub vwap: Option<Precise>,
    pub open: Option<Precise>,
    pub close: Option<Precise>,
    pub last: Option<Precise>,
    pub previous_close: Option<Precise>,
    pub change: Option<Precise>,
    /// Percent change from `open`, e.g. `2.5` for +2.5%
    pub percentage: Option<Precise>,
    pub average: Option<Precise>,
    pub base_volume: Option<Precise>,
    pub quote_volume: Option<Precise>,
    pub info: Value,
}

/// A single fill.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Trade {
    pub id: Option<String>,
    /// Id of the order this fill belongs to
    pub order: Option<String>,
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    pub side: Option<OrderSide>,
    pub taker_or_maker: Option<TakerOrMaker>,
    pub price: Option<Precise>,
    pub amount: Option<Precise>,
    pub cost: Option<Precise>,
    pub fee: Option<Fee>,
    #[serde_as(as = "DefaultOnNull")]
    pub fees: Vec<Fee>,
    pub info: Value,
}

/// An order as reported by the exchange.
///
/// `status` holds the unified status (`open`, `closed`, `canceled`, `expired`,
/// `rejected`) or, when the exchange's value is unknown, the raw value unchanged.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Order {
    pub id: Option<String>,
    pub client_order_id: Option<String>,
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub last_trade_timestamp: Option<i64>,
    pub symbol: Option<String>,
    #[serde(rename = "type")]
    pub order_type: Option<String>,
    pub time_in_force: Option<String>,
    pub post_only: Option<bool>,
    pub side: Option<OrderSide>,
    pub price: Option<Precise>,
    pub average: Option<Precise>,
    pub amount: Option<Precise>,
    pub filled: Option<Precise>,
    pub remaining: Option<Precise>,
    pub cost: Option<Precise>,
    pub status: Option<String>,
    pub fee: Option<Fee>,
    #[serde_as(as = "DefaultOnNull")]
    pub fees: Vec<Fee>,
    #[serde_as(as = "DefaultOnNull")]
    pub trades: Vec<Trade>,
    pub info: Value,
}
