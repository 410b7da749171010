//! Market and currency definitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::precise::Precise;
use crate::types::{MarketType, MinMax};

/// Step sizes of a market. Each is a tick size such as `0.00001`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrecision {
    pub amount: Option<Precise>,
    pub price: Option<Precise>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketLimits {
    pub amount: MinMax,
    pub price: MinMax,
    pub cost: MinMax,
}

/// A tradable instrument.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Market {
    /// Exchange-specific id, e.g. `BTCUSDT` or `XXBTZUSD`
    pub id: String,
    /// Unified symbol, always `BASE/QUOTE`
    pub symbol: String,
    pub base: String,
    pub quote: String,
    pub base_id: String,
    pub quote_id: String,
    #[serde(rename = "type")]
    pub market_type: MarketType,
    pub active: Option<bool>,
    pub precision: MarketPrecision,
    pub limits: MarketLimits,
    pub taker: Option<Precise>,
    pub maker: Option<Precise>,
    pub info: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyLimits {
    pub amount: MinMax,
    pub withdraw: MinMax,
}

/// One deposit/withdrawal network of a currency.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyNetwork {
    pub id: String,
    pub network: String,
    pub active: Option<bool>,
    pub deposit: Option<bool>,
    pub withdraw: Option<bool>,
    pub fee: Option<Precise>,
    pub precision: Option<Precise>,
    pub limits: CurrencyLimits,
    pub info: Value,
}

/// A currency with its transfer capabilities.
///
/// `active`, `deposit` and `withdraw` left unknown at the top level are derived from
/// the networks; see [`crate::normalize::safe_currency_structure`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Currency {
    pub id: String,
    /// Unified code, e.g. `BTC`
    pub code: String,
    pub name: Option<String>,
    pub active: Option<bool>,
    pub deposit: Option<bool>,
    pub withdraw: Option<bool>,
    pub fee: Option<Precise>,
    pub precision: Option<Precise>,
    pub limits: CurrencyLimits,
    pub networks: BTreeMap<String, CurrencyNetwork>,
    pub info: Value,
}
