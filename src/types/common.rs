//! Small enums and value types shared by the canonical entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::precise::Precise;

/// Buy or sell side of an order or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Recognize the spellings exchanges use for a side (`BUY`, `bid`, `long`...).
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" | "bid" | "b" | "long" => Some(OrderSide::Buy),
            "sell" | "ask" | "s" | "short" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Liquidity role of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TakerOrMaker {
    Taker,
    Maker,
}

impl TakerOrMaker {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "taker" | "t" => Some(TakerOrMaker::Taker),
            "maker" | "m" => Some(TakerOrMaker::Maker),
            _ => None,
        }
    }
}

/// Direction of a ledger entry relative to the account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerDirection {
    /// Credit
    In,
    /// Debit
    Out,
}

impl LedgerDirection {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "in" | "credit" | "deposit" => Some(LedgerDirection::In),
            "out" | "debit" | "withdrawal" => Some(LedgerDirection::Out),
            _ => None,
        }
    }
}

/// Kind of instrument a market trades.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketType {
    #[default]
    Spot,
    Margin,
    Swap,
    Future,
    Option,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketType::Spot => "spot",
            MarketType::Margin => "margin",
            MarketType::Swap => "swap",
            MarketType::Future => "future",
            MarketType::Option => "option",
        };
        write!(f, "{}", s)
    }
}

/// A fee charged on an order, trade, transfer or ledger entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub currency: Option<String>,
    pub cost: Option<Precise>,
    pub rate: Option<Precise>,
}

/// Inclusive bounds; either side may be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    pub min: Option<Precise>,
    pub max: Option<Precise>,
}

impl MinMax {
    pub fn new(min: Option<Precise>, max: Option<Precise>) -> Self {
        Self { min, max }
    }

    /// Whether `value` lies within the known bounds.
    pub fn contains(&self, value: &Precise) -> bool {
        self.min.as_ref().is_none_or(|min| value >= min)
            && self.max.as_ref().is_none_or(|max| value <= max)
    }
}
