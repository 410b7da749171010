//! Canonical entities shared by every exchange.
//!
//! All financial numbers are [`Precise`](crate::precise::Precise) and serialize as
//! decimal strings. Fields an exchange does not report are `None` and serialize as
//! `null`; building an entity never fails because a field is missing.

mod account;
mod common;
mod market;
mod trading;

pub use account::{BalanceAccount, Balances, LedgerEntry, Transaction};
pub use common::{Fee, LedgerDirection, MarketType, MinMax, OrderSide, TakerOrMaker};
pub use market::{Currency, CurrencyLimits, CurrencyNetwork, Market, MarketLimits, MarketPrecision};
pub use trading::{Order, Ticker, Trade};
