//! Balances, deposits/withdrawals and ledger entries.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_with::{DefaultOnNull, serde_as};

use crate::precise::Precise;
use crate::types::{Fee, LedgerDirection};

/// Holdings of one currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAccount {
    /// Available for trading
    pub free: Option<Precise>,
    /// Locked in orders or positions
    pub used: Option<Precise>,
    /// `free + used`
    pub total: Option<Precise>,
}

impl BalanceAccount {
    pub fn new(free: Option<Precise>, used: Option<Precise>, total: Option<Precise>) -> Self {
        Self { free, used, total }
    }
}

/// Account balances keyed by unified currency code.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Balances {
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    #[serde_as(as = "DefaultOnNull")]
    pub currencies: BTreeMap<String, BalanceAccount>,
    pub info: Value,
}

impl Balances {
    pub fn get(&self, code: &str) -> Option<&BalanceAccount> {
        self.currencies.get(code)
    }

    pub fn insert(&mut self, code: impl Into<String>, account: BalanceAccount) {
        self.currencies.insert(code.into(), account);
    }

    /// Free amount per currency.
    pub fn free(&self) -> BTreeMap<String, Option<Precise>> {
        self.view(|a| a.free.clone())
    }

    pub fn used(&self) -> BTreeMap<String, Option<Precise>> {
        self.view(|a| a.used.clone())
    }

    pub fn total(&self) -> BTreeMap<String, Option<Precise>> {
        self.view(|a| a.total.clone())
    }

    fn view(&self, pick: impl Fn(&BalanceAccount) -> Option<Precise>) -> BTreeMap<String, Option<Precise>> {
        self.currencies
            .iter()
            .map(|(code, account)| (code.clone(), pick(account)))
            .collect()
    }
}

/// A deposit or withdrawal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub id: Option<String>,
    /// On-chain transaction hash
    pub txid: Option<String>,
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<Precise>,
    pub network: Option<String>,
    pub address: Option<String>,
    pub tag: Option<String>,
    /// `deposit` or `withdrawal`
    #[serde(rename = "type")]
    pub transaction_type: Option<String>,
    /// `pending`, `ok`, `failed`, `canceled`, or the raw value
    pub status: Option<String>,
    /// Last status change, epoch milliseconds
    pub updated: Option<i64>,
    pub fee: Option<Fee>,
    pub info: Value,
}

/// A movement in the account ledger.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: Option<String>,
    pub timestamp: Option<i64>,
    pub datetime: Option<String>,
    pub direction: Option<LedgerDirection>,
    pub account: Option<String>,
    /// Id of the order, trade or transaction that caused the entry
    pub reference_id: Option<String>,
    pub currency: Option<String>,
    /// Always non-negative; `direction` carries the sign
    pub amount: Option<Precise>,
    pub before: Option<Precise>,
    pub after: Option<Precise>,
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub status: Option<String>,
    pub fee: Option<Fee>,
    pub info: Value,
}
