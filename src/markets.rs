//! Market and currency cache.
//!
//! Markets are loaded once per session and read on every call, so the cache is
//! read-mostly: readers clone an `Arc<MarketTable>` and keep a consistent view
//! for as long as they hold it. A reload builds a complete new table and swaps the
//! reference in one step, so nobody ever observes a half-written table.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ExchangeError;
use crate::normalize::{common_currency_code, safe_currency_structure, safe_market};
use crate::precise::Precise;
use crate::types::{Currency, Market, MarketType};

/// An immutable snapshot of markets and currencies.
#[derive(Debug, Clone, Default)]
pub struct MarketTable {
    markets: BTreeMap<String, Market>,
    // Several markets may share an exchange id (spot and margin); spot comes first.
    markets_by_id: BTreeMap<String, Vec<String>>,
    currencies: BTreeMap<String, Currency>,
    currencies_by_id: BTreeMap<String, String>,
    loaded: bool,
}

impl MarketTable {
    /// Build a table. When `currencies` is `None` they are derived from the
    /// markets' base and quote codes.
    pub fn new(markets: Vec<Market>, currencies: Option<Vec<Currency>>) -> Self {
        let mut markets: Vec<Market> = markets.into_iter().map(safe_market).collect();
        // Stable sort keeps input order among non-spot markets.
        markets.sort_by_key(|m| m.market_type != MarketType::Spot);

        let mut table = Self {
            loaded: true,
            ..Self::default()
        };
        for market in markets {
            table
                .markets_by_id
                .entry(market.id.clone())
                .or_default()
                .push(market.symbol.clone());
            table.markets.insert(market.symbol.clone(), market);
        }

        let currencies = currencies.unwrap_or_else(|| derive_currencies(table.markets.values()));
        for currency in currencies {
            let currency = safe_currency_structure(currency);
            table
                .currencies_by_id
                .insert(currency.id.clone(), currency.code.clone());
            table.currencies.insert(currency.code.clone(), currency);
        }
        table
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Market by unified symbol.
    pub fn market(&self, symbol: &str) -> Result<&Market, ExchangeError> {
        if !self.loaded {
            return Err(ExchangeError::Config(
                "markets not loaded, call load_markets() first".to_string(),
            ));
        }
        self.markets
            .get(symbol)
            .ok_or_else(|| ExchangeError::BadSymbol(symbol.to_string()))
    }

    /// Market by exchange id, preferring the spot market when ids collide.
    pub fn market_by_id(&self, id: &str) -> Option<&Market> {
        self.markets_by_id
            .get(id)
            .and_then(|symbols| symbols.first())
            .and_then(|symbol| self.markets.get(symbol))
    }

    /// Unified symbol for a raw market id.
    ///
    /// Unknown ids come back unchanged, or as `BASE/QUOTE` when a delimiter is given
    /// and splits the id in two.
    pub fn safe_symbol(&self, market_id: &str, delimiter: Option<&str>) -> String {
        if let Some(market) = self.market_by_id(market_id) {
            return market.symbol.clone();
        }
        if let Some(delimiter) = delimiter {
            if let Some((base, quote)) = market_id.split_once(delimiter) {
                if !base.is_empty() && !quote.is_empty() {
                    return format!(
                        "{}/{}",
                        self.safe_currency_code(base),
                        self.safe_currency_code(quote)
                    );
                }
            }
        }
        market_id.to_string()
    }

    pub fn currency(&self, code: &str) -> Option<&Currency> {
        self.currencies.get(code)
    }

    /// Unified code for a raw currency id: a known id maps to its code, anything
    /// else goes through
    /// [`common_currency_code`](crate::normalize::common_currency_code).
    pub fn safe_currency_code(&self, currency_id: &str) -> String {
        match self.currencies_by_id.get(currency_id) {
            Some(code) => code.clone(),
            None => common_currency_code(&currency_id.to_uppercase()),
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.markets.keys().map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.markets_by_id.keys().map(String::as_str)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.currencies.keys().map(String::as_str)
    }

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values()
    }

    pub fn len(&self) -> usize {
        self.markets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markets.is_empty()
    }
}

// One currency per code; the finest precision among the markets quoting it wins.
fn derive_currencies<'a>(markets: impl Iterator<Item = &'a Market>) -> Vec<Currency> {
    let mut by_code: BTreeMap<String, Currency> = BTreeMap::new();
    for market in markets {
        let sides = [
            (&market.base_id, &market.base, &market.precision.amount),
            (&market.quote_id, &market.quote, &market.precision.price),
        ];
        for (id, code, precision) in sides {
            if code.is_empty() {
                continue;
            }
            let candidate = Currency {
                id: if id.is_empty() { code.clone() } else { id.clone() },
                code: code.clone(),
                precision: precision.clone(),
                ..Currency::default()
            };
            match by_code.get_mut(code) {
                Some(existing) => {
                    if finer(&candidate.precision, &existing.precision) {
                        existing.precision = candidate.precision;
                    }
                }
                None => {
                    by_code.insert(code.clone(), candidate);
                }
            }
        }
    }
    by_code.into_values().collect()
}

fn finer(candidate: &Option<Precise>, current: &Option<Precise>) -> bool {
    match (candidate, current) {
        (Some(c), Some(e)) => c < e,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Session-wide market cache with serialized loading.
#[derive(Debug, Default)]
pub struct MarketCache {
    table: RwLock<Arc<MarketTable>>,
    loading: Mutex<()>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current table. Cheap; holds no lock after returning.
    pub fn snapshot(&self) -> Arc<MarketTable> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot().is_loaded()
    }

    /// Replace the table.
    pub fn set_markets(&self, markets: Vec<Market>, currencies: Option<Vec<Currency>>) -> Arc<MarketTable> {
        let table = Arc::new(MarketTable::new(markets, currencies));
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&table);
        info!(
            markets = table.len(),
            currencies = table.currencies.len(),
            "markets loaded"
        );
        table
    }

    /// Load markets through `loader` unless they are already loaded.
    ///
    /// Concurrent callers wait for one load instead of each calling the loader.
    pub async fn load_markets<F, Fut>(&self, reload: bool, loader: F) -> Result<Arc<MarketTable>, ExchangeError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(Vec<Market>, Option<Vec<Currency>>), ExchangeError>>,
    {
        let _loading = self.loading.lock().await;
        let current = self.snapshot();
        if current.is_loaded() && !reload {
            debug!(markets = current.len(), "using cached markets");
            return Ok(current);
        }
        let (markets, currencies) = loader().await?;
        Ok(self.set_markets(markets, currencies))
    }

    /// Market by unified symbol, cloned out of the current table.
    pub fn market(&self, symbol: &str) -> Result<Market, ExchangeError> {
        self.snapshot().market(symbol).cloned()
    }
}
