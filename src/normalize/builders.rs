//! Canonical entity builders.
//!
//! Each builder takes a partially filled entity (fields the exchange did not
//! report are already `None`) and fills in what can be derived from the rest:
//! `symbol` from base/quote, `remaining` from amount and filled, `datetime` from
//! `timestamp`, and so on. Builders never fail and are idempotent: running one
//! on its own output changes nothing.

use crate::normalize::time::iso8601;
use crate::precise::{DEFAULT_DIV_PRECISION, Precise, RoundingMode};
use crate::types::{
    Balances, Currency, Fee, LedgerDirection, LedgerEntry, Market, Order, Ticker, Trade,
    Transaction,
};

fn div(a: &Precise, b: &Precise) -> Option<Precise> {
    a.div(b, DEFAULT_DIV_PRECISION, RoundingMode::Truncate).ok()
}

fn omit_zero(value: Option<Precise>) -> Option<Precise> {
    value.filter(|v| !v.is_zero())
}

fn datetime_of(datetime: Option<String>, timestamp: Option<i64>) -> Option<String> {
    datetime.or_else(|| timestamp.and_then(iso8601))
}

fn hundred() -> Precise {
    Precise::from(100)
}

/// `symbol = base/quote`; ids default to the codes.
pub fn safe_market(mut market: Market) -> Market {
    if market.base_id.is_empty() {
        market.base_id = market.base.clone();
    }
    if market.quote_id.is_empty() {
        market.quote_id = market.quote.clone();
    }
    if !market.base.is_empty() && !market.quote.is_empty() {
        market.symbol = format!("{}/{}", market.base, market.quote);
    }
    market
}

/// Fill derived ticker fields.
///
/// `close` and `last` stand in for each other; `change`, `average` and
/// `percentage` are derived from `open` and `last`; `vwap` is
/// `quote_volume / base_volume`. Zero prices are treated as unknown.
pub fn safe_ticker(mut ticker: Ticker, market: Option<&Market>) -> Ticker {
    let mut open = ticker.open.take();
    let mut close = ticker.close.take();
    let mut last = ticker.last.take();
    let mut change = ticker.change.take();
    let mut percentage = ticker.percentage.take();
    let mut average = ticker.average.take();
    let mut vwap = ticker.vwap.take();

    if vwap.is_none() {
        if let (Some(quote), Some(base)) = (&ticker.quote_volume, &ticker.base_volume) {
            vwap = div(quote, base);
        }
    }
    match (&last, &close) {
        (Some(l), None) => close = Some(l.clone()),
        (None, Some(c)) => last = Some(c.clone()),
        _ => {}
    }
    if let (Some(l), Some(o)) = (&last, &open) {
        if change.is_none() {
            change = Some(l - o);
        }
        if average.is_none() {
            average = div(&(l + o), &Precise::from(2));
        }
    }
    if percentage.is_none() {
        if let (Some(c), Some(o)) = (&change, &open) {
            if o > &Precise::zero() {
                percentage = div(c, o).map(|ratio| ratio * hundred());
            }
        }
    }
    if change.is_none() {
        if let (Some(p), Some(o)) = (&percentage, &open) {
            change = div(&(p * o), &hundred());
        }
    }
    if open.is_none() {
        if let (Some(l), Some(c)) = (&last, &change) {
            open = Some(l - c);
        }
    }

    ticker.open = omit_zero(open);
    ticker.close = omit_zero(close);
    ticker.last = omit_zero(last);
    ticker.change = change;
    ticker.percentage = percentage;
    ticker.average = omit_zero(average);
    ticker.vwap = omit_zero(vwap);
    ticker.ask = omit_zero(ticker.ask.take());
    ticker.bid = omit_zero(ticker.bid.take());
    ticker.high = omit_zero(ticker.high.take());
    ticker.low = omit_zero(ticker.low.take());
    ticker.datetime = datetime_of(ticker.datetime.take(), ticker.timestamp);
    if ticker.symbol.is_none() {
        ticker.symbol = market.map(|m| m.symbol.clone());
    }
    ticker
}

/// Sum fees per currency and rate, dropping zero-cost fees.
///
/// Order of first appearance is kept.
pub fn reduce_fees_by_currency(fees: &[Fee]) -> Vec<Fee> {
    let mut reduced: Vec<Fee> = Vec::new();
    for fee in fees {
        let Some(currency) = &fee.currency else {
            continue;
        };
        if fee.cost.as_ref().is_some_and(Precise::is_zero) {
            continue;
        }
        match reduced
            .iter_mut()
            .find(|r| r.currency.as_ref() == Some(currency) && r.rate == fee.rate)
        {
            Some(existing) => {
                existing.cost = match (existing.cost.take(), &fee.cost) {
                    (Some(a), Some(b)) => Some(a + b.clone()),
                    (a, b) => a.or_else(|| b.clone()),
                };
            }
            None => reduced.push(fee.clone()),
        }
    }
    reduced
}

/// Reconcile the single `fee` with the `fees` list.
fn settle_fees(fee: &mut Option<Fee>, fees: &mut Vec<Fee>) {
    if fees.is_empty() {
        if let Some(single) = fee {
            fees.push(single.clone());
        }
    } else if fee.is_none() && fees.len() == 1 {
        *fee = fees.first().cloned();
    }
}

/// `cost = price × amount`, fee list and `datetime`.
pub fn safe_trade(mut trade: Trade, market: Option<&Market>) -> Trade {
    if trade.cost.is_none() {
        if let (Some(price), Some(amount)) = (&trade.price, &trade.amount) {
            trade.cost = Some(price * amount);
        }
    }
    trade.fees = reduce_fees_by_currency(&trade.fees);
    settle_fees(&mut trade.fee, &mut trade.fees);
    trade.datetime = datetime_of(trade.datetime.take(), trade.timestamp);
    if trade.symbol.is_none() {
        trade.symbol = market.map(|m| m.symbol.clone());
    }
    trade
}

/// Derive the missing order quantities.
///
/// Fills in `remaining = amount - filled` (or whichever of the three is missing),
/// aggregates filled/cost/fees/last trade time from `trades`, computes `average`
/// and `cost`, and sets `datetime`.
pub fn safe_order(mut order: Order, market: Option<&Market>) -> Order {
    let mut amount = omit_zero(order.amount.take());
    let mut average = omit_zero(order.average.take());
    let mut price = omit_zero(order.price.take());
    let mut filled = order.filled.take();
    let mut remaining = order.remaining.take();
    let mut cost = order.cost.take();

    order.trades = std::mem::take(&mut order.trades)
        .into_iter()
        .map(|t| safe_trade(t, market))
        .collect();

    if let Some(first) = order.trades.first() {
        if order.symbol.is_none() {
            order.symbol = first.symbol.clone();
        }
        if order.side.is_none() {
            order.side = first.side;
        }
        if order.order_type.is_none() {
            order.order_type = first.order_type.clone();
        }
        if order.id.is_none() {
            order.id = first.order.clone();
        }
        if filled.is_none() {
            filled = Some(
                order
                    .trades
                    .iter()
                    .filter_map(|t| t.amount.clone())
                    .fold(Precise::zero(), |acc, a| acc + a),
            );
        }
        if cost.is_none() {
            cost = Some(
                order
                    .trades
                    .iter()
                    .filter_map(|t| t.cost.clone())
                    .fold(Precise::zero(), |acc, c| acc + c),
            );
        }
        if order.last_trade_timestamp.is_none() {
            order.last_trade_timestamp = order.trades.iter().filter_map(|t| t.timestamp).max();
        }
        if order.fee.is_none() && order.fees.is_empty() {
            let trade_fees: Vec<Fee> = order
                .trades
                .iter()
                .flat_map(|t| {
                    if t.fees.is_empty() {
                        t.fee.iter().cloned().collect::<Vec<_>>()
                    } else {
                        t.fees.clone()
                    }
                })
                .collect();
            order.fees = trade_fees;
        }
    }
    order.fees = reduce_fees_by_currency(&order.fees);
    settle_fees(&mut order.fee, &mut order.fees);

    if amount.is_none() {
        if let (Some(f), Some(r)) = (&filled, &remaining) {
            amount = Some(f + r);
        } else if order.status.as_deref() == Some("closed") {
            amount = filled.clone();
        }
    }
    if filled.is_none() {
        if let (Some(a), Some(r)) = (&amount, &remaining) {
            filled = Some(a - r);
        }
    }
    if remaining.is_none() {
        if let (Some(a), Some(f)) = (&amount, &filled) {
            remaining = Some(a - f);
        }
    }
    // Cost before average, so a second pass derives nothing new. With only price
    // and filled known, average ends up equal to price.
    if cost.is_none() {
        if let (Some(f), Some(p)) = (&filled, average.as_ref().or(price.as_ref())) {
            cost = Some(f * p);
        }
    }
    if average.is_none() {
        if let (Some(f), Some(c)) = (&filled, &cost) {
            if f > &Precise::zero() {
                average = div(c, f);
            }
        }
    }
    if price.is_none() && order.order_type.as_deref() == Some("market") {
        price = average.clone();
    }

    match (&order.time_in_force, order.post_only) {
        (None, post_only) => {
            if order.order_type.as_deref() == Some("market") {
                order.time_in_force = Some("IOC".to_string());
            }
            if post_only == Some(true) {
                order.time_in_force = Some("PO".to_string());
            }
        }
        (Some(tif), None) => order.post_only = Some(tif == "PO"),
        _ => {}
    }

    order.amount = amount;
    order.average = average;
    order.price = price;
    order.filled = filled;
    order.remaining = remaining;
    order.cost = cost;
    order.datetime = datetime_of(order.datetime.take(), order.timestamp);
    if order.symbol.is_none() {
        order.symbol = market.map(|m| m.symbol.clone());
    }
    order
}

/// `total = free + used`, or whichever of the three is missing.
pub fn safe_balance(mut balances: Balances) -> Balances {
    for account in balances.currencies.values_mut() {
        let (free, used, total) = (account.free.take(), account.used.take(), account.total.take());
        let (free, used, total) = match (free, used, total) {
            (Some(f), Some(u), None) => {
                let t = &f + &u;
                (Some(f), Some(u), Some(t))
            }
            (None, Some(u), Some(t)) => (Some(&t - &u), Some(u), Some(t)),
            (Some(f), None, Some(t)) => {
                let u = &t - &f;
                (Some(f), Some(u), Some(t))
            }
            other => other,
        };
        account.free = free;
        account.used = used;
        account.total = total;
    }
    balances.datetime = datetime_of(balances.datetime.take(), balances.timestamp);
    balances
}

pub fn safe_transaction(mut transaction: Transaction, currency: Option<&Currency>) -> Transaction {
    if transaction.currency.is_none() {
        transaction.currency = currency.map(|c| c.code.clone());
    }
    transaction.datetime = datetime_of(transaction.datetime.take(), transaction.timestamp);
    transaction
}

/// Derive top-level currency flags from its networks.
///
/// `deposit`/`withdraw` become true if any network allows it and false if all
/// networks forbid it; `active` is `deposit && withdraw` when both are known. A
/// single network also supplies `fee` and `precision`.
pub fn safe_currency_structure(mut currency: Currency) -> Currency {
    fn any_all(values: impl Iterator<Item = Option<bool>>) -> Option<bool> {
        let known: Vec<bool> = values.flatten().collect();
        if known.iter().any(|v| *v) {
            Some(true)
        } else if known.is_empty() {
            None
        } else {
            Some(false)
        }
    }

    if currency.id.is_empty() {
        currency.id = currency.code.clone();
    }
    for (key, network) in currency.networks.iter_mut() {
        if network.network.is_empty() {
            network.network = key.clone();
        }
        if network.active.is_none() {
            if let (Some(d), Some(w)) = (network.deposit, network.withdraw) {
                network.active = Some(d && w);
            }
        }
    }
    if currency.deposit.is_none() {
        currency.deposit = any_all(currency.networks.values().map(|n| n.deposit));
    }
    if currency.withdraw.is_none() {
        currency.withdraw = any_all(currency.networks.values().map(|n| n.withdraw));
    }
    if currency.active.is_none() {
        currency.active = match (currency.deposit, currency.withdraw) {
            (Some(d), Some(w)) => Some(d && w),
            _ => any_all(currency.networks.values().map(|n| n.active)),
        };
    }
    if currency.networks.len() == 1 {
        if let Some(network) = currency.networks.values().next() {
            if currency.fee.is_none() {
                currency.fee = network.fee.clone();
            }
            if currency.precision.is_none() {
                currency.precision = network.precision.clone();
            }
        }
    }
    currency
}

/// Fill `before`/`after` from each other and the amount, infer `direction` from
/// the balance change, and set `datetime`.
pub fn safe_ledger_entry(mut entry: LedgerEntry, currency: Option<&Currency>) -> LedgerEntry {
    if let Some(amount) = &entry.amount {
        let signed = match entry.direction {
            Some(LedgerDirection::Out) => -amount,
            _ => amount.clone(),
        };
        match (&entry.before, &entry.after) {
            (None, Some(after)) => entry.before = Some(after - &signed),
            (Some(before), None) => entry.after = Some(before + &signed),
            _ => {}
        }
    }
    if entry.direction.is_none() {
        if let (Some(before), Some(after)) = (&entry.before, &entry.after) {
            entry.direction = match before.cmp(after) {
                std::cmp::Ordering::Greater => Some(LedgerDirection::Out),
                std::cmp::Ordering::Less => Some(LedgerDirection::In),
                std::cmp::Ordering::Equal => None,
            };
        }
    }
    if entry.currency.is_none() {
        entry.currency = currency.map(|c| c.code.clone());
    }
    entry.datetime = datetime_of(entry.datetime.take(), entry.timestamp);
    entry
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::types::{BalanceAccount, CurrencyNetwork, OrderSide};

    fn p(s: &str) -> Precise {
        Precise::parse(s).unwrap()
    }

    fn some(s: &str) -> Option<Precise> {
        Some(p(s))
    }

    #[test]
    fn test_safe_market_symbol() {
        let market = safe_market(Market {
            id: "XXBTZUSD".to_string(),
            base: "BTC".to_string(),
            quote: "USD".to_string(),
            ..Market::default()
        });
        assert_eq!(market.symbol, "BTC/USD");
        assert_eq!(market.base_id, "BTC");
        assert_eq!(safe_market(market.clone()), market);
    }

    #[test]
    fn test_empty_ticker_is_all_none() {
        let ticker = safe_ticker(Ticker::default(), None);
        assert_eq!(ticker, Ticker::default());
    }

    #[test]
    fn test_safe_ticker_derivations() {
        let ticker = safe_ticker(
            Ticker {
                timestamp: Some(1_700_000_000_000),
                open: some("100"),
                last: some("110"),
                base_volume: some("4"),
                quote_volume: some("420"),
                bid: some("0"),
                info: json!({"raw": true}),
                ..Ticker::default()
            },
            None,
        );
        assert_eq!(ticker.close, some("110"));
        assert_eq!(ticker.change, some("10"));
        assert_eq!(ticker.percentage, some("10"));
        assert_eq!(ticker.average, some("105"));
        assert_eq!(ticker.vwap, some("105"));
        assert_eq!(ticker.bid, None);
        assert_eq!(ticker.datetime.as_deref(), Some("2023-11-14T22:13:20.000Z"));
        assert_eq!(ticker.info, json!({"raw": true}));
    }

    #[test]
    fn test_safe_ticker_idempotent() {
        let raw = Ticker {
            timestamp: Some(1),
            close: some("3"),
            open: some("7"),
            base_volume: some("3"),
            quote_volume: some("10"),
            ..Ticker::default()
        };
        let once = safe_ticker(raw, None);
        let twice = safe_ticker(once.clone(), None);
        assert_eq!(once, twice);
        assert_eq!(once.vwap, some("3.333333333333333333"));
    }

    #[test]
    fn test_safe_ticker_open_from_change() {
        let ticker = safe_ticker(
            Ticker {
                last: some("50"),
                change: some("-5"),
                ..Ticker::default()
            },
            None,
        );
        assert_eq!(ticker.open, some("55"));
    }

    #[test]
    fn test_safe_trade_cost() {
        let trade = safe_trade(
            Trade {
                price: some("0.1"),
                amount: some("3"),
                fee: Some(Fee {
                    currency: Some("USDT".to_string()),
                    cost: some("0.001"),
                    rate: None,
                }),
                ..Trade::default()
            },
            None,
        );
        assert_eq!(trade.cost, some("0.3"));
        assert_eq!(trade.fees.len(), 1);
        assert_eq!(safe_trade(trade.clone(), None), trade);
    }

    #[test]
    fn test_safe_order_remaining() {
        let order = safe_order(
            Order {
                amount: some("2"),
                filled: some("0.5"),
                price: some("100"),
                timestamp: Some(0),
                ..Order::default()
            },
            None,
        );
        assert_eq!(order.remaining, some("1.5"));
        assert_eq!(order.cost, some("50"));
        assert_eq!(order.average, some("100"));
        assert_eq!(order.datetime.as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(safe_order(order.clone(), None), order);
    }

    #[test]
    fn test_safe_order_average_follows_price() {
        let order = safe_order(
            Order {
                price: some("250"),
                filled: some("0.4"),
                ..Order::default()
            },
            None,
        );
        assert_eq!(order.cost, some("100"));
        assert_eq!(order.average, some("250"));
        assert_eq!(order.amount, None);
        assert_eq!(order.remaining, None);
    }

    #[test]
    fn test_safe_order_from_trades() {
        let fee = |cost: &str| {
            Some(Fee {
                currency: Some("USDT".to_string()),
                cost: some(cost),
                rate: None,
            })
        };
        let order = safe_order(
            Order {
                amount: some("3"),
                order_type: Some("market".to_string()),
                trades: vec![
                    Trade {
                        order: Some("42".to_string()),
                        side: Some(OrderSide::Buy),
                        price: some("10"),
                        amount: some("1"),
                        timestamp: Some(5),
                        fee: fee("0.01"),
                        ..Trade::default()
                    },
                    Trade {
                        price: some("13"),
                        amount: some("1"),
                        timestamp: Some(9),
                        fee: fee("0.02"),
                        ..Trade::default()
                    },
                ],
                ..Order::default()
            },
            None,
        );
        assert_eq!(order.id.as_deref(), Some("42"));
        assert_eq!(order.side, Some(OrderSide::Buy));
        assert_eq!(order.filled, some("2"));
        assert_eq!(order.cost, some("23"));
        assert_eq!(order.remaining, some("1"));
        assert_eq!(order.average, some("11.5"));
        assert_eq!(order.price, some("11.5"));
        assert_eq!(order.last_trade_timestamp, Some(9));
        assert_eq!(order.fee.as_ref().and_then(|f| f.cost.clone()), some("0.03"));
        assert_eq!(order.time_in_force.as_deref(), Some("IOC"));
    }

    #[test]
    fn test_safe_order_amount_from_closed_status() {
        let order = safe_order(
            Order {
                filled: some("4"),
                status: Some("closed".to_string()),
                ..Order::default()
            },
            None,
        );
        assert_eq!(order.amount, some("4"));
        assert_eq!(order.remaining, some("0"));
    }

    #[test]
    fn test_reduce_fees() {
        let fee = |currency: &str, cost: &str, rate: Option<&str>| Fee {
            currency: Some(currency.to_string()),
            cost: some(cost),
            rate: rate.map(p),
        };
        let reduced = reduce_fees_by_currency(&[
            fee("BTC", "0.1", None),
            fee("BTC", "0.2", None),
            fee("BTC", "0.2", Some("0.00123")),
            fee("BTC", "0.4", Some("0.00123")),
            fee("USDT", "0", None),
            fee("USDT", "12.3456", None),
        ]);
        assert_eq!(reduced.len(), 3);
        assert_eq!(reduced[0].cost, some("0.3"));
        assert_eq!(reduced[1].cost, some("0.6"));
        assert_eq!(reduced[2].cost, some("12.3456"));
    }

    #[test]
    fn test_safe_balance() {
        let mut balances = Balances::default();
        balances.insert("BTC", BalanceAccount::new(some("1.5"), some("0.25"), None));
        balances.insert("ETH", BalanceAccount::new(None, some("1"), some("3")));
        balances.insert("XRP", BalanceAccount::new(some("7"), None, None));
        let balances = safe_balance(balances);
        assert_eq!(balances.total()["BTC"], some("1.75"));
        assert_eq!(balances.free()["ETH"], some("2"));
        assert_eq!(balances.total()["XRP"], None);
    }

    #[test]
    fn test_safe_currency_structure() {
        let network = |deposit, withdraw, fee: &str| CurrencyNetwork {
            deposit: Some(deposit),
            withdraw: Some(withdraw),
            fee: some(fee),
            ..CurrencyNetwork::default()
        };
        let mut networks = BTreeMap::new();
        networks.insert("ERC20".to_string(), network(true, false, "5"));
        networks.insert("TRC20".to_string(), network(false, false, "1"));
        let currency = safe_currency_structure(Currency {
            code: "USDT".to_string(),
            networks,
            ..Currency::default()
        });
        assert_eq!(currency.id, "USDT");
        assert_eq!(currency.deposit, Some(true));
        assert_eq!(currency.withdraw, Some(false));
        assert_eq!(currency.active, Some(false));
        assert_eq!(currency.fee, None);
        assert_eq!(currency.networks["ERC20"].network, "ERC20");
    }

    #[test]
    fn test_safe_transaction() {
        let usdt = Currency {
            id: "usdt".to_string(),
            code: "USDT".to_string(),
            ..Currency::default()
        };
        let tx = safe_transaction(
            Transaction {
                id: Some("w-1".to_string()),
                timestamp: Some(1_700_000_000_000),
                amount: some("25"),
                status: Some("ok".to_string()),
                ..Transaction::default()
            },
            Some(&usdt),
        );
        assert_eq!(tx.currency.as_deref(), Some("USDT"));
        assert_eq!(tx.datetime.as_deref(), Some("2023-11-14T22:13:20.000Z"));
        assert_eq!(safe_transaction(tx.clone(), None), tx);

        // An explicit currency wins over the hint.
        let btc = safe_transaction(
            Transaction {
                currency: Some("BTC".to_string()),
                ..Transaction::default()
            },
            Some(&usdt),
        );
        assert_eq!(btc.currency.as_deref(), Some("BTC"));
        assert_eq!(btc.datetime, None);
    }

    #[test]
    fn test_safe_ledger_entry() {
        let entry = safe_ledger_entry(
            LedgerEntry {
                amount: some("2"),
                after: some("10"),
                direction: Some(LedgerDirection::Out),
                ..LedgerEntry::default()
            },
            None,
        );
        assert_eq!(entry.before, some("12"));

        let inferred = safe_ledger_entry(
            LedgerEntry {
                amount: some("2"),
                before: some("10"),
                ..LedgerEntry::default()
            },
            Some(&Currency {
                code: "BTC".to_string(),
                ..Currency::default()
            }),
        );
        assert_eq!(inferred.after, some("12"));
        assert_eq!(inferred.direction, Some(LedgerDirection::In));
        assert_eq!(inferred.currency.as_deref(), Some("BTC"));
    }
}
