use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use exchange_api_core::dispatch::{ApiRequest, Dispatcher, ExchangeProfile, HttpTransport};
use exchange_api_core::normalize::{
    FieldMap, filter_by_since_limit, parse_trade, safe_bool, safe_list, safe_string,
};
use exchange_api_core::types::{Market, MarketPrecision, OrderSide};
use exchange_api_core::{ErrorKind, ExchangeError, Precise};

fn exchange_info() -> Value {
    serde_json::json!({
        "symbols": [
            {"symbol": "BTCUSDT", "baseAsset": "BTC", "quoteAsset": "USDT", "status": "TRADING",
             "stepSize": "0.00001", "tickSize": "0.01"},
            {"symbol": "ETHBTC", "baseAsset": "ETH", "quoteAsset": "BTC", "status": "BREAK",
             "stepSize": "0.0001", "tickSize": "0.000001"},
            {"symbol": "BROKEN"}
        ]
    })
}

fn parse_markets(raw: &Value) -> Vec<Market> {
    safe_list(raw, "symbols")
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            Some(Market {
                id: safe_string(entry, "symbol")?,
                base: safe_string(entry, "baseAsset")?,
                quote: safe_string(entry, "quoteAsset")?,
                active: safe_string(entry, "status").map(|s| s == "TRADING"),
                precision: MarketPrecision {
                    amount: safe_string(entry, "stepSize").and_then(|s| Precise::parse(&s).ok()),
                    price: safe_string(entry, "tickSize").and_then(|s| Precise::parse(&s).ok()),
                },
                info: entry.clone(),
                ..Market::default()
            })
        })
        .collect()
}

async fn dispatcher(server: &MockServer) -> Dispatcher<HttpTransport> {
    Mock::given(method("GET"))
        .and(path("/api/v3/exchangeInfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(exchange_info()))
        .mount(server)
        .await;
    let profile = ExchangeProfile::new("demo").url("public", server.uri());
    Dispatcher::builder(profile).build().unwrap()
}

async fn load(dispatcher: &Dispatcher<HttpTransport>, reload: bool, calls: &AtomicUsize) -> Result<usize, ExchangeError> {
    let table = dispatcher
        .load_markets(reload, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            let raw = dispatcher
                .request(ApiRequest::get("/api/v3/exchangeInfo").cost(10.0))
                .await?;
            Ok::<_, ExchangeError>((parse_markets(&raw), None))
        })
        .await?;
    Ok(table.len())
}

#[tokio::test]
async fn test_load_markets_through_dispatcher() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher(&server).await;
    let calls = AtomicUsize::new(0);

    assert_eq!(load(&dispatcher, false, &calls).await.unwrap(), 2);
    assert_eq!(load(&dispatcher, false, &calls).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(load(&dispatcher, true, &calls).await.unwrap(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let table = dispatcher.markets().snapshot();
    let btc = table.market("BTC/USDT").unwrap();
    assert_eq!(btc.id, "BTCUSDT");
    assert_eq!(btc.active, Some(true));
    assert_eq!(table.market_by_id("ETHBTC").unwrap().symbol, "ETH/BTC");
    assert_eq!(table.codes().collect::<Vec<_>>(), ["BTC", "ETH", "USDT"]);
    assert_eq!(table.safe_symbol("ETHBTC", None), "ETH/BTC");
}

#[tokio::test]
async fn test_unknown_symbol() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher(&server).await;
    load(&dispatcher, false, &AtomicUsize::new(0)).await.unwrap();

    let err = dispatcher.markets().market("DOGE/USDT").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadSymbol);
}

#[tokio::test]
async fn test_precision_uses_market_steps() {
    let server = MockServer::start().await;
    let dispatcher = dispatcher(&server).await;
    load(&dispatcher, false, &AtomicUsize::new(0)).await.unwrap();

    assert_eq!(dispatcher.amount_to_precision("BTC/USDT", "0.123456").unwrap(), "0.12345");
    // Session default rounds prices half up.
    assert_eq!(dispatcher.price_to_precision("BTC/USDT", "27000.125").unwrap(), "27000.13");
    let err = dispatcher.amount_to_precision("BTC/USDT", "0.000001").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOrder);
}

#[tokio::test]
async fn test_trades_normalized_against_loaded_market() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/myTrades"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 3, "orderId": 9, "price": "27000.10", "qty": "0.5", "time": 1700000003000_i64, "isBuyer": false, "isMaker": true, "commission": "0.01"},
            {"id": 1, "orderId": 9, "price": "27000.00", "qty": "0.1", "time": 1700000001000_i64, "isBuyer": true, "isMaker": false},
            {"id": 2, "orderId": 9, "price": "27000.05", "qty": "0.2", "time": 1700000002000_i64, "isBuyer": true, "isMaker": false}
        ])))
        .mount(&server)
        .await;
    let dispatcher = dispatcher(&server).await;
    load(&dispatcher, false, &AtomicUsize::new(0)).await.unwrap();

    let raw = dispatcher.request(ApiRequest::get("/api/v3/myTrades")).await.unwrap();
    let map = FieldMap::new()
        .field("order", ["orderId"])
        .field("amount", ["qty"])
        .field("timestamp", ["time"])
        .field("fee", ["commission"]);
    let table = dispatcher.markets().snapshot();
    let market = table.market("BTC/USDT").unwrap();

    let trades: Vec<_> = raw
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| {
            let mut trade = parse_trade(entry, &map, Some(market));
            trade.side = Some(if safe_bool(entry, "isBuyer") == Some(true) {
                OrderSide::Buy
            } else {
                OrderSide::Sell
            });
            trade
        })
        .collect();

    let recent = filter_by_since_limit(trades, Some(1_700_000_001_500), Some(1), true);
    assert_eq!(recent.len(), 1);
    let trade = &recent[0];
    assert_eq!(trade.id.as_deref(), Some("3"));
    assert_eq!(trade.symbol.as_deref(), Some("BTC/USDT"));
    assert_eq!(trade.cost.as_ref().unwrap().to_string(), "13500.05");
    assert_eq!(trade.datetime.as_deref(), Some("2023-11-14T22:13:23.000Z"));
    let fee = trade.fee.as_ref().unwrap();
    assert_eq!(fee.currency.as_deref(), Some("USDT"));
    assert_eq!(fee.cost.as_ref().unwrap().to_string(), "0.01");
}
