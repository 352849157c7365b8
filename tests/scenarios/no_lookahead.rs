//! No-lookahead (§4.2/§8): replaying at `as_of` must never surface a candle
//! timestamped after the last fully closed boundary at or before `as_of`,
//! and must never touch the vendor — only the Historical-Candle Store.

use crate::common::{FakeCandleRepository, PanicVendorClient};
use btc_sentinel::application::data_service::DataService;
use btc_sentinel::domain::market::candle::Candle;
use btc_sentinel::domain::market::timeframe::Timeframe;
use btc_sentinel::domain::venue::Venue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn candle(ts: i64, close: Decimal) -> Candle {
    Candle {
        venue: Venue::BinanceUsdtPerp,
        symbol: "BTCUSDT".to_string(),
        interval: Timeframe::H1,
        timestamp: ts,
        open: close,
        high: close + Decimal::ONE,
        low: close - Decimal::ONE,
        close,
        volume: Some(dec!(1_000_000)),
        oi: Some(dec!(5_000_000_000)),
        funding_rate: Some(dec!(0.01)),
        buy_volume: Some(dec!(500_000)),
        sell_volume: Some(dec!(500_000)),
    }
}

#[tokio::test]
async fn replay_never_surfaces_a_candle_after_the_last_closed_boundary() {
    let interval_ms = Timeframe::H1.interval_ms();
    // 80 candles on each side of as_of's last-closed boundary.
    let as_of = 100 * interval_ms + interval_ms / 3;
    let last_closed = Timeframe::H1.align_end_to_last_closed(as_of);

    let mut rows = Vec::new();
    for i in 0..180i64 {
        rows.push(candle(i * interval_ms, dec!(60_000) + Decimal::from(i)));
    }
    // Also seed bybit so both venues resolve and the timeframe isn't dropped.
    for i in 0..180i64 {
        let mut c = candle(i * interval_ms, dec!(60_000) + Decimal::from(i));
        c.venue = Venue::BybitCoinMarginedPerp;
        rows.push(c);
    }

    let repository = Arc::new(FakeCandleRepository::new(rows));
    let data_service = DataService::new(Arc::new(PanicVendorClient), repository, "BTCUSDT".to_string(), Duration::from_millis(0));

    let input = data_service.replay_timeframe_input(Timeframe::H1, as_of).await.unwrap();

    let binance = input.binance.expect("binance venue should resolve from local history");
    assert!(binance.candles.iter().all(|c| c.timestamp <= last_closed));
    assert_eq!(binance.candles.last().unwrap().timestamp, last_closed);

    let bybit = input.bybit.expect("bybit venue should resolve from local history");
    assert!(bybit.candles.iter().all(|c| c.timestamp <= last_closed));
}

#[tokio::test]
async fn replay_inputs_across_all_timeframes_never_touches_the_vendor() {
    let interval_ms = Timeframe::H1.interval_ms();
    let as_of = 200 * interval_ms;

    let mut rows = Vec::new();
    for interval in Timeframe::ALL {
        let step = interval.interval_ms();
        for i in 0..120i64 {
            let ts = as_of - (119 - i) * step;
            if ts < 0 {
                continue;
            }
            for venue in [Venue::BinanceUsdtPerp, Venue::BybitCoinMarginedPerp] {
                let mut c = candle(ts, dec!(60_000));
                c.venue = venue;
                c.interval = interval;
                rows.push(c);
            }
        }
    }

    let repository = Arc::new(FakeCandleRepository::new(rows));
    let data_service = DataService::new(Arc::new(PanicVendorClient), repository, "BTCUSDT".to_string(), Duration::from_millis(0));

    // If this ever reached `PanicVendorClient`, the test would panic inside
    // the future rather than return an error, since replay only consults the
    // repository per `replay_venue_candles`'s contract.
    let inputs = data_service.replay_inputs(as_of).await.unwrap();
    assert_eq!(inputs.len(), Timeframe::ALL.len());
}
