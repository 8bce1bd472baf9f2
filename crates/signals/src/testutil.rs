//! Shared test fixtures: scripted feeds and bar builders.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::events::{Bar, BarInterval, NewsEvent, Quote};
use sentinel_core::traits::{DataFeed, NewsCalendar};
use std::collections::HashMap;

/// Fixed series origin so aligned timestamps line up across series.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 13, 0, 0).unwrap()
}

fn dec(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

/// One-minute bars from close prices, with highs/lows hugging the close.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, close)| Bar {
            timestamp: base_time() + Duration::minutes(i as i64),
            open: dec(*close),
            high: dec(close * 1.0001),
            low: dec(close * 0.9999),
            close: dec(*close),
            volume: Decimal::from(1000),
        })
        .collect()
}

/// Bars with explicit lows and highs, closes midway.
pub fn bars_from_ohlc(lows: &[f64], highs: &[f64]) -> Vec<Bar> {
    assert_eq!(lows.len(), highs.len());
    lows.iter()
        .zip(highs.iter())
        .enumerate()
        .map(|(i, (low, high))| Bar {
            timestamp: base_time() + Duration::minutes(i as i64),
            open: dec((low + high) / 2.0),
            high: dec(*high),
            low: dec(*low),
            close: dec((low + high) / 2.0),
            volume: Decimal::from(1000),
        })
        .collect()
}

/// A feed serving preset series and quotes.
#[derive(Default)]
pub struct ScriptedFeed {
    pub series: HashMap<String, Vec<Bar>>,
    pub quotes: HashMap<String, Quote>,
}

impl ScriptedFeed {
    pub fn with_series(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.series.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_quote(mut self, symbol: &str, price: f64) -> Self {
        self.quotes.insert(
            symbol.to_string(),
            Quote {
                symbol: symbol.to_string(),
                price: dec(price),
                bid: dec(price * 0.9999),
                ask: dec(price * 1.0001),
                timestamp: base_time(),
            },
        );
        self
    }
}

#[async_trait]
impl DataFeed for ScriptedFeed {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        self.quotes
            .get(symbol)
            .cloned()
            .ok_or_else(|| SentinelError::data_unavailable(symbol, "no scripted quote"))
    }

    async fn get_history(
        &self,
        symbol: &str,
        bars: usize,
        _interval: BarInterval,
    ) -> Result<Vec<Bar>> {
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| SentinelError::data_unavailable(symbol, "no scripted series"))?;
        if series.len() < bars {
            return Err(SentinelError::insufficient_history(
                symbol,
                bars,
                series.len(),
            ));
        }
        Ok(series[series.len() - bars..].to_vec())
    }
}

/// A feed whose every request fails.
pub struct FailingFeed;

#[async_trait]
impl DataFeed for FailingFeed {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        Err(SentinelError::data_unavailable(symbol, "feed offline"))
    }

    async fn get_history(
        &self,
        symbol: &str,
        _bars: usize,
        _interval: BarInterval,
    ) -> Result<Vec<Bar>> {
        Err(SentinelError::data_unavailable(symbol, "feed offline"))
    }
}

/// A calendar with a fixed event list.
#[derive(Default)]
pub struct FixedCalendar {
    pub events: Vec<NewsEvent>,
}

#[async_trait]
impl NewsCalendar for FixedCalendar {
    async fn get_events(&self, minutes_back: i64, minutes_ahead: i64) -> Result<Vec<NewsEvent>> {
        let now = Utc::now();
        let from = now - Duration::minutes(minutes_back);
        let to = now + Duration::minutes(minutes_ahead);
        Ok(self
            .events
            .iter()
            .filter(|e| e.timestamp >= from && e.timestamp <= to)
            .cloned()
            .collect())
    }
}
