//! Synthetic market data feed for paper sessions and tests.
//!
//! Generates seeded random-walk OHLCV series so a paper session is
//! reproducible bar for bar. Series for different instruments share
//! minute-aligned timestamps, which the correlation join depends on.

use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use sentinel_core::error::{Result, SentinelError};
use sentinel_core::events::{Bar, BarInterval, Quote};
use sentinel_core::traits::DataFeed;
use std::collections::HashMap;
use std::sync::Mutex;

/// Market scenario driving the walk's volatility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Normal,
    Crash,
    Rally,
    Chop,
}

impl Scenario {
    /// Per-bar return volatility for the scenario.
    #[must_use]
    pub const fn volatility(self) -> f64 {
        match self {
            Self::Normal => 0.0001,
            Self::Crash => 0.003,
            Self::Rally => 0.002,
            Self::Chop => 0.0005,
        }
    }

    /// Per-bar drift for the scenario.
    #[must_use]
    pub const fn drift(self) -> f64 {
        match self {
            Self::Normal | Self::Chop => 0.0,
            Self::Crash => -0.0005,
            Self::Rally => 0.0003,
        }
    }
}

struct FeedState {
    rng: ChaCha8Rng,
    last_prices: HashMap<String, f64>,
}

/// Seeded random-walk feed over a fixed instrument universe.
pub struct SyntheticDataFeed {
    scenario: Scenario,
    state: Mutex<FeedState>,
}

impl SyntheticDataFeed {
    /// Creates a feed with realistic base prices for the CFD universe.
    #[must_use]
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        let last_prices = [
            ("US500", 4500.0),
            ("USDJPY", 150.0),
            ("VIX", 15.0),
            ("VIX3M", 16.5),
            ("US10Y", 4.5),
            ("DXY", 104.0),
            ("DAX", 16000.0),
            ("NAS100", 15500.0),
            ("AUDJPY", 95.0),
            ("XAUUSD", 2000.0),
            ("EURJPY", 160.0),
        ]
        .into_iter()
        .map(|(symbol, price)| (symbol.to_string(), price))
        .collect();

        Self {
            scenario,
            state: Mutex::new(FeedState {
                rng: ChaCha8Rng::seed_from_u64(seed),
                last_prices,
            }),
        }
    }

    fn base_price(state: &FeedState, symbol: &str) -> Result<f64> {
        state
            .last_prices
            .get(symbol)
            .copied()
            .ok_or_else(|| SentinelError::data_unavailable(symbol, "symbol not in universe"))
    }

    /// Standard normal variable via the Box-Muller transform.
    fn standard_normal(rng: &mut ChaCha8Rng) -> f64 {
        let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
        let u2: f64 = rng.gen_range(0.0..1.0);
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn minute_floor(now: DateTime<Utc>) -> DateTime<Utc> {
        now.duration_trunc(Duration::minutes(1)).unwrap_or(now)
    }
}

#[async_trait]
impl DataFeed for SyntheticDataFeed {
    async fn get_quote(&self, symbol: &str) -> Result<Quote> {
        let mut state = self.state.lock().expect("feed state poisoned");
        let base = Self::base_price(&state, symbol)?;

        let volatility = self.scenario.volatility();
        let noise = Self::standard_normal(&mut state.rng) * volatility;
        let price = base * (1.0 + self.scenario.drift() + noise);
        state.last_prices.insert(symbol.to_string(), price);

        let spread = price * 0.0002;
        let price_dec = Decimal::try_from(price)
            .map_err(|e| SentinelError::data_unavailable(symbol, e.to_string()))?;
        let half_spread = Decimal::try_from(spread / 2.0)
            .map_err(|e| SentinelError::data_unavailable(symbol, e.to_string()))?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price: price_dec,
            bid: price_dec - half_spread,
            ask: price_dec + half_spread,
            timestamp: Utc::now(),
        })
    }

    async fn get_history(
        &self,
        symbol: &str,
        bars: usize,
        interval: BarInterval,
    ) -> Result<Vec<Bar>> {
        if bars == 0 {
            return Err(SentinelError::insufficient_history(symbol, bars, 0));
        }
        let mut state = self.state.lock().expect("feed state poisoned");
        let base = Self::base_price(&state, symbol)?;

        let volatility = self.scenario.volatility();
        let drift = self.scenario.drift();
        let end = Self::minute_floor(Utc::now());
        let step = Duration::minutes(interval.minutes());

        let mut series = Vec::with_capacity(bars);
        let mut close = base;
        for i in 0..bars {
            let ret = drift + Self::standard_normal(&mut state.rng) * volatility;
            close *= 1.0 + ret;
            let wick_up = Self::standard_normal(&mut state.rng).abs() * volatility / 2.0;
            let wick_down = Self::standard_normal(&mut state.rng).abs() * volatility / 2.0;
            let high = close * (1.0 + wick_up);
            let low = close * (1.0 - wick_down);
            let open = if i == 0 { base } else { close / (1.0 + ret) };
            let volume = f64::from(state.rng.gen_range(1_000u32..10_000));

            let timestamp = end - step * (bars - 1 - i) as i32;
            series.push(Bar {
                timestamp,
                open: to_decimal(symbol, open)?,
                high: to_decimal(symbol, high.max(close).max(open))?,
                low: to_decimal(symbol, low.min(close).min(open))?,
                close: to_decimal(symbol, close)?,
                volume: to_decimal(symbol, volume)?,
            });
        }

        Ok(series)
    }
}

fn to_decimal(symbol: &str, value: f64) -> Result<Decimal> {
    Decimal::try_from(value).map_err(|e| SentinelError::data_unavailable(symbol, e.to_string()))
}
