//! End-to-end decision pipeline tests: scripted market data in, confirmed
//! (or timed-out) advisory out.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sentinel_core::config::SentinelConfig;
use sentinel_core::error::{Result as SentinelResult, SentinelError};
use sentinel_core::events::{Bar, BarInterval, GateDecision, Quote};
use sentinel_core::traits::{AlertChannel, DataFeed};
use sentinel_data::{Scenario, SimulatedBrokerAccount, StaticNewsCalendar, SyntheticDataFeed};
use sentinel_execution::{AlertWorker, ConfirmationGate};
use sentinel_orchestrator::{TickEngine, TickOutcome};
use sentinel_risk::{DailyRiskLedger, LossHistory, RiskSizer};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

struct ScriptedFeed {
    series: HashMap<String, Vec<Bar>>,
    quotes: HashMap<String, Decimal>,
}

#[async_trait]
impl DataFeed for ScriptedFeed {
    async fn get_quote(&self, symbol: &str) -> SentinelResult<Quote> {
        let price = self
            .quotes
            .get(symbol)
            .copied()
            .ok_or_else(|| SentinelError::data_unavailable(symbol, "no scripted quote"))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            bid: price,
            ask: price,
            timestamp: Utc::now(),
        })
    }

    async fn get_history(
        &self,
        symbol: &str,
        bars: usize,
        _interval: BarInterval,
    ) -> SentinelResult<Vec<Bar>> {
        let series = self
            .series
            .get(symbol)
            .ok_or_else(|| SentinelError::data_unavailable(symbol, "no scripted series"))?;
        if series.len() < bars {
            return Err(SentinelError::insufficient_history(symbol, bars, series.len()));
        }
        Ok(series[series.len() - bars..].to_vec())
    }
}

fn d(value: f64) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 13, 0, 0).unwrap()
}

fn bars(closes: &[f64], lows: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .zip(lows.iter())
        .enumerate()
        .map(|(i, (close, low))| Bar {
            timestamp: base_time() + ChronoDuration::minutes(i as i64),
            open: d(*close),
            high: d(close * 1.0001),
            low: d(*low),
            close: d(*close),
            volume: Decimal::from(1000),
        })
        .collect()
}

/// A bullish divergence scenario: the equity index makes a new fractal low
/// its carry partner refuses to confirm while the VIX declines, and the
/// closes of both stay perfectly correlated so the regime stays reliable.
fn divergence_feed() -> ScriptedFeed {
    let n = 30;
    let osc = |i: usize| 1.0 + 0.001 * ((i % 2) as f64);

    let core_closes: Vec<f64> = (0..n).map(|i| 4500.0 * osc(i)).collect();
    let mut core_lows: Vec<f64> = core_closes.iter().map(|c| c * 0.9999).collect();
    core_lows[7] = 4480.0;
    core_lows[22] = 4420.0;

    let carry_closes: Vec<f64> = (0..n).map(|i| 150.0 * osc(i)).collect();
    let mut carry_lows: Vec<f64> = carry_closes.iter().map(|c| c * 0.9999).collect();
    carry_lows[7] = 149.0;
    carry_lows[22] = 149.5;

    let vix_closes: Vec<f64> = (0..15)
        .map(|i| 16.0 - 1.4 * i as f64 / 14.0)
        .collect();
    let vix_lows: Vec<f64> = vix_closes.iter().map(|c| c * 0.9999).collect();

    let bond_closes = vec![4.5; 3];
    let bond_lows = vec![4.4995; 3];

    let mut series = HashMap::new();
    series.insert("US500".to_string(), bars(&core_closes, &core_lows));
    series.insert("USDJPY".to_string(), bars(&carry_closes, &carry_lows));
    series.insert("VIX".to_string(), bars(&vix_closes, &vix_lows));
    series.insert("US10Y".to_string(), bars(&bond_closes, &bond_lows));

    let mut quotes = HashMap::new();
    quotes.insert("US500".to_string(), dec!(4500));
    quotes.insert("VIX".to_string(), d(14.6));
    quotes.insert("VIX3M".to_string(), dec!(16));

    ScriptedFeed { series, quotes }
}

fn test_config() -> SentinelConfig {
    let mut config = SentinelConfig::default();
    // Keep wall-clock readiness out of the way; the pipeline under test
    // injects its own tick time.
    config.execution.blackout_start_hour = 0;
    config.execution.blackout_end_hour = 0;
    config
}

struct Pipeline {
    engine: TickEngine,
    sizer: Arc<RiskSizer>,
    gate: Arc<ConfirmationGate>,
    delivered: Arc<Mutex<Vec<String>>>,
}

struct CollectingChannel {
    delivered: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl AlertChannel for CollectingChannel {
    fn name(&self) -> &str {
        "collector"
    }

    async fn deliver(&self, rendered: &str) -> SentinelResult<()> {
        self.delivered.lock().unwrap().push(rendered.to_string());
        Ok(())
    }
}

fn build_pipeline(config: SentinelConfig, feed: Arc<dyn DataFeed>) -> Pipeline {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let channel = Arc::new(CollectingChannel {
        delivered: Arc::clone(&delivered),
    });
    let (publisher, worker) = AlertWorker::new(&config.execution, vec![channel]);
    worker.spawn();

    let broker = Arc::new(SimulatedBrokerAccount::new(dec!(50000)));
    let calendar = Arc::new(StaticNewsCalendar::quiet());
    let sizer = Arc::new(RiskSizer::new(&config, DailyRiskLedger::new(Utc::now())));
    let gate = Arc::new(ConfirmationGate::new(
        &config,
        publisher.clone(),
        LossHistory::new(Utc::now()),
    ));

    let engine = TickEngine::new(
        config,
        feed,
        broker,
        calendar,
        Arc::clone(&sizer),
        Arc::clone(&gate),
        publisher,
    );

    Pipeline {
        engine,
        sizer,
        gate,
        delivered,
    }
}

/// 14:00 GMT: US overlap session, full-power multipliers.
fn tick_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 16, 14, 0, 0).unwrap()
}

#[tokio::test(start_paused = true)]
async fn confirmed_divergence_flows_end_to_end() {
    let mut pipeline = build_pipeline(test_config(), Arc::new(divergence_feed()));
    let handle = pipeline.gate.response_handle();

    // Trader says yes as soon as the proposal goes pending.
    let responder = tokio::spawn(async move {
        while !handle.respond("1-US500", true) {
            tokio::task::yield_now().await;
        }
    });

    let tick = pipeline.engine.run_tick(tick_time()).await.unwrap();
    responder.await.unwrap();

    let (outcome, sizing) = match tick {
        TickOutcome::Resolved { outcome, sizing } => (outcome, sizing),
        other => panic!("expected a resolved proposal, got {other:?}"),
    };
    assert_eq!(outcome.decision, GateDecision::Confirmed);
    assert_eq!(outcome.proposal_id, "1-US500");

    // $900 base, regime multiplier 0.1 (score 0.2), divergence penalty 0.5.
    assert_eq!(sizing.risk_amount, dec!(45));
    assert_eq!(pipeline.sizer.committed_today(tick_time()), dec!(45));

    // The P1 announcement and the confirmed advisory both went out.
    tokio::task::yield_now().await;
    let delivered = pipeline.delivered.lock().unwrap();
    assert!(delivered.iter().any(|a| a.contains("[P1]")));
    assert!(delivered.iter().any(|a| a.contains("forward to execution")));
}

#[tokio::test(start_paused = true)]
async fn unanswered_proposal_times_out_and_commits_nothing() {
    let mut pipeline = build_pipeline(test_config(), Arc::new(divergence_feed()));

    let tick = pipeline.engine.run_tick(tick_time()).await.unwrap();

    let outcome = match tick {
        TickOutcome::Resolved { outcome, .. } => outcome,
        other => panic!("expected a resolved proposal, got {other:?}"),
    };
    assert_eq!(outcome.decision, GateDecision::TimedOut);
    assert_eq!(pipeline.sizer.committed_today(tick_time()), Decimal::ZERO);
}

#[tokio::test(start_paused = true)]
async fn closed_session_never_proposes() {
    let mut pipeline = build_pipeline(test_config(), Arc::new(divergence_feed()));
    // 22:00 GMT is the closed session.
    let night = Utc.with_ymd_and_hms(2025, 6, 16, 22, 0, 0).unwrap();
    let outcome = pipeline.engine.run_tick(night).await.unwrap();
    assert!(matches!(outcome, TickOutcome::Skipped("session")));
}

#[tokio::test(start_paused = true)]
async fn synthetic_feed_ticks_without_fatal_errors() {
    let config = test_config();
    let feed = Arc::new(SyntheticDataFeed::new(Scenario::Normal, config.system.feed_seed));
    let mut pipeline = build_pipeline(config, feed);

    for _ in 0..3 {
        pipeline.engine.run_tick(tick_time()).await.unwrap();
    }
}
