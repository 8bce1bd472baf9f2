//! Signal assembly: one regime classification plus zero or more accepted
//! divergences become at most one trade proposal per tick.
//!
//! The decision ladder is strict: nothing is proposed unless the regime is
//! trustworthy, and a directional divergence always outranks a regime-only
//! setup. Entry/stop/target derivation is deterministic given identical
//! inputs.

use chrono::Utc;
use rust_decimal::Decimal;
use sentinel_core::config::{InstrumentsConfig, SentinelConfig, StrategyConfig};
use sentinel_core::error::Result;
use sentinel_core::events::{
    DivergenceKind, DivergenceSignal, RegimeClassification, RegimeStatus, RegimeType,
    TradeDirection, TradeProposal,
};
use sentinel_core::traits::DataFeed;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

fn dec(value: f64) -> Decimal {
    Decimal::from_str(&value.to_string()).unwrap_or(Decimal::ZERO)
}

/// Builds trade proposals from the tick's analysis outputs.
pub struct SignalAssembler {
    config: StrategyConfig,
    instruments: InstrumentsConfig,
    feed: Arc<dyn DataFeed>,
}

impl SignalAssembler {
    #[must_use]
    pub fn new(config: &SentinelConfig, feed: Arc<dyn DataFeed>) -> Self {
        Self {
            config: config.strategy.clone(),
            instruments: config.instruments.clone(),
            feed,
        }
    }

    /// Merges the tick's regime and divergences into at most one proposal.
    ///
    /// Returns `None` when the regime is not `Ok`, or when neither a
    /// sufficiently confident divergence nor a strong, confident regime
    /// exists.
    ///
    /// # Errors
    /// Propagates a quote fetch failure for the chosen instrument.
    pub async fn assemble(
        &self,
        tick_seq: u64,
        regime: &RegimeClassification,
        divergences: &[DivergenceSignal],
    ) -> Result<Option<TradeProposal>> {
        if regime.status != RegimeStatus::Ok {
            debug!(status = ?regime.status, "regime not trustworthy, no proposal");
            return Ok(None);
        }

        let best = divergences.iter().max_by(|a, b| {
            a.confidence
                .partial_cmp(&b.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if let Some(divergence) = best {
            if divergence.confidence > self.config.min_divergence_confidence {
                return self
                    .divergence_proposal(tick_seq, regime, divergence)
                    .await
                    .map(Some);
            }
            debug!(
                confidence = divergence.confidence,
                "divergence below confidence floor"
            );
        }

        if regime.regime_type.is_strong() && regime.confidence > self.config.min_regime_confidence {
            return self.regime_proposal(tick_seq, regime).await.map(Some);
        }

        Ok(None)
    }

    async fn divergence_proposal(
        &self,
        tick_seq: u64,
        regime: &RegimeClassification,
        divergence: &DivergenceSignal,
    ) -> Result<TradeProposal> {
        let quote = self.feed.get_quote(&divergence.instrument).await?;
        let entry = quote.price;

        let stop_pct = dec(self.config.divergence_stop_pct);
        let target_pct = dec(self.config.divergence_target_pct);
        let (direction, stop, target) = match divergence.kind {
            DivergenceKind::Bullish => (
                TradeDirection::Buy,
                entry * (Decimal::ONE - stop_pct),
                entry * (Decimal::ONE + target_pct),
            ),
            DivergenceKind::Bearish => (
                TradeDirection::Sell,
                entry * (Decimal::ONE + stop_pct),
                entry * (Decimal::ONE - target_pct),
            ),
        };

        let aligned = match divergence.kind {
            DivergenceKind::Bullish => regime.regime_type.is_risk_on(),
            DivergenceKind::Bearish => regime.regime_type.is_risk_off(),
        };
        let mut confidence = divergence.confidence;
        if aligned {
            confidence = (confidence * self.config.aligned_confidence_boost)
                .min(self.config.confidence_cap);
        }

        let proposal = TradeProposal {
            id: format!("{tick_seq}-{}", divergence.instrument),
            direction,
            instrument: divergence.instrument.clone(),
            entry,
            stop,
            target,
            confidence,
            regime: regime.clone(),
            divergence: Some(divergence.clone()),
            timestamp: Utc::now(),
        };
        info!(
            proposal = %proposal.id,
            direction = ?proposal.direction,
            confidence = proposal.confidence,
            "divergence proposal assembled"
        );
        Ok(proposal)
    }

    async fn regime_proposal(
        &self,
        tick_seq: u64,
        regime: &RegimeClassification,
    ) -> Result<TradeProposal> {
        let instrument = self.instruments.equity_index.clone();
        let quote = self.feed.get_quote(&instrument).await?;
        let entry = quote.price;

        let stop_pct = dec(self.config.regime_stop_pct);
        let target_pct = dec(self.config.regime_target_pct);
        let (direction, stop, target) = if regime.regime_type == RegimeType::StrongRiskOn {
            (
                TradeDirection::Buy,
                entry * (Decimal::ONE - stop_pct),
                entry * (Decimal::ONE + target_pct),
            )
        } else {
            (
                TradeDirection::Sell,
                entry * (Decimal::ONE + stop_pct),
                entry * (Decimal::ONE - target_pct),
            )
        };

        let proposal = TradeProposal {
            id: format!("{tick_seq}-{instrument}"),
            direction,
            instrument,
            entry,
            stop,
            target,
            confidence: regime.confidence,
            regime: regime.clone(),
            divergence: None,
            timestamp: Utc::now(),
        };
        info!(
            proposal = %proposal.id,
            direction = ?proposal.direction,
            "regime proposal assembled"
        );
        Ok(proposal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec as d;
    use sentinel_core::error::SentinelError;
    use sentinel_core::events::{Bar, BarInterval, Quote};
    use sentinel_core::session::TradingSession;
    use std::collections::HashMap;

    struct QuoteFeed {
        quotes: HashMap<String, Decimal>,
    }

    impl QuoteFeed {
        fn new(quotes: &[(&str, Decimal)]) -> Self {
            Self {
                quotes: quotes
                    .iter()
                    .map(|(s, p)| ((*s).to_string(), *p))
                    .collect(),
            }
        }
    }

    #[async_trait]
    impl DataFeed for QuoteFeed {
        async fn get_quote(&self, symbol: &str) -> sentinel_core::error::Result<Quote> {
            let price = self
                .quotes
                .get(symbol)
                .copied()
                .ok_or_else(|| SentinelError::data_unavailable(symbol, "no quote"))?;
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
            _bars: usize,
            _interval: BarInterval,
        ) -> sentinel_core::error::Result<Vec<Bar>> {
            Err(SentinelError::data_unavailable(symbol, "quotes only"))
        }
    }

    fn regime(status: RegimeStatus, regime_type: RegimeType, confidence: f64) -> RegimeClassification {
        RegimeClassification {
            status,
            regime_type,
            score: 3.42,
            confidence,
            correlation_health: 0.73,
            vix_level: 14.2,
            threshold_used: 0.2,
            session: TradingSession::UsOverlap,
            timestamp: Utc::now(),
        }
    }

    fn divergence(kind: DivergenceKind, confidence: f64) -> DivergenceSignal {
        DivergenceSignal {
            kind,
            instrument: "US500".to_string(),
            magnitude: 0.0045,
            confidence,
            correlation: 0.7,
            timestamp: Utc::now(),
        }
    }

    fn assembler() -> SignalAssembler {
        let config = SentinelConfig::default();
        SignalAssembler::new(
            &config,
            Arc::new(QuoteFeed::new(&[("US500", d!(4500)), ("DAX", d!(16000))])),
        )
    }

    #[tokio::test]
    async fn no_proposal_when_regime_unreliable() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Unreliable, RegimeType::Neutral, 0.0);
        let signals = vec![divergence(DivergenceKind::Bullish, 0.9)];
        let proposal = assembler.assemble(1, &regime, &signals).await.unwrap();
        assert!(proposal.is_none());
    }

    #[tokio::test]
    async fn no_proposal_when_regime_errored() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::DataError, RegimeType::Neutral, 0.0);
        let proposal = assembler.assemble(1, &regime, &[]).await.unwrap();
        assert!(proposal.is_none());
    }

    #[tokio::test]
    async fn bullish_divergence_becomes_buy_with_derived_levels() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::Neutral, 0.6);
        let signals = vec![divergence(DivergenceKind::Bullish, 0.7)];
        let proposal = assembler
            .assemble(7, &regime, &signals)
            .await
            .unwrap()
            .expect("proposal");

        assert_eq!(proposal.id, "7-US500");
        assert_eq!(proposal.direction, TradeDirection::Buy);
        assert_eq!(proposal.entry, d!(4500));
        assert_eq!(proposal.stop, d!(4488.75));
        assert_eq!(proposal.target, d!(4522.5));
        assert!(proposal.divergence.is_some());
        // Neutral regime: no alignment boost.
        assert!((proposal.confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn bearish_divergence_becomes_sell_with_mirrored_levels() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::Neutral, 0.6);
        let signals = vec![divergence(DivergenceKind::Bearish, 0.7)];
        let proposal = assembler
            .assemble(2, &regime, &signals)
            .await
            .unwrap()
            .expect("proposal");

        assert_eq!(proposal.direction, TradeDirection::Sell);
        assert_eq!(proposal.stop, d!(4511.25));
        assert_eq!(proposal.target, d!(4477.5));
    }

    #[tokio::test]
    async fn aligned_divergence_gets_boosted_and_capped() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::StrongRiskOn, 0.6);
        let signals = vec![divergence(DivergenceKind::Bullish, 0.9)];
        let proposal = assembler
            .assemble(3, &regime, &signals)
            .await
            .unwrap()
            .expect("proposal");
        // 0.9 * 1.2 exceeds the 0.95 cap.
        assert!((proposal.confidence - 0.95).abs() < 1e-9);
    }

    #[tokio::test]
    async fn weak_divergence_and_weak_regime_yield_nothing() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::WeakRiskOn, 0.9);
        let signals = vec![divergence(DivergenceKind::Bullish, 0.5)];
        let proposal = assembler.assemble(4, &regime, &signals).await.unwrap();
        assert!(proposal.is_none());
    }

    #[tokio::test]
    async fn strong_confident_regime_proposes_on_its_own() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::StrongRiskOff, 0.8);
        let proposal = assembler
            .assemble(5, &regime, &[])
            .await
            .unwrap()
            .expect("proposal");

        assert_eq!(proposal.id, "5-US500");
        assert_eq!(proposal.direction, TradeDirection::Sell);
        assert_eq!(proposal.entry, d!(4500));
        assert_eq!(proposal.stop, d!(4513.5));
        assert_eq!(proposal.target, d!(4455));
        assert!(proposal.divergence.is_none());
    }

    #[tokio::test]
    async fn strong_regime_with_low_confidence_stays_quiet() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::StrongRiskOn, 0.65);
        let proposal = assembler.assemble(6, &regime, &[]).await.unwrap();
        assert!(proposal.is_none());
    }

    #[tokio::test]
    async fn divergence_outranks_regime_setup() {
        let assembler = assembler();
        let regime = regime(RegimeStatus::Ok, RegimeType::StrongRiskOn, 0.9);
        let signals = vec![divergence(DivergenceKind::Bearish, 0.8)];
        let proposal = assembler
            .assemble(8, &regime, &signals)
            .await
            .unwrap()
            .expect("proposal");
        assert!(proposal.divergence.is_some());
        assert_eq!(proposal.direction, TradeDirection::Sell);
    }
}
