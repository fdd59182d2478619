// Price engine: drift, news impact application, severity clamping

use std::collections::HashMap;

use rand::{thread_rng, Rng};
use tracing::debug;

use super::news::{NewsEvent, Severity};
use super::{MarketState, Sector, MIN_PRICE};

/// Converts news impact intent into price motion. The only component that
/// mutates security prices.
#[derive(Debug, Clone)]
pub struct PriceEngine {
    /// Half-width of the symmetric drift noise (fraction, e.g. 0.0005).
    drift_pct: f64,
    /// Half-width of the realism noise added on impact application.
    impact_noise_pct: f64,
}

impl PriceEngine {
    pub fn new(drift_pct: f64, impact_noise_pct: f64) -> Self {
        Self {
            drift_pct,
            impact_noise_pct,
        }
    }

    /// Small symmetric random motion between events. Cosmetic only; scaled
    /// by each security's idiosyncratic volatility relative to a 3% base.
    pub fn drift(&self, market: &mut MarketState) {
        let mut rng = thread_rng();
        for security in market.securities_mut() {
            if self.drift_pct <= 0.0 {
                continue;
            }
            let scale = (security.volatility / 0.03).clamp(0.2, 2.0);
            let noise = rng.gen_range(-self.drift_pct..=self.drift_pct) * scale;
            security.price = (security.price * (1.0 + noise)).max(MIN_PRICE);
        }
    }

    /// Apply intended fractional moves to the market and return the realized
    /// move per ticker. A small noise term makes realized moves differ
    /// slightly from intent; prices never fall to or below zero.
    pub fn apply_impact(
        &self,
        market: &mut MarketState,
        impacts: &HashMap<String, f64>,
    ) -> HashMap<String, f64> {
        let mut rng = thread_rng();
        let mut realized = HashMap::new();
        for security in market.securities_mut() {
            let Some(&intent) = impacts.get(&security.ticker) else {
                continue;
            };
            let noise = if self.impact_noise_pct > 0.0 {
                rng.gen_range(-self.impact_noise_pct..=self.impact_noise_pct)
            } else {
                0.0
            };
            let old_price = security.price;
            security.price = (old_price * (1.0 + intent + noise)).max(MIN_PRICE);
            let actual = (security.price - old_price) / old_price;
            debug!(
                "impact {}: intent {:+.3}% -> realized {:+.3}% (price {:.2} -> {:.2})",
                security.ticker,
                intent * 100.0,
                actual * 100.0,
                old_price,
                security.price
            );
            realized.insert(security.ticker.clone(), actual);
        }
        realized
    }

    /// Bound magnitudes into the band owned by the event's severity tier.
    /// Sign is preserved; zero impacts stay zero. This is the guard against
    /// an adversarial or misbehaving generator injecting unbounded shocks.
    pub fn clamp_to_severity(
        impacts: &HashMap<String, f64>,
        severity: Severity,
    ) -> HashMap<String, f64> {
        let (min, max) = severity.band();
        impacts
            .iter()
            .map(|(ticker, &raw)| {
                let clamped = if raw == 0.0 {
                    0.0
                } else {
                    raw.signum() * raw.abs().clamp(min, max)
                };
                (ticker.clone(), clamped)
            })
            .collect()
    }

    /// Deterministic approximate impacts for events that arrive without a
    /// per-security map: per-sector figures from the event when present,
    /// otherwise a static sector sensitivity table, both scaled by beta.
    pub fn fallback_impacts(event: &NewsEvent, market: &MarketState) -> HashMap<String, f64> {
        let base = event.severity.midpoint() * event.tone.sign();
        market
            .tradable()
            .map(|security| {
                let sector_factor = event
                    .sector_impacts
                    .get(&security.sector)
                    .copied()
                    .unwrap_or_else(|| base * sector_modifier(security.sector));
                (security.ticker.clone(), sector_factor * security.beta)
            })
            .collect()
    }

    /// Preferred per-security impacts when supplied, sector fallback
    /// otherwise. Always severity-clamped before use.
    pub fn resolve_impacts(event: &NewsEvent, market: &MarketState) -> HashMap<String, f64> {
        let raw = if event.security_impacts.is_empty() {
            Self::fallback_impacts(event, market)
        } else {
            event.security_impacts.clone()
        };
        Self::clamp_to_severity(&raw, event.severity)
    }
}

impl Default for PriceEngine {
    fn default() -> Self {
        Self::new(0.0005, 0.001)
    }
}

/// How strongly each sector participates in a market-wide story.
fn sector_modifier(sector: Sector) -> f64 {
    match sector {
        Sector::Technology => 1.2,
        Sector::Energy => 1.0,
        Sector::Financials => 1.1,
        Sector::Healthcare => 0.8,
        Sector::Consumer => 0.9,
        Sector::Industrials => 0.9,
        Sector::Utilities => 0.5,
        Sector::Index => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::news::{catalog_event, EventKind, Tone};
    use crate::market::{default_universe, Security};

    fn test_market() -> MarketState {
        MarketState::new(default_universe(), 50)
    }

    #[test]
    fn test_drift_stays_positive_and_small() {
        let engine = PriceEngine::default();
        let mut market = test_market();
        let before: Vec<f64> = market.securities().iter().map(|s| s.price).collect();
        engine.drift(&mut market);
        for (security, old) in market.securities().iter().zip(before) {
            assert!(security.price > 0.0);
            let moved = (security.price - old).abs() / old;
            assert!(moved <= 0.0011, "{} drifted {:.4}%", security.ticker, moved * 100.0);
        }
    }

    #[test]
    fn test_apply_impact_never_kills_price() {
        let engine = PriceEngine::new(0.0, 0.0);
        let mut market = MarketState::new(
            vec![Security::new("PENY", "Penny Co", Sector::Consumer, 1.0, 0.02, 0.02)],
            10,
        );
        let impacts = HashMap::from([("PENY".to_string(), -0.99)]);
        engine.apply_impact(&mut market, &impacts);
        assert!(market.price("PENY").unwrap() >= MIN_PRICE);
    }

    #[test]
    fn test_apply_impact_realized_close_to_intent() {
        let engine = PriceEngine::new(0.0, 0.001);
        let mut market = test_market();
        let impacts = HashMap::from([("NVTX".to_string(), 0.04)]);
        let realized = engine.apply_impact(&mut market, &impacts);
        let actual = realized["NVTX"];
        assert!(actual >= 0.039 && actual <= 0.041, "realized {}", actual);
    }

    #[test]
    fn test_clamp_preserves_sign_and_bounds_magnitude() {
        let raw = HashMap::from([
            ("UP".to_string(), 0.25),
            ("DOWN".to_string(), -0.25),
            ("TINY".to_string(), 0.0001),
            ("ZERO".to_string(), 0.0),
        ]);
        let clamped = PriceEngine::clamp_to_severity(&raw, Severity::Extreme);
        assert!((clamped["UP"] - 0.05).abs() < 1e-12);
        assert!((clamped["DOWN"] + 0.05).abs() < 1e-12);
        assert!((clamped["TINY"] - 0.03).abs() < 1e-12);
        assert_eq!(clamped["ZERO"], 0.0);
    }

    #[test]
    fn test_extreme_event_lands_in_band_and_above_start() {
        // $100 security, extreme +6% intent: clamps into the 3-5% band.
        let engine = PriceEngine::new(0.0, 0.001);
        let mut market = MarketState::new(
            vec![Security::new("XTST", "X Test", Sector::Technology, 1.0, 0.02, 100.0)],
            10,
        );
        let raw = HashMap::from([("XTST".to_string(), 0.06)]);
        let clamped = PriceEngine::clamp_to_severity(&raw, Severity::Extreme);
        let realized = engine.apply_impact(&mut market, &clamped);

        let price = market.price("XTST").unwrap();
        assert!(price > 100.0);
        let actual = realized["XTST"];
        // Band 3%-5% plus the +/-0.1% noise term.
        assert!(actual >= 0.029 && actual <= 0.051, "realized {}", actual);
    }

    #[test]
    fn test_fallback_uses_sector_map_when_present() {
        let market = test_market();
        let mut event = catalog_event(0, 5, market.securities(), &[]);
        event.security_impacts.clear();
        event.kind = EventKind::Macro;
        event.tone = Tone::Bearish;
        event.sector_impacts.insert(Sector::Technology, -0.02);

        let impacts = PriceEngine::fallback_impacts(&event, &market);
        // NVTX: explicit sector figure * beta 1.6
        assert!((impacts["NVTX"] + 0.032).abs() < 1e-9);
        // Non-tech names fall back to the static table, signed by tone.
        assert!(impacts["PETR"] < 0.0);
    }

    #[test]
    fn test_resolve_prefers_per_security_impacts() {
        let market = test_market();
        let event = catalog_event(1, 5, market.securities(), &[]);
        let resolved = PriceEngine::resolve_impacts(&event, &market);
        assert_eq!(resolved.len(), event.security_impacts.len());
    }
}
