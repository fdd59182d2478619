// Pre-trade validation: affordability, concentration, tradability

use serde::Serialize;
use thiserror::Error;

use crate::ledger::{Portfolio, TradeProposal};
use crate::market::MarketState;

/// How affordability failures are treated.
///
/// `Hard` is the standalone/manual path: an open whose notional exceeds
/// available cash is rejected outright. `Auto` is the scheduler's
/// auto-execution path: the requested quantity is clamped down to the
/// maximum affordable whole-share amount instead, and rejected only when
/// not even one share is affordable. Both behaviors are deliberate and
/// must stay distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationMode {
    Hard,
    Auto,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("{0} is a derived instrument and cannot be traded")]
    NotTradable(String),

    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("insufficient funds: required ${required:.2}, available ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error(
        "concentration limit: {ticker} would be {would_be_pct:.1}% of portfolio, limit {limit_pct:.1}%"
    )]
    ConcentrationLimit {
        ticker: String,
        would_be_pct: f64,
        limit_pct: f64,
    },

    #[error("no open position in {ticker} to close")]
    NoPosition { ticker: String },

    #[error("close quantity {requested} exceeds held {held} in {ticker}")]
    ExcessClose {
        ticker: String,
        requested: u64,
        held: u64,
    },

    #[error("position in {ticker} is {held}, cannot {requested}")]
    SideMismatch {
        ticker: String,
        held: &'static str,
        requested: &'static str,
    },
}

/// Match-wide limits applied before any ledger mutation.
#[derive(Debug, Clone, Serialize)]
pub struct TradeLimits {
    /// Maximum fraction of total portfolio value allowed in one ticker.
    pub max_position_pct: f64,
}

impl Default for TradeLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 0.40,
        }
    }
}

/// A proposal that passed validation, possibly with a clamped quantity.
#[derive(Debug, Clone)]
pub struct ValidatedTrade {
    pub proposal: TradeProposal,
    /// Original requested quantity when auto-mode affordability clamping
    /// reduced it.
    pub clamped_from: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct TradeValidator {
    limits: TradeLimits,
}

impl TradeValidator {
    pub fn new(limits: TradeLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &TradeLimits {
        &self.limits
    }

    /// Validate a proposal against the current portfolio and market.
    /// Never mutates state: a rejected trade leaves the ledger untouched.
    pub fn validate(
        &self,
        proposal: &TradeProposal,
        portfolio: &Portfolio,
        market: &MarketState,
        mode: ValidationMode,
    ) -> Result<ValidatedTrade, ValidationError> {
        let security = market
            .security(&proposal.ticker)
            .ok_or_else(|| ValidationError::UnknownTicker(proposal.ticker.clone()))?;
        if !security.tradable {
            return Err(ValidationError::NotTradable(proposal.ticker.clone()));
        }
        if proposal.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }

        if proposal.action.is_open() {
            self.validate_open(proposal, portfolio, market, security.price, mode)
        } else {
            Self::validate_close(proposal, portfolio)
        }
    }

    fn validate_open(
        &self,
        proposal: &TradeProposal,
        portfolio: &Portfolio,
        market: &MarketState,
        price: f64,
        mode: ValidationMode,
    ) -> Result<ValidatedTrade, ValidationError> {
        let cash = portfolio.cash();
        let requested_notional = proposal.quantity as f64 * price;

        let (quantity, clamped_from) = if requested_notional > cash {
            match mode {
                ValidationMode::Hard => {
                    return Err(ValidationError::InsufficientFunds {
                        required: requested_notional,
                        available: cash,
                    });
                }
                ValidationMode::Auto => {
                    let affordable = (cash / price).floor() as u64;
                    if affordable == 0 {
                        return Err(ValidationError::InsufficientFunds {
                            required: price,
                            available: cash,
                        });
                    }
                    (affordable, Some(proposal.quantity))
                }
            }
        } else {
            (proposal.quantity, None)
        };

        // Concentration is checked against total value before the trade.
        let total_value = portfolio.valuation(market);
        if total_value > 0.0 {
            let existing = portfolio
                .position(&proposal.ticker)
                .map(|p| p.quantity as f64 * price)
                .unwrap_or(0.0);
            let exposure = existing + quantity as f64 * price;
            let would_be = exposure / total_value;
            if would_be > self.limits.max_position_pct {
                return Err(ValidationError::ConcentrationLimit {
                    ticker: proposal.ticker.clone(),
                    would_be_pct: would_be * 100.0,
                    limit_pct: self.limits.max_position_pct * 100.0,
                });
            }
        }

        Ok(ValidatedTrade {
            proposal: TradeProposal {
                quantity,
                ..proposal.clone()
            },
            clamped_from,
        })
    }

    fn validate_close(
        proposal: &TradeProposal,
        portfolio: &Portfolio,
    ) -> Result<ValidatedTrade, ValidationError> {
        let position = portfolio
            .position(&proposal.ticker)
            .ok_or_else(|| ValidationError::NoPosition {
                ticker: proposal.ticker.clone(),
            })?;

        if position.side != proposal.action.side() {
            return Err(ValidationError::SideMismatch {
                ticker: proposal.ticker.clone(),
                held: position.side.label(),
                requested: proposal.action.label(),
            });
        }
        if proposal.quantity > position.quantity {
            return Err(ValidationError::ExcessClose {
                ticker: proposal.ticker.clone(),
                requested: proposal.quantity,
                held: position.quantity,
            });
        }

        Ok(ValidatedTrade {
            proposal: proposal.clone(),
            clamped_from: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::TradeAction;
    use crate::market::{default_universe, MarketState, Sector, Security};

    fn market() -> MarketState {
        MarketState::new(default_universe(), 10)
    }

    fn hundred_dollar_market() -> MarketState {
        MarketState::new(
            vec![Security::new("AAA", "Test Co", Sector::Technology, 1.0, 0.02, 100.0)],
            10,
        )
    }

    fn proposal(action: TradeAction, ticker: &str, quantity: u64) -> TradeProposal {
        TradeProposal::new(action, ticker, quantity, "test")
    }

    #[test]
    fn test_unknown_ticker_rejected() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(10_000.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "NOPE", 1),
                &portfolio,
                &market(),
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::UnknownTicker(_)));
    }

    #[test]
    fn test_synthetic_index_not_tradable() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(1_000_000.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "ARX50", 1),
                &portfolio,
                &market(),
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotTradable(_)));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(10_000.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "NVTX", 0),
                &portfolio,
                &market(),
                ValidationMode::Auto,
            )
            .unwrap_err();
        assert_eq!(err, ValidationError::ZeroQuantity);
    }

    #[test]
    fn test_hard_mode_rejects_unaffordable_open() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(1_000.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 50),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_auto_mode_clamps_to_affordable() {
        // The clamped 10-share trade is nearly the whole portfolio, so the
        // concentration cap must be out of the way to observe the clamp.
        let validator = TradeValidator::new(TradeLimits {
            max_position_pct: 1.0,
        });
        let portfolio = Portfolio::new(1_050.0);
        let validated = validator
            .validate(
                &proposal(TradeAction::Short, "AAA", 50),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Auto,
            )
            .unwrap();
        assert_eq!(validated.proposal.quantity, 10);
        assert_eq!(validated.clamped_from, Some(50));
    }

    #[test]
    fn test_clamped_quantity_still_subject_to_concentration_cap() {
        // Clamping to 10 affordable shares leaves a $1,000 position in a
        // $1,050 portfolio; the default cap must still reject it.
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(1_050.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Short, "AAA", 50),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Auto,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConcentrationLimit { .. }));
    }

    #[test]
    fn test_auto_mode_rejects_when_one_share_unaffordable() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(99.0);
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 5),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Auto,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_concentration_limit_enforced() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(100_000.0);
        // 45% of a 100k portfolio in one ticker exceeds the 40% default.
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 450),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConcentrationLimit { .. }));
    }

    #[test]
    fn test_concentration_counts_existing_exposure() {
        let validator = TradeValidator::default();
        let market = hundred_dollar_market();
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_long(&market, "AAA", 300).unwrap();

        // 300 held + 150 new = 45% of total value.
        let err = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 150),
                &portfolio,
                &market,
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::ConcentrationLimit { .. }));

        // 50 more stays under the limit.
        assert!(validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 50),
                &portfolio,
                &market,
                ValidationMode::Hard,
            )
            .is_ok());
    }

    #[test]
    fn test_close_without_position_rejected() {
        let validator = TradeValidator::default();
        let portfolio = Portfolio::new(10_000.0);
        let err = validator
            .validate(
                &proposal(TradeAction::CloseLong, "AAA", 5),
                &portfolio,
                &hundred_dollar_market(),
                ValidationMode::Auto,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::NoPosition { .. }));
    }

    #[test]
    fn test_close_side_mismatch_rejected() {
        let validator = TradeValidator::default();
        let market = hundred_dollar_market();
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_short(&market, "AAA", 10).unwrap();

        let err = validator
            .validate(
                &proposal(TradeAction::CloseLong, "AAA", 10),
                &portfolio,
                &market,
                ValidationMode::Auto,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::SideMismatch { .. }));
    }

    #[test]
    fn test_half_portfolio_spend_then_hard_reject() {
        // $100k cash, 500 shares at $100 is a full 50% spend; the default
        // concentration limit would block that, so widen the limit here.
        let validator = TradeValidator::new(TradeLimits {
            max_position_pct: 0.60,
        });
        let market = hundred_dollar_market();
        let mut portfolio = Portfolio::new(100_000.0);

        let first = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 500),
                &portfolio,
                &market,
                ValidationMode::Hard,
            )
            .unwrap();
        portfolio
            .open_long(&market, "AAA", first.proposal.quantity)
            .unwrap();
        assert_eq!(portfolio.cash(), 50_000.0);

        let err = validator
            .validate(
                &proposal(TradeAction::Long, "AAA", 600),
                &portfolio,
                &market,
                ValidationMode::Hard,
            )
            .unwrap_err();
        assert!(matches!(err, ValidationError::InsufficientFunds { .. }));
        assert_eq!(portfolio.position("AAA").unwrap().quantity, 500);
    }
}
