// Position ledger: cash, long/short positions, margin-debit short model

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::market::MarketState;

/// Round a monetary amount to cent precision. Applied after every ledger
/// operation so floating-point drift cannot accumulate across a match.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn label(&self) -> &'static str {
        match self {
            PositionSide::Long => "long",
            PositionSide::Short => "short",
        }
    }
}

/// What a decision provider asks the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeAction {
    Long,
    Short,
    CloseLong,
    CloseShort,
}

impl TradeAction {
    pub fn is_open(&self) -> bool {
        matches!(self, TradeAction::Long | TradeAction::Short)
    }

    /// The position side this action opens or closes.
    pub fn side(&self) -> PositionSide {
        match self {
            TradeAction::Long | TradeAction::CloseLong => PositionSide::Long,
            TradeAction::Short | TradeAction::CloseShort => PositionSide::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TradeAction::Long => "LONG",
            TradeAction::Short => "SHORT",
            TradeAction::CloseLong => "CLOSE_LONG",
            TradeAction::CloseShort => "CLOSE_SHORT",
        }
    }
}

/// A trade as proposed by a decision provider, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeProposal {
    pub action: TradeAction,
    pub ticker: String,
    pub quantity: u64,
    pub rationale: String,
}

impl TradeProposal {
    pub fn new(action: TradeAction, ticker: &str, quantity: u64, rationale: &str) -> Self {
        Self {
            action,
            ticker: ticker.to_string(),
            quantity,
            rationale: rationale.to_string(),
        }
    }
}

/// An executed trade, appended to the immutable match log.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub participant_id: String,
    pub action: TradeAction,
    pub ticker: String,
    pub quantity: u64,
    pub executed_price: f64,
    pub rationale: String,
    pub timestamp: DateTime<Utc>,
}

/// At most one position per ticker; same-side re-entries merge into a
/// volume-weighted average cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub quantity: u64,
    pub side: PositionSide,
    pub avg_cost: f64,
}

impl Position {
    /// Mark-to-market value under the margin-debit short model.
    pub fn market_value(&self, price: f64) -> f64 {
        let qty = self.quantity as f64;
        match self.side {
            PositionSide::Long => qty * price,
            PositionSide::Short => qty * (2.0 * self.avg_cost - price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        let qty = self.quantity as f64;
        match self.side {
            PositionSide::Long => qty * (price - self.avg_cost),
            PositionSide::Short => qty * (self.avg_cost - price),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
    #[error("insufficient funds: required ${required:.2}, available ${available:.2}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("no open position in {ticker}")]
    NoPosition { ticker: String },

    #[error("close quantity {requested} exceeds held {held} in {ticker}")]
    ExcessClose {
        ticker: String,
        requested: u64,
        held: u64,
    },

    #[error("position in {ticker} is {held}, cannot close {requested}")]
    SideMismatch {
        ticker: String,
        held: &'static str,
        requested: &'static str,
    },
}

/// Result of a successful ledger mutation, used for trade logging.
#[derive(Debug, Clone)]
pub struct Execution {
    pub ticker: String,
    pub quantity: u64,
    pub price: f64,
    /// Signed cash movement: negative for debits, positive for credits.
    pub cash_delta: f64,
}

/// One participant's cash and positions. Mutated only through validated
/// trade execution; knows nothing about time or other participants.
#[derive(Debug, Clone)]
pub struct Portfolio {
    cash: f64,
    positions: HashMap<String, Position>,
}

impl Portfolio {
    pub fn new(starting_cash: f64) -> Self {
        Self {
            cash: round_cents(starting_cash),
            positions: HashMap::new(),
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Open or extend a long position. Debits `qty * price` from cash.
    pub fn open_long(
        &mut self,
        market: &MarketState,
        ticker: &str,
        quantity: u64,
    ) -> Result<Execution, LedgerError> {
        self.open(market, ticker, quantity, PositionSide::Long)
    }

    /// Open or extend a short position. The margin requirement equals the
    /// notional at entry: cash is debited by `qty * price`, not credited.
    pub fn open_short(
        &mut self,
        market: &MarketState,
        ticker: &str,
        quantity: u64,
    ) -> Result<Execution, LedgerError> {
        self.open(market, ticker, quantity, PositionSide::Short)
    }

    fn open(
        &mut self,
        market: &MarketState,
        ticker: &str,
        quantity: u64,
        side: PositionSide,
    ) -> Result<Execution, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let price = market
            .price(ticker)
            .ok_or_else(|| LedgerError::UnknownTicker(ticker.to_string()))?;
        let cost = round_cents(quantity as f64 * price);
        if cost > self.cash {
            return Err(LedgerError::InsufficientFunds {
                required: cost,
                available: self.cash,
            });
        }

        if let Some(position) = self.positions.get_mut(ticker) {
            if position.side != side {
                return Err(LedgerError::SideMismatch {
                    ticker: ticker.to_string(),
                    held: position.side.label(),
                    requested: side.label(),
                });
            }
            let old_qty = position.quantity as f64;
            let new_qty = old_qty + quantity as f64;
            position.avg_cost =
                round_cents((old_qty * position.avg_cost + quantity as f64 * price) / new_qty);
            position.quantity += quantity;
        } else {
            self.positions.insert(
                ticker.to_string(),
                Position {
                    ticker: ticker.to_string(),
                    quantity,
                    side,
                    avg_cost: round_cents(price),
                },
            );
        }

        self.cash = round_cents(self.cash - cost);
        Ok(Execution {
            ticker: ticker.to_string(),
            quantity,
            price,
            cash_delta: -cost,
        })
    }

    /// Reduce or delete a position. Longs credit `qty * current_price`;
    /// shorts credit `qty * (2*avg_cost - current_price)` clamped to zero,
    /// returning the entry margin adjusted for the position's P&L.
    pub fn close(
        &mut self,
        market: &MarketState,
        ticker: &str,
        quantity: u64,
    ) -> Result<Execution, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::ZeroQuantity);
        }
        let price = market
            .price(ticker)
            .ok_or_else(|| LedgerError::UnknownTicker(ticker.to_string()))?;
        let position = self
            .positions
            .get_mut(ticker)
            .ok_or_else(|| LedgerError::NoPosition {
                ticker: ticker.to_string(),
            })?;
        if quantity > position.quantity {
            return Err(LedgerError::ExcessClose {
                ticker: ticker.to_string(),
                requested: quantity,
                held: position.quantity,
            });
        }

        let qty = quantity as f64;
        let credit = match position.side {
            PositionSide::Long => round_cents(qty * price),
            PositionSide::Short => round_cents((qty * (2.0 * position.avg_cost - price)).max(0.0)),
        };

        position.quantity -= quantity;
        if position.quantity == 0 {
            self.positions.remove(ticker);
        }

        self.cash = round_cents(self.cash + credit);
        Ok(Execution {
            ticker: ticker.to_string(),
            quantity,
            price,
            cash_delta: credit,
        })
    }

    /// Total mark-to-market value:
    /// `cash + sum(long qty*price) + sum(short qty*(2*avg - price))`.
    pub fn valuation(&self, market: &MarketState) -> f64 {
        let positions: f64 = self
            .positions
            .values()
            .map(|p| {
                let price = market.price(&p.ticker).unwrap_or(p.avg_cost);
                p.market_value(price)
            })
            .sum();
        round_cents(self.cash + positions)
    }

    /// Point-in-time view handed to decision providers and reports.
    pub fn summary(&self, market: &MarketState) -> PortfolioSummary {
        let mut positions: Vec<PositionSummary> = self
            .positions
            .values()
            .map(|p| {
                let price = market.price(&p.ticker).unwrap_or(p.avg_cost);
                PositionSummary {
                    ticker: p.ticker.clone(),
                    side: p.side,
                    quantity: p.quantity,
                    avg_cost: p.avg_cost,
                    current_price: price,
                    market_value: round_cents(p.market_value(price)),
                    unrealized_pnl: round_cents(p.unrealized_pnl(price)),
                }
            })
            .collect();
        positions.sort_by(|a, b| a.ticker.cmp(&b.ticker));

        PortfolioSummary {
            cash: self.cash,
            total_value: self.valuation(market),
            positions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PositionSummary {
    pub ticker: String,
    pub side: PositionSide,
    pub quantity: u64,
    pub avg_cost: f64,
    pub current_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSummary {
    pub cash: f64,
    pub total_value: f64,
    pub positions: Vec<PositionSummary>,
}

impl PortfolioSummary {
    pub fn position(&self, ticker: &str) -> Option<&PositionSummary> {
        self.positions.iter().find(|p| p.ticker == ticker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Sector, Security};

    fn market_with(ticker: &str, price: f64) -> MarketState {
        MarketState::new(
            vec![Security::new(ticker, "Test Co", Sector::Technology, 1.0, 0.02, price)],
            10,
        )
    }

    fn set_price(market: &mut MarketState, ticker: &str, price: f64) {
        for s in market.securities_mut() {
            if s.ticker == ticker {
                s.price = price;
            }
        }
    }

    #[test]
    fn test_open_long_debits_cash() {
        let market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        let exec = portfolio.open_long(&market, "AAA", 500).unwrap();
        assert_eq!(exec.cash_delta, -50_000.0);
        assert_eq!(portfolio.cash(), 50_000.0);
        assert_eq!(portfolio.position("AAA").unwrap().quantity, 500);
    }

    #[test]
    fn test_open_rejects_insufficient_funds() {
        let market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100.0);
        let err = portfolio.open_long(&market, "AAA", 2).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(portfolio.cash(), 100.0);
        assert!(portfolio.position("AAA").is_none());
    }

    #[test]
    fn test_vwap_merge_on_repeated_longs() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_long(&market, "AAA", 100).unwrap();
        set_price(&mut market, "AAA", 110.0);
        portfolio.open_long(&market, "AAA", 100).unwrap();

        let position = portfolio.position("AAA").unwrap();
        assert_eq!(position.quantity, 200);
        assert_eq!(position.avg_cost, 105.0);
    }

    #[test]
    fn test_long_close_credits_qty_times_price() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_long(&market, "AAA", 500).unwrap();
        set_price(&mut market, "AAA", 104.50);

        let exec = portfolio.close(&market, "AAA", 500).unwrap();
        assert_eq!(exec.cash_delta, 52_250.0);
        assert_eq!(portfolio.cash(), 102_250.0);
        assert!(portfolio.position("AAA").is_none());
    }

    #[test]
    fn test_short_margin_debit_and_close_formula() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);

        // Margin debit equals notional at entry.
        portfolio.open_short(&market, "AAA", 100).unwrap();
        assert_eq!(portfolio.cash(), 90_000.0);

        // Price falls: credit qty*(2*avg - price) = 100*(200 - 92) = 10_800.
        set_price(&mut market, "AAA", 92.0);
        let exec = portfolio.close(&market, "AAA", 100).unwrap();
        assert_eq!(exec.cash_delta, 10_800.0);
        assert_eq!(portfolio.cash(), 100_800.0);
    }

    #[test]
    fn test_short_close_clamped_at_zero() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_short(&market, "AAA", 100).unwrap();

        // Price more than doubles: 2*avg - price < 0, credit clamps to 0.
        set_price(&mut market, "AAA", 250.0);
        let exec = portfolio.close(&market, "AAA", 100).unwrap();
        assert_eq!(exec.cash_delta, 0.0);
        assert_eq!(portfolio.cash(), 90_000.0);
    }

    #[test]
    fn test_close_more_than_held_rejected() {
        let market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_long(&market, "AAA", 10).unwrap();
        let err = portfolio.close(&market, "AAA", 11).unwrap_err();
        assert!(matches!(err, LedgerError::ExcessClose { held: 10, .. }));
        assert_eq!(portfolio.position("AAA").unwrap().quantity, 10);
    }

    #[test]
    fn test_opposite_side_open_rejected() {
        let market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_long(&market, "AAA", 10).unwrap();
        let err = portfolio.open_short(&market, "AAA", 10).unwrap_err();
        assert!(matches!(err, LedgerError::SideMismatch { .. }));
    }

    #[test]
    fn test_incremental_valuation_matches_from_scratch() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);

        portfolio.open_long(&market, "AAA", 120).unwrap();
        set_price(&mut market, "AAA", 97.25);
        portfolio.close(&market, "AAA", 40).unwrap();
        set_price(&mut market, "AAA", 101.10);
        portfolio.open_long(&market, "AAA", 30).unwrap();
        set_price(&mut market, "AAA", 99.80);

        // Rebuild valuation from the final cash + positions only.
        let position = portfolio.position("AAA").unwrap();
        let from_scratch = round_cents(
            portfolio.cash() + position.quantity as f64 * market.price("AAA").unwrap(),
        );
        assert_eq!(portfolio.valuation(&market), from_scratch);
    }

    #[test]
    fn test_valuation_includes_short_positions() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_short(&market, "AAA", 100).unwrap();

        set_price(&mut market, "AAA", 95.0);
        // cash 90_000 + 100*(200 - 95) = 100_500
        assert_eq!(portfolio.valuation(&market), 100_500.0);
    }

    #[test]
    fn test_cent_rounding_after_each_operation() {
        let market = market_with("AAA", 33.333333);
        let mut portfolio = Portfolio::new(1_000.0);
        portfolio.open_long(&market, "AAA", 3).unwrap();
        let cents = (portfolio.cash() * 100.0).round() / 100.0;
        assert_eq!(portfolio.cash(), cents);
    }

    #[test]
    fn test_summary_reports_unrealized_pnl() {
        let mut market = market_with("AAA", 100.0);
        let mut portfolio = Portfolio::new(100_000.0);
        portfolio.open_short(&market, "AAA", 50).unwrap();
        set_price(&mut market, "AAA", 90.0);

        let summary = portfolio.summary(&market);
        let position = summary.position("AAA").unwrap();
        assert_eq!(position.unrealized_pnl, 500.0);
        assert_eq!(summary.total_value, portfolio.valuation(&market));
    }
}
