// Built-in autonomous opponents

use async_trait::async_trait;
use rand::{thread_rng, Rng};

use crate::ledger::{PositionSide, TradeAction, TradeProposal};
use crate::market::news::{EventKind, Tone};
use crate::market::{MarketSnapshot, Security};

use super::{DecisionContext, DecisionProvider, DecisionSet, ProviderError};

/// Fraction of cash a heuristic commits to a single new position.
const POSITION_BUDGET_PCT: f64 = 0.20;

fn affordable_quantity(cash: f64, price: f64) -> u64 {
    if price <= 0.0 {
        return 0;
    }
    ((cash * POSITION_BUDGET_PCT) / price).floor() as u64
}

fn recent_move(market: &MarketSnapshot, ticker: &str, lookback: usize) -> Option<f64> {
    let history = market.history.get(ticker)?;
    if history.len() < 2 {
        return None;
    }
    let start = history.len().saturating_sub(lookback.max(2));
    let old = history[start];
    let last = *history.last()?;
    if old <= 0.0 {
        return None;
    }
    Some((last - old) / old)
}

/// Chases the strongest recent mover and cuts positions that turn against it.
pub struct MomentumProvider {
    name: String,
    lookback: usize,
    entry_threshold: f64,
}

impl MomentumProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lookback: 10,
            entry_threshold: 0.002,
        }
    }
}

#[async_trait]
impl DecisionProvider for MomentumProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, ctx: &DecisionContext) -> Result<DecisionSet, ProviderError> {
        let mut trades = Vec::new();

        // Exit anything moving against us by more than the entry threshold.
        for position in &ctx.portfolio.positions {
            let Some(moved) = recent_move(&ctx.market, &position.ticker, self.lookback) else {
                continue;
            };
            let against = match position.side {
                PositionSide::Long => moved < -self.entry_threshold,
                PositionSide::Short => moved > self.entry_threshold,
            };
            if against {
                let action = match position.side {
                    PositionSide::Long => TradeAction::CloseLong,
                    PositionSide::Short => TradeAction::CloseShort,
                };
                trades.push(TradeProposal::new(
                    action,
                    &position.ticker,
                    position.quantity,
                    "momentum reversed, cutting the position",
                ));
            }
        }

        // Enter the strongest mover we do not already hold.
        let mut best: Option<(&Security, f64)> = None;
        for security in ctx.market.securities.iter().filter(|s| s.tradable) {
            if ctx.portfolio.position(&security.ticker).is_some() {
                continue;
            }
            let Some(moved) = recent_move(&ctx.market, &security.ticker, self.lookback) else {
                continue;
            };
            if moved.abs() < self.entry_threshold {
                continue;
            }
            if best.map(|(_, m)| moved.abs() > m.abs()).unwrap_or(true) {
                best = Some((security, moved));
            }
        }

        if let Some((security, moved)) = best {
            let quantity = affordable_quantity(ctx.portfolio.cash, security.price);
            if quantity > 0 {
                let action = if moved > 0.0 {
                    TradeAction::Long
                } else {
                    TradeAction::Short
                };
                trades.push(TradeProposal::new(
                    action,
                    &security.ticker,
                    quantity,
                    "riding the strongest recent move",
                ));
            }
        }

        Ok(DecisionSet {
            trades,
            rationale: "follow recent price momentum".to_string(),
        })
    }
}

/// Mean reversion: buys the biggest recent loser, shorts the biggest gainer.
pub struct ContrarianProvider {
    name: String,
    lookback: usize,
    entry_threshold: f64,
}

impl ContrarianProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            lookback: 10,
            entry_threshold: 0.005,
        }
    }
}

#[async_trait]
impl DecisionProvider for ContrarianProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, ctx: &DecisionContext) -> Result<DecisionSet, ProviderError> {
        let mut trades = Vec::new();
        let mut extreme: Option<(&Security, f64)> = None;

        for security in ctx.market.securities.iter().filter(|s| s.tradable) {
            if ctx.portfolio.position(&security.ticker).is_some() {
                continue;
            }
            let Some(moved) = recent_move(&ctx.market, &security.ticker, self.lookback) else {
                continue;
            };
            if moved.abs() < self.entry_threshold {
                continue;
            }
            if extreme.map(|(_, m)| moved.abs() > m.abs()).unwrap_or(true) {
                extreme = Some((security, moved));
            }
        }

        if let Some((security, moved)) = extreme {
            let quantity = affordable_quantity(ctx.portfolio.cash, security.price);
            if quantity > 0 {
                let action = if moved < 0.0 {
                    TradeAction::Long
                } else {
                    TradeAction::Short
                };
                trades.push(TradeProposal::new(
                    action,
                    &security.ticker,
                    quantity,
                    "fading an overextended move",
                ));
            }
        }

        Ok(DecisionSet {
            trades,
            rationale: "bet on reversion of the widest move".to_string(),
        })
    }
}

/// Trades the latest headline directly: follows tone on the target name,
/// or the highest-beta name in a macro story.
pub struct HeadlineProvider {
    name: String,
}

impl HeadlineProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl DecisionProvider for HeadlineProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, ctx: &DecisionContext) -> Result<DecisionSet, ProviderError> {
        let Some(event) = ctx.market.latest_news() else {
            return Ok(DecisionSet::none("no news yet"));
        };

        let target = match &event.kind {
            EventKind::Company { ticker } => ctx.market.security(ticker),
            EventKind::Macro => ctx
                .market
                .securities
                .iter()
                .filter(|s| s.tradable && ctx.portfolio.position(&s.ticker).is_none())
                .max_by(|a, b| a.beta.total_cmp(&b.beta)),
        };
        let Some(security) = target else {
            return Ok(DecisionSet::none("no tradable target for this story"));
        };
        if ctx.portfolio.position(&security.ticker).is_some() {
            return Ok(DecisionSet::none("already positioned in the target"));
        }

        let quantity = affordable_quantity(ctx.portfolio.cash, security.price);
        if quantity == 0 {
            return Ok(DecisionSet::none("not enough cash to act on the story"));
        }

        let action = match event.tone {
            Tone::Bullish => TradeAction::Long,
            Tone::Bearish => TradeAction::Short,
        };
        Ok(DecisionSet {
            trades: vec![TradeProposal::new(
                action,
                &security.ticker,
                quantity,
                "positioning with the latest headline",
            )],
            rationale: format!("react to: {}", event.headline),
        })
    }
}

/// Random small trades; keeps the tape moving and the field honest.
pub struct NoiseProvider {
    name: String,
    trade_probability: f64,
}

impl NoiseProvider {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            trade_probability: 0.6,
        }
    }
}

#[async_trait]
impl DecisionProvider for NoiseProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, ctx: &DecisionContext) -> Result<DecisionSet, ProviderError> {
        let mut rng = thread_rng();
        if !rng.gen_bool(self.trade_probability) {
            return Ok(DecisionSet::none("sitting this one out"));
        }

        // Half the time, close something instead of opening.
        if rng.gen_bool(0.5) {
            if let Some(position) = ctx.portfolio.positions.first() {
                let action = match position.side {
                    PositionSide::Long => TradeAction::CloseLong,
                    PositionSide::Short => TradeAction::CloseShort,
                };
                let quantity = rng.gen_range(1..=position.quantity);
                return Ok(DecisionSet {
                    trades: vec![TradeProposal::new(
                        action,
                        &position.ticker,
                        quantity,
                        "taking some off the table",
                    )],
                    rationale: "random partial exit".to_string(),
                });
            }
        }

        let tradable: Vec<&Security> =
            ctx.market.securities.iter().filter(|s| s.tradable).collect();
        if tradable.is_empty() {
            return Ok(DecisionSet::none("nothing tradable"));
        }
        let security = tradable[rng.gen_range(0..tradable.len())];
        let budget = affordable_quantity(ctx.portfolio.cash, security.price);
        if budget == 0 {
            return Ok(DecisionSet::none("out of cash"));
        }
        let quantity = rng.gen_range(1..=budget.min(50).max(1));
        let action = if rng.gen_bool(0.7) {
            TradeAction::Long
        } else {
            TradeAction::Short
        };

        Ok(DecisionSet {
            trades: vec![TradeProposal::new(
                action,
                &security.ticker,
                quantity,
                "gut feel",
            )],
            rationale: "random flow".to_string(),
        })
    }
}

/// The default opponent roster for a demo match, cycled by slot index.
pub fn opponent_roster(count: usize) -> Vec<Box<dyn DecisionProvider>> {
    let mut roster: Vec<Box<dyn DecisionProvider>> = Vec::with_capacity(count);
    for slot in 0..count {
        let provider: Box<dyn DecisionProvider> = match slot % 4 {
            0 => Box::new(HeadlineProvider::new(&format!("headline-{}", slot + 1))),
            1 => Box::new(MomentumProvider::new(&format!("momentum-{}", slot + 1))),
            2 => Box::new(ContrarianProvider::new(&format!("contrarian-{}", slot + 1))),
            _ => Box::new(NoiseProvider::new(&format!("noise-{}", slot + 1))),
        };
        roster.push(provider);
    }
    roster
}
