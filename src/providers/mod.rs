// External-collaborator contracts: decisions, news generation, reactions

pub mod heuristic;

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::{PortfolioSummary, TradeProposal};
use crate::market::news::NewsEvent;
use crate::market::{MarketSnapshot, Security};
use crate::standings::StandingEntry;

/// Everything a decision provider sees for one round. Providers must be
/// stateless across calls; all needed context is carried here.
#[derive(Debug, Clone)]
pub struct DecisionContext {
    pub market: MarketSnapshot,
    pub portfolio: PortfolioSummary,
    pub standings: Vec<StandingEntry>,
}

/// Zero or more proposed trades plus the provider's reasoning.
#[derive(Debug, Clone, Default)]
pub struct DecisionSet {
    pub trades: Vec<TradeProposal>,
    pub rationale: String,
}

impl DecisionSet {
    pub fn none(rationale: &str) -> Self {
        Self {
            trades: Vec::new(),
            rationale: rationale.to_string(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// The propose-trades contract. The engine wraps every call in a timeout;
/// a timeout or error counts as zero trades for that round and never blocks
/// the shared timeline.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn propose(&self, ctx: &DecisionContext) -> Result<DecisionSet, ProviderError>;
}

/// Inputs for generating one event's content ahead of its display time.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub securities: Vec<Security>,
    pub event_index: usize,
    pub total_events: usize,
    /// Headlines already shown this match, to avoid repeats.
    pub used_headlines: Vec<String>,
    /// Tickers already targeted by company-specific events.
    pub used_tickers: Vec<String>,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("news generation failed: {0}")]
    Failed(String),

    #[error("news generation timed out after {0:?}")]
    TimedOut(Duration),
}

/// Produces event content (headline, severity, intended impacts). Failure
/// or timeout degrades to the deterministic internal catalog.
#[async_trait]
pub trait NewsGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<NewsEvent, GenerationError>;
}

/// Optional secondary refinement of a generated event's price impacts.
/// Failure falls back to the generator's own impacts, then the sector table.
#[async_trait]
pub trait ReactionModel: Send + Sync {
    async fn expected_moves(
        &self,
        headline: &str,
        securities: &[Security],
    ) -> Result<HashMap<String, f64>, GenerationError>;
}

/// Default generator: serves the deterministic internal catalog directly.
#[derive(Debug, Default)]
pub struct CatalogGenerator;

#[async_trait]
impl NewsGenerator for CatalogGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<NewsEvent, GenerationError> {
        Ok(crate::market::news::catalog_event(
            request.event_index,
            request.total_events,
            &request.securities,
            &request.used_tickers,
        ))
    }
}

/// Replays a fixed sequence of decision sets, one per round. Stands in for
/// the human-directed agent in the demo binary and in deterministic tests.
pub struct ScriptedProvider {
    name: String,
    script: Mutex<VecDeque<Vec<TradeProposal>>>,
}

impl ScriptedProvider {
    pub fn new(name: &str, rounds: Vec<Vec<TradeProposal>>) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(rounds.into()),
        }
    }
}

#[async_trait]
impl DecisionProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn propose(&self, _ctx: &DecisionContext) -> Result<DecisionSet, ProviderError> {
        let next = self
            .script
            .lock()
            .map_err(|_| ProviderError::Unavailable("script lock poisoned".to_string()))?
            .pop_front();
        match next {
            Some(trades) => Ok(DecisionSet {
                trades,
                rationale: "scripted round".to_string(),
            }),
            None => Ok(DecisionSet::none("script exhausted")),
        }
    }
}
