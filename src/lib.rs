// Trading Arena Library
//
// A timed multi-participant trading simulation: a shared synthetic market,
// scheduled news events and concurrent decision providers competing on
// mark-to-market returns.

pub mod config;
pub mod error;      // Unified error handling
pub mod export;     // Retrospective JSON reports
pub mod ledger;     // Portfolios, positions, executions
pub mod market;     // Securities, news events, price engine
pub mod providers;  // Decision/generation contracts and built-ins
pub mod scheduler;  // Match lifecycle and event timeline
pub mod standings;
pub mod validation; // Pre-execution trade checks

// Re-export market types
pub use market::{default_universe, MarketSnapshot, MarketState, Sector, Security};
pub use market::news::{catalog_event, EventKind, NewsEvent, Severity, Tone};
pub use market::price_engine::PriceEngine;

// Re-export ledger types
pub use ledger::{
    round_cents, Execution, Portfolio, PortfolioSummary, Position, PositionSide,
    PositionSummary, TradeAction, TradeProposal, TradeRecord,
};

// Re-export validation types
pub use validation::{TradeLimits, TradeValidator, ValidatedTrade, ValidationMode};

// Re-export provider contracts
pub use providers::{
    CatalogGenerator, DecisionContext, DecisionProvider, DecisionSet, GenerationRequest,
    NewsGenerator, ReactionModel, ScriptedProvider,
};
pub use providers::heuristic::opponent_roster;

// Re-export scheduler types
pub use scheduler::{
    DecisionRecord, EventState, MatchPhase, MatchScheduler, Participant, RejectedTrade,
};

// Re-export standings and reporting
pub use standings::{rank, StandingEntry};
pub use export::MatchReport;

// Re-export configuration and errors
pub use config::{ConfigError, MatchConfig};
pub use error::{ArenaError, ArenaResult};
