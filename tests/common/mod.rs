// Common test utilities and helpers
#![allow(dead_code)]

use std::sync::Arc;

use trading_arena::providers::heuristic::opponent_roster;
use trading_arena::{
    default_universe, CatalogGenerator, MarketState, MatchConfig, MatchScheduler, Participant,
    ScriptedProvider, Security, TradeProposal,
};

/// Fast, deterministic match configuration: no noise, no drift, short
/// windows so paused-clock tests finish in milliseconds of virtual time.
pub fn fast_config(events: usize, trading_secs: u64) -> MatchConfig {
    let mut config = MatchConfig::default();
    config.market.drift_pct = 0.0;
    config.market.impact_noise_pct = 0.0;
    config.timing.countdown_secs = 2;
    config.timing.trading_secs = trading_secs;
    config.timing.event_count = events;
    config.timing.prefetch_lead_secs = 5;
    config.timing.reaction_delay_secs = 3;
    config.timing.decision_timeout_secs = 5;
    config.timing.generation_timeout_secs = 5;
    config.timing.drift_interval_secs = 5;
    config
}

/// A market with the stock universe and a short history buffer.
pub fn test_market() -> MarketState {
    MarketState::new(default_universe(), 16)
}

/// A two-security universe with known round prices, handy for exact
/// cash assertions.
pub fn tiny_universe() -> Vec<Security> {
    vec![
        Security::new("AAA", "Alpha Corp", trading_arena::Sector::Technology, 1.0, 0.02, 100.0),
        Security::new("BBB", "Beta Industries", trading_arena::Sector::Energy, 1.0, 0.02, 50.0),
    ]
}

/// Participant that replays the given rounds of trades.
pub fn scripted_participant(id: &str, rounds: Vec<Vec<TradeProposal>>) -> Participant {
    Participant::new(id, id, Arc::new(ScriptedProvider::new(id, rounds)), 100_000.0)
}

/// Scheduler over the default universe with the catalog generator.
pub fn catalog_match(
    config: MatchConfig,
    participants: Vec<Participant>,
) -> MatchScheduler {
    MatchScheduler::new(
        config,
        default_universe(),
        participants,
        Arc::new(CatalogGenerator),
        None,
    )
    .expect("match setup should succeed")
}

/// A roster of heuristic opponents wrapped as participants.
pub fn heuristic_participants(count: usize, starting_cash: f64) -> Vec<Participant> {
    opponent_roster(count)
        .into_iter()
        .map(|provider| {
            let provider: Arc<dyn trading_arena::DecisionProvider> = Arc::from(provider);
            let name = provider.name().to_string();
            Participant::new(&name, &name, provider, starting_cash)
        })
        .collect()
}
