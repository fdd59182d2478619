// Match scheduler: drives the countdown, event timeline, decision rounds
// and retrospective over a single shared market

pub mod schedule;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::oneshot;
use tokio::time::{interval, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::error::{ArenaError, ArenaResult};
use crate::export::{DecisionReport, EventReport, MatchReport, RejectionReport};
use crate::ledger::{Portfolio, TradeAction, TradeProposal, TradeRecord};
use crate::market::news::{catalog_event, NewsEvent};
use crate::market::price_engine::PriceEngine;
use crate::market::{MarketState, Security};
use crate::providers::{DecisionContext, DecisionProvider, GenerationRequest, NewsGenerator, ReactionModel};
use crate::standings::{rank, StandingEntry};
use crate::validation::{TradeLimits, TradeValidator, ValidationMode};

pub use schedule::{build_schedule, EventScheduleEntry, EventState, MatchPhase, ScheduledEvent};

/// One competitor: a decision provider plus its isolated ledger.
pub struct Participant {
    pub id: String,
    pub display_name: String,
    pub provider: Arc<dyn DecisionProvider>,
    pub portfolio: Portfolio,
    pub starting_cash: f64,
    pub trade_count: usize,
}

impl Participant {
    pub fn new(
        id: &str,
        display_name: &str,
        provider: Arc<dyn DecisionProvider>,
        starting_cash: f64,
    ) -> Self {
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            provider,
            portfolio: Portfolio::new(starting_cash),
            starting_cash,
            trade_count: 0,
        }
    }
}

/// An executed trade kept for the retrospective. The exit price is stamped
/// when the match finishes.
#[derive(Debug, Clone)]
pub struct DecisionRecord {
    pub event_index: Option<usize>,
    pub record: TradeRecord,
    pub exit_price: Option<f64>,
}

impl DecisionRecord {
    /// Hindsight verdict: did the final price move the way this trade
    /// needed it to? Closes invert their opening side, so an early exit
    /// before a drop counts as favorable.
    pub fn favorable(&self) -> Option<bool> {
        let exit = self.exit_price?;
        let entry = self.record.executed_price;
        Some(match self.record.action {
            TradeAction::Long | TradeAction::CloseShort => exit > entry,
            TradeAction::Short | TradeAction::CloseLong => exit < entry,
        })
    }
}

#[derive(Debug, Clone)]
pub struct RejectedTrade {
    pub participant_id: String,
    pub event_index: Option<usize>,
    pub proposal: TradeProposal,
    pub reason: String,
}

/// Owns the whole match: market, participants, event timeline and the
/// tick loop that advances them together.
pub struct MatchScheduler {
    match_id: Uuid,
    config: MatchConfig,
    phase: MatchPhase,
    market: MarketState,
    price_engine: PriceEngine,
    validator: TradeValidator,
    participants: Vec<Participant>,
    events: Vec<ScheduledEvent>,
    generator: Arc<dyn NewsGenerator>,
    reaction: Option<Arc<dyn ReactionModel>>,
    published: Vec<NewsEvent>,
    decisions: Vec<DecisionRecord>,
    rejections: Vec<RejectedTrade>,
    used_headlines: Vec<String>,
    used_tickers: Vec<String>,
}

impl MatchScheduler {
    pub fn new(
        config: MatchConfig,
        securities: Vec<Security>,
        participants: Vec<Participant>,
        generator: Arc<dyn NewsGenerator>,
        reaction: Option<Arc<dyn ReactionModel>>,
    ) -> ArenaResult<Self> {
        config.validate()?;

        if participants.is_empty() {
            return Err(ArenaError::MatchSetup(
                "a match needs at least one participant".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for participant in &participants {
            if participant.id.trim().is_empty() {
                return Err(ArenaError::MatchSetup(
                    "participant id cannot be empty".to_string(),
                ));
            }
            if !seen.insert(participant.id.clone()) {
                return Err(ArenaError::MatchSetup(format!(
                    "duplicate participant id: {}",
                    participant.id
                )));
            }
        }

        if !securities.iter().any(|s| s.tradable) {
            return Err(ArenaError::MatchSetup(
                "the universe needs at least one tradable security".to_string(),
            ));
        }

        let events = build_schedule(&config.timing)?
            .into_iter()
            .map(ScheduledEvent::new)
            .collect();

        let market = MarketState::new(securities, config.market.price_history_size);
        let price_engine =
            PriceEngine::new(config.market.drift_pct, config.market.impact_noise_pct);
        let validator = TradeValidator::new(TradeLimits {
            max_position_pct: config.limits.max_position_pct,
        });

        Ok(Self {
            match_id: Uuid::new_v4(),
            config,
            phase: MatchPhase::Idle,
            market,
            price_engine,
            validator,
            participants,
            events,
            generator,
            reaction,
            published: Vec::new(),
            decisions: Vec::new(),
            rejections: Vec::new(),
            used_headlines: Vec::new(),
            used_tickers: Vec::new(),
        })
    }

    pub fn match_id(&self) -> Uuid {
        self.match_id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    pub fn events(&self) -> &[ScheduledEvent] {
        &self.events
    }

    pub fn published(&self) -> &[NewsEvent] {
        &self.published
    }

    pub fn decisions(&self) -> &[DecisionRecord] {
        &self.decisions
    }

    pub fn rejections(&self) -> &[RejectedTrade] {
        &self.rejections
    }

    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    /// Current mark-to-market ranking.
    pub fn standings(&self) -> Vec<StandingEntry> {
        let entries = self
            .participants
            .iter()
            .map(|p| {
                StandingEntry::new(
                    &p.id,
                    &p.display_name,
                    p.starting_cash,
                    p.portfolio.valuation(&self.market),
                    p.trade_count,
                )
            })
            .collect();
        rank(entries)
    }

    /// Run the match end to end: countdown, trading window with scheduled
    /// events and background drift, then the retrospective report.
    pub async fn run(&mut self) -> ArenaResult<MatchReport> {
        if self.phase != MatchPhase::Idle {
            return Err(ArenaError::MatchSetup(format!(
                "match already {}",
                self.phase.label()
            )));
        }

        self.phase = MatchPhase::Countdown;
        info!(
            "🏁 Match {} starting: {} participants, {} events, {}s countdown + {}s trading",
            self.match_id,
            self.participants.len(),
            self.events.len(),
            self.config.timing.countdown_secs,
            self.config.timing.trading_secs
        );
        self.market.record_history();

        let start = Instant::now();
        let match_end = self.config.timing.match_end();
        let drift_interval = self.config.timing.drift_interval();
        let mut last_drift = Duration::ZERO;
        let mut ticker = interval(Duration::from_secs(1));

        loop {
            ticker.tick().await;
            let elapsed = start.elapsed();

            if self.phase == MatchPhase::Countdown && elapsed >= self.config.timing.countdown() {
                self.phase = MatchPhase::Trading;
                info!("📈 Trading window open");
            }

            if self.phase == MatchPhase::Trading
                && elapsed.saturating_sub(last_drift) >= drift_interval
            {
                self.price_engine.drift(&mut self.market);
                self.market.record_history();
                last_drift = elapsed;
                if self.config.logging.log_prices {
                    for security in self.market.securities() {
                        debug!("💲 {} {:.2}", security.ticker, security.price);
                    }
                }
            }

            self.service_events(elapsed).await;

            if elapsed >= match_end {
                break;
            }
        }

        Ok(self.finish())
    }

    /// One pass over the event timeline. Each entry walks its own state
    /// machine; an overdue display stays deferred until content arrives
    /// rather than being skipped.
    async fn service_events(&mut self, elapsed: Duration) {
        for index in 0..self.events.len() {
            if matches!(self.events[index].state, EventState::Pending)
                && elapsed >= self.events[index].entry.prefetch_at
            {
                self.start_generation(index);
            }

            if matches!(self.events[index].state, EventState::Fetching) {
                self.poll_generation(index);
            }

            if matches!(self.events[index].state, EventState::Ready(_))
                && elapsed >= self.events[index].entry.display_at
            {
                self.display_event(index, elapsed).await;
            }

            if matches!(self.events[index].state, EventState::Displayed { .. })
                && elapsed >= self.events[index].entry.impact_at
            {
                self.apply_event_impact(index);
            }
        }
    }

    /// Kick off content generation in the background. The task always
    /// resolves: a generator failure or timeout degrades to the internal
    /// catalog, so the timeline never stalls on a slow upstream.
    fn start_generation(&mut self, index: usize) {
        let (tx, rx) = oneshot::channel();
        let request = GenerationRequest {
            securities: self.market.securities().to_vec(),
            event_index: index,
            total_events: self.events.len(),
            used_headlines: self.used_headlines.clone(),
            used_tickers: self.used_tickers.clone(),
        };
        let generator = Arc::clone(&self.generator);
        let reaction = self.reaction.clone();
        let generation_timeout = self.config.timing.generation_timeout();

        debug!("🛰️ Prefetching content for event {}", index + 1);
        tokio::spawn(async move {
            let mut event = match timeout(generation_timeout, generator.generate(&request)).await {
                Ok(Ok(event)) => event,
                Ok(Err(err)) => {
                    warn!(
                        "⚠️ Generation failed for event {}: {} - falling back to catalog",
                        request.event_index + 1,
                        err
                    );
                    catalog_event(
                        request.event_index,
                        request.total_events,
                        &request.securities,
                        &request.used_tickers,
                    )
                }
                Err(_) => {
                    warn!(
                        "⏱️ Generation for event {} timed out after {:?} - falling back to catalog",
                        request.event_index + 1,
                        generation_timeout
                    );
                    catalog_event(
                        request.event_index,
                        request.total_events,
                        &request.securities,
                        &request.used_tickers,
                    )
                }
            };

            if let Some(model) = reaction {
                match timeout(
                    generation_timeout,
                    model.expected_moves(&event.headline, &request.securities),
                )
                .await
                {
                    Ok(Ok(moves)) if !moves.is_empty() => {
                        event.security_impacts = moves;
                    }
                    Ok(Err(err)) => {
                        debug!("Reaction model declined, keeping generator impacts: {}", err);
                    }
                    _ => {}
                }
            }

            // Receiver may be gone if the match ended first.
            let _ = tx.send(event);
        });

        self.events[index].state = EventState::Fetching;
        self.events[index].content_rx = Some(rx);
    }

    /// Non-blocking check for finished generation.
    fn poll_generation(&mut self, index: usize) {
        let Some(mut rx) = self.events[index].content_rx.take() else {
            return;
        };
        match rx.try_recv() {
            Ok(event) => {
                self.note_usage(&event);
                self.events[index].state = EventState::Ready(event);
            }
            Err(oneshot::error::TryRecvError::Empty) => {
                self.events[index].content_rx = Some(rx);
            }
            Err(oneshot::error::TryRecvError::Closed) => {
                // Generation task died without sending; the catalog still
                // has an answer.
                warn!(
                    "⚠️ Generation task for event {} vanished, using catalog",
                    index + 1
                );
                let event = catalog_event(
                    index,
                    self.events.len(),
                    self.market.securities(),
                    &self.used_tickers,
                );
                self.note_usage(&event);
                self.events[index].state = EventState::Ready(event);
            }
        }
    }

    fn note_usage(&mut self, event: &NewsEvent) {
        self.used_headlines.push(event.headline.clone());
        if let Some(ticker) = event.kind.target() {
            self.used_tickers.push(ticker.to_string());
        }
    }

    /// Publish the event and run a decision round off it.
    async fn display_event(&mut self, index: usize, elapsed: Duration) {
        let event = match &self.events[index].state {
            EventState::Ready(event) => event.clone(),
            _ => return,
        };

        if elapsed > self.events[index].entry.display_at + Duration::from_secs(1) {
            info!(
                "📰 [{}s] (deferred from {}s) {} [{}]",
                elapsed.as_secs(),
                self.events[index].entry.display_at.as_secs(),
                event.headline,
                event.severity.label()
            );
        } else {
            info!(
                "📰 [{}s] {} [{}]",
                elapsed.as_secs(),
                event.headline,
                event.severity.label()
            );
        }

        self.published.push(event.clone());
        self.events[index].state = EventState::Displayed {
            event,
            displayed_at: elapsed,
        };

        self.decision_round(Some(index)).await;
    }

    /// Move prices per the event's (clamped) impacts.
    fn apply_event_impact(&mut self, index: usize) {
        let (event, displayed_at) =
            match std::mem::replace(&mut self.events[index].state, EventState::Pending) {
                EventState::Displayed {
                    event,
                    displayed_at,
                } => (event, displayed_at),
                other => {
                    self.events[index].state = other;
                    return;
                }
            };

        let impacts = PriceEngine::resolve_impacts(&event, &self.market);
        let realized = self.price_engine.apply_impact(&mut self.market, &impacts);
        self.market.record_history();

        let widest = realized
            .iter()
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))
            .map(|(ticker, pct)| format!("{} {:+.2}%", ticker, pct * 100.0))
            .unwrap_or_else(|| "no tradable targets".to_string());
        info!("💥 Event {} impact landed: {}", index + 1, widest);

        self.events[index].state = EventState::ImpactApplied {
            event,
            displayed_at,
            realized,
        };
    }

    /// Fan out one decision round to every provider concurrently, each
    /// under its own timeout, then apply the results in a deterministic
    /// order (by participant id) so completion order never changes the
    /// outcome.
    async fn decision_round(&mut self, event_index: Option<usize>) {
        let snapshot = self.market.snapshot(&self.published);
        let standings = self.standings();
        let per_call = self.config.timing.decision_timeout();

        let calls: Vec<_> = self
            .participants
            .iter()
            .map(|p| {
                let provider = Arc::clone(&p.provider);
                let ctx = DecisionContext {
                    market: snapshot.clone(),
                    portfolio: p.portfolio.summary(&self.market),
                    standings: standings.clone(),
                };
                let id = p.id.clone();
                async move {
                    let outcome = timeout(per_call, provider.propose(&ctx)).await;
                    (id, outcome)
                }
            })
            .collect();

        let mut results = join_all(calls).await;
        results.sort_by(|a, b| a.0.cmp(&b.0));

        for (participant_id, outcome) in results {
            match outcome {
                Err(_) => {
                    warn!(
                        "⏱️ {} missed the {}s decision window, no trades this round",
                        participant_id,
                        per_call.as_secs()
                    );
                }
                Ok(Err(err)) => {
                    warn!("⚠️ {} provider failed: {}", participant_id, err);
                }
                Ok(Ok(set)) => {
                    if self.config.logging.log_decisions && !set.rationale.is_empty() {
                        debug!("💭 {}: {}", participant_id, set.rationale);
                    }
                    for proposal in set.trades {
                        self.apply_proposal(&participant_id, event_index, proposal);
                    }
                }
            }
        }
    }

    /// Validate then execute a single proposal. Rejections are recorded,
    /// never fatal; a trade arriving after the window closes is discarded.
    fn apply_proposal(
        &mut self,
        participant_id: &str,
        event_index: Option<usize>,
        proposal: TradeProposal,
    ) {
        if self.phase != MatchPhase::Trading {
            warn!(
                "🚫 Discarding {} trade from {} outside the trading window",
                proposal.ticker, participant_id
            );
            return;
        }
        let Some(idx) = self
            .participants
            .iter()
            .position(|p| p.id == participant_id)
        else {
            return;
        };

        let validated = self.validator.validate(
            &proposal,
            &self.participants[idx].portfolio,
            &self.market,
            ValidationMode::Auto,
        );

        let validated = match validated {
            Err(err) => {
                warn!("🚫 {} rejected: {}", participant_id, err);
                self.rejections.push(RejectedTrade {
                    participant_id: participant_id.to_string(),
                    event_index,
                    proposal,
                    reason: err.to_string(),
                });
                return;
            }
            Ok(v) => v,
        };

        if let Some(requested) = validated.clamped_from {
            info!(
                "✂️ {} {} {} clamped from {} to {} affordable shares",
                participant_id,
                validated.proposal.action.label(),
                validated.proposal.ticker,
                requested,
                validated.proposal.quantity
            );
        }

        let proposal = validated.proposal;
        let participant = &mut self.participants[idx];
        let executed = match proposal.action {
            TradeAction::Long => {
                participant
                    .portfolio
                    .open_long(&self.market, &proposal.ticker, proposal.quantity)
            }
            TradeAction::Short => {
                participant
                    .portfolio
                    .open_short(&self.market, &proposal.ticker, proposal.quantity)
            }
            TradeAction::CloseLong | TradeAction::CloseShort => {
                participant
                    .portfolio
                    .close(&self.market, &proposal.ticker, proposal.quantity)
            }
        };

        match executed {
            Ok(execution) => {
                participant.trade_count += 1;
                info!(
                    "✅ {} {} {} x{} @ {:.2}",
                    participant_id,
                    proposal.action.label(),
                    proposal.ticker,
                    execution.quantity,
                    execution.price
                );
                self.decisions.push(DecisionRecord {
                    event_index,
                    record: TradeRecord {
                        id: Uuid::new_v4(),
                        participant_id: participant_id.to_string(),
                        action: proposal.action,
                        ticker: proposal.ticker.clone(),
                        quantity: execution.quantity,
                        executed_price: execution.price,
                        rationale: proposal.rationale.clone(),
                        timestamp: Utc::now(),
                    },
                    exit_price: None,
                });
            }
            Err(err) => {
                // Validation passed, so hitting this means the validator
                // and ledger disagree about a precondition.
                warn!(
                    "❌ {} execution failed after validation: {}",
                    participant_id, err
                );
                self.rejections.push(RejectedTrade {
                    participant_id: participant_id.to_string(),
                    event_index,
                    proposal,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Stamp exit prices, compute final standings and assemble the
    /// retrospective report.
    pub fn finish(&mut self) -> MatchReport {
        self.phase = MatchPhase::Retrospective;

        for decision in &mut self.decisions {
            decision.exit_price = self.market.price(&decision.record.ticker);
        }

        let standings = self.standings();
        info!("🏆 Final standings:");
        for (rank, entry) in standings.iter().enumerate() {
            info!(
                "   {}. {} ${:.2} ({:+.2}%, {} trades)",
                rank + 1,
                entry.display_name,
                entry.total_value,
                entry.pnl_pct * 100.0,
                entry.trade_count
            );
        }

        let events = self
            .events
            .iter()
            .filter_map(|scheduled| match &scheduled.state {
                EventState::Displayed {
                    event,
                    displayed_at,
                } => Some(EventReport {
                    index: scheduled.entry.index,
                    headline: event.headline.clone(),
                    category: event.category.clone(),
                    severity: event.severity.label().to_string(),
                    scheduled_display_secs: scheduled.entry.display_at.as_secs(),
                    actual_display_secs: displayed_at.as_secs(),
                    realized_impacts: Default::default(),
                }),
                EventState::ImpactApplied {
                    event,
                    displayed_at,
                    realized,
                } => Some(EventReport {
                    index: scheduled.entry.index,
                    headline: event.headline.clone(),
                    category: event.category.clone(),
                    severity: event.severity.label().to_string(),
                    scheduled_display_secs: scheduled.entry.display_at.as_secs(),
                    actual_display_secs: displayed_at.as_secs(),
                    realized_impacts: realized.clone(),
                }),
                _ => None,
            })
            .collect();

        let decisions = self
            .decisions
            .iter()
            .map(|d| DecisionReport {
                participant_id: d.record.participant_id.clone(),
                action: d.record.action.label().to_string(),
                ticker: d.record.ticker.clone(),
                quantity: d.record.quantity,
                entry_price: d.record.executed_price,
                exit_price: d.exit_price,
                favorable: d.favorable(),
                rationale: d.record.rationale.clone(),
                event_index: d.event_index,
            })
            .collect();

        let rejections = self
            .rejections
            .iter()
            .map(|r| RejectionReport {
                participant_id: r.participant_id.clone(),
                action: r.proposal.action.label().to_string(),
                ticker: r.proposal.ticker.clone(),
                quantity: r.proposal.quantity,
                reason: r.reason.clone(),
                event_index: r.event_index,
            })
            .collect();

        MatchReport {
            match_id: self.match_id,
            generated_at: Utc::now(),
            standings,
            events,
            decisions,
            rejections,
        }
    }

    /// Final transition out of the retrospective. Anything arriving after
    /// this is dropped by the phase guard.
    pub fn close(&mut self) {
        if self.phase != MatchPhase::Closed {
            info!("🔒 Match {} closed", self.match_id);
        }
        self.phase = MatchPhase::Closed;
    }
}
