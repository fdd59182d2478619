// Event schedule: fixed offsets plus a per-event content state machine

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::TimingSettings;
use crate::error::{ArenaError, ArenaResult};
use crate::market::news::NewsEvent;

/// Match lifecycle. `Retrospective -> Closed` is externally triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Idle,
    Countdown,
    Trading,
    Retrospective,
    Closed,
}

impl MatchPhase {
    pub fn label(&self) -> &'static str {
        match self {
            MatchPhase::Idle => "idle",
            MatchPhase::Countdown => "countdown",
            MatchPhase::Trading => "trading",
            MatchPhase::Retrospective => "retrospective",
            MatchPhase::Closed => "closed",
        }
    }
}

/// Fixed at match creation; never mutated during the match.
#[derive(Debug, Clone, Copy)]
pub struct EventScheduleEntry {
    pub index: usize,
    /// When async content generation starts, hiding latency.
    pub prefetch_at: Duration,
    /// When the event is shown and decisions are solicited.
    pub display_at: Duration,
    /// When the clamped price impact lands.
    pub impact_at: Duration,
}

/// Content lifecycle for one scheduled event. A single explicit state
/// machine per event, checked each tick.
#[derive(Debug)]
pub enum EventState {
    Pending,
    Fetching,
    Ready(NewsEvent),
    Displayed {
        event: NewsEvent,
        displayed_at: Duration,
    },
    ImpactApplied {
        event: NewsEvent,
        displayed_at: Duration,
        realized: HashMap<String, f64>,
    },
}

impl EventState {
    pub fn label(&self) -> &'static str {
        match self {
            EventState::Pending => "pending",
            EventState::Fetching => "fetching",
            EventState::Ready(_) => "ready",
            EventState::Displayed { .. } => "displayed",
            EventState::ImpactApplied { .. } => "impact-applied",
        }
    }
}

/// A schedule entry plus its runtime state and the channel the generation
/// task reports back on.
#[derive(Debug)]
pub struct ScheduledEvent {
    pub entry: EventScheduleEntry,
    pub state: EventState,
    pub content_rx: Option<oneshot::Receiver<NewsEvent>>,
}

impl ScheduledEvent {
    pub fn new(entry: EventScheduleEntry) -> Self {
        Self {
            entry,
            state: EventState::Pending,
            content_rx: None,
        }
    }
}

/// Spread N events across the trading window. Display offsets are evenly
/// spaced after the countdown; prefetch leads each display (clamped to
/// match start, so early generation hides behind the countdown); impact
/// follows display by the reaction delay.
pub fn build_schedule(timing: &TimingSettings) -> ArenaResult<Vec<EventScheduleEntry>> {
    let countdown = timing.countdown();
    let trading = timing.trading();
    let count = timing.event_count;

    let spacing = trading / (count as u32 + 1);
    if timing.reaction_delay() >= spacing {
        return Err(ArenaError::MatchSetup(format!(
            "reaction delay {:?} does not fit between events spaced {:?} apart",
            timing.reaction_delay(),
            spacing
        )));
    }

    let entries = (0..count)
        .map(|index| {
            let display_at = countdown + spacing * (index as u32 + 1);
            EventScheduleEntry {
                index,
                prefetch_at: display_at.saturating_sub(timing.prefetch_lead()),
                display_at,
                impact_at: display_at + timing.reaction_delay(),
            }
        })
        .collect::<Vec<_>>();

    // The last impact must land inside the trading window.
    if let Some(last) = entries.last() {
        if last.impact_at > timing.match_end() {
            return Err(ArenaError::MatchSetup(format!(
                "final event impact at {:?} falls after match end {:?}",
                last.impact_at,
                timing.match_end()
            )));
        }
    }

    Ok(entries)
}
