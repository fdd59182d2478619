// Standings: mark-to-market ranking of match participants

use serde::Serialize;

/// One participant's row. Recomputed on demand from portfolio + prices;
/// never stored as authoritative state.
#[derive(Debug, Clone, Serialize)]
pub struct StandingEntry {
    pub participant_id: String,
    pub display_name: String,
    pub total_value: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub trade_count: usize,
}

impl StandingEntry {
    pub fn new(
        participant_id: &str,
        display_name: &str,
        starting_value: f64,
        total_value: f64,
        trade_count: usize,
    ) -> Self {
        let pnl = total_value - starting_value;
        let pnl_pct = if starting_value > 0.0 {
            pnl / starting_value
        } else {
            0.0
        };
        Self {
            participant_id: participant_id.to_string(),
            display_name: display_name.to_string(),
            total_value,
            pnl,
            pnl_pct,
            trade_count,
        }
    }
}

/// Order entries by descending percentage return, ties broken by absolute
/// dollar return, then by the caller's original ordering (stable sort).
pub fn rank(mut entries: Vec<StandingEntry>) -> Vec<StandingEntry> {
    entries.sort_by(|a, b| {
        b.pnl_pct
            .total_cmp(&a.pnl_pct)
            .then_with(|| b.pnl.total_cmp(&a.pnl))
    });
    entries
}
