// Retrospective report: JSON snapshot of a finished match

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ArenaError, ArenaResult};
use crate::standings::StandingEntry;

/// One executed trade with its hindsight verdict.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionReport {
    pub participant_id: String,
    pub action: String,
    pub ticker: String,
    pub quantity: u64,
    pub entry_price: f64,
    /// Price at match end. Absent when the ticker vanished mid-match,
    /// which the validator prevents in practice.
    pub exit_price: Option<f64>,
    /// Whether the final price moved the way the trade needed it to.
    pub favorable: Option<bool>,
    pub rationale: String,
    /// Index of the news event whose round produced this trade.
    pub event_index: Option<usize>,
}

/// One published news event with its scheduled vs actual timing and the
/// realized price moves.
#[derive(Debug, Clone, Serialize)]
pub struct EventReport {
    pub index: usize,
    pub headline: String,
    pub category: String,
    pub severity: String,
    pub scheduled_display_secs: u64,
    pub actual_display_secs: u64,
    /// Fractional move per ticker once the impact landed. Empty when the
    /// match ended between display and impact.
    pub realized_impacts: HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectionReport {
    pub participant_id: String,
    pub action: String,
    pub ticker: String,
    pub quantity: u64,
    pub reason: String,
    pub event_index: Option<usize>,
}

/// Everything the retrospective screen needs, in one serializable blob.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub match_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub standings: Vec<StandingEntry>,
    pub events: Vec<EventReport>,
    pub decisions: Vec<DecisionReport>,
    pub rejections: Vec<RejectionReport>,
}

impl MatchReport {
    pub fn to_json(&self) -> ArenaResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> ArenaResult<()> {
        let json = self.to_json()?;
        fs::write(path.as_ref(), json).map_err(|e| {
            ArenaError::Export(format!(
                "failed to write report to {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(())
    }

    /// Winner's row, if standings are present.
    pub fn winner(&self) -> Option<&StandingEntry> {
        self.standings.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> MatchReport {
        MatchReport {
            match_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            standings: vec![
                StandingEntry::new("alice", "Alice", 100_000.0, 104_000.0, 3),
                StandingEntry::new("bot-1", "Momentum", 100_000.0, 99_500.0, 5),
            ],
            events: vec![EventReport {
                index: 0,
                headline: "NVTX unveils record results".to_string(),
                category: "earnings".to_string(),
                severity: "high".to_string(),
                scheduled_display_secs: 130,
                actual_display_secs: 131,
                realized_impacts: HashMap::from([("NVTX".to_string(), 0.021)]),
            }],
            decisions: vec![DecisionReport {
                participant_id: "alice".to_string(),
                action: "long".to_string(),
                ticker: "NVTX".to_string(),
                quantity: 100,
                entry_price: 120.0,
                exit_price: Some(124.5),
                favorable: Some(true),
                rationale: "strong earnings".to_string(),
                event_index: Some(0),
            }],
            rejections: vec![],
        }
    }

    #[test]
    fn test_report_serializes_to_json() {
        let report = sample_report();
        let json = report.to_json().unwrap();
        assert!(json.contains("\"alice\""));
        assert!(json.contains("NVTX unveils record results"));
        assert!(json.contains("\"favorable\": true"));
    }

    #[test]
    fn test_winner_is_first_standing() {
        let report = sample_report();
        assert_eq!(report.winner().unwrap().participant_id, "alice");
    }
}
