// News events and the deterministic fallback catalog

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Sector, Security};

/// Coarse bucket bounding how large an event's price impact may be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Moderate,
    High,
    Extreme,
}

impl Severity {
    /// Magnitude band (min, max) owned by this tier, as fractional moves.
    pub fn band(&self) -> (f64, f64) {
        match self {
            Severity::Low => (0.0005, 0.005),
            Severity::Moderate => (0.005, 0.015),
            Severity::High => (0.015, 0.030),
            Severity::Extreme => (0.030, 0.050),
        }
    }

    /// Midpoint of the band, used by the deterministic fallback model.
    pub fn midpoint(&self) -> f64 {
        let (min, max) = self.band();
        (min + max) / 2.0
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Moderate => "MODERATE",
            Severity::High => "HIGH",
            Severity::Extreme => "EXTREME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Macro,
    Company { ticker: String },
}

impl EventKind {
    pub fn target(&self) -> Option<&str> {
        match self {
            EventKind::Macro => None,
            EventKind::Company { ticker } => Some(ticker),
        }
    }
}

/// Direction of the story; only used when impacts must be reconstructed
/// from the sector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Bullish,
    Bearish,
}

impl Tone {
    pub fn sign(&self) -> f64 {
        match self {
            Tone::Bullish => 1.0,
            Tone::Bearish => -1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsEvent {
    pub headline: String,
    pub kind: EventKind,
    pub category: String,
    pub severity: Severity,
    pub tone: Tone,
    /// Intended fractional move per ticker. May be partial; unlisted
    /// tickers default to zero.
    pub security_impacts: HashMap<String, f64>,
    /// Coarse per-sector fallback, consulted only when `security_impacts`
    /// is empty.
    pub sector_impacts: HashMap<Sector, f64>,
}

impl NewsEvent {
    pub fn target(&self) -> Option<&str> {
        self.kind.target()
    }
}

struct CatalogTemplate {
    category: &'static str,
    tone: Tone,
    macro_headline: &'static str,
    company_headline: &'static str,
}

// Rotated by event index; {T} is replaced with the target ticker.
const CATALOG: [CatalogTemplate; 6] = [
    CatalogTemplate {
        category: "monetary-policy",
        tone: Tone::Bullish,
        macro_headline: "Central bank signals earlier-than-expected rate cuts",
        company_headline: "{T} secures cheap refinancing ahead of rate decision",
    },
    CatalogTemplate {
        category: "earnings",
        tone: Tone::Bearish,
        macro_headline: "Broad earnings season opens with widespread guidance cuts",
        company_headline: "{T} misses quarterly earnings and withdraws guidance",
    },
    CatalogTemplate {
        category: "supply-chain",
        tone: Tone::Bearish,
        macro_headline: "Port congestion triggers global shipping delays",
        company_headline: "{T} halts production citing component shortages",
    },
    CatalogTemplate {
        category: "product-launch",
        tone: Tone::Bullish,
        macro_headline: "Industry expo showcases stronger-than-expected demand",
        company_headline: "{T} unveils flagship product to glowing early reviews",
    },
    CatalogTemplate {
        category: "regulation",
        tone: Tone::Bearish,
        macro_headline: "Regulators announce sweeping antitrust review",
        company_headline: "{T} faces formal investigation over market practices",
    },
    CatalogTemplate {
        category: "macro-data",
        tone: Tone::Bullish,
        macro_headline: "Jobs report smashes expectations, soft landing in sight",
        company_headline: "{T} lands landmark government contract",
    },
];

/// Severity escalates over the course of the match so late events matter more.
fn escalating_severity(index: usize, total: usize) -> Severity {
    let total = total.max(1);
    match index * 4 / total {
        0 => Severity::Low,
        1 => Severity::Moderate,
        2 => Severity::High,
        _ => Severity::Extreme,
    }
}

/// Deterministic internal catalog keyed by event index. Serves as both the
/// default generator and the fallback when external generation fails.
///
/// `avoid_tickers` rotates company targets away from already-used names.
pub fn catalog_event(
    index: usize,
    total_events: usize,
    securities: &[Security],
    avoid_tickers: &[String],
) -> NewsEvent {
    let template = &CATALOG[index % CATALOG.len()];
    let severity = escalating_severity(index, total_events);
    let tradable: Vec<&Security> = securities.iter().filter(|s| s.tradable).collect();

    // Even indices are macro stories, odd indices company-specific.
    let kind = if index % 2 == 0 || tradable.is_empty() {
        EventKind::Macro
    } else {
        let start = index / 2;
        let target = (0..tradable.len())
            .map(|offset| tradable[(start + offset) % tradable.len()])
            .find(|s| !avoid_tickers.contains(&s.ticker))
            .unwrap_or(tradable[start % tradable.len()]);
        EventKind::Company {
            ticker: target.ticker.clone(),
        }
    };

    let headline = match &kind {
        EventKind::Macro => template.macro_headline.to_string(),
        EventKind::Company { ticker } => template.company_headline.replace("{T}", ticker),
    };

    let mut security_impacts = HashMap::new();
    let base = severity.midpoint() * template.tone.sign();
    match &kind {
        EventKind::Macro => {
            for security in &tradable {
                security_impacts.insert(security.ticker.clone(), base * security.beta);
            }
        }
        EventKind::Company { ticker } => {
            security_impacts.insert(ticker.clone(), base);
        }
    }

    NewsEvent {
        headline,
        kind,
        category: template.category.to_string(),
        severity,
        tone: template.tone,
        security_impacts,
        sector_impacts: HashMap::new(),
    }
}
