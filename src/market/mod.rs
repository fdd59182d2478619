// Security universe and market state for a single match

pub mod news;
pub mod price_engine;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prices are never allowed to fall to or below this floor.
pub const MIN_PRICE: f64 = 0.01;

/// Coarse sector tag used by the fallback correlation model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sector {
    Technology,
    Energy,
    Financials,
    Healthcare,
    Consumer,
    Industrials,
    Utilities,
    /// Synthetic composite instruments (listed for display, never tradable).
    Index,
}

impl Sector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sector::Technology => "Technology",
            Sector::Energy => "Energy",
            Sector::Financials => "Financials",
            Sector::Healthcare => "Healthcare",
            Sector::Consumer => "Consumer",
            Sector::Industrials => "Industrials",
            Sector::Utilities => "Utilities",
            Sector::Index => "Index",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Security {
    pub ticker: String,
    pub name: String,
    pub sector: Sector,
    /// Market-sensitivity multiplier, >= 0.
    pub beta: f64,
    /// Idiosyncratic noise scale used by drift.
    pub volatility: f64,
    pub price: f64,
    pub starting_price: f64,
    /// Synthetic/derived instruments are listed but cannot be traded.
    pub tradable: bool,
}

impl Security {
    pub fn new(ticker: &str, name: &str, sector: Sector, beta: f64, volatility: f64, price: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            sector,
            beta,
            volatility,
            price,
            starting_price: price,
            tradable: true,
        }
    }

    pub fn synthetic(ticker: &str, name: &str, price: f64) -> Self {
        Self {
            ticker: ticker.to_string(),
            name: name.to_string(),
            sector: Sector::Index,
            beta: 1.0,
            volatility: 0.0,
            price,
            starting_price: price,
            tradable: false,
        }
    }

    /// Percentage change since match start.
    pub fn change_pct(&self) -> f64 {
        if self.starting_price <= 0.0 {
            return 0.0;
        }
        (self.price - self.starting_price) / self.starting_price
    }
}

/// All security state for one match. Prices are mutated only through the
/// price engine; every other component reads a snapshot.
#[derive(Debug, Clone)]
pub struct MarketState {
    securities: Vec<Security>,
    history: HashMap<String, Vec<f64>>,
    history_size: usize,
}

impl MarketState {
    pub fn new(securities: Vec<Security>, history_size: usize) -> Self {
        let history = securities
            .iter()
            .map(|s| (s.ticker.clone(), vec![s.price]))
            .collect();
        Self {
            securities,
            history,
            history_size,
        }
    }

    pub fn securities(&self) -> &[Security] {
        &self.securities
    }

    pub fn security(&self, ticker: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.ticker == ticker)
    }

    pub fn price(&self, ticker: &str) -> Option<f64> {
        self.security(ticker).map(|s| s.price)
    }

    pub fn tradable(&self) -> impl Iterator<Item = &Security> {
        self.securities.iter().filter(|s| s.tradable)
    }

    pub fn history(&self, ticker: &str) -> &[f64] {
        self.history.get(ticker).map(|h| h.as_slice()).unwrap_or(&[])
    }

    /// Append current prices to each security's bounded history ring.
    pub fn record_history(&mut self) {
        for security in &self.securities {
            let prices = self.history.entry(security.ticker.clone()).or_default();
            prices.push(security.price);
            if prices.len() > self.history_size {
                let excess = prices.len() - self.history_size;
                prices.drain(..excess);
            }
        }
    }

    /// Read-only view handed to decision providers.
    pub fn snapshot(&self, published_news: &[news::NewsEvent]) -> MarketSnapshot {
        MarketSnapshot {
            securities: self.securities.clone(),
            history: self.history.clone(),
            news: published_news.to_vec(),
        }
    }

    // Mutable access reserved for the price engine (same module tree).
    pub(crate) fn securities_mut(&mut self) -> &mut [Security] {
        &mut self.securities
    }
}

/// Owned, read-only view of the market handed out during a decision round.
#[derive(Debug, Clone, Serialize)]
pub struct MarketSnapshot {
    pub securities: Vec<Security>,
    pub history: HashMap<String, Vec<f64>>,
    pub news: Vec<news::NewsEvent>,
}

impl MarketSnapshot {
    pub fn security(&self, ticker: &str) -> Option<&Security> {
        self.securities.iter().find(|s| s.ticker == ticker)
    }

    pub fn price(&self, ticker: &str) -> Option<f64> {
        self.security(ticker).map(|s| s.price)
    }

    pub fn latest_news(&self) -> Option<&news::NewsEvent> {
        self.news.last()
    }
}

/// Default nine-security universe: eight tradable names plus one synthetic
/// composite used for display only.
pub fn default_universe() -> Vec<Security> {
    vec![
        Security::new("NVTX", "Novatex Semiconductors", Sector::Technology, 1.6, 0.035, 142.50),
        Security::new("CLDW", "Cloudwave Systems", Sector::Technology, 1.4, 0.030, 87.20),
        Security::new("PETR", "Petralis Energy", Sector::Energy, 1.1, 0.028, 64.75),
        Security::new("HLGN", "Halogen Power", Sector::Utilities, 0.6, 0.015, 41.30),
        Security::new("MERB", "Meridian Bancorp", Sector::Financials, 1.2, 0.022, 55.10),
        Security::new("VYTL", "Vytalis Pharma", Sector::Healthcare, 0.9, 0.026, 118.40),
        Security::new("SHPC", "Shopcart Retail", Sector::Consumer, 1.0, 0.024, 73.60),
        Security::new("ARMT", "Armature Industrial", Sector::Industrials, 0.8, 0.018, 96.85),
        Security::synthetic("ARX50", "Arena Composite 50", 1000.0),
    ]
}
