// Arena CLI: run demo matches, manage configuration, preview the catalog

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use trading_arena::providers::heuristic::opponent_roster;
use trading_arena::{
    catalog_event, default_universe, CatalogGenerator, DecisionProvider, MatchConfig,
    MatchScheduler, Participant,
};

#[derive(Parser)]
#[command(name = "arena")]
#[command(about = "Timed multi-participant trading simulation")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "arena.toml")]
    config: PathBuf,

    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full match with heuristic opponents
    Run {
        /// Number of scheduled news events
        #[arg(short, long)]
        events: Option<usize>,

        /// Trading window length in seconds
        #[arg(short, long)]
        trading_secs: Option<u64>,

        /// Countdown length in seconds
        #[arg(long)]
        countdown_secs: Option<u64>,

        /// Number of heuristic opponents
        #[arg(short = 'n', long, default_value_t = 4)]
        opponents: usize,

        /// Write the retrospective report to this JSON file
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Write a default configuration file
    Init,
    /// Preview the internal news catalog for the default universe
    Catalog,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            events,
            trading_secs,
            countdown_secs,
            opponents,
            out,
        } => {
            let mut config = MatchConfig::load_or_create(&cli.config)?;
            if let Some(count) = events {
                config.timing.event_count = count;
            }
            if let Some(secs) = trading_secs {
                config.timing.trading_secs = secs;
            }
            if let Some(secs) = countdown_secs {
                config.timing.countdown_secs = secs;
            }
            run_match(config, opponents, out).await?;
        }
        Commands::Init => {
            MatchConfig::default().to_file(&cli.config)?;
            info!("📁 Wrote default configuration to {}", cli.config.display());
        }
        Commands::Catalog => {
            preview_catalog(&MatchConfig::load_or_create(&cli.config)?);
        }
    }

    Ok(())
}

async fn run_match(
    config: MatchConfig,
    opponents: usize,
    out: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let starting_cash = config.market.starting_cash;
    let participants: Vec<Participant> = opponent_roster(opponents.max(1))
        .into_iter()
        .map(|provider| {
            let provider: Arc<dyn DecisionProvider> = Arc::from(provider);
            let name = provider.name().to_string();
            Participant::new(&name, &name, provider, starting_cash)
        })
        .collect();

    let mut scheduler = MatchScheduler::new(
        config,
        default_universe(),
        participants,
        Arc::new(CatalogGenerator),
        None,
    )?;
    let report = scheduler.run().await?;

    if let Some(winner) = report.winner() {
        info!(
            "🥇 Winner: {} with ${:.2} ({:+.2}%)",
            winner.display_name,
            winner.total_value,
            winner.pnl_pct * 100.0
        );
    }
    if let Some(path) = out {
        report.write_to_file(&path)?;
        info!("💾 Report written to {}", path.display());
    }
    scheduler.close();
    Ok(())
}

fn preview_catalog(config: &MatchConfig) {
    let securities = default_universe();
    let total = config.timing.event_count;
    let mut used = Vec::new();
    for index in 0..total {
        let event = catalog_event(index, total, &securities, &used);
        if let Some(ticker) = event.kind.target() {
            used.push(ticker.to_string());
        }
        println!(
            "{}. [{:<8}] {} ({})",
            index + 1,
            event.severity.label(),
            event.headline,
            event.category
        );
    }
}
