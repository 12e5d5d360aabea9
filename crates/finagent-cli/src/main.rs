//! finagent command-line interface
//!
//! ```bash
//! export ALPHA_VANTAGE_API_KEY=...
//! export OPENAI_API_KEY=...
//!
//! finagent quote TSM SSNLF
//! finagent risk --symbols TSM,SSNLF --watch 60
//! finagent brief "market data for Asia tech"
//! finagent serve
//! ```

mod repl;

use anyhow::{Context as _, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use finagent_core::Agent;
use finagent_market::api::{get_stock_prices, historical_data};
use finagent_market::config::parse_symbol_list;
use finagent_market::voice::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};
use finagent_market::{
    AlphaVantageClient, AllocationTable, CachedProvider, MarketConfig, MarketDataProvider,
    Orchestrator, RiskAnalyzer, ScrapingAgent,
};
use finagent_utils::{LogFormat, init_tracing, optional_env};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on waiting for a spoken reply to finish
const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Parser, Debug)]
#[command(name = "finagent")]
#[command(about = "Multi-agent financial assistant", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Listen address, defaults to FINAGENT_BIND or 0.0.0.0:8000
        #[arg(long)]
        bind: Option<String>,
    },
    /// Answer one query through the orchestrator
    Brief {
        /// e.g. "market data" or "what do the filings say about export risk"
        query: String,
        /// Filing URLs to ingest before answering
        #[arg(long, value_delimiter = ',')]
        filings: Vec<String>,
    },
    /// Risk exposure of the watchlist against the portfolio allocation
    Risk {
        /// Comma-separated symbols, defaults to the watchlist
        #[arg(long)]
        symbols: Option<String>,
        /// Re-run every N seconds until Ctrl-C
        #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "60")]
        watch: Option<u64>,
    },
    /// Latest quotes
    Quote {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Historical bars
    History {
        symbol: String,
        /// 1d, 1wk or 1mo
        #[arg(long, default_value = "1d")]
        interval: String,
        /// 1mo, 3mo, 6mo, 1y, 2y, 5y, ytd or max
        #[arg(long, default_value = "1y")]
        period: String,
    },
    /// Company fundamentals
    Overview { symbol: String },
    /// Extract text from HTML or PDF filings
    Scrape {
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Record a spoken query and answer it aloud
    Listen {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        /// Repeat the transcript back instead of querying the orchestrator
        #[arg(long)]
        echo: bool,
    },
    /// Interactive session with conversation memory
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(LogFormat::from_env(), "warn,finagent_market=info,finagent=info");

    let cli = Cli::parse();
    match cli.command {
        Command::Serve { bind } => {
            let bind = bind
                .or_else(|| optional_env(finagent_server::BIND_ENV))
                .unwrap_or_else(|| finagent_server::DEFAULT_BIND.to_string());
            finagent_server::run(&bind).await
        }
        Command::Brief { query, filings } => brief(&query, &filings).await,
        Command::Risk { symbols, watch } => risk(symbols.as_deref(), watch).await,
        Command::Quote { symbols } => {
            let provider = market_provider()?;
            let symbols: Vec<String> = symbols.iter().map(|s| s.to_uppercase()).collect();
            print_json(&get_stock_prices(provider.as_ref(), &symbols).await)
        }
        Command::History {
            symbol,
            interval,
            period,
        } => {
            let provider = market_provider()?;
            let today = Local::now().date_naive();
            let series = historical_data(
                provider.as_ref(),
                &symbol.to_uppercase(),
                &interval,
                &period,
                today,
            )
            .await?;
            print_json(&series.to_records())
        }
        Command::Overview { symbol } => {
            let provider = market_provider()?;
            match provider.company_overview(&symbol.to_uppercase()).await? {
                Some(overview) => print_json(&overview),
                None => bail!("No overview available for {symbol}"),
            }
        }
        Command::Scrape { urls } => {
            let scraper = ScrapingAgent::new(&MarketConfig::default())?;
            print_json(&scraper.scrape_filings(&urls).await)
        }
        Command::Listen { seconds, echo } => listen(Duration::from_secs(seconds), echo).await,
        Command::Repl => {
            let orchestrator = orchestrator().await?;
            repl::run(&orchestrator).await
        }
    }
}

/// Alpha Vantage behind the series cache
fn market_provider() -> anyhow::Result<Arc<dyn MarketDataProvider>> {
    let config = MarketConfig::default().with_env_api_key()?;
    let client = AlphaVantageClient::new(&config)?;
    Ok(Arc::new(CachedProvider::new(
        Arc::new(client),
        config.series_cache_ttl,
    )))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Orchestrator from the environment, initialized
async fn orchestrator() -> anyhow::Result<Orchestrator> {
    let mut orchestrator = Orchestrator::from_env()?;
    orchestrator.initialize().await?;
    Ok(orchestrator)
}

async fn brief(query: &str, filings: &[String]) -> anyhow::Result<()> {
    let orchestrator = orchestrator().await?;
    if !filings.is_empty() {
        let chunks = orchestrator.ingest_filings(filings).await;
        info!(chunks, "Filings ingested");
    }

    let reply = orchestrator.handle_query(query).await;
    println!("{}", reply.response);
    wait_for_playback(&orchestrator).await;
    Ok(())
}

async fn risk(symbols: Option<&str>, watch: Option<u64>) -> anyhow::Result<()> {
    let config = MarketConfig::default()
        .with_env_api_key()?
        .with_env_watchlist();
    let symbols = symbols.map_or_else(|| config.symbols(), parse_symbol_list);
    let allocation = AllocationTable::from_env()?;

    let client = AlphaVantageClient::new(&config)?;
    let provider = Arc::new(CachedProvider::new(
        Arc::new(client),
        config.series_cache_ttl,
    ));
    let analyzer = RiskAnalyzer::new(provider, &config);

    let Some(secs) = watch else {
        return print_json(&analyzer.analyze_risk_exposure(&symbols, &allocation).await);
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    info!(?symbols, every_secs = secs, "Watching risk exposure");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                print_json(&analyzer.analyze_risk_exposure(&symbols, &allocation).await)?;
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Stopping risk watch");
                return Ok(());
            }
        }
    }
}

async fn listen(duration: Duration, echo: bool) -> anyhow::Result<()> {
    let orchestrator = orchestrator().await?;
    let Some(voice) = orchestrator.voice() else {
        bail!("Voice is not configured");
    };

    println!("Listening for {} seconds...", duration.as_secs());
    if echo {
        match voice.process_microphone_input(duration).await {
            Some(response) => println!("{response}"),
            None => warn!("Nothing was heard"),
        }
    } else {
        let audio = voice
            .listen_microphone(duration, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
            .await;
        if audio.is_empty() {
            bail!("No audio captured; build with --features audio-io for microphone support");
        }
        let language = orchestrator.language_agent().language();
        let reply = orchestrator.handle_audio(audio, language).await?;
        println!("{}", reply.response);
    }

    wait_for_playback(&orchestrator).await;
    Ok(())
}

async fn wait_for_playback(orchestrator: &Orchestrator) {
    if let Some(voice) = orchestrator.voice() {
        if !voice.wait_until_quiet(PLAYBACK_TIMEOUT).await {
            warn!("Playback still running after {}s", PLAYBACK_TIMEOUT.as_secs());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_risk_watch() {
        let cli = Cli::try_parse_from(["finagent", "risk", "--symbols", "TSM,SSNLF", "--watch"])
            .unwrap();
        match cli.command {
            Command::Risk { symbols, watch } => {
                assert_eq!(symbols.as_deref(), Some("TSM,SSNLF"));
                assert_eq!(watch, Some(60));
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["finagent", "risk", "--watch", "5"]).unwrap();
        assert!(matches!(cli.command, Command::Risk { watch: Some(5), symbols: None }));
    }

    #[test]
    fn test_parse_history_defaults() {
        let cli = Cli::try_parse_from(["finagent", "history", "TSM"]).unwrap();
        match cli.command {
            Command::History {
                symbol,
                interval,
                period,
            } => {
                assert_eq!(symbol, "TSM");
                assert_eq!(interval, "1d");
                assert_eq!(period, "1y");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_brief_filings() {
        let cli = Cli::try_parse_from([
            "finagent",
            "brief",
            "what do the filings say",
            "--filings",
            "https://a.example/10k.htm,https://b.example/20f.pdf",
        ])
        .unwrap();
        match cli.command {
            Command::Brief { query, filings } => {
                assert_eq!(query, "what do the filings say");
                assert_eq!(filings.len(), 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_quote_requires_symbols() {
        assert!(Cli::try_parse_from(["finagent", "quote"]).is_err());
        assert!(Cli::try_parse_from(["finagent", "listen", "--seconds", "3", "--echo"]).is_ok());
    }
}
