//! smcbot: replay the decision engine over CSV bars, or evaluate the latest bar.

mod settings;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use analysis::{EntryFinder, PatternDetector, StructureAnalyzer};
use common::Config;
use engine::{BacktestRunner, BacktestSimulator, LogSink};
use paper::{CsvBarSource, PaperGateway};
use settings::EngineSettings;

#[derive(Parser)]
#[command(name = "smcbot", about = "Market structure analysis and decision engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the decision pipeline bar by bar and write the result JSON.
    Backtest {
        /// Engine settings TOML. Defaults to ENGINE_CONFIG_PATH.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Bar CSV file. Defaults to BARS_CSV_PATH.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Result JSON path. Defaults to RESULT_PATH.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyse and score the latest bar of a series.
    Evaluate {
        /// Engine settings TOML. Defaults to ENGINE_CONFIG_PATH.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Lower-timeframe bar CSV. Defaults to BARS_CSV_PATH.
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Higher-timeframe bar CSV. Defaults to HTF_BARS_CSV_PATH, then to --bars.
        #[arg(long)]
        htf_bars: Option<PathBuf>,

        /// Submit an actionable decision to the paper gateway.
        #[arg(long, default_value_t = false)]
        paper: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let env = Config::from_env();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest { config, bars, out } => {
            let settings = load_settings(config, &env)?;
            let bars = bars_path(bars, env.bars_csv_path.as_deref())?;
            let out = out.unwrap_or_else(|| PathBuf::from(&env.result_path));
            run_backtest(settings, &bars, &out).await
        }
        Commands::Evaluate { config, bars, htf_bars, paper } => {
            let settings = load_settings(config, &env)?;
            let ltf = bars_path(bars, env.bars_csv_path.as_deref())?;
            let htf = htf_bars.or_else(|| env.htf_bars_csv_path.as_ref().map(PathBuf::from));
            run_evaluate(settings, &ltf, htf.as_deref(), paper).await
        }
    }
}

fn load_settings(flag: Option<PathBuf>, env: &Config) -> Result<EngineSettings> {
    let path = flag.unwrap_or_else(|| PathBuf::from(&env.engine_config_path));
    EngineSettings::load_or_default(&path).with_context(|| format!("loading {}", path.display()))
}

fn bars_path(flag: Option<PathBuf>, env: Option<&str>) -> Result<PathBuf> {
    flag.or_else(|| env.map(PathBuf::from))
        .ok_or_else(|| anyhow!("no bar file: pass --bars or set BARS_CSV_PATH"))
}

async fn run_backtest(settings: EngineSettings, bars: &Path, out: &Path) -> Result<()> {
    let bars = CsvBarSource::load(bars)
        .with_context(|| format!("reading bars from {}", bars.display()))?
        .into_bars();
    let simulator = Arc::new(BacktestSimulator::new(settings.pipeline()?, settings.backtest.clone())?);

    let runner = BacktestRunner::new(Arc::new(LogSink));
    let handle = runner.start(simulator, bars)?;
    info!(run_id = %handle.run_id(), "Backtest running");

    let mut progress = handle.subscribe();
    let reporter = tokio::spawn(async move {
        let mut next = 10.0;
        while progress.changed().await.is_ok() {
            let percent = *progress.borrow_and_update();
            if percent >= next {
                info!(percent = percent.round(), "Backtest progress");
                next = (percent / 10.0).floor() * 10.0 + 10.0;
            }
        }
    });

    let result = handle.wait().await?;
    if let Err(e) = reporter.await {
        warn!(error = %e, "Progress reporter failed");
    }

    let path = out.to_string_lossy();
    result.write_json(&path)?;
    println!("Trades:        {}", result.trade_count);
    println!("Final PnL:     {:.2}", result.final_pnl);
    println!("Win rate:      {:.1}%", result.win_rate * 100.0);
    match result.profit_factor {
        Some(pf) => println!("Profit factor: {pf:.2}"),
        None => println!("Profit factor: n/a (no losing trades)"),
    }
    println!("Max drawdown:  {:.2}%", result.max_drawdown_percent);
    for (trigger, stats) in &result.by_trigger {
        println!(
            "  {:<12} {:>4} trades  {:>5.1}%  net {:.2}",
            trigger,
            stats.trades,
            stats.win_rate * 100.0,
            stats.net_pnl
        );
    }
    println!("Result written to {path}");
    Ok(())
}

async fn run_evaluate(settings: EngineSettings, ltf_path: &Path, htf_path: Option<&Path>, paper: bool) -> Result<()> {
    let source = CsvBarSource::load(ltf_path)
        .with_context(|| format!("reading bars from {}", ltf_path.display()))?;
    let ltf = source.bars();
    let htf_source = match htf_path {
        Some(path) => Some(CsvBarSource::load(path).with_context(|| format!("reading bars from {}", path.display()))?),
        None => None,
    };
    let htf = htf_source.as_ref().map_or(ltf, |s| s.bars());
    let last = ltf.last().ok_or_else(|| anyhow!("{} has no bars", ltf_path.display()))?;

    // ── Structure and patterns ────────────────────────────────────────────────
    let structure = StructureAnalyzer::from_config(&settings.analysis).analyze(htf, ltf);
    let patterns = PatternDetector::from_config(&settings.analysis).detect(ltf, &structure);
    println!("{} @ {} close {}", settings.instrument.symbol, last.timestamp, last.close);
    println!("HTF bias:      {}", structure.bias);
    match structure.ltf_event {
        Some(event) => println!("LTF event:     {event:?}"),
        None => println!("LTF event:     none"),
    }
    println!(
        "Open zones:    {} order blocks, {} imbalances",
        patterns.order_blocks.len(),
        patterns.imbalances.len()
    );
    println!(
        "Liquidity:     equal highs {:?}, equal lows {:?}",
        patterns.liquidity.equal_highs, patterns.liquidity.equal_lows
    );
    if let Some(grab) = patterns.liquidity_grab {
        println!("Liquidity grab: {:?} swept {:.5}, target {:.5}", grab.kind, grab.swept, grab.target);
    }
    if let Some(setup) = EntryFinder::from_config(&settings.analysis).find(htf, ltf) {
        println!(
            "Entry setup:   {} {} [{:.5}, {:.5}] SL {:.5} TP {:.5}: {}",
            setup.direction, setup.poi, setup.zone_bottom, setup.zone_top, setup.stop_loss, setup.take_profit, setup.reason
        );
    }

    // ── Scoring ───────────────────────────────────────────────────────────────
    let pipeline = settings.pipeline()?;
    let equity = settings.paper.initial_balance;
    let decision = pipeline.evaluate(ltf, equity);
    for signal in decision.signals.values() {
        println!("  {:<12} {:>6.2} {}", signal.name, signal.score, signal.direction);
    }
    println!("Decision:      {} {:.2}", decision.aggregated.direction, decision.aggregated.score);
    match (&decision.trade, &decision.sizing_failure) {
        (Some(t), _) => println!(
            "Trade:         {} {} lots @ {:.5} SL {:.5} TP {:.5}",
            t.direction, t.volume, t.entry, t.stop_loss, t.take_profit
        ),
        (None, Some(failure)) => println!("Not sized:     {failure}"),
        (None, None) => println!("Trade:         none (threshold {})", settings.scoring.execution_threshold),
    }

    if paper {
        let gateway = PaperGateway::new(settings.paper.clone()).with_instrument(&settings.instrument);
        gateway.update_price(&settings.instrument.symbol, last.close).await;
        match pipeline
            .execute(&source, &gateway, &settings.timeframe, settings.bar_count, equity, 0.0)
            .await?
        {
            Some(fill) => println!("Paper fill:    {} {} @ {:.5} ({})", fill.side, fill.volume, fill.fill_price, fill.order_id),
            None => println!("Paper fill:    nothing submitted"),
        }
    }
    Ok(())
}
