//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::adapters::confirmation::{AlwaysConfirm, BoundedConfirmation, RuleConfirmation};
use crate::adapters::csv_adapter::{read_series, CsvMarketData};
use crate::adapters::csv_outcome_archive::CsvOutcomeArchive;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::ini_weight_file::IniWeightFile;
use crate::adapters::paper_execution::PaperExecution;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::adapters::state_file::RunStateFile;
use crate::domain::backtest::{run_backtest as replay, trim_to_days, BacktestConfig};
use crate::domain::config_validation::{
    validate_backtest_config, validate_engine_config, DEFAULT_MIN_TIMEFRAMES, DEFAULT_TIMEFRAMES,
};
use crate::domain::decision::{DecisionEngine, PositionSizer, Thresholds};
use crate::domain::error::TurbotraderError;
use crate::domain::indicator::{IndicatorConfig, IndicatorKind};
use crate::domain::learning::{LearningConfig, LearningModule};
use crate::domain::normalizer::{NormalizerConfig, SigmoidParams};
use crate::domain::outcome::OutcomeSummary;
use crate::domain::scanner::{fetch_series, RunState, Scanner, ScannerConfig, ScannerPorts};
use crate::domain::scorer::{score_asset, ScoringConfig};
use crate::domain::strategy::StrategyConfig;
use crate::domain::timeframe::{parse_timeframes, Timeframe};
use crate::domain::trader::Trader;
use crate::domain::weights::{WeightStore, WeightVector};
use crate::logging::init_tracing;
use crate::ports::config_port::ConfigPort;
use crate::ports::confirmation_port::ConfirmationPort;
use crate::ports::market_data_port::MarketDataPort;
use crate::ports::outcome_archive_port::OutcomeArchive;
use crate::ports::weight_repository_port::WeightRepository;

#[derive(Parser, Debug)]
#[command(name = "turbotrader", about = "Multi-timeframe crypto scoring and trading engine")]
pub struct Cli {
    /// Log filter, overrides [logging] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Score one coin across the configured timeframes
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        coin: String,
    },
    /// Replay historical bars for one coin
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        coin: String,
        #[arg(long)]
        days: Option<u32>,
        /// Append closed trades to this CSV file
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Feed the outcomes to the learning module and save the new weights
        #[arg(long)]
        learn: bool,
    },
    /// Start continuous scanning
    Start {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, value_delimiter = ',')]
        coins: Vec<String>,
        #[arg(long)]
        cycles: Option<usize>,
    },
    /// Ask a running scanner to stop
    Stop {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show scanner state, weights and trade statistics
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

impl Command {
    fn config_path(&self) -> &Path {
        match self {
            Command::Analyze { config, .. }
            | Command::Backtest { config, .. }
            | Command::Start { config, .. }
            | Command::Stop { config }
            | Command::Status { config }
            | Command::Validate { config } => config.as_path(),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let config_path = cli.command.config_path().to_path_buf();
    let adapter = match load_config(&config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let level = cli
        .log_level
        .clone()
        .or_else(|| adapter.get_string("logging", "level"))
        .unwrap_or_else(|| "info".to_string());
    init_tracing(&level);
    tracing::debug!(config = %config_path.display(), "configuration loaded");

    let result = match cli.command {
        Command::Analyze { coin, .. } => run_analyze(&adapter, &config_path, &coin),
        Command::Backtest {
            coin,
            days,
            output,
            learn,
            ..
        } => run_backtest(&adapter, &config_path, &coin, days, output.as_deref(), learn),
        Command::Start { coins, cycles, .. } => run_start(&adapter, &config_path, &coins, cycles),
        Command::Stop { .. } => run_stop(&adapter, &config_path),
        Command::Status { .. } => run_status(&adapter, &config_path),
        Command::Validate { .. } => run_validate(&adapter),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Relative paths in the config resolve against the config file's directory.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn configured_path(
    config: &dyn ConfigPort,
    config_path: &Path,
    section: &str,
    key: &str,
    default: &str,
) -> PathBuf {
    let value = config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string());
    resolve_path(config_path, &value)
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, TurbotraderError> {
    let raw = config
        .get_string("engine", "timeframes")
        .unwrap_or_else(|| DEFAULT_TIMEFRAMES.to_string());
    let timeframes = parse_timeframes(&raw)
        .map_err(|reason| TurbotraderError::config_invalid("engine", "timeframes", reason))?;
    let default_min = DEFAULT_MIN_TIMEFRAMES.min(timeframes.len() as i64);
    let min_timeframes = config.get_int("engine", "min_timeframes", default_min).max(1) as usize;

    let indicator_defaults = IndicatorConfig::default();
    let indicators = IndicatorConfig {
        momentum_lookback: config.get_int(
            "indicators",
            "momentum_lookback",
            indicator_defaults.momentum_lookback as i64,
        ) as usize,
        rsi_period: config.get_int(
            "indicators",
            "rsi_period",
            indicator_defaults.rsi_period as i64,
        ) as usize,
        volatility_period: config.get_int(
            "indicators",
            "volatility_period",
            indicator_defaults.volatility_period as i64,
        ) as usize,
        volatility_annualization: config.get_double(
            "indicators",
            "volatility_annualization",
            indicator_defaults.volatility_annualization,
        ),
    };

    let mut normalizer = NormalizerConfig::default();
    for kind in IndicatorKind::ALL {
        let defaults = normalizer.get(kind);
        let k = config.get_double("normalizer", &format!("{}_k", kind.name()), defaults.k);
        let x0 = config.get_double("normalizer", &format!("{}_x0", kind.name()), defaults.x0);
        normalizer.set(kind, SigmoidParams::new(k, x0));
    }

    let weights = WeightVector::from_raw(
        config.get_double("weights", "price", 70.0),
        config.get_double("weights", "volume", 10.0),
        config.get_double("weights", "rsi", 10.0),
        config.get_double("weights", "volatility", 10.0),
    )?;

    let thresholds = Thresholds {
        buy: config.get_double("decision", "buy_threshold", 70.0),
        sell: config.get_double("decision", "sell_threshold", 30.0),
    };

    let sizer_defaults = PositionSizer::default();
    let sizer = PositionSizer {
        account_fraction: config.get_double(
            "positions",
            "account_fraction",
            sizer_defaults.account_fraction,
        ),
        max_concurrent: config.get_int(
            "positions",
            "max_concurrent",
            sizer_defaults.max_concurrent as i64,
        ) as usize,
        min_balance: config.get_double("positions", "min_balance", sizer_defaults.min_balance),
    };

    Ok(StrategyConfig {
        timeframes,
        scoring: ScoringConfig {
            indicators,
            normalizer,
            min_timeframes,
        },
        thresholds,
        sizer,
        weights,
    })
}

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, TurbotraderError> {
    let defaults = BacktestConfig::default();
    let interval = match config.get_string("backtest", "interval") {
        Some(raw) => Timeframe::parse(&raw).ok_or_else(|| {
            TurbotraderError::config_invalid("backtest", "interval", format!("unknown timeframe '{raw}'"))
        })?,
        None => defaults.interval,
    };
    Ok(BacktestConfig {
        interval,
        days: config.get_int("backtest", "days", i64::from(defaults.days)).max(1) as u32,
        step: config.get_int("backtest", "step", defaults.step as i64).max(1) as usize,
        initial_capital: config.get_double("backtest", "initial_capital", defaults.initial_capital),
        min_timeframes: config
            .get_int("backtest", "min_timeframes", defaults.min_timeframes as i64)
            .max(1) as usize,
    })
}

pub fn build_learning_config(config: &dyn ConfigPort) -> LearningConfig {
    let defaults = LearningConfig::default();
    LearningConfig {
        min_trades: config
            .get_int("learning", "min_trades", defaults.min_trades as i64)
            .max(0) as usize,
        target_win_rate: config.get_double("learning", "target_win_rate", defaults.target_win_rate),
        learning_rate: config.get_double("learning", "learning_rate", defaults.learning_rate),
        reinforce_rate: config.get_double("learning", "reinforce_rate", defaults.reinforce_rate),
        min_weight: config.get_double("learning", "min_weight", defaults.min_weight),
    }
}

pub fn build_scanner_config(config: &dyn ConfigPort) -> ScannerConfig {
    let defaults = ScannerConfig::default();
    let assets = config
        .get_list("scanner", "coins")
        .map(|coins| coins.iter().map(|c| c.to_uppercase()).collect::<Vec<_>>())
        .filter(|coins| !coins.is_empty())
        .unwrap_or(defaults.assets);
    ScannerConfig {
        assets,
        fetch_limit: config
            .get_int("data", "fetch_limit", defaults.fetch_limit as i64)
            .max(1) as usize,
    }
}

/// The local confirmation policy named by `[confirmation] policy`.
pub fn build_confirmation(config: &dyn ConfigPort) -> Arc<dyn ConfirmationPort + Send + Sync> {
    match config.get_string("confirmation", "policy").as_deref() {
        Some("always") => Arc::new(AlwaysConfirm),
        _ => {
            let defaults = RuleConfirmation::default();
            Arc::new(RuleConfirmation {
                rsi_ceiling: config.get_double("confirmation", "rsi_ceiling", defaults.rsi_ceiling),
                rsi_floor: config.get_double("confirmation", "rsi_floor", defaults.rsi_floor),
            })
        }
    }
}

pub fn build_bounded_confirmation(config: &dyn ConfigPort) -> BoundedConfirmation {
    let timeout_ms = config.get_int("confirmation", "timeout_ms", 5000).max(1) as u64;
    BoundedConfirmation::new(build_confirmation(config), Duration::from_millis(timeout_ms))
}

/// Storage backends named by the config. With `[sqlite] path` set, SQLite
/// holds outcomes and weights, and serves bars when no `[data] csv_dir` is given.
pub struct Stores {
    csv: Option<CsvMarketData>,
    #[cfg(feature = "sqlite")]
    sqlite: Option<SqliteAdapter>,
    outcomes: CsvOutcomeArchive,
    weight_file: IniWeightFile,
}

impl Stores {
    pub fn open(config: &dyn ConfigPort, config_path: &Path) -> Result<Self, TurbotraderError> {
        let csv = config
            .get_string("data", "csv_dir")
            .map(|dir| CsvMarketData::new(resolve_path(config_path, &dir)));

        #[cfg(feature = "sqlite")]
        let sqlite = match config.get_string("sqlite", "path") {
            Some(_) => Some(SqliteAdapter::from_config(config)?),
            None => None,
        };

        Ok(Stores {
            csv,
            #[cfg(feature = "sqlite")]
            sqlite,
            outcomes: CsvOutcomeArchive::new(configured_path(
                config,
                config_path,
                "scanner",
                "outcomes_file",
                "outcomes.csv",
            )),
            weight_file: IniWeightFile::new(configured_path(
                config,
                config_path,
                "scanner",
                "weights_file",
                "weights.ini",
            )),
        })
    }

    pub fn market_data(&self) -> Result<&dyn MarketDataPort, TurbotraderError> {
        if let Some(csv) = &self.csv {
            return Ok(csv);
        }
        #[cfg(feature = "sqlite")]
        {
            if let Some(db) = &self.sqlite {
                return Ok(db);
            }
        }
        Err(TurbotraderError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })
    }

    pub fn archive(&self) -> &dyn OutcomeArchive {
        #[cfg(feature = "sqlite")]
        {
            if let Some(db) = &self.sqlite {
                return db;
            }
        }
        &self.outcomes
    }

    pub fn weight_repository(&self) -> &dyn WeightRepository {
        #[cfg(feature = "sqlite")]
        {
            if let Some(db) = &self.sqlite {
                return db;
            }
        }
        &self.weight_file
    }
}

/// Persisted weights if any, else the configured initial vector.
pub fn current_weights(
    strategy: &StrategyConfig,
    repository: &dyn WeightRepository,
) -> Result<WeightVector, TurbotraderError> {
    Ok(repository.load()?.unwrap_or(strategy.weights))
}

fn run_analyze(
    config: &FileConfigAdapter,
    config_path: &Path,
    coin: &str,
) -> Result<(), TurbotraderError> {
    validate_engine_config(config)?;
    let strategy = build_strategy_config(config)?;
    let scanner_config = build_scanner_config(config);
    let stores = Stores::open(config, config_path)?;
    let weights = current_weights(&strategy, stores.weight_repository())?;
    let asset = coin.trim().to_uppercase();

    let series = fetch_series(
        stores.market_data()?,
        &asset,
        &strategy.timeframes,
        scanner_config.fetch_limit,
    )?;
    let score = score_asset(&asset, &series, &strategy.scoring, &weights)?;
    let confirmation = build_bounded_confirmation(config);
    let decision =
        DecisionEngine::new(strategy.thresholds).decide(&score, |request| confirmation.confirm(request));

    println!("{asset}");
    println!(
        "{:<5} {:>7} {:>10} {:>10} {:>7} {:>10}",
        "TF", "SCORE", "MOMENTUM", "VOL_DELTA", "RSI", "VOLATILITY"
    );
    for t in &score.timeframes {
        println!(
            "{:<5} {:>7.2} {:>10.4} {:>10.4} {:>7.2} {:>10.4}",
            t.timeframe,
            t.score,
            t.indicators.momentum,
            t.indicators.volume_delta,
            t.indicators.rsi,
            t.indicators.volatility
        );
    }
    for tf in &score.skipped {
        println!("{:<5} {:>7}", tf, "n/a");
    }
    println!();
    println!("Composite: {:.2}", score.composite);
    println!("Decision:  {}", decision.action);
    match decision.verdict {
        Some(verdict) => println!("Verdict:   {:?}", verdict),
        None => println!("Verdict:   not requested"),
    }
    Ok(())
}

fn run_backtest(
    config: &FileConfigAdapter,
    config_path: &Path,
    coin: &str,
    days: Option<u32>,
    output: Option<&Path>,
    learn: bool,
) -> Result<(), TurbotraderError> {
    validate_engine_config(config)?;
    validate_backtest_config(config)?;
    let strategy = build_strategy_config(config)?;
    let mut bt_config = build_backtest_config(config)?;
    if let Some(days) = days {
        if days == 0 {
            return Err(TurbotraderError::config_invalid(
                "backtest",
                "days",
                "--days must be at least 1",
            ));
        }
        bt_config.days = days;
    }

    let csv_dir = config
        .get_string("data", "csv_dir")
        .ok_or_else(|| TurbotraderError::ConfigMissing {
            section: "data".into(),
            key: "csv_dir".into(),
        })?;
    let asset = coin.trim().to_uppercase();
    let path = resolve_path(config_path, &csv_dir).join(format!("{}_{}.csv", asset, bt_config.interval));
    eprintln!("Loading {}", path.display());
    let bars = read_series(&path)?;
    let window = trim_to_days(&bars, bt_config.days);

    let stores = Stores::open(config, config_path)?;
    let weights = current_weights(&strategy, stores.weight_repository())?;
    let policy = build_confirmation(config);

    eprintln!(
        "Running backtest: {} over {} days ({} {} bars)",
        asset,
        bt_config.days,
        window.len(),
        bt_config.interval
    );
    let result = replay(&asset, window, &strategy, &bt_config, &weights, &policy)?;

    println!(
        "{{win_rate: {:.4}, total_pnl: {:.2}, trade_count: {}}}",
        result.summary.win_rate, result.summary.total_pnl, result.summary.trade_count
    );
    eprintln!("Final balance: {:.2}", result.final_balance);

    if let Some(output) = output {
        let archive = CsvOutcomeArchive::new(output.to_path_buf());
        for outcome in &result.outcomes {
            archive.append(outcome)?;
        }
        eprintln!("Outcomes written to: {}", output.display());
    }

    if learn {
        let mut learning = LearningModule::new(build_learning_config(config));
        for outcome in &result.outcomes {
            learning.observe(outcome.clone());
        }
        match learning.update(&weights)? {
            Some(update) => {
                stores.weight_repository().save(&update.next)?;
                println!("weights: {} -> {}", update.previous, update.next);
            }
            None => eprintln!(
                "Learning skipped: {} trades, need {}",
                result.outcomes.len(),
                learning.config.min_trades
            ),
        }
    }
    Ok(())
}

fn run_start(
    config: &FileConfigAdapter,
    config_path: &Path,
    coins: &[String],
    cycles: Option<usize>,
) -> Result<(), TurbotraderError> {
    validate_engine_config(config)?;
    let strategy = build_strategy_config(config)?;
    let mut scanner_config = build_scanner_config(config);
    let overrides: Vec<String> = coins
        .iter()
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .collect();
    if !overrides.is_empty() {
        scanner_config.assets = overrides;
    }

    let stores = Stores::open(config, config_path)?;
    let state = RunStateFile::new(configured_path(
        config,
        config_path,
        "scanner",
        "state_file",
        "turbotrader.state",
    ));
    let starting_balance = config.get_double("paper", "starting_balance", 1000.0);
    let execution = PaperExecution::new(starting_balance);
    let confirmation = build_bounded_confirmation(config);
    let weight_store = WeightStore::new(current_weights(&strategy, stores.weight_repository())?)?;
    let pause = Duration::from_secs(config.get_int("scanner", "interval_secs", 300).max(0) as u64);

    let ports = ScannerPorts {
        market_data: stores.market_data()?,
        confirmation: &confirmation,
        execution: &execution,
        archive: stores.archive(),
        weights: &weight_store,
        weight_repository: Some(stores.weight_repository()),
    };
    let trader = Trader::new(strategy, starting_balance);
    let learning = LearningModule::new(build_learning_config(config));
    let mut scanner = Scanner::new(scanner_config, trader, learning, ports);

    state.write(RunState::Running)?;
    eprintln!(
        "Scanning {} every {}s (state file {})",
        scanner.config.assets.join(", "),
        pause.as_secs(),
        state.path().display()
    );

    let result = scanner.run(
        || Ok(state.read()? == RunState::Running),
        cycles,
        || thread::sleep(pause),
    );
    state.write(RunState::Stopped)?;
    let cycles_run = result?;

    let portfolio = scanner.portfolio();
    println!(
        "cycles: {}, open positions: {}, cash: {:.2}",
        cycles_run,
        portfolio.position_count(),
        portfolio.cash
    );
    println!("weights: {}", weight_store.snapshot());
    Ok(())
}

fn run_stop(config: &FileConfigAdapter, config_path: &Path) -> Result<(), TurbotraderError> {
    let state = RunStateFile::new(configured_path(
        config,
        config_path,
        "scanner",
        "state_file",
        "turbotrader.state",
    ));
    state.write(RunState::Stopped)?;
    eprintln!("Stop requested ({})", state.path().display());
    Ok(())
}

fn run_status(config: &FileConfigAdapter, config_path: &Path) -> Result<(), TurbotraderError> {
    let strategy = build_strategy_config(config)?;
    let stores = Stores::open(config, config_path)?;
    let state = RunStateFile::new(configured_path(
        config,
        config_path,
        "scanner",
        "state_file",
        "turbotrader.state",
    ))
    .read()?;
    let weights = current_weights(&strategy, stores.weight_repository())?;
    let outcomes = stores.archive().read_all()?;
    let summary = OutcomeSummary::from_outcomes(&outcomes);

    println!("state:     {state}");
    println!("weights:   {weights}");
    println!("trades:    {}", summary.trade_count);
    println!("win rate:  {:.1}%", summary.win_rate * 100.0);
    println!("total pnl: {:.2}", summary.total_pnl);
    Ok(())
}

fn run_validate(config: &FileConfigAdapter) -> Result<(), TurbotraderError> {
    validate_engine_config(config)?;
    validate_backtest_config(config)?;
    let strategy = build_strategy_config(config)?;
    let timeframes: Vec<&str> = strategy.timeframes.iter().map(|tf| tf.as_str()).collect();
    eprintln!("Timeframes: {}", timeframes.join(","));
    eprintln!("Weights:    {}", strategy.weights);
    eprintln!(
        "Thresholds: buy > {} / sell < {}",
        strategy.thresholds.buy, strategy.thresholds.sell
    );
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
