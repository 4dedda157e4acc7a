//! CLI definition, config assembly and the terminal play loop.

use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::svg_chart::SvgChartAdapter;
use crate::domain::config_validation::validate_game_config;
use crate::domain::error::CandlecallError;
use crate::domain::fetcher::MarketDataFetcher;
use crate::domain::game::{GameEvent, GamePhase, GameStateMachine, GameView};
use crate::domain::interval::{Interval, parse_intervals};
use crate::domain::ohlcv::{RawBar, Series};
use crate::domain::period::PeriodSampler;
use crate::domain::settings::{GameConfig, PredictionBounds, default_universes};
use crate::domain::trend::{Direction, classify};
use crate::domain::universe::{
    Universe, UniverseSelection, Universes, normalize_symbol, parse_codes,
};
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "candlecall", about = "Guess where the chart goes next")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play an interactive session
    Play {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Seed for symbol and window selection
        #[arg(long)]
        seed: Option<u64>,
        /// Write the current chart as SVG to this path
        #[arg(long)]
        chart: Option<PathBuf>,
    },
    /// Validate a game configuration
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print sampled fetch windows for an interval
    Window {
        #[arg(short, long)]
        interval: String,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Classify the trend of the last candles of a CSV file
    Trend {
        #[arg(long)]
        csv: PathBuf,
        #[arg(short = 'n', long, default_value_t = 10)]
        candles: usize,
    },
    /// Load a CSV file into the SQLite candle store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(short, long)]
        interval: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show stored symbols and data ranges
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        interval: String,
        #[arg(long)]
        symbol: Option<String>,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Play {
            config,
            seed,
            chart,
        } => run_play(config.as_ref(), seed, chart.as_ref()),
        Command::Validate { config } => run_validate(&config),
        Command::Window {
            interval,
            seed,
            count,
        } => run_window(&interval, seed, count),
        Command::Trend { csv, candles } => run_trend(&csv, candles),
        Command::Import {
            config,
            symbol,
            interval,
            csv,
        } => run_import(&config, &symbol, &interval, &csv),
        Command::Info {
            config,
            interval,
            symbol,
        } => run_info(&config, &interval, symbol.as_deref()),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = CandlecallError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn invalid(section: &str, key: &str, reason: impl Into<String>) -> CandlecallError {
    CandlecallError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

fn parse_interval_arg(value: &str) -> Result<Interval, ExitCode> {
    value.parse().map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(2)
    })
}

/// Validates the `[game]` and `[universes]` sections and assembles a
/// [`GameConfig`], falling back to built-in defaults for absent keys.
pub fn build_game_config(config: &dyn ConfigPort) -> Result<GameConfig, CandlecallError> {
    validate_game_config(config)?;
    let defaults = GameConfig::default();

    let intervals = match config.get_string("game", "intervals") {
        Some(list) => {
            parse_intervals(&list).map_err(|e| invalid("game", "intervals", e.to_string()))?
        }
        None => defaults.intervals.clone(),
    };

    let default_interval = match config.get_string("game", "default_interval") {
        Some(value) => value
            .parse()
            .map_err(|e: crate::domain::interval::UnknownInterval| {
                invalid("game", "default_interval", e.to_string())
            })?,
        None if intervals.contains(&defaults.default_interval) => defaults.default_interval,
        None => intervals[0],
    };

    let mut named = Vec::new();
    for name in config.keys("universes") {
        let codes = parse_codes(&config.get_string("universes", &name).unwrap_or_default())?;
        named.push(Universe { name, codes });
    }
    let mut universes = Universes::new(named);
    if universes.is_empty() {
        universes = default_universes();
    }

    let default_universe = match config.get_string("game", "default_universe") {
        Some(value) => resolve_universe(value.trim(), &universes)
            .ok_or_else(|| invalid("game", "default_universe", format!("unknown universe {value}")))?,
        None => universes
            .names()
            .first()
            .map(|name| UniverseSelection::Named(name.to_string()))
            .unwrap_or(UniverseSelection::Custom),
    };

    let default_symbol = config
        .get_string("game", "default_symbol")
        .map(|s| normalize_symbol(&s))
        .unwrap_or(defaults.default_symbol);

    let fallback = PredictionBounds::default();
    let prediction = PredictionBounds {
        min: config.get_int("game", "prediction_candles_min", fallback.min as i64) as usize,
        max: config.get_int("game", "prediction_candles_max", fallback.max as i64) as usize,
        step: config.get_int("game", "prediction_candles_step", fallback.step as i64) as usize,
        default: config.get_int("game", "prediction_candles_default", fallback.default as i64)
            as usize,
    };

    Ok(GameConfig {
        universes,
        intervals,
        default_symbol,
        default_interval,
        default_universe,
        prediction,
        min_required_points: config.get_int(
            "game",
            "min_required_points",
            defaults.min_required_points as i64,
        ) as usize,
        widen_days: config.get_int("game", "widen_days", defaults.widen_days),
    })
}

/// Maps selector text onto a universe selection. Named universes match
/// case-insensitively and come back under their configured spelling.
pub fn resolve_universe(text: &str, universes: &Universes) -> Option<UniverseSelection> {
    if text.eq_ignore_ascii_case("any") {
        Some(UniverseSelection::Any)
    } else if text.eq_ignore_ascii_case("custom") {
        Some(UniverseSelection::Custom)
    } else {
        universes
            .find(text)
            .map(|u| UniverseSelection::Named(u.name.clone()))
    }
}

/// Builds the market data source named by `[data] provider` (default `csv`).
pub fn build_data_port(config: &dyn ConfigPort) -> Result<Box<dyn MarketDataPort>, CandlecallError> {
    let provider = config
        .get_string("data", "provider")
        .unwrap_or_else(|| "csv".to_string());

    match provider.trim().to_ascii_lowercase().as_str() {
        "csv" => {
            let dir = config
                .get_string("data", "csv_dir")
                .unwrap_or_else(|| "data".to_string());
            Ok(Box::new(CsvAdapter::new(PathBuf::from(dir))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(config)?))
        }
        #[cfg(feature = "yahoo")]
        "yahoo" => {
            use crate::adapters::yahoo_adapter::YahooAdapter;
            Ok(Box::new(YahooAdapter::from_config(config)?))
        }
        other => Err(invalid(
            "data",
            "provider",
            format!("unsupported provider {other} (check enabled features)"),
        )),
    }
}

/// One line of input at the play prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayCommand {
    Event(GameEvent),
    Show,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("invalid argument for {command}: {reason}")]
    InvalidArgument {
        command: &'static str,
        reason: String,
    },
}

/// Parses a prompt line. Blank lines yield `Ok(None)`.
pub fn parse_command(
    line: &str,
    universes: &Universes,
) -> Result<Option<PlayCommand>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let arg = |name: &'static str| {
        if rest.is_empty() {
            Err(CommandError::MissingArgument(name))
        } else {
            Ok(rest)
        }
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "universe" => {
            let text = arg("universe")?;
            let selection = resolve_universe(text, universes)
                .unwrap_or_else(|| UniverseSelection::Named(text.to_string()));
            PlayCommand::Event(GameEvent::UniverseChanged(selection))
        }
        "interval" => {
            let interval = arg("interval")?.parse().map_err(
                |e: crate::domain::interval::UnknownInterval| CommandError::InvalidArgument {
                    command: "interval",
                    reason: e.to_string(),
                },
            )?;
            PlayCommand::Event(GameEvent::IntervalChanged(interval))
        }
        "symbol" => PlayCommand::Event(GameEvent::CustomSymbolChanged(
            arg("symbol")?.to_string(),
        )),
        "candles" => {
            let n = arg("candles")?
                .parse::<usize>()
                .map_err(|e| CommandError::InvalidArgument {
                    command: "candles",
                    reason: e.to_string(),
                })?;
            PlayCommand::Event(GameEvent::PredictionCandleCountChanged(n))
        }
        "up" | "u" | "down" | "d" => {
            let direction: Direction = word.parse().map_err(|e: String| {
                CommandError::InvalidArgument {
                    command: "predict",
                    reason: e,
                }
            })?;
            PlayCommand::Event(GameEvent::PredictionSubmitted(direction))
        }
        "next" | "n" => PlayCommand::Event(GameEvent::NextRequested),
        "reset" => PlayCommand::Event(GameEvent::ResetRequested),
        "show" | "s" => PlayCommand::Show,
        "help" | "h" | "?" => PlayCommand::Help,
        "quit" | "q" | "exit" => PlayCommand::Quit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

const HELP: &str = "\
Commands:
  up | down           predict the trend of the hidden candles
  next                play another round
  candles <n>         number of hidden candles
  interval <id>       candle interval (1m 2m 5m 15m 30m 60m 90m 1h 1d 5d 1wk 1mo 3mo)
  universe <name>     pick symbols from a universe, 'any' or 'custom'
  symbol <ticker>     ticker for custom mode
  reset               clear score and start over
  show                redraw the current round
  quit                leave";

/// Where the play loop writes the chart after each redraw.
pub struct ChartOutput<'a> {
    pub port: &'a dyn ChartPort,
    pub path: PathBuf,
}

pub fn render_view<W: Write>(view: &GameView<'_>, out: &mut W) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "Stock Universe: {}", view.universe)?;
    writeln!(out, "Symbol: {} - Interval: {}", view.symbol, view.interval)?;

    match view.phase {
        GamePhase::Loading => {
            writeln!(out, "Loading data...")?;
            return Ok(());
        }
        GamePhase::Error(_) => {
            if let Some(err) = view.error {
                writeln!(out, "No data available: {err}")?;
            }
            writeln!(out, "Please try another interval or symbol.")?;
            return Ok(());
        }
        GamePhase::AwaitingPrediction | GamePhase::Revealing => {}
    }

    if let Some((start, end)) = view.period {
        writeln!(
            out,
            "Period: {} to {}",
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )?;
    }

    if !view.playable {
        writeln!(
            out,
            "Not enough data points for the selected interval and {} prediction candles \
             (need {}). Please choose another interval.",
            view.prediction_candle_count, view.required_points
        )?;
        return Ok(());
    }

    match (view.phase, view.outcome) {
        (GamePhase::Revealing, Some(outcome)) => {
            let actual = outcome.actual.map_or("undefined", |d| d.as_str());
            if outcome.correct {
                writeln!(out, "Correct prediction! The trend was {actual}.")?;
            } else {
                writeln!(out, "Incorrect prediction. True trend was {actual}.")?;
            }
            writeln!(out, "Type 'next' for another round.")?;
        }
        _ => {
            if let Some(last) = view.candles.last() {
                writeln!(out, "Last close: {:.2}", last.close)?;
            }
            writeln!(
                out,
                "Will the next {} candles trend up or down?",
                view.prediction_candle_count
            )?;
        }
    }

    write!(out, "Score: {}", view.score)?;
    if let Some(accuracy) = view.accuracy_pct {
        write!(
            out,
            "  Accuracy: {accuracy:.2}% over {} predictions",
            view.total_predictions
        )?;
    }
    writeln!(out)?;
    Ok(())
}

fn write_chart(view: &GameView<'_>, chart: &ChartOutput<'_>) -> Result<(), CandlecallError> {
    let title = format!("{} {}", view.symbol, view.interval);
    let svg = chart.port.render(view.candles, view.highlight_from, &title)?;
    fs::write(&chart.path, svg)?;
    tracing::debug!(path = %chart.path.display(), "chart written");
    Ok(())
}

fn redraw<R: Rng, W: Write>(
    game: &GameStateMachine<R>,
    chart: Option<&ChartOutput<'_>>,
    out: &mut W,
) -> io::Result<()> {
    let view = game.view();
    render_view(&view, out)?;
    if let Some(chart) = chart {
        if !view.candles.is_empty() {
            if let Err(e) = write_chart(&view, chart) {
                writeln!(out, "warning: could not write chart: {e}")?;
            }
        }
    }
    Ok(())
}

/// Runs the prompt loop until `quit` or end of input. Game errors are
/// printed and the session continues.
pub fn play_session<R, I, W>(
    game: &mut GameStateMachine<R>,
    fetcher: &MarketDataFetcher<'_>,
    chart: Option<&ChartOutput<'_>>,
    clock: &dyn Fn() -> NaiveDateTime,
    input: I,
    out: &mut W,
) -> io::Result<()>
where
    R: Rng,
    I: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        if game.load_with(fetcher, clock()) {
            redraw(game, chart, out)?;
        }

        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next() else {
            writeln!(out)?;
            return Ok(());
        };
        let line = line?;

        match parse_command(&line, &game.config().universes) {
            Ok(None) => {}
            Ok(Some(PlayCommand::Quit)) => return Ok(()),
            Ok(Some(PlayCommand::Help)) => {
                writeln!(out, "{HELP}")?;
                writeln!(out, "Universes: {}", game.config().universes.names().join(", "))?;
            }
            Ok(Some(PlayCommand::Show)) => redraw(game, chart, out)?,
            Ok(Some(PlayCommand::Event(event))) => match game.handle(event) {
                Ok(()) if game.state().phase != GamePhase::Loading => redraw(game, chart, out)?,
                Ok(()) => {}
                Err(e) => writeln!(out, "error: {e}")?,
            },
            Err(e) => writeln!(out, "error: {e}")?,
        }
    }
}

fn run_play(config_path: Option<&PathBuf>, seed: Option<u64>, chart_path: Option<&PathBuf>) -> ExitCode {
    let adapter = match config_path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            match load_config(path) {
                Ok(a) => a,
                Err(code) => return code,
            }
        }
        None => match FileConfigAdapter::from_string("") {
            Ok(a) => a,
            Err(reason) => {
                let err = CandlecallError::ConfigParse {
                    file: "<defaults>".into(),
                    reason,
                };
                eprintln!("error: {err}");
                return (&err).into();
            }
        },
    };

    let game_config = match build_game_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let port = match build_data_port(&adapter) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    let fetcher = MarketDataFetcher::with_limits(
        port.as_ref(),
        game_config.min_required_points,
        game_config.widen_days,
    );

    let mut game = match GameStateMachine::new(game_config, make_rng(seed)) {
        Ok(g) => g,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let chart_adapter = SvgChartAdapter::from_config(&adapter);
    let chart = chart_path
        .cloned()
        .or_else(|| adapter.get_string("chart", "output").map(PathBuf::from))
        .map(|path| ChartOutput {
            port: &chart_adapter,
            path,
        });

    eprintln!("Type 'help' for commands.");
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let clock = || Local::now().naive_local();

    match play_session(&mut game, &fetcher, chart.as_ref(), &clock, stdin.lock(), &mut stdout) {
        Ok(()) => {
            let state = game.state();
            eprintln!(
                "Final score: {} ({} correct of {})",
                state.score,
                state.correct_count(),
                state.history.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            let err = CandlecallError::from(e);
            eprintln!("error: {err}");
            (&err).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let config = match build_game_config(&adapter) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!("\nUniverses:");
    for name in config.universes.names() {
        let count = config.universes.get(name).map_or(0, Universe::count);
        eprintln!("  {name}: {count} symbols");
    }
    let intervals: Vec<&str> = config.intervals.iter().map(Interval::as_str).collect();
    eprintln!("\nIntervals: {}", intervals.join(", "));
    eprintln!(
        "Defaults: symbol {}, interval {}, universe {}",
        config.default_symbol, config.default_interval, config.default_universe
    );
    eprintln!(
        "Prediction candles: {}..={} step {} (default {})",
        config.prediction.min, config.prediction.max, config.prediction.step, config.prediction.default
    );
    eprintln!(
        "Minimum history: {} candles, widened by {} days on retry",
        config.min_required_points, config.widen_days
    );

    if let Err(e) = build_data_port(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_window(interval: &str, seed: Option<u64>, count: usize) -> ExitCode {
    let interval = match parse_interval_arg(interval) {
        Ok(i) => i,
        Err(code) => return code,
    };

    let class = interval.class();
    let policy = class.policy();
    eprintln!(
        "{interval} ({class:?}): {}..={} days back, {} day span",
        policy.min_days_back, policy.max_days_back, policy.span_days
    );

    let mut rng = make_rng(seed);
    let now = Local::now().naive_local();
    for _ in 0..count.max(1) {
        println!("{}", PeriodSampler::sample(class, now, &mut rng));
    }
    ExitCode::SUCCESS
}

fn run_trend(csv_path: &Path, tail: usize) -> ExitCode {
    let bars = match CsvAdapter::read_file(csv_path) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let candles = match bars.iter().map(RawBar::to_candle).collect::<Result<Vec<_>, _>>() {
        Ok(c) => c,
        Err(field) => {
            eprintln!("error: {} has rows without {field}", csv_path.display());
            return ExitCode::from(1);
        }
    };
    let series = match Series::new(candles) {
        Ok(s) if s.is_empty() => {
            eprintln!("error: {} has no rows", csv_path.display());
            return ExitCode::from(1);
        }
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(1);
        }
    };

    let split = series.len().saturating_sub(tail);
    let (_, withheld) = series.split_at(split);
    match classify(withheld) {
        Some(direction) => println!("{direction}"),
        None => println!("undefined"),
    }
    eprintln!(
        "{} candles classified from {} total",
        withheld.len(),
        series.len()
    );
    ExitCode::SUCCESS
}

fn run_import(config_path: &PathBuf, symbol: &str, interval: &str, csv_path: &Path) -> ExitCode {
    let interval = match parse_interval_arg(interval) {
        Ok(i) => i,
        Err(code) => return code,
    };
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let result = CsvAdapter::read_file(csv_path).and_then(|bars| {
            let store = SqliteAdapter::from_config(&config)?;
            store.insert_candles(&normalize_symbol(symbol), interval, &bars)
        });
        match result {
            Ok(count) => {
                eprintln!("Imported {count} candles for {symbol} {interval}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("error: {e}");
                (&e).into()
            }
        }
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, symbol, interval, csv_path);
        eprintln!("error: sqlite feature is required for import");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &PathBuf, interval: &str, symbol: Option<&str>) -> ExitCode {
    let interval = match parse_interval_arg(interval) {
        Ok(i) => i,
        Err(code) => return code,
    };
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteAdapter;

        let store = match SqliteAdapter::from_config(&config) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("error: {e}");
                return (&e).into();
            }
        };

        let symbols = match symbol {
            Some(s) => vec![normalize_symbol(s)],
            None => match store.list_symbols(interval) {
                Ok(list) => list,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            },
        };

        for s in &symbols {
            match store.data_range(s, interval) {
                Ok(Some((min, max, count))) => {
                    println!("{s} {interval}: {count} candles, {min} to {max}");
                }
                Ok(None) => eprintln!("{s} {interval}: no data found"),
                Err(e) => eprintln!("error querying {s}: {e}"),
            }
        }
        ExitCode::SUCCESS
    }

    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config, interval, symbol);
        eprintln!("error: sqlite feature is required for info");
        ExitCode::from(1)
    }
}
