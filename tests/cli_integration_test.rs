//! CLI integration tests.
//!
//! Tests cover:
//! - Config assembly (build_game_config) with defaults and overrides
//! - Data port selection from `[data] provider`
//! - Prompt command parsing
//! - Scripted play sessions against CSV files on disk

mod common;

use candlecall::adapters::csv_adapter::CsvAdapter;
use candlecall::adapters::file_config_adapter::FileConfigAdapter;
use candlecall::adapters::svg_chart::SvgChartAdapter;
use candlecall::cli::{self, ChartOutput, Cli, Command, CommandError, PlayCommand};
use candlecall::domain::error::CandlecallError;
use candlecall::domain::fetcher::MarketDataFetcher;
use candlecall::domain::game::{GameEvent, GameStateMachine};
use candlecall::domain::interval::Interval;
use candlecall::domain::settings::GameConfig;
use candlecall::domain::trend::Direction;
use candlecall::domain::universe::UniverseSelection;
use common::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::{Cursor, Write};

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[game]
default_symbol = msft
default_interval = 1wk
default_universe = tech
intervals = 1d, 1wk, 1h
prediction_candles_min = 5
prediction_candles_max = 30
prediction_candles_step = 5
prediction_candles_default = 15
min_required_points = 60
widen_days = 200

[universes]
Tech = AAPL, MSFT, NVDA
Banks = JPM, BAC

[data]
provider = csv
csv_dir = data

[chart]
zoom_candles = 40
"#;

mod config_loading {
    use super::*;

    #[test]
    fn build_game_config_valid_full() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_game_config(&adapter).unwrap();

        assert_eq!(config.default_symbol, "MSFT");
        assert_eq!(config.default_interval, Interval::Week1);
        assert_eq!(
            config.default_universe,
            UniverseSelection::Named("Tech".into())
        );
        assert_eq!(
            config.intervals,
            vec![Interval::Day1, Interval::Week1, Interval::Hour1]
        );
        assert_eq!(config.prediction.max, 30);
        assert_eq!(config.prediction.default, 15);
        assert_eq!(config.min_required_points, 60);
        assert_eq!(config.widen_days, 200);
        assert_eq!(config.universes.get("Banks").unwrap().codes, vec!["JPM", "BAC"]);
    }

    #[test]
    fn build_game_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("[game]\n").unwrap();
        let config = cli::build_game_config(&adapter).unwrap();
        assert_eq!(config, GameConfig::default());
    }

    #[test]
    fn empty_universes_section_uses_builtins() {
        let adapter = FileConfigAdapter::from_string("[game]\n[universes]\n").unwrap();
        let config = cli::build_game_config(&adapter).unwrap();
        assert_eq!(config.universes, GameConfig::default().universes);
        assert!(config.universes.get("Nifty 50").is_some());
    }

    #[test]
    fn first_enabled_interval_when_day_is_disabled() {
        let adapter = FileConfigAdapter::from_string("[game]\nintervals = 1h, 1wk\n").unwrap();
        let config = cli::build_game_config(&adapter).unwrap();
        assert_eq!(config.default_interval, Interval::Hour1);
    }

    #[test]
    fn any_and_custom_default_universes() {
        let adapter = FileConfigAdapter::from_string("[game]\ndefault_universe = ANY\n").unwrap();
        assert_eq!(
            cli::build_game_config(&adapter).unwrap().default_universe,
            UniverseSelection::Any
        );

        let adapter =
            FileConfigAdapter::from_string("[game]\ndefault_universe = custom\n").unwrap();
        assert_eq!(
            cli::build_game_config(&adapter).unwrap().default_universe,
            UniverseSelection::Custom
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[game]\nprediction_candles_step = 0\n").unwrap();
        match cli::build_game_config(&adapter) {
            Err(CandlecallError::ConfigInvalid { section, key, .. }) => {
                assert_eq!(section, "game");
                assert_eq!(key, "prediction_candles_step");
            }
            other => panic!("expected ConfigInvalid, got {other:?}"),
        }
    }

    #[test]
    fn load_config_from_disk() {
        let file = write_temp_ini(VALID_INI);
        let adapter = cli::load_config(&file.path().to_path_buf()).unwrap();
        assert!(cli::build_game_config(&adapter).is_ok());
    }

    #[test]
    fn load_config_missing_file() {
        let missing = std::path::PathBuf::from("/nonexistent/candlecall.ini");
        let code = cli::load_config(&missing).err().unwrap();
        assert_eq!(format!("{code:?}"), format!("{:?}", std::process::ExitCode::from(2)));
    }

    #[test]
    fn csv_provider_is_default() {
        let adapter = FileConfigAdapter::from_string("[game]\n").unwrap();
        assert!(cli::build_data_port(&adapter).is_ok());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let adapter = FileConfigAdapter::from_string("[data]\nprovider = bloomberg\n").unwrap();
        assert!(matches!(
            cli::build_data_port(&adapter),
            Err(CandlecallError::ConfigInvalid { .. })
        ));
    }

    #[test]
    fn chart_settings_from_config() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let chart = SvgChartAdapter::from_config(&adapter);
        assert_eq!(chart.zoom_candles, 40);
    }
}

mod trend_command {
    use super::*;
    use std::process::ExitCode;

    fn trend(content: &str) -> ExitCode {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ABC_1d.csv");
        std::fs::write(&path, content).unwrap();
        cli::run(Cli {
            command: Command::Trend {
                csv: path,
                candles: 10,
            },
        })
    }

    #[test]
    fn classifies_file_tail() {
        let code = trend(&to_csv(&falling_tail(20, 10)));
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::SUCCESS));
    }

    #[test]
    fn header_only_file_is_an_error() {
        let code = trend("date,open,high,low,close\n");
        assert_eq!(format!("{code:?}"), format!("{:?}", ExitCode::from(1)));
    }
}

mod command_parsing {
    use super::*;

    fn parse(line: &str) -> Result<Option<PlayCommand>, CommandError> {
        cli::parse_command(line, &GameConfig::default().universes)
    }

    fn event(line: &str) -> GameEvent {
        match parse(line) {
            Ok(Some(PlayCommand::Event(event))) => event,
            other => panic!("expected an event for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn predictions() {
        assert_eq!(event("up"), GameEvent::PredictionSubmitted(Direction::Up));
        assert_eq!(event(" D "), GameEvent::PredictionSubmitted(Direction::Down));
    }

    #[test]
    fn selectors() {
        assert_eq!(event("interval 1h"), GameEvent::IntervalChanged(Interval::Hour1));
        assert_eq!(event("candles 20"), GameEvent::PredictionCandleCountChanged(20));
        assert_eq!(
            event("symbol reliance.ns"),
            GameEvent::CustomSymbolChanged("reliance.ns".into())
        );
    }

    #[test]
    fn universe_names_resolve_case_insensitively() {
        assert_eq!(
            event("universe nifty 50"),
            GameEvent::UniverseChanged(UniverseSelection::Named("Nifty 50".into()))
        );
        assert_eq!(event("universe any"), GameEvent::UniverseChanged(UniverseSelection::Any));
        assert_eq!(
            event("universe Custom"),
            GameEvent::UniverseChanged(UniverseSelection::Custom)
        );
        assert_eq!(
            event("universe Crypto"),
            GameEvent::UniverseChanged(UniverseSelection::Named("Crypto".into()))
        );
    }

    #[test]
    fn control_commands() {
        assert_eq!(event("next"), GameEvent::NextRequested);
        assert_eq!(event("reset"), GameEvent::ResetRequested);
        assert_eq!(parse("show"), Ok(Some(PlayCommand::Show)));
        assert_eq!(parse("?"), Ok(Some(PlayCommand::Help)));
        assert_eq!(parse("quit"), Ok(Some(PlayCommand::Quit)));
        assert_eq!(parse("   "), Ok(None));
    }

    #[test]
    fn bad_input() {
        assert_eq!(parse("sideways"), Err(CommandError::Unknown("sideways".into())));
        assert_eq!(parse("interval"), Err(CommandError::MissingArgument("interval")));
        assert!(matches!(
            parse("interval 2y"),
            Err(CommandError::InvalidArgument { command: "interval", .. })
        ));
        assert!(matches!(
            parse("candles many"),
            Err(CommandError::InvalidArgument { command: "candles", .. })
        ));
    }
}

mod play_session {
    use super::*;

    fn csv_dir(symbol: &str, bars: &[RawBar]) -> tempfile::TempDir {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join(format!("{symbol}_1d.csv")), to_csv(bars)).unwrap();
        dir
    }

    fn custom_game(symbol: &str) -> GameStateMachine<StdRng> {
        let config = GameConfig {
            default_universe: UniverseSelection::Custom,
            default_symbol: symbol.into(),
            ..GameConfig::default()
        };
        GameStateMachine::new(config, StdRng::seed_from_u64(11)).unwrap()
    }

    fn run_script(
        game: &mut GameStateMachine<StdRng>,
        port: &CsvAdapter,
        chart: Option<&ChartOutput<'_>>,
        script: &str,
    ) -> String {
        let fetcher = MarketDataFetcher::new(port);
        let clock = || now();
        let mut out = Vec::new();
        cli::play_session(game, &fetcher, chart, &clock, Cursor::new(script), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Strictly falling daily bars from 2020-01-01 past `now()`, so every
    /// sampled daily window is covered and its tail trends down.
    fn long_history() -> Vec<RawBar> {
        let closes: Vec<f64> = (0..2000).map(|i| 5000.0 - i as f64).collect();
        bars_from_closes(&closes)
    }

    #[test]
    fn scripted_round_scores_and_writes_chart() {
        let dir = csv_dir("ABC", &long_history());
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let chart_adapter = SvgChartAdapter::default();
        let chart = ChartOutput {
            port: &chart_adapter,
            path: dir.path().join("chart.svg"),
        };
        let mut game = custom_game("ABC");

        let output = run_script(&mut game, &port, Some(&chart), "show\nup\nquit\n");

        assert!(output.contains("Symbol: ABC - Interval: 1d"));
        assert!(output.contains("Will the next 10 candles trend up or down?"));
        assert_eq!(game.state().history.len(), 1);
        assert!(game.state().already_scored);

        let svg = std::fs::read_to_string(dir.path().join("chart.svg")).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn errors_do_not_end_the_session() {
        let dir = csv_dir("ABC", &long_history());
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let mut game = custom_game("ABC");

        let output = run_script(
            &mut game,
            &port,
            None,
            "fly\nnext\ninterval 7d\ncandles 25\nshow\n",
        );

        assert!(output.contains("error: unknown command: fly"));
        assert!(output.contains("error: next is not allowed while awaiting prediction"));
        assert!(output.contains("error: invalid argument for interval"));
        assert!(output.contains("Will the next 25 candles trend up or down?"));
        assert!(game.state().history.is_empty());
    }

    #[test]
    fn missing_data_is_shown_and_recoverable() {
        let dir = tempfile::TempDir::new().unwrap();
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let mut game = custom_game("ZZZ");

        let output = run_script(&mut game, &port, None, "reset\nquit\n");

        assert_eq!(output.matches("No data available").count(), 2);
        assert_eq!(game.state().score, 0);
    }

    #[test]
    fn end_of_input_stops_cleanly() {
        let dir = csv_dir("ABC", &long_history());
        let port = CsvAdapter::new(dir.path().to_path_buf());
        let mut game = custom_game("ABC");

        let output = run_script(&mut game, &port, None, "down\n");
        assert!(output.contains("Correct prediction!"));
        assert_eq!(game.state().score, 1);
    }
}
