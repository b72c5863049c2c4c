//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - loads the workbook
//! - runs the analysis / forecast / question
//! - prints reports/plots
//! - writes optional exports

use std::fs::OpenOptions;
use std::time::Duration;

use clap::Parser;
use log::info;

use crate::analysis::dates::date_span;
use crate::chart::Chart;
use crate::cli::{AskArgs, Command, ForecastArgs, PreviewArgs, ReportArgs, ServiceArgs, SourceArgs, TuiArgs};
use crate::domain::{ColumnMarkers, DateRange, LoadOptions, QaSettings, ReportType, Selections, ServiceSettings};
use crate::error::AppError;
use crate::io::ingest::{Dataset, load_dataset};

pub mod pipeline;
pub mod session;

/// File the TUI writes its log to (the terminal is taken by the UI).
pub const TUI_LOG_FILE: &str = "xplot.log";

/// Entry point for the `xplot` binary.
pub fn run() -> Result<(), AppError> {
    // Load `.env` first so clap's `env = ...` fallbacks and the API key see it.
    let _ = dotenvy::dotenv();

    // We want `xplot` and `xplot -f sales.xlsx` to behave like `xplot tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Tui(args) => {
            init_tui_logging();
            handle_tui(args)
        }
        Command::Preview(args) => {
            init_cli_logging();
            handle_preview(args)
        }
        Command::Report(args) => {
            init_cli_logging();
            handle_report(args)
        }
        Command::Forecast(args) => {
            init_cli_logging();
            handle_forecast(args)
        }
        Command::Ask(args) => {
            init_cli_logging();
            handle_ask(args)
        }
    }
}

/// CLI commands log to stderr (default level `warn`, override with `RUST_LOG`).
fn init_cli_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).try_init();
}

/// The TUI owns the terminal, so logs go to a file.
fn init_tui_logging() {
    let Ok(file) = OpenOptions::new().create(true).append(true).open(TUI_LOG_FILE) else {
        return;
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&load_options_from_args(&args.source)?)?;
    let settings = service_settings_from_args(&args.services);
    crate::tui::run(dataset, settings)
}

fn handle_preview(args: PreviewArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&load_options_from_args(&args.source)?)?;

    println!("{}", crate::report::format_dataset_summary(&dataset));
    println!("{}", crate::report::format_table(&dataset.table, args.rows));
    Ok(())
}

fn handle_report(args: ReportArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&load_options_from_args(&args.source)?)?;
    let selections = selections_from_args(&dataset, &args)?;

    let outcome = pipeline::run_analysis(&dataset, &selections)?;
    let view = match &outcome {
        pipeline::AnalysisOutcome::Unavailable { reason } => return Err(AppError::new(3, reason.clone())),
        pipeline::AnalysisOutcome::MissingMeasures => {
            return Err(AppError::new(3, pipeline::MISSING_MEASURES_MESSAGE));
        }
        pipeline::AnalysisOutcome::Ready(view) => view,
    };

    println!(
        "{}",
        crate::report::format_analysis(&outcome, &selections, args.rows)
    );

    if !args.no_plot {
        match &view.chart {
            Some(Chart::Line(chart)) => {
                println!("{}", crate::plot::render_line_chart(chart, args.width, args.height));
            }
            Some(Chart::Bar(chart)) => {
                println!("{}", crate::plot::render_bar_chart(chart, args.width));
            }
            None => {}
        }
    }

    // Optional export.
    if let Some(path) = &args.export {
        crate::io::export::write_table_csv(path, &view.filtered)?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&load_options_from_args(&args.source)?)?;
    let settings = service_settings_from_args(&args.services);

    let ds_column = args
        .ds_column
        .clone()
        .unwrap_or_else(|| dataset.date_column.clone());
    let forecaster = crate::services::forecaster_from_settings(&settings)?;
    let forecast = crate::services::run_forecast(forecaster.as_ref(), &dataset.table, &ds_column, &args.y_column)?;

    println!("{}", crate::report::format_forecast(&forecast, args.rows));
    if !args.no_plot {
        println!(
            "{}",
            crate::plot::render_line_chart(&forecast.to_chart(), args.width, args.height)
        );
    }

    if let Some(path) = &args.export {
        crate::io::export::write_table_csv(path, &forecast.to_table())?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

fn handle_ask(args: AskArgs) -> Result<(), AppError> {
    let dataset = load_dataset(&load_options_from_args(&args.source)?)?;
    let settings = service_settings_from_args(&args.services);

    let client = crate::services::CompletionClient::from_env(&settings.qa, settings.timeout)?;
    let question = args.question.join(" ");
    let exchange = crate::services::ask(&client, &dataset.table, &question, settings.qa.max_context_chars)?;

    println!("Q: {}", exchange.question);
    println!("A: {}", exchange.answer);
    Ok(())
}

/// Resolve the input file (prompting when `-f` is absent) and reading options.
pub fn load_options_from_args(args: &SourceArgs) -> Result<LoadOptions, AppError> {
    let path = match &args.file {
        Some(path) => crate::cli::picker::validate_data_path(path)?,
        None => crate::cli::picker::prompt_for_data_path()?,
    };

    Ok(LoadOptions {
        path,
        sheet: args.sheet.clone(),
        date_column: args.date_column.clone(),
        markers: ColumnMarkers {
            grouping: args.group_markers.clone(),
            amount: args.amount_markers.clone(),
            quantity: args.qty_markers.clone(),
        },
    })
}

pub fn service_settings_from_args(args: &ServiceArgs) -> ServiceSettings {
    ServiceSettings {
        timeout: Duration::from_secs(args.timeout_secs.max(1)),
        forecast_url: args.forecast_url.clone().filter(|u| !u.trim().is_empty()),
        qa: QaSettings {
            base_url: args.qa_base_url.clone(),
            model: args.qa_model.clone(),
            max_tokens: args.max_tokens,
            max_context_chars: args.context_chars,
        },
    }
}

/// Translate report flags into selections, resolving `DIM=VALUE` against the
/// values actually present in the data.
pub fn selections_from_args(dataset: &Dataset, args: &ReportArgs) -> Result<Selections, AppError> {
    let mut selections = Selections {
        report: args.report,
        granularity: args.granularity,
        dimensions: args.dimensions.clone(),
        ..Selections::default()
    };

    if args.start.is_some() || args.end.is_some() {
        let span = date_span(&dataset.frame, &dataset.date_column);
        let start = args.start.or(span.map(|s| s.start));
        let end = args.end.or(span.map(|s| s.end));
        let (Some(start), Some(end)) = (start, end) else {
            return Err(AppError::new(
                2,
                "Both --start and --end are needed when the date column is unusable.",
            ));
        };
        if start > end {
            return Err(AppError::new(2, format!("Start date {start} is after end date {end}.")));
        }
        selections.date_range = Some(DateRange { start, end });
    }

    for raw in &args.selections {
        let (dim, wanted) = raw
            .split_once('=')
            .ok_or_else(|| AppError::new(2, format!("Expected DIM=VALUE, got '{raw}'.")))?;
        let (dim, wanted) = (dim.trim(), wanted.trim());

        if !selections.dimensions.iter().any(|d| d == dim) {
            return Err(AppError::new(
                2,
                format!("`{dim}` is not among the selected dimensions (use -g {dim})."),
            ));
        }

        let options = pipeline::filter_options(dataset, &selections, dim);
        let value = options
            .iter()
            .find(|v| v.to_string() == wanted)
            .cloned()
            .ok_or_else(|| {
                let shown: Vec<String> = options.iter().take(10).map(|v| v.to_string()).collect();
                AppError::new(
                    2,
                    format!("No `{dim}` value '{wanted}'. Available: {}.", shown.join(", ")),
                )
            })?;

        match args.report {
            ReportType::Visual => {
                if selections.visual_filters.insert(dim.to_string(), value).is_some() {
                    return Err(AppError::new(
                        2,
                        format!("Data Visual takes one value per dimension; `{dim}` was given twice."),
                    ));
                }
            }
            ReportType::Comparison => {
                let set = selections.comparison_filters.entry(dim.to_string()).or_default();
                if !set.contains(&value) {
                    set.push(value);
                }
            }
        }
    }

    Ok(selections)
}

/// Rewrite argv so `xplot` defaults to `xplot tui`.
///
/// Rules:
/// - `xplot`                      -> `xplot tui`
/// - `xplot -f sales.xlsx ...`    -> `xplot tui -f sales.xlsx ...`
/// - `xplot --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "preview" | "report" | "forecast" | "ask");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::{Table, Value};
    use crate::io::ingest::build_dataset;

    fn argv(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_invocation_and_flags_default_to_tui() {
        assert_eq!(rewrite_args(argv(&["xplot"])), argv(&["xplot", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["xplot", "-f", "a.xlsx"])),
            argv(&["xplot", "tui", "-f", "a.xlsx"])
        );
        assert_eq!(rewrite_args(argv(&["xplot", "--help"])), argv(&["xplot", "--help"]));
        assert_eq!(
            rewrite_args(argv(&["xplot", "report", "-f", "a.csv"])),
            argv(&["xplot", "report", "-f", "a.csv"])
        );
    }

    fn dataset() -> Dataset {
        let table = Table::from_rows(
            vec!["CDATE".into(), "RegionCd".into(), "StoreCd".into(), "SalesAmt".into()],
            vec![
                vec![20230101.0.into(), "A".into(), 7.0.into(), 1.0.into()],
                vec![20230201.0.into(), "B".into(), 8.0.into(), 2.0.into()],
            ],
        );
        build_dataset(table, "s.csv".into(), None, vec![], "CDATE", &ColumnMarkers::default()).unwrap()
    }

    fn report_args(extra: &[&str]) -> ReportArgs {
        let mut list = vec!["xplot", "report", "-f", "s.csv"];
        list.extend_from_slice(extra);
        match Cli::parse_from(list).command {
            Command::Report(args) => args,
            other => panic!("expected report, got {other:?}"),
        }
    }

    #[test]
    fn selections_resolve_values_by_their_text() {
        let args = report_args(&["-g", "RegionCd,StoreCd", "-s", "RegionCd=A", "-s", "StoreCd=8"]);
        let selections = selections_from_args(&dataset(), &args).unwrap();

        assert_eq!(selections.visual_filters["RegionCd"], Value::from("A"));
        // Numeric codes match their displayed form.
        assert_eq!(selections.visual_filters["StoreCd"], Value::Number(8.0));
    }

    #[test]
    fn comparison_fills_an_open_range_from_the_data() {
        let args = report_args(&[
            "--report", "comparison", "-g", "RegionCd", "-s", "RegionCd=A", "-s", "RegionCd=A", "--end",
            "2023-01-31",
        ]);
        let selections = selections_from_args(&dataset(), &args).unwrap();

        assert_eq!(selections.comparison_filters["RegionCd"], vec![Value::from("A")]);
        let range = selections.date_range.unwrap();
        assert_eq!(range.start, chrono::NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(range.end, chrono::NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
    }

    #[test]
    fn bad_selections_are_input_errors() {
        let ds = dataset();
        for extra in [
            vec!["-g", "RegionCd", "-s", "RegionCd"],
            vec!["-g", "RegionCd", "-s", "StoreCd=7"],
            vec!["-g", "RegionCd", "-s", "RegionCd=Z"],
            vec!["-g", "RegionCd", "-s", "RegionCd=A", "-s", "RegionCd=B"],
            vec!["--start", "2023-03-01", "--end", "2023-01-01"],
            // B only appears after the range, so it is not offered.
            vec!["--report", "comparison", "-g", "RegionCd", "-s", "RegionCd=B", "--end", "2023-01-31"],
        ] {
            let err = selections_from_args(&ds, &report_args(&extra)).unwrap_err();
            assert_eq!(err.exit_code(), 2, "{extra:?}");
        }
    }
}
