//! Command-line parsing for the Excel plotter.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the analysis code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::domain::{DEFAULT_DATE_COLUMN, Granularity, ReportType};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "xplot", version, about = "Excel Plotter with AI: explore, chart, forecast and ask")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive TUI (default).
    ///
    /// This uses the same underlying pipeline as `xplot report`, but renders
    /// results in a terminal UI using Ratatui.
    Tui(TuiArgs),
    /// Print a dataset summary and the first rows.
    Preview(PreviewArgs),
    /// Aggregate, filter and chart the data (Data Visual or Comparison).
    Report(ReportArgs),
    /// Forecast one column 365 days past its last date.
    Forecast(ForecastArgs),
    /// Ask a question about the data.
    Ask(AskArgs),
}

/// Which file to load and how to read it.
#[derive(Debug, Args, Clone)]
pub struct SourceArgs {
    /// Workbook (.xlsx/.xlsm/.xls/.xlsb/.ods) or .csv file. Prompts when omitted.
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub file: Option<PathBuf>,

    /// Sheet to read (default: first sheet).
    #[arg(long)]
    pub sheet: Option<String>,

    /// Required date column, in YYYYMMDD form.
    #[arg(long, default_value = DEFAULT_DATE_COLUMN)]
    pub date_column: String,

    /// Substrings marking grouping columns (comma separated).
    #[arg(long = "group-marker", value_delimiter = ',', default_values_t = ["Cd".to_string(), "Logistic".to_string(), "Cn".to_string()])]
    pub group_markers: Vec<String>,

    /// Substrings marking amount measures (left axis).
    #[arg(long = "amount-marker", value_delimiter = ',', default_values_t = ["Amt".to_string()])]
    pub amount_markers: Vec<String>,

    /// Substrings marking quantity measures (right axis).
    #[arg(long = "qty-marker", value_delimiter = ',', default_values_t = ["Qty".to_string()])]
    pub qty_markers: Vec<String>,
}

/// Settings for the forecast model and the completion API.
#[derive(Debug, Args, Clone)]
pub struct ServiceArgs {
    /// Per-request timeout (seconds) for external calls; one retry on failure.
    #[arg(long, env = "XPLOT_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Remote forecast endpoint. The built-in additive model is used when unset.
    #[arg(long, env = "XPLOT_FORECAST_URL")]
    pub forecast_url: Option<String>,

    /// Base URL of the OpenAI-compatible API.
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub qa_base_url: String,

    /// Completion model.
    #[arg(long, env = "XPLOT_QA_MODEL", default_value = "gpt-3.5-turbo-instruct")]
    pub qa_model: String,

    /// Output-length budget for answers.
    #[arg(long, default_value_t = 150)]
    pub max_tokens: u32,

    /// Upper bound on the dataset text sent with a question.
    #[arg(long, default_value_t = 12_000)]
    pub context_chars: usize,
}

#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub services: ServiceArgs,
}

#[derive(Debug, Args, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Rows to show.
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Report type.
    #[arg(long, value_enum, default_value_t = ReportType::Visual)]
    pub report: ReportType,

    /// Date granularity (Data Visual).
    #[arg(long = "by", value_enum, default_value_t = Granularity::Day)]
    pub granularity: Granularity,

    /// Grouping dimensions, in order (comma separated or repeated).
    #[arg(short = 'g', long = "group", value_delimiter = ',')]
    pub dimensions: Vec<String>,

    /// Filter value as DIM=VALUE. Repeat for several values (Comparison) or
    /// several dimensions.
    #[arg(short = 's', long = "select", value_name = "DIM=VALUE")]
    pub selections: Vec<String>,

    /// First date (YYYY-MM-DD, inclusive) for Comparison.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last date (YYYY-MM-DD, inclusive) for Comparison.
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Rows of the aggregated table to print.
    #[arg(long, default_value_t = 30)]
    pub rows: usize,

    /// Disable the terminal chart.
    #[arg(long)]
    pub no_plot: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Chart height (rows).
    #[arg(long, default_value_t = 25)]
    pub height: usize,

    /// Export the filtered table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub services: ServiceArgs,

    /// Column holding the dates (default: the date column).
    #[arg(long = "ds")]
    pub ds_column: Option<String>,

    /// Column to forecast.
    #[arg(long = "y")]
    pub y_column: String,

    /// Rows shown from each end of the forecast table.
    #[arg(long, default_value_t = 5)]
    pub rows: usize,

    /// Disable the terminal chart.
    #[arg(long)]
    pub no_plot: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Chart height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the full forecast table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub services: ServiceArgs,

    /// The question.
    #[arg(required = true, num_args = 1.., trailing_var_arg = true)]
    pub question: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn report_flags_parse() {
        let cli = Cli::parse_from([
            "xplot", "report", "-f", "sales.xlsx", "--report", "comparison", "-g", "RegionCd,StoreCd", "-s",
            "RegionCd=A", "-s", "RegionCd=B", "--start", "2023-01-01",
        ]);
        let Command::Report(args) = cli.command else {
            panic!("expected report");
        };
        assert_eq!(args.report, ReportType::Comparison);
        assert_eq!(args.dimensions, vec!["RegionCd", "StoreCd"]);
        assert_eq!(args.selections, vec!["RegionCd=A", "RegionCd=B"]);
        assert_eq!(args.start, NaiveDate::from_ymd_opt(2023, 1, 1));
        assert_eq!(args.source.date_column, "CDATE");
        assert_eq!(args.source.group_markers, vec!["Cd", "Logistic", "Cn"]);
    }

    #[test]
    fn ask_collects_the_question_words() {
        let cli = Cli::parse_from(["xplot", "ask", "-f", "s.csv", "which", "region", "sold", "most?"]);
        let Command::Ask(args) = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(args.question.join(" "), "which region sold most?");
        assert_eq!(args.services.max_tokens, 150);
    }
}
