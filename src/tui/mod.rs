//! Ratatui-based terminal UI.
//!
//! Two tabs share one `Session`:
//! - "Data Analysis": preview, Data Visual / Comparison charts and the forecast
//! - "Ask AI": questions about the loaded file
//!
//! The controls panel on the left drives the selections; the right side shows
//! whatever the current view derives from them.

use std::collections::BTreeMap;
use std::io;
use std::time::Duration;

use chrono::{NaiveDate, TimeDelta};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use log::{info, warn};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{AnalysisOutcome, MISSING_MEASURES_MESSAGE, effective_date_range};
use crate::app::session::Session;
use crate::chart::{Axis, Chart, Series, padded_bounds, value_bounds};
use crate::domain::{DateRange, ReportType, ServiceSettings};
use crate::error::AppError;
use crate::io::ingest::Dataset;
use crate::services::{CompletionClient, FORECAST_HORIZON_DAYS, forecaster_from_settings};

mod chart_widget;

use chart_widget::{BarChartWidget, LineChartWidget, series_color};

/// Rows of the raw table loaded into the preview pane.
const PREVIEW_ROWS: usize = 500;

/// Start the TUI on an already loaded dataset.
pub fn run(dataset: Dataset, settings: ServiceSettings) -> Result<(), AppError> {
    info!(
        "tui start: {} ({} rows)",
        dataset.display_name(),
        dataset.table.len()
    );
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::new(4, format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(dataset, settings);
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::new(4, format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::new(4, format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Analysis,
    Ask,
}

impl Tab {
    fn next(self) -> Self {
        match self {
            Tab::Analysis => Tab::Ask,
            Tab::Ask => Tab::Analysis,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            Tab::Analysis => "Data Analysis",
            Tab::Ask => "Ask AI",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum View {
    Preview,
    Visual,
    Forecast,
}

impl View {
    fn next(self) -> Self {
        match self {
            View::Preview => View::Visual,
            View::Visual => View::Forecast,
            View::Forecast => View::Preview,
        }
    }

    fn prev(self) -> Self {
        match self {
            View::Preview => View::Forecast,
            View::Visual => View::Preview,
            View::Forecast => View::Visual,
        }
    }

    fn display_name(self) -> &'static str {
        match self {
            View::Preview => "Preview",
            View::Visual => "Data Visual",
            View::Forecast => "Data Forecast",
        }
    }
}

/// One row of the controls panel.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    View,
    Report,
    Granularity,
    StartDate,
    EndDate,
    Group(String),
    Filter(String),
    ForecastDate,
    ForecastValue,
    RunForecast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Editing {
    Start,
    End,
    Question,
}

/// Blocking work deferred until after the next redraw, so the status line
/// can say what is happening first.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    Ask(String),
    Forecast,
}

struct App {
    session: Session,
    settings: ServiceSettings,
    tab: Tab,
    view: View,
    selected_field: usize,
    editing: Option<Editing>,
    input: String,
    /// Comparison mode: highlighted option per dimension.
    filter_cursor: BTreeMap<String, usize>,
    /// Column indexes for the forecast pickers.
    forecast_date: usize,
    forecast_value: usize,
    preview_scroll: u16,
    pending: Option<Pending>,
    qa_client: Option<CompletionClient>,
    status: String,
}

impl App {
    fn new(dataset: Dataset, settings: ServiceSettings) -> Self {
        let columns = dataset.table.columns();
        let forecast_date = dataset.table.column_index(&dataset.date_column).unwrap_or(0);
        let forecast_value = dataset
            .roles
            .measures(columns)
            .first()
            .and_then(|m| dataset.table.column_index(m))
            .unwrap_or(0);
        let status = dataset.date_message().unwrap_or_else(|| {
            format!("Loaded {} ({} rows).", dataset.display_name(), dataset.table.len())
        });

        Self {
            session: Session::new(dataset),
            settings,
            tab: Tab::Analysis,
            view: View::Preview,
            selected_field: 0,
            editing: None,
            input: String::new(),
            filter_cursor: BTreeMap::new(),
            forecast_date,
            forecast_value,
            preview_scroll: 0,
            pending: None,
            qa_client: None,
            status,
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::new(4, format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if let Some(pending) = self.pending.take() {
                self.run_pending(pending);
                needs_redraw = true;
                continue;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::new(4, format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::new(4, format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code)? {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<bool, AppError> {
        if self.editing.is_some() {
            self.handle_edit(code);
            return Ok(false);
        }

        match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => {
                self.tab = self.tab.next();
                self.status = format!("tab: {}", self.tab.display_name());
                return Ok(false);
            }
            _ => {}
        }

        match self.tab {
            Tab::Analysis => self.handle_analysis_key(code),
            Tab::Ask => {
                if matches!(code, KeyCode::Enter | KeyCode::Char('i')) {
                    self.editing = Some(Editing::Question);
                    self.input.clear();
                    self.status = "Type a question. Enter to ask, Esc to cancel.".to_string();
                }
            }
        }

        Ok(false)
    }

    fn handle_analysis_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Up => {
                self.selected_field = self.selected_field.saturating_sub(1);
            }
            KeyCode::Down => {
                if self.selected_field + 1 < self.fields().len() {
                    self.selected_field += 1;
                }
            }
            KeyCode::Left => self.adjust_field(-1),
            KeyCode::Right => self.adjust_field(1),
            KeyCode::Enter | KeyCode::Char(' ') => self.activate_field(),
            KeyCode::PageDown => {
                self.preview_scroll = self.preview_scroll.saturating_add(10);
            }
            KeyCode::PageUp => {
                self.preview_scroll = self.preview_scroll.saturating_sub(10);
            }
            _ => {}
        }
    }

    fn handle_edit(&mut self, code: KeyCode) {
        let Some(target) = self.editing else {
            return;
        };
        match code {
            KeyCode::Esc => {
                self.editing = None;
                self.input.clear();
                self.status = "Edit canceled.".to_string();
            }
            KeyCode::Enter => self.apply_input(),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Char(c) => {
                let accepted = match target {
                    Editing::Question => true,
                    Editing::Start | Editing::End => c.is_ascii_digit() || c == '-',
                };
                if accepted {
                    self.input.push(c);
                }
            }
            _ => {}
        }
    }

    /// Controls shown for the current view and selections.
    fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::View];
        match self.view {
            View::Preview => {}
            View::Visual => {
                let selections = self.session.selections();
                fields.push(Field::Report);
                match selections.report {
                    ReportType::Visual => fields.push(Field::Granularity),
                    ReportType::Comparison => {
                        fields.push(Field::StartDate);
                        fields.push(Field::EndDate);
                    }
                }
                fields.extend(
                    self.session
                        .dataset()
                        .roles
                        .grouping
                        .iter()
                        .map(|c| Field::Group(c.clone())),
                );
                fields.extend(selections.dimensions.iter().map(|d| Field::Filter(d.clone())));
            }
            View::Forecast => {
                fields.push(Field::ForecastDate);
                fields.push(Field::ForecastValue);
                fields.push(Field::RunForecast);
            }
        }
        fields
    }

    fn current_field(&self) -> Option<Field> {
        self.fields().get(self.selected_field).cloned()
    }

    fn clamp_selection(&mut self) {
        let len = self.fields().len();
        self.selected_field = self.selected_field.min(len.saturating_sub(1));
    }

    fn adjust_field(&mut self, delta: i32) {
        let Some(field) = self.current_field() else {
            return;
        };
        let ncols = self.session.dataset().table.columns().len();

        match field {
            Field::View => {
                self.view = if delta >= 0 { self.view.next() } else { self.view.prev() };
                self.clamp_selection();
                self.status = format!("view: {}", self.view.display_name());
            }
            Field::Report => {
                let report = self.session.selections().report.next();
                self.session.set_report(report);
                self.clamp_selection();
                self.status = format!("report: {}", report.display_name());
            }
            Field::Granularity => {
                let current = self.session.selections().granularity;
                let next = if delta >= 0 { current.next() } else { current.prev() };
                self.session.set_granularity(next);
                self.status = format!("granularity: {}", next.display_name());
            }
            Field::StartDate | Field::EndDate => self.shift_date(&field, delta),
            Field::Filter(dim) => self.move_filter(&dim, delta),
            Field::ForecastDate => {
                self.forecast_date = cycle(self.forecast_date, delta, ncols);
            }
            Field::ForecastValue => {
                self.forecast_value = cycle(self.forecast_value, delta, ncols);
            }
            Field::Group(_) | Field::RunForecast => {}
        }
    }

    fn activate_field(&mut self) {
        let Some(field) = self.current_field() else {
            return;
        };

        match field {
            Field::View | Field::Report | Field::Granularity => self.adjust_field(1),
            Field::StartDate | Field::EndDate => {
                let range = effective_date_range(self.session.dataset(), self.session.selections());
                let Some(range) = range else {
                    self.status = "No usable dates in this file.".to_string();
                    return;
                };
                let (target, current) = if field == Field::StartDate {
                    (Editing::Start, range.start)
                } else {
                    (Editing::End, range.end)
                };
                self.input = current.to_string();
                self.editing = Some(target);
                self.status = "Editing date (YYYY-MM-DD, empty = full span). Enter to apply, Esc to cancel.".to_string();
            }
            Field::Group(column) => {
                self.session.toggle_dimension(&column);
                self.filter_cursor.remove(&column);
                let dims = &self.session.selections().dimensions;
                self.status = if dims.is_empty() {
                    "dimensions: none".to_string()
                } else {
                    format!("dimensions: {}", dims.join(", "))
                };
            }
            Field::Filter(dim) => match self.session.selections().report {
                ReportType::Visual => {
                    self.session.set_visual_filter(&dim, None);
                    self.status = format!("{dim}: (all)");
                }
                ReportType::Comparison => {
                    let options = self.session.filter_options(&dim);
                    let cursor = self.filter_cursor.get(&dim).copied().unwrap_or(0);
                    if let Some(value) = options.get(cursor).cloned() {
                        self.session.toggle_comparison_value(&dim, value);
                    }
                }
            },
            Field::ForecastDate | Field::ForecastValue | Field::RunForecast => {
                self.pending = Some(Pending::Forecast);
                self.status = "Running forecast...".to_string();
            }
        }
    }

    fn shift_date(&mut self, field: &Field, delta: i32) {
        let range = effective_date_range(self.session.dataset(), self.session.selections());
        let Some(mut range) = range else {
            self.status = "No usable dates in this file.".to_string();
            return;
        };
        let step = TimeDelta::days(delta.into());
        let bound = if *field == Field::StartDate { &mut range.start } else { &mut range.end };
        if let Some(moved) = bound.checked_add_signed(step) {
            *bound = moved;
        }
        self.apply_range(range);
    }

    fn apply_range(&mut self, range: DateRange) {
        match self.session.set_date_range(Some(range)) {
            Ok(()) => self.status = format!("range: {} to {}", range.start, range.end),
            Err(err) => self.status = err.to_string(),
        }
    }

    fn move_filter(&mut self, dim: &str, delta: i32) {
        let options = self.session.filter_options(dim);
        match self.session.selections().report {
            ReportType::Visual => {
                // Position 0 is "(all)".
                let current = self
                    .session
                    .selections()
                    .visual_filters
                    .get(dim)
                    .and_then(|v| options.iter().position(|o| o == v))
                    .map_or(0, |p| p + 1);
                let next = cycle(current, delta, options.len() + 1);
                let value = next.checked_sub(1).and_then(|i| options.get(i)).cloned();
                self.status = format!(
                    "{dim}: {}",
                    value.as_ref().map_or("(all)".to_string(), |v| v.to_string())
                );
                self.session.set_visual_filter(dim, value);
            }
            ReportType::Comparison => {
                if options.is_empty() {
                    self.status = format!("No `{dim}` values in the date range.");
                    return;
                }
                let current = self.filter_cursor.get(dim).copied().unwrap_or(0);
                self.filter_cursor
                    .insert(dim.to_string(), cycle(current, delta, options.len()));
            }
        }
    }

    fn apply_input(&mut self) {
        let Some(target) = self.editing.take() else {
            return;
        };
        let text = std::mem::take(&mut self.input);
        let text = text.trim();

        match target {
            Editing::Question => {
                if text.is_empty() {
                    self.status = "Please enter a question.".to_string();
                    return;
                }
                self.pending = Some(Pending::Ask(text.to_string()));
                self.status = "Asking...".to_string();
            }
            Editing::Start | Editing::End => {
                if text.is_empty() {
                    if let Err(err) = self.session.set_date_range(None) {
                        self.status = err.to_string();
                    } else {
                        self.status = "Date range reset to the full span.".to_string();
                    }
                    return;
                }
                let date = match NaiveDate::parse_from_str(text, "%Y-%m-%d") {
                    Ok(date) => date,
                    Err(e) => {
                        self.status = format!("Invalid date '{text}': {e}");
                        return;
                    }
                };
                let range = effective_date_range(self.session.dataset(), self.session.selections());
                let Some(mut range) = range else {
                    self.status = "No usable dates in this file.".to_string();
                    return;
                };
                if target == Editing::Start {
                    range.start = date;
                } else {
                    range.end = date;
                }
                self.apply_range(range);
            }
        }
    }

    fn run_pending(&mut self, pending: Pending) {
        let result = match pending {
            Pending::Ask(question) => self.ask(&question),
            Pending::Forecast => self.forecast(),
        };
        if let Err(err) = result {
            warn!("{err}");
            self.status = err.to_string();
        }
    }

    fn ask(&mut self, question: &str) -> Result<(), AppError> {
        if self.qa_client.is_none() {
            self.qa_client = Some(CompletionClient::from_env(&self.settings.qa, self.settings.timeout)?);
        }
        let Some(client) = self.qa_client.as_ref() else {
            return Ok(());
        };
        self.session
            .ask(client, question, self.settings.qa.max_context_chars)?;
        self.status = "Answer received.".to_string();
        Ok(())
    }

    fn forecast(&mut self) -> Result<(), AppError> {
        let columns = self.session.dataset().table.columns();
        let (Some(ds), Some(y)) = (
            columns.get(self.forecast_date).cloned(),
            columns.get(self.forecast_value).cloned(),
        ) else {
            return Err(AppError::new(2, "The file has no columns to forecast."));
        };

        let forecaster = forecaster_from_settings(&self.settings)?;
        let table = self.session.run_forecast(forecaster.as_ref(), &ds, &y)?;
        self.status = format!(
            "Forecast of {y} ({} model): {FORECAST_HORIZON_DAYS} days past {} points.",
            table.model, table.history_len
        );
        info!("{}", self.status);
        Ok(())
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        // Only the chart view needs the analysis. Refresh the memo first,
        // then draw from a shared borrow of it.
        let wants_chart = self.tab == Tab::Analysis && self.view == View::Visual;
        let failure = if wants_chart {
            self.session.analysis().err().map(|e| e.to_string())
        } else {
            None
        };
        let analysis = wants_chart.then(|| match &failure {
            Some(msg) => Err(msg.as_str()),
            None => self.session.cached_analysis().ok_or("Analysis is not available."),
        });

        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(5), Constraint::Min(0), Constraint::Length(3)])
            .split(size);

        self.draw_header(frame, chunks[0]);
        match self.tab {
            Tab::Analysis => self.draw_analysis(frame, chunks[1], analysis),
            Tab::Ask => self.draw_ask(frame, chunks[1]),
        }
        self.draw_footer(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let dataset = self.session.dataset();
        let mut lines: Vec<Line> = Vec::new();
        lines.push(Line::from(vec![
            Span::styled("xplot", Style::default().fg(Color::Cyan)),
            Span::raw(" | Excel Plotter with AI"),
        ]));

        let date = dataset
            .date_message()
            .unwrap_or_else(|| format!("{} ok", dataset.date_column));
        lines.push(Line::from(Span::styled(
            format!(
                "file: {} | rows: {} | columns: {} | {date}",
                dataset.display_name(),
                dataset.table.len(),
                dataset.table.columns().len()
            ),
            Style::default().fg(Color::Gray),
        )));

        let mut tabs = Vec::new();
        for tab in [Tab::Analysis, Tab::Ask] {
            let style = if tab == self.tab {
                Style::default().fg(Color::Black).bg(Color::Cyan)
            } else {
                Style::default().fg(Color::Gray)
            };
            tabs.push(Span::styled(format!(" {} ", tab.display_name()), style));
            tabs.push(Span::raw(" "));
        }
        lines.push(Line::from(tabs));

        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_analysis(
        &self,
        frame: &mut ratatui::Frame<'_>,
        area: Rect,
        analysis: Option<Result<&AnalysisOutcome, &str>>,
    ) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(36), Constraint::Min(0)])
            .split(area);

        self.draw_controls(frame, chunks[0]);
        match (self.view, analysis) {
            (View::Preview, _) => self.draw_preview(frame, chunks[1]),
            (View::Visual, Some(analysis)) => self.draw_visual(frame, chunks[1], analysis),
            (View::Visual, None) => {}
            (View::Forecast, _) => self.draw_forecast(frame, chunks[1]),
        }
    }

    fn draw_controls(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .fields()
            .iter()
            .map(|f| ListItem::new(self.field_label(f)))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Controls").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected_field));
        frame.render_stateful_widget(list, area, &mut state);

        if matches!(self.editing, Some(Editing::Start | Editing::End)) {
            let hint = Paragraph::new(format!("Date: {}_", self.input))
                .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
            let rect = Rect {
                x: area.x + 2,
                y: area.y + area.height.saturating_sub(2),
                width: area.width.saturating_sub(4),
                height: 1,
            };
            frame.render_widget(hint, rect);
        }
    }

    fn field_label(&self, field: &Field) -> String {
        let selections = self.session.selections();
        let columns = self.session.dataset().table.columns();
        let column = |idx: usize| columns.get(idx).map_or("-", |c| c.as_str());
        let range = effective_date_range(self.session.dataset(), selections);

        match field {
            Field::View => format!("View: {}", self.view.display_name()),
            Field::Report => format!("Report: {}", selections.report.display_name()),
            Field::Granularity => format!("Granularity: {}", selections.granularity.display_name()),
            Field::StartDate => format!("Start: {}", range.map_or("-".to_string(), |r| r.start.to_string())),
            Field::EndDate => format!("End: {}", range.map_or("-".to_string(), |r| r.end.to_string())),
            Field::Group(c) => {
                let mark = if selections.dimensions.contains(c) { "x" } else { " " };
                format!("[{mark}] {c}")
            }
            Field::Filter(dim) => match selections.report {
                ReportType::Visual => {
                    let value = selections
                        .visual_filters
                        .get(dim)
                        .map_or("(all)".to_string(), |v| v.to_string());
                    format!("  {dim}: < {value} >")
                }
                ReportType::Comparison => {
                    let options = self.session.filter_options(dim);
                    let chosen = selections.comparison_filters.get(dim);
                    let cursor = self.filter_cursor.get(dim).copied().unwrap_or(0);
                    let Some(value) = options.get(cursor) else {
                        return format!("  {dim}: (no values)");
                    };
                    let mark = if chosen.is_some_and(|set| set.contains(value)) { "x" } else { " " };
                    format!(
                        "  {dim}: < {value} > [{mark}] ({} chosen)",
                        chosen.map_or(0, |set| set.len())
                    )
                }
            },
            Field::ForecastDate => format!("Date column: {}", column(self.forecast_date)),
            Field::ForecastValue => format!("Value column: {}", column(self.forecast_value)),
            Field::RunForecast => "Run forecast (Enter)".to_string(),
        }
    }

    fn draw_preview(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let dataset = self.session.dataset();
        let mut lines: Vec<Line> = crate::report::format_dataset_summary(dataset)
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        lines.push(Line::from(""));
        lines.extend(
            crate::report::table_lines(&dataset.table.head(PREVIEW_ROWS))
                .into_iter()
                .map(Line::from),
        );

        let p = Paragraph::new(Text::from(lines))
            .scroll((self.preview_scroll, 0))
            .block(Block::default().title("Preview").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_visual(&self, frame: &mut ratatui::Frame<'_>, area: Rect, analysis: Result<&AnalysisOutcome, &str>) {
        let message = match analysis {
            Err(msg) => Some(msg.to_string()),
            Ok(AnalysisOutcome::Unavailable { reason }) => Some(reason.clone()),
            Ok(AnalysisOutcome::MissingMeasures) => Some(MISSING_MEASURES_MESSAGE.to_string()),
            Ok(AnalysisOutcome::Ready(_)) => None,
        };
        if let Some(message) = message {
            let p = Paragraph::new(message)
                .style(Style::default().fg(Color::Red))
                .block(Block::default().title("Data Visual").borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        }
        let Ok(AnalysisOutcome::Ready(view)) = analysis else {
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(12)])
            .split(area);

        match &view.chart {
            Some(chart) => draw_chart(frame, chunks[0], chart),
            None => {
                let notice = view.notice.clone().unwrap_or_default();
                let p = Paragraph::new(notice)
                    .style(Style::default().fg(Color::Yellow))
                    .block(Block::default().title("Chart").borders(Borders::ALL));
                frame.render_widget(p, chunks[0]);
            }
        }

        let mut title = format!("Aggregated ({} rows)", view.aggregated.len());
        if !view.dropped.is_empty() {
            title.push_str(&format!(" | not summed: {}", view.dropped.join(", ")));
        }
        let lines: Vec<Line> = crate::report::table_lines(&view.aggregated)
            .into_iter()
            .map(Line::from)
            .collect();
        let p = Paragraph::new(Text::from(lines)).block(Block::default().title(title).borders(Borders::ALL));
        frame.render_widget(p, chunks[1]);
    }

    fn draw_forecast(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let Some(forecast) = self.session.forecast() else {
            let p = Paragraph::new("Pick the date and value columns, then Enter on \"Run forecast\".")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().title("Data Forecast").borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(10)])
            .split(area);

        draw_chart(frame, chunks[0], &Chart::Line(forecast.to_chart()));

        let lines: Vec<Line> = crate::report::format_forecast(forecast, 3)
            .lines()
            .map(|l| Line::from(l.to_string()))
            .collect();
        let p = Paragraph::new(Text::from(lines)).block(
            Block::default()
                .title(format!("{} over {}", forecast.value_column, forecast.date_column))
                .borders(Borders::ALL),
        );
        frame.render_widget(p, chunks[1]);
    }

    fn draw_ask(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(area);

        let block = Block::default().title("Conversation").borders(Borders::ALL);
        let inner = block.inner(chunks[0]);
        frame.render_widget(block, chunks[0]);

        let conversation = self.session.conversation();
        let width = inner.width.max(1) as usize;
        let mut lines: Vec<Line> = Vec::new();
        if conversation.is_empty() {
            lines.push(Line::from(Span::styled(
                format!(
                    "Press Enter to ask a question about {}.",
                    self.session.dataset().display_name()
                ),
                Style::default().fg(Color::Gray),
            )));
        }
        for exchange in conversation.exchanges() {
            for l in wrap_text(&format!("Q: {}", exchange.question), width) {
                lines.push(Line::from(Span::styled(
                    l,
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                )));
            }
            lines.extend(wrap_text(&format!("A: {}", exchange.answer), width).into_iter().map(Line::from));
            lines.push(Line::from(""));
        }

        // Keep the newest exchange in view.
        let overflow = lines.len().saturating_sub(inner.height as usize);
        let scroll = u16::try_from(overflow).unwrap_or(u16::MAX);
        frame.render_widget(Paragraph::new(Text::from(lines)).scroll((scroll, 0)), inner);

        let input = if self.editing == Some(Editing::Question) {
            format!("{}_", self.input)
        } else {
            String::new()
        };
        let p = Paragraph::new(input).block(Block::default().title("Question").borders(Borders::ALL));
        frame.render_widget(p, chunks[1]);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = match (self.editing, self.tab) {
            (Some(_), _) => "Enter apply  Esc cancel",
            (None, Tab::Analysis) => {
                "Tab switch  ↑/↓ select  ←/→ adjust  Enter/Space toggle/edit/run  PgUp/PgDn scroll  q quit"
            }
            (None, Tab::Ask) => "Tab switch  Enter ask  q quit",
        };
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Step `current` by `delta` within `0..len`, wrapping around.
fn cycle(current: usize, delta: i32, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as i64 + i64::from(delta)).rem_euclid(len as i64) as usize
}

/// Category axis range. Bars are centered on integer positions.
fn category_bounds(n: usize, bars: bool) -> [f64; 2] {
    if bars || n <= 1 {
        [-0.5, n.max(1) as f64 - 0.5]
    } else {
        [0.0, n as f64 - 1.0]
    }
}

fn axis_bounds<'a>(series: impl Iterator<Item = &'a Series>, include_zero: bool) -> [f64; 2] {
    let (lo, hi) = value_bounds(series).unwrap_or((0.0, 1.0));
    let (lo, hi) = if include_zero { (lo.min(0.0), hi.max(0.0)) } else { (lo, hi) };
    let (lo, hi) = padded_bounds((lo, hi));
    [lo, hi]
}

/// Evenly spaced category indexes to label (always including both ends).
fn category_ticks(n: usize, max: usize) -> Vec<usize> {
    if n <= max {
        return (0..n).collect();
    }
    let max = max.max(2);
    (0..max).map(|i| i * (n - 1) / (max - 1)).collect()
}

/// Compact tick label: `25.0k`, `3.2M`.
fn fmt_tick(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{:.1}B", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", v / 1e6)
    } else if abs >= 1e4 {
        format!("{:.1}k", v / 1e3)
    } else if v.fract() == 0.0 {
        format!("{v:.0}")
    } else {
        format!("{v:.1}")
    }
}

/// Greedy word wrap on character counts; overlong words are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut out = Vec::new();
    for paragraph in text.split('\n') {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    out.push(std::mem::take(&mut line));
                }
                out.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = if line.is_empty() { word.chars().count() } else { line.chars().count() + 1 + word.chars().count() };
            if needed > width && !line.is_empty() {
                out.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        out.push(line);
    }
    out
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect, right_axis: bool) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: if right_axis { 9 } else { 2 },
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10 || inner.height <= insets.top + insets.bottom + 5 {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

/// Everything the tick/label overlay needs.
struct AxisLabels<'a> {
    categories: &'a [String],
    x_bounds: [f64; 2],
    left: [f64; 2],
    right: Option<[f64; 2]>,
    x_title: &'a str,
    left_title: &'a str,
    right_title: &'a str,
}

/// Bordered chart with a legend line and tick labels.
fn draw_chart(frame: &mut ratatui::Frame<'_>, area: Rect, chart: &Chart) {
    let block = Block::default().title(chart.title().to_string()).borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    frame.render_widget(Clear, inner);

    let (series, labels) = match chart {
        Chart::Line(c) => {
            let right = c
                .has_right_axis()
                .then(|| axis_bounds(c.series.iter().filter(|s| s.axis == Axis::Right), false));
            let labels = AxisLabels {
                categories: &c.categories,
                x_bounds: category_bounds(c.categories.len(), false),
                left: axis_bounds(c.series.iter().filter(|s| s.axis == Axis::Left), false),
                right,
                x_title: &c.x_title,
                left_title: &c.left_title,
                right_title: &c.right_title,
            };
            (&c.series, labels)
        }
        Chart::Bar(c) => {
            let labels = AxisLabels {
                categories: &c.categories,
                x_bounds: category_bounds(c.categories.len(), true),
                left: axis_bounds(c.series.iter(), true),
                right: None,
                x_title: &c.x_title,
                left_title: &c.y_title,
                right_title: "",
            };
            (&c.series, labels)
        }
    };

    // Legend on the last row.
    let legend_rect = Rect {
        x: inner.x,
        y: inner.y + inner.height.saturating_sub(1),
        width: inner.width,
        height: inner.height.min(1),
    };
    let mut legend = Vec::new();
    for (idx, s) in series.iter().enumerate() {
        let suffix = if s.axis == Axis::Right { " (right)" } else { "" };
        legend.push(Span::styled(format!("■ {}{suffix}  ", s.name), Style::default().fg(series_color(idx))));
    }
    frame.render_widget(Paragraph::new(Line::from(legend)), legend_rect);

    let plot_area = Rect {
        height: inner.height.saturating_sub(1),
        ..inner
    };
    let (chart_rect, insets) = chart_layout(plot_area, labels.right.is_some());
    match chart {
        Chart::Line(c) => frame.render_widget(
            LineChartWidget {
                chart: c,
                x_bounds: labels.x_bounds,
                left_bounds: labels.left,
                right_bounds: labels.right,
            },
            chart_rect,
        ),
        Chart::Bar(c) => frame.render_widget(
            BarChartWidget {
                chart: c,
                x_bounds: labels.x_bounds,
                y_bounds: labels.left,
            },
            chart_rect,
        ),
    }
    if let Some(insets) = insets {
        draw_axis_ticks(frame, plot_area, chart_rect, insets, &labels);
    }
}

fn draw_axis_ticks(frame: &mut ratatui::Frame<'_>, inner: Rect, chart: Rect, insets: AxisInsets, labels: &AxisLabels<'_>) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);
    let [x0, x1] = labels.x_bounds;

    // Category labels under the plot.
    let max_labels = (chart.width / 12).max(2) as usize;
    for idx in category_ticks(labels.categories.len(), max_labels) {
        let u = (idx as f64 - x0) / (x1 - x0);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label: String = labels.categories[idx].chars().take(11).collect();
        let label_len = label.chars().count() as u16;
        let start = x
            .saturating_sub(label_len / 2)
            .min((chart.x + chart.width).saturating_sub(label_len));
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let y_ticks = |bounds: [f64; 2]| {
        (0..ticks).map(move |i| {
            let u = i as f64 / (ticks as f64 - 1.0);
            let value = bounds[0] + u * (bounds[1] - bounds[0]);
            let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
            (fmt_tick(value), y)
        })
    };

    for (label, y) in y_ticks(labels.left) {
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    if let Some(right) = labels.right {
        for (label, y) in y_ticks(right) {
            let label_len = (label.len() as u16).min(insets.right.saturating_sub(1));
            frame.render_widget(
                Paragraph::new(label).style(style),
                Rect {
                    x: chart.x + chart.width + 1,
                    y,
                    width: label_len,
                    height: 1,
                },
            );
        }
        let right_title = Paragraph::new(labels.right_title)
            .alignment(Alignment::Right)
            .style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
        frame.render_widget(
            right_title,
            Rect {
                x: chart.x + chart.width,
                y: inner.y,
                width: insets.right,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new(labels.x_title)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }

    let y_label =
        Paragraph::new(labels.left_title).style(Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD));
    let y_rect = Rect {
        x: inner.x,
        y: inner.y,
        width: insets.left.saturating_sub(1),
        height: 1,
    };
    frame.render_widget(y_label, y_rect);
}
