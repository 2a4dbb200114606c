// services/payments-dash/src/main.rs
//
// Terminal dashboard for payment records
// Filterable, sortable, virtualized table plus a status chart
//
// Run with: cargo run --bin payments-dash -- --demo

use std::fs::OpenOptions;
use std::io::stdout;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use payments_dash::aggregate::format_number;
use payments_dash::api::{Connection, PaymentsClient};
use payments_dash::mock::MockBackend;
use payments_dash::table::{badge_class, cell_text, BadgeClass, Column, SortDirection};
use payments_dash::{DashboardState, FilterLocation, PaymentsBackend};
use svckit::config::{load_config, DashboardConfig};

#[derive(Parser, Debug)]
#[command(name = "payments-dash")]
#[command(about = "Terminal dashboard for filtering and charting payment records")]
#[command(version = "0.1.0")]
struct Args {
    /// Serve generated payments in-process instead of calling the API
    #[arg(long, short)]
    demo: bool,

    /// Base URL of the payments API (overrides config)
    #[arg(long)]
    api_url: Option<String>,

    /// YAML configuration file
    #[arg(long, short)]
    config: Option<String>,

    /// Shared location to restore, e.g. "?search=ali&status=failed"
    #[arg(long, short, default_value = "")]
    location: String,

    /// UI refresh interval in milliseconds
    #[arg(long, default_value = "50")]
    refresh_ms: u64,

    /// Where tracing output goes (the terminal belongs to the UI)
    #[arg(long)]
    log_file: Option<String>,

    /// Number of generated payments in demo mode
    #[arg(long, default_value = "5000")]
    demo_rows: usize,
}

// Color palette: Slate, White, Blue
mod colors {
    use ratatui::style::Color;

    pub const WHITE: Color = Color::Rgb(248, 250, 252);
    pub const SLATE: Color = Color::Rgb(100, 116, 139);
    pub const SLATE_LIGHT: Color = Color::Rgb(203, 213, 225);
    pub const BLUE: Color = Color::Rgb(59, 130, 246);
    pub const INK: Color = Color::Rgb(15, 23, 42);
    pub const BG_DARK: Color = Color::Rgb(2, 6, 23);
    pub const BG_PANEL: Color = Color::Rgb(15, 23, 42);
    pub const GREEN: Color = Color::Rgb(21, 128, 61);
    pub const GREEN_BG: Color = Color::Rgb(220, 252, 231);
    pub const RED: Color = Color::Rgb(185, 28, 28);
    pub const RED_BG: Color = Color::Rgb(254, 226, 226);
    pub const SLATE_BG: Color = Color::Rgb(241, 245, 249);
}

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// What the draw functions need besides the dashboard state.
struct UiContext<'a> {
    demo_mode: bool,
    client: Option<&'a PaymentsClient>,
    endpoint: &'a str,
    frame_no: u64,
}

impl UiContext<'_> {
    fn spinner(&self) -> &'static str {
        SPINNER[(self.frame_no as usize / 2) % SPINNER.len()]
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("loading configuration")?;
    if let Some(url) = &args.api_url {
        config.api.endpoint = url.clone();
    }
    if let Some(path) = &args.log_file {
        config.observability.log_file = path.clone();
    }
    init_tracing(&config)?;

    let location = FilterLocation::parse(&args.location).context("parsing --location")?;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    // Run app
    let result = run_app(&mut terminal, &args, &config, location);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    // Print the final location so the view can be shared or restored
    let descriptor = result?;
    println!("{}", descriptor);
    Ok(())
}

fn init_tracing(config: &DashboardConfig) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.observability.log_file)
        .with_context(|| format!("opening log file {}", config.observability.log_file))?;

    let level = &config.observability.log_level;
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("payments_dash={level},svckit={level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    args: &Args,
    config: &DashboardConfig,
    location: FilterLocation,
) -> Result<String> {
    let client = if args.demo {
        None
    } else {
        Some(Arc::new(PaymentsClient::new(&config.api.endpoint, config.api.timeout())?))
    };
    let backend: Arc<dyn PaymentsBackend> = match &client {
        Some(client) => Arc::clone(client) as Arc<dyn PaymentsBackend>,
        None => Arc::new(MockBackend::new(args.demo_rows, 42)),
    };

    let now = Instant::now();
    let mut state = DashboardState::new(location, config, backend, now);

    // Initial log
    if args.demo {
        state.add_log("INFO", &format!("Dashboard started in DEMO mode ({} payments)", args.demo_rows));
    } else {
        state.add_log("INFO", &format!("Dashboard started - connecting to {}", config.api.endpoint));
    }
    info!("payments-dash started at {}", state.location.descriptor());

    let tick_rate = Duration::from_millis(args.refresh_ms);
    let mut frame_no: u64 = 0;

    loop {
        // Draw UI
        let ctx = UiContext {
            demo_mode: args.demo,
            client: client.as_deref(),
            endpoint: &config.api.endpoint,
            frame_no,
        };
        terminal.draw(|frame| draw_ui(frame, &mut state, &ctx))?;
        frame_no = frame_no.wrapping_add(1);

        // Handle input; wake early if the debounce deadline is sooner
        let now = Instant::now();
        let timeout = state
            .search
            .timer()
            .remaining(now)
            .map_or(tick_rate, |left| left.min(tick_rate));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && handle_key(&mut state, key) {
                    info!("payments-dash exiting at {}", state.location.descriptor());
                    return Ok(state.location.descriptor().to_string());
                }
            }
        }

        // Update state
        state.tick(Instant::now());
    }
}

/// Returns true when the user asked to quit.
fn handle_key(state: &mut DashboardState, key: KeyEvent) -> bool {
    let now = Instant::now();
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Esc => return true,
        KeyCode::Char('c') if ctrl => return true,
        KeyCode::Char('u') if ctrl => state.clear_search(now),
        KeyCode::Char('s') if ctrl => state.toggle_email_sort(),
        KeyCode::Char('r') if ctrl => state.refetch(),
        KeyCode::Char(c) if !ctrl => state.type_char(c, now),
        KeyCode::Backspace => state.backspace(now),
        KeyCode::Left => state.prev_status(now),
        KeyCode::Right => state.next_status(now),
        KeyCode::Up => state.scroll_up(),
        KeyCode::Down => state.scroll_down(),
        KeyCode::PageUp => state.page_up(),
        KeyCode::PageDown => state.page_down(),
        KeyCode::Home => state.scroll_home(),
        KeyCode::End => state.scroll_end(),
        _ => {}
    }
    false
}

fn draw_ui(frame: &mut Frame, state: &mut DashboardState, ctx: &UiContext) {
    let area = frame.area();

    // Background
    frame.render_widget(
        Block::default().style(Style::default().bg(colors::BG_DARK)),
        area,
    );

    // Main layout
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Header
            Constraint::Length(10), // Total + chart
            Constraint::Length(3),  // Toolbar
            Constraint::Min(8),     // Table + activity
            Constraint::Length(3),  // Footer
        ])
        .split(area);

    draw_header(frame, chunks[0], state, ctx);
    draw_summary(frame, chunks[1], state);
    draw_toolbar(frame, chunks[2], state, ctx);
    draw_main_content(frame, chunks[3], state, ctx);
    draw_footer(frame, chunks[4], state, ctx);
}

fn draw_header(frame: &mut Frame, area: Rect, state: &DashboardState, ctx: &UiContext) {
    // Mode indicator (DEMO vs LIVE)
    let (mode_text, mode_color) = if ctx.demo_mode {
        ("DEMO", colors::BLUE)
    } else if let Some(client) = ctx.client {
        match client.connection() {
            Connection::Connected => ("LIVE", colors::GREEN),
            Connection::Disconnected => ("DISCONNECTED", colors::RED),
            Connection::Unknown => ("CONNECTING", colors::SLATE_LIGHT),
        }
    } else {
        ("LIVE", colors::SLATE)
    };

    let mut spans = vec![
        Span::styled(
            " ORDERS ",
            Style::default().fg(colors::WHITE).bg(colors::INK).bold(),
        ),
        Span::raw("  "),
        Span::styled(
            format!("[{}]", mode_text),
            Style::default().fg(mode_color).bold(),
        ),
        Span::raw("  "),
        Span::styled(
            state.location.descriptor().to_string(),
            Style::default().fg(colors::SLATE_LIGHT),
        ),
    ];
    if state.is_fetching() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("{} Syncing...", ctx.spinner()),
            Style::default().fg(colors::BLUE),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(colors::SLATE))
                .style(Style::default().bg(colors::BG_DARK)),
        );

    frame.render_widget(header, area);
}

fn draw_summary(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
        .split(area);

    draw_stat_box(
        frame,
        chunks[0],
        "TOTAL RESULTS",
        &format_number(state.row_count() as u64),
        colors::WHITE,
    );
    draw_status_chart(frame, chunks[1], state);
}

fn draw_stat_box(frame: &mut Frame, area: Rect, label: &str, value: &str, value_color: Color) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text = vec![
        Line::from(Span::styled(
            label,
            Style::default().fg(colors::SLATE_LIGHT).add_modifier(Modifier::DIM),
        )),
        Line::from(""),
        Line::from(Span::styled(
            value,
            Style::default().fg(value_color).add_modifier(Modifier::BOLD),
        )),
    ];

    let paragraph = Paragraph::new(text).alignment(Alignment::Center);
    frame.render_widget(paragraph, inner);
}

fn draw_status_chart(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(Span::styled(
            " STATUS ",
            Style::default().fg(colors::WHITE).bold(),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL));

    let data: Vec<(&str, u64)> = state
        .status_counts()
        .iter()
        .map(|c| (c.status.as_str(), c.count))
        .collect();

    let chart = BarChart::default()
        .block(block)
        .data(data.as_slice())
        .bar_width(10)
        .bar_gap(3)
        .bar_style(Style::default().fg(colors::SLATE_LIGHT))
        .value_style(Style::default().fg(colors::INK).bg(colors::SLATE_LIGHT).bold())
        .label_style(Style::default().fg(colors::SLATE_LIGHT));

    frame.render_widget(chart, area);
}

fn draw_toolbar(frame: &mut Frame, area: Rect, state: &DashboardState, ctx: &UiContext) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    // Spinner while the network is busy or the search box is ahead of the filter
    let icon = if state.show_busy_indicator() {
        Span::styled(format!(" {} ", ctx.spinner()), Style::default().fg(colors::BLUE))
    } else {
        Span::styled(" ⌕ ", Style::default().fg(colors::SLATE_LIGHT))
    };
    let input = if state.search.pending().is_empty() {
        Span::styled("Search email...", Style::default().fg(colors::SLATE))
    } else {
        Span::styled(state.search.pending().to_string(), Style::default().fg(colors::WHITE))
    };
    let search = Paragraph::new(Line::from(vec![icon, input, Span::styled("▏", Style::default().fg(colors::BLUE))]))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(colors::BLUE))
                .style(Style::default().bg(colors::BG_PANEL)),
        );
    frame.render_widget(search, chunks[0]);

    let current = state.location.status();
    let status = Paragraph::new(Line::from(vec![
        Span::styled(" ◂ ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::styled(current.label(), Style::default().fg(colors::WHITE).bold()),
        Span::styled(" ▸ ", Style::default().fg(colors::SLATE_LIGHT)),
    ]))
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title(Span::styled(" FILTER ", Style::default().fg(colors::SLATE_LIGHT)))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(colors::SLATE))
            .style(Style::default().bg(colors::BG_PANEL)),
    );
    frame.render_widget(status, chunks[1]);
}

fn draw_main_content(frame: &mut Frame, area: Rect, state: &mut DashboardState, ctx: &UiContext) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(70), Constraint::Percentage(30)])
        .split(area);

    draw_payments_table(frame, chunks[0], state, ctx);
    draw_activity_panel(frame, chunks[1], state);
}

fn draw_payments_table(frame: &mut Frame, area: Rect, state: &mut DashboardState, ctx: &UiContext) {
    let block = Block::default()
        .title(Span::styled(
            " PAYMENTS ",
            Style::default().fg(colors::WHITE).bold(),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL));

    if state.is_loading() {
        let loading = Paragraph::new(Line::from(Span::styled(
            format!("{} Loading data from {}...", ctx.spinner(), ctx.endpoint),
            Style::default().fg(colors::SLATE_LIGHT),
        )))
        .alignment(Alignment::Center)
        .block(block);
        frame.render_widget(loading, area);
        return;
    }

    if state.row_count() == 0 {
        let message = match state.query.last_error() {
            Some(error) => format!("Could not load payments: {}", error),
            None => "No payments match these filters".to_string(),
        };
        let empty = Paragraph::new(Line::from(Span::styled(message, Style::default().fg(colors::SLATE_LIGHT))))
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    // Inner height minus the header row is the scroll viewport
    let inner = block.inner(area);
    state.set_viewport(u64::from(inner.height.saturating_sub(1)));
    let window = state.window();
    let row_cells = u16::try_from(state.row_height).unwrap_or(u16::MAX);

    let rows: Vec<Row> = window
        .items()
        .filter_map(|item| state.display_row(item.index))
        .map(|row| {
            let (fg, bg) = match badge_class(row.payment.status) {
                BadgeClass::Green => (colors::GREEN, colors::GREEN_BG),
                BadgeClass::Red => (colors::RED, colors::RED_BG),
                BadgeClass::Slate => (colors::INK, colors::SLATE_BG),
            };

            Row::new(vec![
                Cell::from(Span::styled(cell_text(row, Column::No), Style::default().fg(colors::SLATE_LIGHT))),
                Cell::from(Span::styled(cell_text(row, Column::Email), Style::default().fg(colors::WHITE))),
                Cell::from(Span::styled(cell_text(row, Column::Amount), Style::default().fg(colors::WHITE))),
                Cell::from(Span::styled(
                    format!(" {} ", cell_text(row, Column::Status)),
                    Style::default().fg(fg).bg(bg).bold(),
                )),
            ])
            .height(row_cells)
        })
        .collect();

    let header = Row::new(Column::ALL.iter().map(|column| {
        let mut title = column.header().to_string();
        if column.is_user_sortable() {
            title.push_str(match state.sort.direction(*column) {
                Some(SortDirection::Asc) => " ▲",
                Some(SortDirection::Desc) => " ▼",
                None => " ⇅",
            });
        }
        Cell::from(Span::styled(title, Style::default().fg(colors::SLATE_LIGHT).bold()))
    }));

    let widths: Vec<Constraint> = Column::ALL.iter().map(|c| Constraint::Fill(c.size())).collect();
    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().bg(colors::BG_DARK));

    // Skip the overscan rows above the viewport
    let mut table_state = TableState::default().with_offset(window.leading_overscan());
    frame.render_stateful_widget(table, area, &mut table_state);

    let mut scrollbar_state = ScrollbarState::new(window.total_size as usize)
        .position(window.scroll_offset as usize)
        .viewport_content_length(state.viewport as usize);
    frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area.inner(Margin { vertical: 1, horizontal: 0 }),
        &mut scrollbar_state,
    );
}

fn draw_activity_panel(frame: &mut Frame, area: Rect, state: &DashboardState) {
    let block = Block::default()
        .title(Span::styled(
            " ACTIVITY LOG ",
            Style::default().fg(colors::WHITE).bold(),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::SLATE))
        .border_type(BorderType::Rounded)
        .style(Style::default().bg(colors::BG_PANEL));

    let logs: Vec<Line> = state
        .activity_log
        .iter()
        .rev()
        .take(20)
        .map(|entry| {
            let (prefix, color) = match entry.level.as_str() {
                "ERROR" => ("[ERR]", colors::RED),
                "WARN" => ("[WRN]", colors::BLUE),
                "INFO" => ("[INF]", colors::GREEN),
                _ => ("[---]", colors::SLATE),
            };

            Line::from(vec![
                Span::styled(
                    format!("{} ", entry.timestamp.format("%H:%M:%S")),
                    Style::default().fg(colors::SLATE).add_modifier(Modifier::DIM),
                ),
                Span::styled(format!("{} ", prefix), Style::default().fg(color)),
                Span::styled(&entry.message, Style::default().fg(colors::WHITE)),
            ])
        })
        .collect();

    let paragraph = Paragraph::new(logs)
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(paragraph, area);
}

fn draw_footer(frame: &mut Frame, area: Rect, state: &DashboardState, ctx: &UiContext) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    let source = if ctx.demo_mode {
        "Demo data".to_string()
    } else {
        match ctx.client.map(|c| c.connection()) {
            Some(Connection::Connected) => format!("{} connected", ctx.endpoint),
            Some(Connection::Disconnected) => format!("{} unreachable", ctx.endpoint),
            _ => format!("{} connecting", ctx.endpoint),
        }
    };
    let status = Line::from(vec![
        Span::styled(
            format!(" {} rows fetched", format_number(state.row_count() as u64)),
            Style::default().fg(colors::SLATE_LIGHT),
        ),
        Span::raw("  |  "),
        Span::styled(source, Style::default().fg(colors::SLATE_LIGHT)),
    ]);
    frame.render_widget(Paragraph::new(status).alignment(Alignment::Center), chunks[1]);

    let help = Line::from(vec![
        Span::styled(" [ESC] ", Style::default().fg(colors::BG_DARK).bg(colors::RED)),
        Span::styled(" Quit ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::raw("  "),
        Span::styled(" [◂/▸] ", Style::default().fg(colors::BG_DARK).bg(colors::BLUE)),
        Span::styled(" Status ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::raw("  "),
        Span::styled(" [^S] ", Style::default().fg(colors::BG_DARK).bg(colors::WHITE)),
        Span::styled(" Sort email ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::raw("  "),
        Span::styled(" [^U] ", Style::default().fg(colors::BG_DARK).bg(colors::SLATE_LIGHT)),
        Span::styled(" Clear ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::raw("  "),
        Span::styled(" [^R] ", Style::default().fg(colors::BG_DARK).bg(colors::SLATE_LIGHT)),
        Span::styled(" Refetch ", Style::default().fg(colors::SLATE_LIGHT)),
        Span::raw("  "),
        Span::styled(" [UP/DOWN/PGUP/PGDN] ", Style::default().fg(colors::BG_DARK).bg(colors::SLATE)),
        Span::styled(" Scroll ", Style::default().fg(colors::SLATE_LIGHT)),
    ]);
    frame.render_widget(Paragraph::new(help).alignment(Alignment::Center), chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    fn line(buffer: &Buffer, y: u16) -> String {
        (1..buffer.area.width - 1)
            .map(|x| buffer[(x, y)].symbol())
            .collect::<String>()
            .trim()
            .to_string()
    }

    #[test]
    fn test_tall_rows_fill_table_to_last_payment() {
        let mut config = DashboardConfig::default();
        config.table.row_height = 2;
        let backend: Arc<dyn PaymentsBackend> = Arc::new(MockBackend::instant(100, 7));
        let location = FilterLocation::empty().unwrap();
        let mut state = DashboardState::new(location, &config, backend, Instant::now());
        state.wait_for_fetch(Duration::from_secs(5)).unwrap();

        let ctx = UiContext {
            demo_mode: true,
            client: None,
            endpoint: "demo",
            frame_no: 0,
        };
        let mut terminal = Terminal::new(TestBackend::new(60, 22)).unwrap();
        terminal
            .draw(|frame| draw_payments_table(frame, frame.area(), &mut state, &ctx))
            .unwrap();
        state.scroll_end();
        terminal
            .draw(|frame| draw_payments_table(frame, frame.area(), &mut state, &ctx))
            .unwrap();

        // 20 inner lines: header, nine rows of two cells, one spare line
        let buffer = terminal.backend().buffer();
        assert_eq!(state.viewport, 18);
        assert!(line(buffer, 2).starts_with("92 "), "got {:?}", line(buffer, 2));
        assert!(line(buffer, 3).is_empty());
        assert!(line(buffer, 18).starts_with("100 "), "got {:?}", line(buffer, 18));
        assert!(line(buffer, 20).is_empty());
    }
}
