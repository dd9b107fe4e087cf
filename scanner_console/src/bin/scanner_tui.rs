// Operator console for the scanning stage
// Run with: cargo run -p scanner_console --bin scanner_tui -- --identity ab12
// Logs go to scanner_tui.log unless --log-file says otherwise.

use clap::Parser;
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event, KeyCode,
        KeyEvent, KeyEventKind, KeyboardEnhancementFlags, MouseButton, MouseEvent, MouseEventKind,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction as Axis, Layout, Position as Cell, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use scanner_remote::config::SERVER_URL_ENV;
use scanner_remote::drivers::ConnectionState;
use scanner_remote::identity::identity_from_query;
use scanner_remote::jog::{InputSignal, PointerPhase};
use scanner_remote::{ClientNotice, Direction, Position, ScannerClientConfig, ScannerDriver, Telemetry};
use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about = "Remote console for a motorized scanning stage")]
struct Args {
    /// Operator identity (4-6 alphanumeric characters)
    #[arg(short, long)]
    identity: Option<String>,

    /// Hosting page URL; the identity is read from its user_id parameter
    #[arg(long)]
    page_url: Option<Url>,

    /// Remote controller base URL, e.g. http://127.0.0.1:8000
    #[arg(short, long)]
    server: Option<String>,

    /// TOML client configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "scanner_tui.log")]
    log_file: PathBuf,
}

const GRID_HALF_WIDTH: i64 = 8;
const GRID_HALF_HEIGHT: i64 = 4;

#[derive(Debug, Clone)]
struct NoticeLog {
    timestamp: SystemTime,
    message: String,
    is_error: bool,
}

struct AppState {
    telemetry: Telemetry,
    notices: VecDeque<NoticeLog>,
    status_message: String,
    /// Without key release events every key press is sent as a tap.
    release_events: bool,
    pad: [(Direction, Rect); 4],
    pointer_held: Option<Direction>,
    should_quit: bool,
}

impl AppState {
    fn new(telemetry: Telemetry, release_events: bool) -> Self {
        let status_message = match &telemetry.disabled_reason {
            Some(reason) => format!("Disabled: {}", reason),
            None => "Connecting".to_string(),
        };
        Self {
            telemetry,
            notices: VecDeque::new(),
            status_message,
            release_events,
            pad: Direction::ALL.map(|d| (d, Rect::default())),
            pointer_held: None,
            should_quit: false,
        }
    }

    fn add_notice(&mut self, notice: ClientNotice) {
        let (message, is_error) = match notice {
            ClientNotice::Disabled { reason } => (format!("Disabled: {}", reason), true),
            ClientNotice::Connected => ("Connected".to_string(), false),
            ClientNotice::ConnectionLost { code, retry_in_ms } => {
                (format!("Connection lost ({}), retrying in {} ms", code, retry_in_ms), true)
            }
            ClientNotice::Disconnected { code } => (format!("Disconnected ({})", code), false),
            ClientNotice::ServerError { message } => (format!("Server: {}", message), true),
            ClientNotice::ServerLog { message, .. } => (message, false),
            ClientNotice::ResetSucceeded { message } => (message, false),
            ClientNotice::ResetFailed { reason } => (format!("Reset failed: {}", reason), true),
        };
        self.notices.push_back(NoticeLog {
            timestamp: SystemTime::now(),
            message,
            is_error,
        });
        if self.notices.len() > 100 {
            self.notices.pop_front();
        }
    }

    fn set_status(&mut self, message: String) {
        self.status_message = message;
    }

    /// A button still held from an earlier press is released before the new one.
    fn pointer_down(&mut self, direction: Direction) -> Vec<InputSignal> {
        let mut signals = Vec::with_capacity(2);
        if let Some(previous) = self.pointer_held.replace(direction) {
            signals.push(InputSignal::Pointer(previous, PointerPhase::Up));
        }
        signals.push(InputSignal::Pointer(direction, PointerPhase::Down));
        signals
    }

    fn pad_button_at(&self, column: u16, row: u16) -> Option<Direction> {
        self.pad
            .iter()
            .find(|(_, rect)| rect.contains(Cell { x: column, y: row }))
            .map(|(d, _)| *d)
    }
}

fn init_logging(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(log_file)
        .with_ansi(false)
        .init();
    Ok(())
}

fn load_config(args: &Args) -> Result<ScannerClientConfig, Box<dyn std::error::Error>> {
    let mut config = match &args.config {
        Some(path) => ScannerClientConfig::load(path)?,
        None => {
            let mut config = ScannerClientConfig::default();
            config.apply_env();
            config
        }
    };
    if let Some(server) = &args.server {
        config.server_url = server.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_file)?;
    info!(?args, "scanner console starting");

    let config = load_config(&args)?;
    info!(server = %config.server_url, env = SERVER_URL_ENV, "configuration loaded");

    // an invalid or missing identity still starts the console, disabled
    let identity = args
        .identity
        .clone()
        .or_else(|| args.page_url.as_ref().and_then(identity_from_query))
        .unwrap_or_default();

    let driver = ScannerDriver::spawn(config, &identity)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
    let release_events = matches!(supports_keyboard_enhancement(), Ok(true));
    if release_events {
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &driver, release_events).await;

    driver.shutdown().await;

    // Restore terminal
    if release_events {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    driver: &ScannerDriver,
    release_events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut notices = driver.subscribe_notices();
    let mut state = AppState::new(driver.snapshot(), release_events);
    if let Some(reason) = state.telemetry.disabled_reason.clone() {
        state.add_notice(ClientNotice::Disabled { reason });
    }

    loop {
        state.telemetry = driver.snapshot();
        loop {
            match notices.try_recv() {
                Ok(notice) => state.add_notice(notice),
                Err(TryRecvError::Lagged(skipped)) => warn!(skipped, "notice display fell behind"),
                Err(_) => break,
            }
        }

        terminal.draw(|f| ui(f, &mut state))?;
        if state.should_quit {
            break;
        }

        // Handle input with timeout; the core keeps its own timing
        if event::poll(Duration::from_millis(20))? {
            match event::read()? {
                Event::Key(key) => handle_key_event(key, driver, &mut state)?,
                Event::Mouse(mouse) => handle_mouse_event(mouse, driver, &mut state)?,
                Event::FocusLost => {
                    state.pointer_held = None;
                    driver.release_all()?;
                }
                _ => {}
            }
        }
    }

    driver.release_all()?;
    Ok(())
}

/// DOM-style key name for bound keys, so the core's keyboard mapping applies.
fn key_name(code: KeyCode) -> Option<String> {
    match code {
        KeyCode::Up => Some("ArrowUp".to_string()),
        KeyCode::Down => Some("ArrowDown".to_string()),
        KeyCode::Left => Some("ArrowLeft".to_string()),
        KeyCode::Right => Some("ArrowRight".to_string()),
        KeyCode::Char(c @ ('w' | 'a' | 's' | 'd' | 'W' | 'A' | 'S' | 'D')) => Some(c.to_string()),
        _ => None,
    }
}

fn handle_key_event(
    key: KeyEvent,
    driver: &ScannerDriver,
    state: &mut AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(name) = key_name(key.code) {
        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                driver.input(InputSignal::KeyDown(name.clone()))?;
                if !state.release_events {
                    driver.input(InputSignal::KeyUp(name))?;
                }
            }
            KeyEventKind::Release => driver.input(InputSignal::KeyUp(name))?,
        }
        return Ok(());
    }

    if key.kind == KeyEventKind::Release {
        return Ok(());
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            state.should_quit = true;
        }
        KeyCode::Char('r') => {
            let driver = driver.clone();
            tokio::spawn(async move {
                // the outcome arrives as a notice
                let _ = driver.reset().await;
            });
            state.set_status("Reset requested".to_string());
        }
        KeyCode::Char('c') => {
            driver.connect()?;
            state.set_status("Connect requested".to_string());
        }
        KeyCode::Char('x') => {
            driver.disconnect()?;
            state.set_status("Disconnected by operator".to_string());
        }
        _ => {}
    }
    Ok(())
}

fn handle_mouse_event(
    mouse: MouseEvent,
    driver: &ScannerDriver,
    state: &mut AppState,
) -> Result<(), Box<dyn std::error::Error>> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if let Some(direction) = state.pad_button_at(mouse.column, mouse.row) {
                for signal in state.pointer_down(direction) {
                    driver.input(signal)?;
                }
            }
        }
        MouseEventKind::Up(MouseButton::Left) => {
            if let Some(direction) = state.pointer_held.take() {
                driver.input(InputSignal::Pointer(direction, PointerPhase::Up))?;
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            // leaving the button counts as a release
            if let Some(direction) = state.pointer_held {
                if state.pad_button_at(mouse.column, mouse.row) != Some(direction) {
                    state.pointer_held = None;
                    driver.input(InputSignal::Pointer(direction, PointerPhase::Leave))?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn ui(f: &mut Frame, state: &mut AppState) {
    let main_chunks = Layout::default()
        .direction(Axis::Vertical)
        .constraints([
            Constraint::Length(7),  // Connection panel
            Constraint::Min(12),    // Data panels
            Constraint::Length(7),  // Help panel
        ])
        .split(f.area());

    render_connection_panel(f, main_chunks[0], state);

    let data_chunks = Layout::default()
        .direction(Axis::Horizontal)
        .constraints([
            Constraint::Percentage(25), // Pad
            Constraint::Percentage(25), // Scanner data
            Constraint::Percentage(25), // Grid
            Constraint::Percentage(25), // Notices
        ])
        .split(main_chunks[1]);

    render_pad(f, data_chunks[0], state);
    render_scanner_data(f, data_chunks[1], state);
    render_grid(f, data_chunks[2], state);
    render_notices(f, data_chunks[3], state);

    render_help_panel(f, main_chunks[2], state);
}

fn connection_style(connection: ConnectionState) -> (&'static str, Color) {
    match connection {
        ConnectionState::Disabled => ("Disabled", Color::Red),
        ConnectionState::Closed => ("Closed", Color::DarkGray),
        ConnectionState::Connecting => ("Connecting", Color::Yellow),
        ConnectionState::Open => ("Connected", Color::Green),
        ConnectionState::Closing => ("Closing", Color::Yellow),
        ConnectionState::Retrying => ("Reconnecting", Color::Magenta),
    }
}

fn render_connection_panel(f: &mut Frame, area: Rect, state: &AppState) {
    let t = &state.telemetry;
    let (label, color) = connection_style(t.connection);
    let pressed: Vec<&str> = t.pressed.iter().map(|d| d.as_str()).collect();

    let text = vec![
        Line::from(vec![
            Span::styled("Identity: ", Style::default().fg(Color::Cyan)),
            Span::raw(t.identity.clone().unwrap_or_else(|| "-".to_string())),
        ]),
        Line::from(vec![
            Span::styled("Connection: ", Style::default().fg(Color::Cyan)),
            Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        ]),
        Line::from(vec![
            Span::styled("Commands Sent: ", Style::default().fg(Color::Cyan)),
            Span::raw(t.command_count.to_string()),
        ]),
        Line::from(vec![
            Span::styled("Pressed: ", Style::default().fg(Color::Cyan)),
            Span::styled(
                if pressed.is_empty() { "None".to_string() } else { pressed.join(" ") },
                Style::default().fg(Color::Magenta),
            ),
        ]),
        Line::from(vec![
            Span::styled("Status: ", Style::default().fg(Color::Cyan)),
            Span::raw(&state.status_message),
        ]),
    ];

    let block = Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Connection"));
    f.render_widget(block, area);
}

fn render_pad(f: &mut Frame, area: Rect, state: &mut AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Pad (mouse)")
        .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = Layout::default()
        .direction(Axis::Vertical)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(inner);
    let columns = |row: Rect| {
        Layout::default()
            .direction(Axis::Horizontal)
            .constraints([Constraint::Ratio(1, 3); 3])
            .split(row)
    };
    let top = columns(rows[0]);
    let middle = columns(rows[1]);
    let bottom = columns(rows[2]);

    state.pad = [
        (Direction::Up, top[1]),
        (Direction::Left, middle[0]),
        (Direction::Right, middle[2]),
        (Direction::Down, bottom[1]),
    ];

    for (direction, rect) in state.pad {
        let held = state.telemetry.pressed.contains(&direction);
        let style = if held {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else {
            Style::default().fg(Color::White)
        };
        let button = Paragraph::new(Line::from(Span::styled(direction.as_str(), style)))
            .block(Block::default().borders(Borders::ALL).border_style(style));
        f.render_widget(button, rect);
    }
}

fn render_scanner_data(f: &mut Frame, area: Rect, state: &AppState) {
    let t = &state.telemetry;
    let mut lines = vec![];

    lines.push(Line::from(vec![
        Span::styled("Position", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
    ]));

    if t.has_snapshot {
        let view = &t.view;
        lines.push(Line::from(vec![
            Span::styled("  X: ", Style::default().fg(Color::Cyan)),
            Span::raw(view.current_position.x.to_string()),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Y: ", Style::default().fg(Color::Cyan)),
            Span::raw(view.current_position.y.to_string()),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::from(vec![
            Span::styled("Scanner", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Status: ", Style::default().fg(Color::Cyan)),
            Span::styled(
                view.operation_status.to_string(),
                Style::default().fg(if view.is_busy() { Color::Yellow } else { Color::Green }),
            ),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Pending: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                "h {} / v {}",
                view.horizontal_movement_pending, view.vertical_movement_pending
            )),
        ]));
        lines.push(Line::from(vec![
            Span::styled("  Captured: ", Style::default().fg(Color::Cyan)),
            Span::raw(format!(
                "{} ({} unique)",
                view.captured_count(),
                t.highlight.captured_cells.len()
            )),
        ]));
        if let Some(duration) = view.current_movement_duration {
            lines.push(Line::from(vec![
                Span::styled("  Move time: ", Style::default().fg(Color::Cyan)),
                Span::raw(format!("{:.1} s", duration)),
            ]));
        }
    } else {
        lines.push(Line::from("  No data"));
    }

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Scanner Data")
            .border_style(Style::default().fg(Color::Yellow)),
    );
    f.render_widget(paragraph, area);
}

fn render_grid(f: &mut Frame, area: Rect, state: &AppState) {
    let highlight = &state.telemetry.highlight;
    let center = highlight.current_cell.unwrap_or_default();

    let lines: Vec<Line> = (-GRID_HALF_HEIGHT..=GRID_HALF_HEIGHT)
        .map(|dy| {
            let spans: Vec<Span> = (-GRID_HALF_WIDTH..=GRID_HALF_WIDTH)
                .map(|dx| {
                    let cell = Position::new(center.x + dx, center.y + dy);
                    if highlight.current_cell == Some(cell) {
                        Span::styled("@", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
                    } else if highlight.is_captured(&cell) {
                        Span::styled("#", Style::default().fg(Color::Cyan))
                    } else {
                        Span::styled(".", Style::default().fg(Color::DarkGray))
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Grid around {}", center))
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(paragraph, area);
}

fn render_notices(f: &mut Frame, area: Rect, state: &AppState) {
    let items: Vec<ListItem> = if state.notices.is_empty() {
        vec![ListItem::new(Line::from(vec![
            Span::styled("Nothing yet", Style::default().fg(Color::DarkGray)),
        ]))]
    } else {
        state
            .notices
            .iter()
            .rev() // Show newest first
            .map(|notice| {
                let elapsed = notice.timestamp.elapsed().unwrap_or(Duration::ZERO);
                let time_str = if elapsed.as_secs() < 60 {
                    format!("{}s", elapsed.as_secs())
                } else {
                    format!("{}m", elapsed.as_secs() / 60)
                };
                let (marker, color) = if notice.is_error { ("⚠ ", Color::Red) } else { ("• ", Color::Green) };

                ListItem::new(Line::from(vec![
                    Span::styled(format!("[{}] ", time_str), Style::default().fg(Color::DarkGray)),
                    Span::styled(marker, Style::default().fg(color)),
                    Span::raw(notice.message.clone()),
                ]))
            })
            .collect()
    };

    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Notices")
            .border_style(Style::default().fg(Color::Green)),
    );
    f.render_widget(list, area);
}

fn render_help_panel(f: &mut Frame, area: Rect, state: &AppState) {
    let help_text = vec![
        Line::from(Span::styled("Motion Controls:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Arrows or W/A/S/D, or hold a pad button with the mouse"),
        Line::from(Span::styled("Other:", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  r=Reset Scanner  c=Connect  x=Disconnect  q=Quit"),
        Line::from(Span::styled(
            if state.release_events {
                "Hold a key to repeat; release to stop"
            } else {
                "Terminal reports no key releases: each key press is a single move"
            },
            Style::default().fg(Color::Yellow),
        )),
    ];

    let help_block = Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help_block, area);
}
