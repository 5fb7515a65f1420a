// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Terminal monitor for session playback.
//!
//! Provides a ratatui-based view with the transport line, per-console
//! last-message gauges and the session statistics table.

mod faders;
mod stats;
mod transport;

pub use faders::FadersWidget;
pub use stats::{stats_cells, stats_rows, StatsWidget};
pub use transport::{format_time, TransportWidget};

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame, Terminal,
};

use crate::capture::ActivitySignal;
use crate::session::{console_name, CONSOLE_COUNT};
use crate::stats::SessionStats;
use crate::transport::{EngineStatus, TransportCommand};

/// Seek step of the arrow keys, in seconds
pub const SEEK_STEP: f32 = 5.0;

/// How long a status message stays visible
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

/// Everything the monitor draws
#[derive(Debug, Clone)]
pub struct UiState {
    pub engine: EngineStatus,
    pub console_names: [String; CONSOLE_COUNT],
    pub stats: Option<SessionStats>,
    pub activity: [ActivitySignal; CONSOLE_COUNT],
    pub show_help: bool,
    pub status_message: Option<String>,
    pub status_time: Option<Instant>,
}

impl UiState {
    pub fn new(engine: EngineStatus) -> Self {
        Self {
            engine,
            console_names: std::array::from_fn(|c| format!("Console {}", console_name(c as u8))),
            stats: None,
            activity: [ActivitySignal::default(); CONSOLE_COUNT],
            show_help: false,
            status_message: None,
            status_time: None,
        }
    }

    /// Take a fresh engine status. Consoles whose last message changed
    /// light their activity marker.
    pub fn update(&mut self, engine: EngineStatus, now: Instant) {
        for console in 0..CONSOLE_COUNT {
            if engine.last_messages[console].is_some()
                && engine.last_messages[console] != self.engine.last_messages[console]
            {
                self.activity[console].trigger(now);
            }
        }
        self.engine = engine;
    }

    pub fn is_active(&self, console: usize, now: Instant) -> bool {
        self.activity
            .get(console)
            .map(|a| a.is_active(now))
            .unwrap_or(false)
    }

    /// Set a status message that will be displayed temporarily
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_time = Some(Instant::now());
    }

    /// Clear expired status message
    pub fn clear_expired_status(&mut self) {
        if let Some(time) = self.status_time {
            if time.elapsed() > STATUS_TIMEOUT {
                self.status_message = None;
                self.status_time = None;
            }
        }
    }
}

/// Key event result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KeyAction {
    None,
    Quit,
    TogglePlay,
    /// Seek relative to the current position
    SeekBy(f32),
    Rewind,
    ToggleConsole(u8),
    ToggleSend,
    ToggleHelp,
}

impl KeyAction {
    /// Transport command carried by this action, if any
    pub fn command(self) -> Option<TransportCommand> {
        match self {
            KeyAction::TogglePlay => Some(TransportCommand::TogglePlay),
            KeyAction::SeekBy(delta) => Some(TransportCommand::Nudge(delta)),
            KeyAction::Rewind => Some(TransportCommand::Seek(0.0)),
            KeyAction::ToggleConsole(console) => Some(TransportCommand::ToggleConsole(console)),
            KeyAction::ToggleSend => Some(TransportCommand::ToggleSend),
            KeyAction::Quit => Some(TransportCommand::Shutdown),
            KeyAction::None | KeyAction::ToggleHelp => None,
        }
    }
}

/// Map a key press to an action
pub fn map_key(code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
    match (code, modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE)
        | (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::Quit,

        (KeyCode::Char(' '), _) => KeyAction::TogglePlay,
        (KeyCode::Left, _) => KeyAction::SeekBy(-SEEK_STEP),
        (KeyCode::Right, _) => KeyAction::SeekBy(SEEK_STEP),
        (KeyCode::Home, _) => KeyAction::Rewind,

        (KeyCode::Char(c @ '1'..='3'), KeyModifiers::NONE) => {
            KeyAction::ToggleConsole(c as u8 - b'1')
        }
        (KeyCode::Char('s'), KeyModifiers::NONE) => KeyAction::ToggleSend,

        (KeyCode::Char('?'), _) | (KeyCode::Char('h'), KeyModifiers::NONE) => {
            KeyAction::ToggleHelp
        }
        _ => KeyAction::None,
    }
}

/// Terminal UI application
pub struct App {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    /// Target frame rate
    frame_rate: u32,
    running: bool,
}

impl App {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            frame_rate: 30,
            running: true,
        })
    }

    pub fn set_frame_rate(&mut self, fps: u32) {
        self.frame_rate = fps.clamp(1, 120);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Handle a key event, updating local view state
    pub fn handle_key(&mut self, state: &mut UiState, code: KeyCode, modifiers: KeyModifiers) -> KeyAction {
        let action = map_key(code, modifiers);
        match action {
            KeyAction::Quit => self.quit(),
            KeyAction::ToggleHelp => state.show_help = !state.show_help,
            KeyAction::ToggleSend => {
                let next = if state.engine.send_enabled { "off" } else { "on" };
                state.set_status(format!("Send {}", next));
            }
            _ => {}
        }
        action
    }

    /// Poll for a key press, waiting at most one frame
    pub fn poll_key(&self) -> io::Result<Option<(KeyCode, KeyModifiers)>> {
        let timeout = Duration::from_millis(1000 / self.frame_rate as u64);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some((key.code, key.modifiers)));
                }
            }
        }
        Ok(None)
    }

    pub fn draw(&mut self, state: &UiState) -> io::Result<()> {
        let now = Instant::now();
        self.terminal.draw(|frame| render(frame, state, now))?;
        Ok(())
    }

    fn cleanup(&mut self) -> io::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for App {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Draw the whole monitor into `frame`
pub fn render(frame: &mut Frame, state: &UiState, now: Instant) {
    let area = frame.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Length(CONSOLE_COUNT as u16 + 2),
            Constraint::Min(4), // Statistics
            Constraint::Length(1),
        ])
        .split(area);

    let block = Block::default().borders(Borders::ALL).title(" Transport ");
    frame.render_widget(TransportWidget::new(&state.engine).block(block), chunks[0]);

    let activity: [bool; CONSOLE_COUNT] = std::array::from_fn(|c| state.is_active(c, now));
    let block = Block::default().borders(Borders::ALL).title(" Consoles ");
    frame.render_widget(
        FadersWidget::new(&state.engine, &state.console_names, activity).block(block),
        chunks[1],
    );

    let block = Block::default().borders(Borders::ALL).title(" Statistics ");
    match &state.stats {
        Some(stats) => frame.render_widget(StatsWidget::new(stats).block(block), chunks[2]),
        None => frame.render_widget(
            Paragraph::new("No statistics")
                .style(Style::default().fg(Color::DarkGray))
                .block(block),
            chunks[2],
        ),
    }

    render_status_bar(frame, chunks[3], state);

    if state.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_status_bar(frame: &mut Frame, area: Rect, state: &UiState) {
    let text = if let Some(ref msg) = state.status_message {
        Span::styled(msg.as_str(), Style::default().fg(Color::Yellow))
    } else {
        Span::styled(
            " Space: Play/Pause | \u{2190}/\u{2192}: Seek | Home: Start | 1-3: Console | s: Send | q: Quit",
            Style::default().fg(Color::DarkGray),
        )
    };
    frame.render_widget(Paragraph::new(text), area);
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let width = 44.min(area.width.saturating_sub(4));
    let height = 11.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);
    let block = Block::default().borders(Borders::ALL).title(" Help ");
    let inner = block.inner(help_area);
    frame.render_widget(block, help_area);

    let help_text = vec![
        Line::from(Span::styled("Transport", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  Space       Play/Pause"),
        Line::from(format!("  Left/Right  Seek -/+{}s", SEEK_STEP)),
        Line::from("  Home        Back to start"),
        Line::from(Span::styled("Output", Style::default().add_modifier(Modifier::BOLD))),
        Line::from("  1-3         Toggle console"),
        Line::from("  s           Toggle send"),
        Line::from("  h/?         Toggle help"),
        Line::from("  q/Ctrl+c    Quit"),
    ];
    frame.render_widget(Paragraph::new(help_text), inner);
}
