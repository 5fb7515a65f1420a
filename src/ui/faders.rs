// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Per-console last-message gauges.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Block, Paragraph, Widget},
};

use crate::midi::messages::DATA_MAX;
use crate::session::CONSOLE_COUNT;
use crate::transport::EngineStatus;

/// One row per console: name, enable marker, activity marker, controller
/// and a value bar.
pub struct FadersWidget<'a> {
    status: &'a EngineStatus,
    names: &'a [String; CONSOLE_COUNT],
    activity: [bool; CONSOLE_COUNT],
    block: Option<Block<'a>>,
}

impl<'a> FadersWidget<'a> {
    pub fn new(
        status: &'a EngineStatus,
        names: &'a [String; CONSOLE_COUNT],
        activity: [bool; CONSOLE_COUNT],
    ) -> Self {
        Self {
            status,
            names,
            activity,
            block: None,
        }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

/// Bar of `width` cells filled in proportion to a 0-127 value
fn value_bar(value: u8, width: usize) -> String {
    let filled = (value.min(DATA_MAX) as usize * width) / DATA_MAX as usize;
    "\u{2588}".repeat(filled) + &"\u{2591}".repeat(width - filled)
}

impl Widget for FadersWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1); CONSOLE_COUNT])
            .split(area);

        for (console, row) in rows.iter().enumerate() {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([
                    Constraint::Length(12), // Name
                    Constraint::Length(5),  // Enabled
                    Constraint::Length(2),  // Activity
                    Constraint::Length(8),  // Controller
                    Constraint::Min(10),    // Bar
                    Constraint::Length(4),  // Value
                ])
                .split(*row);

            let enabled = self.status.console_enabled[console];
            let name_style = if enabled {
                Style::default().fg(Color::White)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Paragraph::new(self.names[console].as_str())
                .style(name_style)
                .render(chunks[0], buf);

            let marker = if enabled {
                Span::styled("ON", Style::default().fg(Color::Green))
            } else {
                Span::styled("OFF", Style::default().fg(Color::Red))
            };
            Paragraph::new(marker).render(chunks[1], buf);

            if self.activity[console] {
                Paragraph::new("\u{25cf}")
                    .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
                    .render(chunks[2], buf);
            }

            let Some(message) = self.status.last_messages[console] else {
                Paragraph::new("-")
                    .style(Style::default().fg(Color::DarkGray))
                    .render(chunks[3], buf);
                continue;
            };

            Paragraph::new(format!("CC {}", message.number))
                .style(Style::default().fg(Color::Cyan))
                .render(chunks[3], buf);

            let width = chunks[4].width.saturating_sub(1) as usize;
            Paragraph::new(value_bar(message.value, width))
                .style(Style::default().fg(Color::Green))
                .render(chunks[4], buf);

            Paragraph::new(format!("{:>3}", message.value)).render(chunks[5], buf);
        }
    }
}
