// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Statistics table widget.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Row, Table, Widget},
};

use crate::session::{console_name, CONSOLE_COUNT};
use crate::stats::{ControllerStats, SessionStats};

const HEADER: [&str; 9] = ["Con", "CC", "Count", "Min", "Max", "Mean", "RMS", "Active s", "Ev/s"];

/// Table cells of one controller
pub fn stats_cells(console: u8, number: u8, stats: &ControllerStats) -> [String; 9] {
    [
        console_name(console).to_string(),
        number.to_string(),
        stats.count.to_string(),
        stats.min.to_string(),
        stats.max.to_string(),
        format!("{:.1}", stats.mean),
        format!("{:.1}", stats.rms),
        format!("{:.2}", stats.active_duration),
        format!("{:.2}", stats.frequency),
    ]
}

/// Every recorded controller of every console, one row each
pub fn stats_rows(stats: &SessionStats) -> Vec<[String; 9]> {
    (0..CONSOLE_COUNT as u8)
        .flat_map(|console| {
            stats
                .recorded(console)
                .map(move |(number, s)| stats_cells(console, number, s))
        })
        .collect()
}

pub struct StatsWidget<'a> {
    stats: &'a SessionStats,
    block: Option<Block<'a>>,
}

impl<'a> StatsWidget<'a> {
    pub fn new(stats: &'a SessionStats) -> Self {
        Self { stats, block: None }
    }

    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for StatsWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let header = Row::new(HEADER)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));
        let rows = stats_rows(self.stats).into_iter().map(Row::new);
        let widths = [
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(9),
            Constraint::Length(6),
        ];

        let mut table = Table::new(rows, widths).header(header);
        if let Some(block) = self.block {
            table = table.block(block);
        }
        Widget::render(table, area, buf);
    }
}
