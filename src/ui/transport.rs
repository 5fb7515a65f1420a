// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Transport display widget.

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Paragraph, Widget},
};

use crate::transport::EngineStatus;

/// Format seconds as `mm:ss.cc`
pub fn format_time(seconds: f32) -> String {
    let centis = (seconds.max(0.0) * 100.0).round() as u64;
    format!(
        "{:02}:{:02}.{:02}",
        centis / 6000,
        (centis % 6000) / 100,
        centis % 100
    )
}

/// Transport line: state, position, event pointer and send switch
pub struct TransportWidget<'a> {
    status: &'a EngineStatus,
    block: Option<Block<'a>>,
}

impl<'a> TransportWidget<'a> {
    pub fn new(status: &'a EngineStatus) -> Self {
        Self {
            status,
            block: None,
        }
    }

    /// Set the block wrapper
    pub fn block(mut self, block: Block<'a>) -> Self {
        self.block = Some(block);
        self
    }
}

impl Widget for TransportWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let area = if let Some(block) = self.block {
            let inner = block.inner(area);
            block.render(area, buf);
            inner
        } else {
            area
        };

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(12), // State
                Constraint::Length(22), // Position / duration
                Constraint::Length(20), // Event pointer
                Constraint::Length(12), // Send
                Constraint::Min(0),
            ])
            .split(area);

        let status = self.status;
        let (indicator, style) = if status.loading {
            ("\u{2026} LOAD", Style::default().fg(Color::Blue))
        } else if status.playing {
            ("\u{25b6} PLAY", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
        } else {
            ("\u{25a0} STOP", Style::default().fg(Color::Yellow))
        };
        Paragraph::new(indicator).style(style).render(chunks[0], buf);

        let position = format!(
            "{} / {}",
            format_time(status.position),
            format_time(status.duration)
        );
        Paragraph::new(position)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .render(chunks[1], buf);

        let pointer = format!("ev {}/{}", status.event_index + 1, status.event_count);
        Paragraph::new(pointer)
            .style(Style::default().fg(Color::White))
            .render(chunks[2], buf);

        let (send, style) = if status.send_enabled {
            ("SEND on", Style::default().fg(Color::Green))
        } else {
            ("SEND off", Style::default().fg(Color::Red))
        };
        Paragraph::new(send).style(style).render(chunks[3], buf);

        if status.failures > 0 {
            Paragraph::new(format!("{} failed", status.failures))
                .style(Style::default().fg(Color::Red))
                .render(chunks[4], buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "00:00.00");
        assert_eq!(format_time(65.25), "01:05.25");
        assert_eq!(format_time(600.0), "10:00.00");
        assert_eq!(format_time(-3.0), "00:00.00");
    }

    #[test]
    fn test_render_loading() {
        let status = EngineStatus::loading(12.0);
        let area = Rect::new(0, 0, 80, 1);
        let mut buf = Buffer::empty(area);
        TransportWidget::new(&status).render(area, &mut buf);

        let line: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(line.contains("LOAD"));
        assert!(line.contains("00:12.00"));
        assert!(line.contains("SEND off"));
    }
}
