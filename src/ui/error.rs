//! Full-screen error display.
//!
//! Used when the episode feed cannot be loaded: the player has nothing to
//! show, so the whole terminal becomes the error message.

use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};

/// Headline shown when the episode feed cannot be loaded.
pub const FEED_ERROR_MESSAGE: &str = "Failed to load podcast episodes. Please try again later.";

const ERROR_BG: Color = Color::Rgb(255, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);
const DETAILS_FG: Color = Color::Rgb(255, 200, 200);

/// Red full-screen message that waits for a key press.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    active: bool,
}

impl ErrorScreen {
    /// Enters the alternate screen.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen {
            terminal,
            active: true,
        })
    }

    /// Shows `message` with optional `details` below it until a key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_error(&mut self, message: &str, details: Option<&str>) -> anyhow::Result<()> {
        let lines = error_lines(message, details);
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.render_widget(
                    ratatui::widgets::Block::default().style(Style::default().bg(ERROR_BG)),
                    area,
                );

                let text_height = (lines.len() as u16 + 2).min(area.height);
                let centered_area = Rect {
                    x: area.x + area.width / 10,
                    y: area.y + area.height.saturating_sub(text_height) / 2,
                    width: area.width * 8 / 10,
                    height: text_height,
                };

                let paragraph = Paragraph::new(lines.clone())
                    .style(Style::default().bg(ERROR_BG))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, centered_area);
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Leaves the alternate screen. Safe to call more than once.
    ///
    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn error_lines(message: &str, details: Option<&str>) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from(Span::styled(
        message.to_string(),
        Style::default().fg(ERROR_FG).add_modifier(Modifier::BOLD),
    ))];
    if let Some(details) = details.filter(|d| !d.trim().is_empty()) {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            details.to_string(),
            Style::default().fg(DETAILS_FG),
        )));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Press any key to exit",
        Style::default().fg(DETAILS_FG),
    )));
    lines
}
