//! Interactive player screen.
//!
//! Lists the feed's episodes, shows the selected episode's card with its
//! visualization, and keeps a now-playing bar for the current episode. All
//! playback state comes from the [`PlayerController`]; this module only draws
//! it and turns key presses into controller operations.

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{
        Block, Borders, Clear, Gauge, HighlightSpacing, List, ListItem, ListState, Padding,
        Paragraph, Sparkline, Wrap,
    },
};
use std::io::{self, Stdout};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use crate::config::UiConfig;
use crate::feed::{Episode, EpisodeId};
use crate::format::format_date;
use crate::player::{
    EpisodeDiagnostics, EpisodeView, NowPlayingBar, PlayGlyph, PlayerBackend, PlayerController,
    PlayerEvent, Visualization, VolumeIcon,
};

const BG: Color = Color::Rgb(0, 0, 0);
const FG: Color = Color::Rgb(255, 255, 255);
const ACCENT: Color = Color::Rgb(206, 224, 220);
const SECONDARY: Color = Color::Rgb(185, 207, 212);
const DIM_FG: Color = Color::Rgb(100, 100, 100);
const HIGHLIGHT_BG: Color = Color::Rgb(20, 20, 20);
const ERROR_FG: Color = Color::Rgb(255, 80, 80);

const NOTICE_TTL: Duration = Duration::from_secs(3);
const DIAGNOSTICS_REFRESH: Duration = Duration::from_millis(500);

/// What a key press asks the player to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiAction {
    SelectPrevious,
    SelectNext,
    TogglePlay,
    ToggleCurrent,
    /// Skip by one seek step, backwards when negative
    SeekBy(i8),
    /// Jump to a tenth of the episode
    SeekTo(u8),
    /// Skip the now-playing episode, whichever row is selected
    SeekCurrentBy(i8),
    VolumeUp,
    VolumeDown,
    ToggleMute,
    CycleSpeed,
    CycleCurrentSpeed,
    ToggleDiagnostics,
    Quit,
}

/// Maps a key press to its action.
pub fn action_for_key(key: KeyEvent) -> Option<UiAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    Some(match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => UiAction::Quit,
        KeyCode::Up | KeyCode::Char('k') => UiAction::SelectPrevious,
        KeyCode::Down | KeyCode::Char('j') => UiAction::SelectNext,
        KeyCode::Enter | KeyCode::Char(' ') => UiAction::TogglePlay,
        KeyCode::Char('p') => UiAction::ToggleCurrent,
        KeyCode::Left => UiAction::SeekBy(-1),
        KeyCode::Right => UiAction::SeekBy(1),
        KeyCode::Char(c @ '0'..='9') => UiAction::SeekTo(c as u8 - b'0'),
        KeyCode::Char('[') => UiAction::SeekCurrentBy(-1),
        KeyCode::Char(']') => UiAction::SeekCurrentBy(1),
        KeyCode::Char('+') | KeyCode::Char('=') => UiAction::VolumeUp,
        KeyCode::Char('-') => UiAction::VolumeDown,
        KeyCode::Char('m') => UiAction::ToggleMute,
        KeyCode::Char('s') => UiAction::CycleSpeed,
        KeyCode::Char('S') => UiAction::CycleCurrentSpeed,
        KeyCode::Char('d') => UiAction::ToggleDiagnostics,
        KeyCode::Char('q') | KeyCode::Esc => UiAction::Quit,
        _ => return None,
    })
}

/// Stretches or squeezes `values` (in `[0, max]`) to `width` sparkline columns.
pub fn resample(values: &[f32], width: usize, scale: f32) -> Vec<u64> {
    if values.is_empty() || width == 0 {
        return vec![0; width];
    }
    (0..width)
        .map(|col| {
            let index = col * values.len() / width;
            let value = values[index.min(values.len() - 1)] * scale;
            if value.is_finite() {
                value.max(0.0).round() as u64
            } else {
                0
            }
        })
        .collect()
}

fn glyph_symbol(glyph: PlayGlyph) -> &'static str {
    match glyph {
        PlayGlyph::Play => "▶",
        PlayGlyph::Pause => "⏸",
        PlayGlyph::Error => "⚠",
    }
}

fn volume_label(view: &EpisodeView) -> String {
    let icon = match view.volume_icon {
        VolumeIcon::Muted => "🔇",
        VolumeIcon::Low => "🔉",
        VolumeIcon::High => "🔊",
    };
    format!("{icon} {:>3.0}%", view.volume * 100.0)
}

/// Terminal player for one feed.
pub struct PodwaveTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    ui: UiConfig,
    list_state: ListState,
    show_diagnostics: bool,
    diagnostics: Option<(EpisodeDiagnostics, Instant)>,
    notice: Option<(String, Instant)>,
    active: bool,
}

impl PodwaveTui {
    /// Enters the alternate screen.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    pub fn new(ui: UiConfig) -> Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            ui,
            list_state: ListState::default(),
            show_diagnostics: false,
            diagnostics: None,
            notice: None,
            active: true,
        })
    }

    /// Runs until the user quits.
    ///
    /// Each pass drains backend events into the controller, advances playback
    /// and animation, redraws, then waits up to one frame for input.
    ///
    /// # Errors
    /// - If terminal rendering or input polling fails
    pub fn run<B: PlayerBackend>(
        &mut self,
        controller: &mut PlayerController<B>,
        events: &Receiver<PlayerEvent>,
    ) -> Result<()> {
        let episodes = controller.episodes();
        let featured = episodes.iter().position(|e| e.featured).unwrap_or(0);
        if !episodes.is_empty() {
            self.list_state.select(Some(featured));
        }
        let frame_time = Duration::from_millis(1000 / u64::from(self.ui.frame_rate.max(1)));

        tracing::debug!("Player started with {} episodes", episodes.len());

        loop {
            while let Ok(event) = events.try_recv() {
                controller.handle_event(event);
            }

            let now = Instant::now();
            controller.tick(now);
            self.refresh_diagnostics(controller, now);
            self.draw(controller, now)?;

            if event::poll(frame_time)? {
                if let Event::Key(key) = event::read()? {
                    if let Some(action) = action_for_key(key) {
                        if action == UiAction::Quit {
                            tracing::debug!("Quit requested");
                            break;
                        }
                        self.apply(controller, action);
                    }
                }
            }
        }

        Ok(())
    }

    fn selected(&self, controller: &PlayerController<impl PlayerBackend>) -> Option<EpisodeId> {
        let index = self.list_state.selected()?;
        controller.episodes().get(index).map(|e| e.id)
    }

    fn apply<B: PlayerBackend>(&mut self, controller: &mut PlayerController<B>, action: UiAction) {
        let count = controller.episodes().len();
        let Some(id) = self.selected(controller) else {
            return;
        };
        let view = controller.view(id).cloned();

        let result = match action {
            UiAction::SelectPrevious => {
                let index = self.list_state.selected().unwrap_or(0);
                self.list_state.select(Some(index.saturating_sub(1)));
                self.diagnostics = None;
                Ok(())
            }
            UiAction::SelectNext => {
                let index = self.list_state.selected().unwrap_or(0);
                self.list_state.select(Some((index + 1).min(count.saturating_sub(1))));
                self.diagnostics = None;
                Ok(())
            }
            UiAction::TogglePlay => controller.toggle_play(id),
            UiAction::ToggleCurrent => controller.toggle_current(),
            UiAction::SeekBy(direction) => {
                let progress = view.map_or(0.0, |v| f64::from(v.progress) / 100.0);
                let fraction = progress + f64::from(direction) * self.ui.seek_step;
                controller.seek(id, fraction.clamp(0.0, 1.0))
            }
            UiAction::SeekTo(tenth) => controller.seek(id, f64::from(tenth) / 10.0),
            UiAction::SeekCurrentBy(direction) => {
                let progress = f64::from(controller.now_playing().progress) / 100.0;
                let fraction = progress + f64::from(direction) * self.ui.seek_step;
                controller.seek_current(fraction.clamp(0.0, 1.0))
            }
            UiAction::VolumeUp | UiAction::VolumeDown => {
                let step = if action == UiAction::VolumeUp {
                    self.ui.volume_step
                } else {
                    -self.ui.volume_step
                };
                let volume = view.map_or(1.0, |v| v.volume) + step;
                let volume = (volume.clamp(0.0, 1.0) * 100.0).round() / 100.0;
                controller.set_volume(id, volume)
            }
            UiAction::ToggleMute => controller.toggle_mute(id),
            UiAction::CycleSpeed => controller.cycle_speed(id),
            UiAction::CycleCurrentSpeed => controller.cycle_current_speed(),
            UiAction::ToggleDiagnostics => {
                self.show_diagnostics = !self.show_diagnostics;
                self.diagnostics = None;
                Ok(())
            }
            UiAction::Quit => Ok(()),
        };

        if let Err(e) = result {
            tracing::debug!("{:?} rejected: {}", action, e);
            self.notice = Some((e.to_string(), Instant::now()));
        }
    }

    fn refresh_diagnostics<B: PlayerBackend>(
        &mut self,
        controller: &mut PlayerController<B>,
        now: Instant,
    ) {
        if !self.show_diagnostics {
            return;
        }
        let stale = self
            .diagnostics
            .as_ref()
            .map_or(true, |(_, at)| now.duration_since(*at) >= DIAGNOSTICS_REFRESH);
        if !stale {
            return;
        }
        self.diagnostics = self
            .selected(controller)
            .and_then(|id| controller.diagnostics(id))
            .map(|d| (d, now));
    }

    fn draw<B: PlayerBackend>(&mut self, controller: &PlayerController<B>, now: Instant) -> Result<()> {
        if self
            .notice
            .as_ref()
            .is_some_and(|(_, at)| at.elapsed() >= NOTICE_TTL)
        {
            self.notice = None;
        }

        let selected = self
            .selected(controller)
            .and_then(|id| controller.episode(id).cloned());
        let notice = self.notice.as_ref().map(|(text, _)| text.clone());
        let diagnostics = if self.show_diagnostics {
            Some(self.diagnostics.as_ref().map(|(d, _)| d.clone()))
        } else {
            None
        };
        let list_state = &mut self.list_state;

        self.terminal.draw(|frame| {
            let area = frame.area();
            frame.render_widget(Block::default().style(Style::default().bg(BG)), area);

            let now_playing = controller.now_playing();
            let bar_height = if now_playing.visible { 3 } else { 0 };
            let [header, body, bar, help] = Layout::vertical([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(bar_height),
                Constraint::Length(1),
            ])
            .areas(area);

            render_header(frame, header, controller.episodes().len());

            let [list_area, card_area] =
                Layout::horizontal([Constraint::Percentage(35), Constraint::Percentage(65)])
                    .areas(body);
            render_list(frame, list_area, controller, list_state);

            if let Some(episode) = &selected {
                if let Some(view) = controller.view(episode.id) {
                    let handle = controller.handle(episode.id);
                    render_card(frame, card_area, episode, view, handle, now);
                }
            }

            if now_playing.visible {
                render_now_playing(frame, bar, now_playing);
            }
            render_help(frame, help, notice.as_deref());

            if let Some(diagnostics) = &diagnostics {
                render_diagnostics(frame, area, diagnostics.as_ref());
            }
        })?;

        Ok(())
    }

    /// Leaves the alternate screen. Safe to call more than once.
    ///
    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> Result<()> {
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

impl Drop for PodwaveTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn render_header(frame: &mut Frame, area: Rect, count: usize) {
    let line = Line::from(vec![
        Span::styled(" podwave ", Style::default().fg(BG).bg(ACCENT).bold()),
        Span::styled(format!("  {count} episodes"), Style::default().fg(DIM_FG)),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn render_list<B: PlayerBackend>(
    frame: &mut Frame,
    area: Rect,
    controller: &PlayerController<B>,
    list_state: &mut ListState,
) {
    let items: Vec<ListItem> = controller
        .episodes()
        .iter()
        .map(|episode| {
            let glyph = controller
                .view(episode.id)
                .map_or(PlayGlyph::Play, |v| v.glyph);
            let glyph_style = match glyph {
                PlayGlyph::Pause => Style::default().fg(ACCENT),
                PlayGlyph::Error => Style::default().fg(ERROR_FG),
                PlayGlyph::Play => Style::default().fg(DIM_FG),
            };
            let mut title = vec![
                Span::styled(format!("{} ", glyph_symbol(glyph)), glyph_style),
                Span::styled(episode.title.clone(), Style::default().fg(FG)),
            ];
            if episode.featured {
                title.push(Span::styled(" ★", Style::default().fg(ACCENT)));
            }
            if episode.popular {
                title.push(Span::styled(" ↑", Style::default().fg(SECONDARY)));
            }
            let meta = Line::from(Span::styled(
                format!("  {} · {}", format_date(&episode.date), episode.duration),
                Style::default().fg(DIM_FG),
            ));
            ListItem::new(vec![Line::from(title), meta])
        })
        .collect();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::RIGHT)
                .border_style(Style::default().fg(DIM_FG))
                .padding(Padding::horizontal(1)),
        )
        .highlight_style(Style::default().bg(HIGHLIGHT_BG))
        .highlight_spacing(HighlightSpacing::Always)
        .highlight_symbol("│");

    frame.render_stateful_widget(list, area, list_state);
}

fn render_card(
    frame: &mut Frame,
    area: Rect,
    episode: &Episode,
    view: &EpisodeView,
    handle: Option<&Visualization>,
    now: Instant,
) {
    let inner = Block::default().padding(Padding::new(2, 2, 1, 0)).inner(area);
    let [title_area, description_area, viz_area, progress_area, controls_area] =
        Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(4),
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .areas(inner);

    let title = vec![
        Line::from(Span::styled(episode.title.clone(), Style::default().fg(FG).bold())),
        Line::from(Span::styled(
            format_date(&episode.date),
            Style::default().fg(DIM_FG),
        )),
    ];
    frame.render_widget(Paragraph::new(title), title_area);

    frame.render_widget(
        Paragraph::new(episode.description.clone())
            .style(Style::default().fg(SECONDARY))
            .wrap(Wrap { trim: true }),
        description_area,
    );

    render_visualization(frame, viz_area, view, handle, now);

    let ratio = f64::from(view.progress / 100.0).clamp(0.0, 1.0);
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(ACCENT).bg(HIGHLIGHT_BG))
        .ratio(ratio)
        .label(format!("{} / {}", view.current_label, view.duration_label));
    frame.render_widget(gauge, progress_area);

    let mut controls = vec![
        Span::styled(
            format!("{} ", glyph_symbol(view.glyph)),
            Style::default().fg(if view.errored { ERROR_FG } else { ACCENT }),
        ),
        Span::styled(volume_label(view), Style::default().fg(FG)),
        Span::styled(format!("   {}", view.speed), Style::default().fg(FG)),
    ];
    if view.loading {
        controls.push(Span::styled("   loading waveform…", Style::default().fg(DIM_FG)));
    }
    let mut lines = vec![Line::from(controls)];
    if view.errored {
        lines.push(Line::from(Span::styled(
            "Audio failed to load",
            Style::default().fg(ERROR_FG),
        )));
    } else if let Some(message) = &view.play_error {
        lines.push(Line::from(Span::styled(
            message.clone(),
            Style::default().fg(ERROR_FG),
        )));
    }
    frame.render_widget(Paragraph::new(lines), controls_area);
}

fn render_visualization(
    frame: &mut Frame,
    area: Rect,
    view: &EpisodeView,
    handle: Option<&Visualization>,
    now: Instant,
) {
    let width = area.width as usize;
    let style = Style::default().bg(BG).fg(ACCENT);

    match handle {
        Some(Visualization::Bars(_)) => {
            let heights = handle.and_then(|h| h.bar_heights(now)).unwrap_or([0.0; 64]);
            let data = resample(&heights, width, 1.0);
            frame.render_widget(Sparkline::default().data(&data).max(100).style(style), area);
        }
        Some(Visualization::Waveform(_)) => {
            let Some(peaks) = handle.and_then(Visualization::peaks) else {
                return;
            };
            let data = resample(&peaks, width, 100.0);
            // Played part in the accent colour, the rest dimmed.
            let played = ((f32::from(area.width) * view.progress / 100.0).round() as u16).min(area.width);
            let [left, right] =
                Layout::horizontal([Constraint::Length(played), Constraint::Min(0)]).areas(area);
            let split = played as usize;
            frame.render_widget(
                Sparkline::default().data(&data[..split]).max(100).style(style),
                left,
            );
            frame.render_widget(
                Sparkline::default()
                    .data(&data[split..])
                    .max(100)
                    .style(Style::default().bg(BG).fg(DIM_FG)),
                right,
            );
        }
        None => {}
    }
}

fn render_now_playing(frame: &mut Frame, area: Rect, bar: &NowPlayingBar) {
    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(DIM_FG));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [info_area, gauge_area] = Layout::vertical([Constraint::Length(1), Constraint::Length(1)]).areas(inner);
    let glyph = bar.glyph.map_or(" ", glyph_symbol);
    let info = Line::from(vec![
        Span::styled(format!(" {glyph} "), Style::default().fg(ACCENT)),
        Span::styled(bar.title.clone(), Style::default().fg(FG).bold()),
        Span::styled(
            format!("  {} / {}  {}", bar.current_label, bar.duration_label, bar.speed),
            Style::default().fg(SECONDARY),
        ),
    ]);
    frame.render_widget(Paragraph::new(info), info_area);

    let ratio = f64::from(bar.progress / 100.0).clamp(0.0, 1.0);
    frame.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(SECONDARY).bg(HIGHLIGHT_BG))
            .ratio(ratio)
            .label(""),
        gauge_area,
    );
}

fn render_help(frame: &mut Frame, area: Rect, notice: Option<&str>) {
    let line = match notice {
        Some(text) => Line::from(Span::styled(format!(" {text}"), Style::default().fg(ERROR_FG))),
        None => Line::from(Span::styled(
            " ↑↓ select  ⏎ play  p now playing  ←→ seek  [] seek current  0-9 jump  +- volume  m mute  s/S speed  d details  q quit",
            Style::default().fg(DIM_FG),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_diagnostics(frame: &mut Frame, area: Rect, diagnostics: Option<&EpisodeDiagnostics>) {
    let width = area.width.saturating_sub(8).min(72);
    let height = area.height.saturating_sub(4).min(14);
    let popup = Rect {
        x: area.x + (area.width.saturating_sub(width)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width,
        height,
    };

    let lines = diagnostics.map_or_else(
        || vec![Line::from("No episode selected")],
        diagnostic_lines,
    );

    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().fg(FG).bg(HIGHLIGHT_BG))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" audio diagnostics ")
                    .padding(Padding::horizontal(1)),
            )
            .wrap(Wrap { trim: false }),
        popup,
    );
}

fn diagnostic_lines(d: &EpisodeDiagnostics) -> Vec<Line<'static>> {
    let media = &d.media;
    let mut lines = vec![
        Line::from(format!("episode       {}", d.episode)),
        Line::from(format!("source        {}", media.source)),
        Line::from(format!(
            "position      {:.1}s / {}",
            media.current_time,
            media
                .duration
                .map_or_else(|| "unknown".to_string(), |s| format!("{s:.1}s"))
        )),
        Line::from(format!(
            "state         {}{}",
            if media.paused { "paused" } else { "playing" },
            if media.loaded { "" } else { ", not loaded" }
        )),
        Line::from(format!(
            "volume/rate   {:.2} / {:.2}x",
            media.volume, media.playback_rate
        )),
        Line::from(format!("visualization {:?}", d.visualization)),
    ];
    if let Some(state) = &d.visualizer {
        lines.push(Line::from(format!("engine        {state:?}")));
    }
    match &d.analyzer {
        Some(info) => lines.push(Line::from(format!(
            "analyser      fft {} / {} bins, smoothing {:.2}, {}s ago",
            info.fft_size,
            info.bin_count,
            info.smoothing,
            info.connected_at.elapsed().as_secs()
        ))),
        None => lines.push(Line::from("analyser      not connected")),
    }
    if let Some(probe) = &d.probe {
        lines.push(Line::from(format!(
            "frequency     {} bins, {:?}, {}",
            probe.buffer_len,
            probe.context_state,
            if probe.all_zero { "all zero" } else { "has data" }
        )));
        lines.push(Line::from(format!("first bins    {:?}", probe.first_bins)));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(action_for_key(key(KeyCode::Char('j'))), Some(UiAction::SelectNext));
        assert_eq!(action_for_key(key(KeyCode::Up)), Some(UiAction::SelectPrevious));
        assert_eq!(action_for_key(key(KeyCode::Char(' '))), Some(UiAction::TogglePlay));
        assert_eq!(action_for_key(key(KeyCode::Enter)), Some(UiAction::TogglePlay));
        assert_eq!(action_for_key(key(KeyCode::Left)), Some(UiAction::SeekBy(-1)));
        assert_eq!(action_for_key(key(KeyCode::Char('7'))), Some(UiAction::SeekTo(7)));
        assert_eq!(action_for_key(key(KeyCode::Char('s'))), Some(UiAction::CycleSpeed));
        assert_eq!(
            action_for_key(KeyEvent::new(KeyCode::Char('S'), KeyModifiers::SHIFT)),
            Some(UiAction::CycleCurrentSpeed)
        );
        assert_eq!(action_for_key(key(KeyCode::Char('['))), Some(UiAction::SeekCurrentBy(-1)));
        assert_eq!(action_for_key(key(KeyCode::Char(']'))), Some(UiAction::SeekCurrentBy(1)));
        assert_eq!(action_for_key(key(KeyCode::Esc)), Some(UiAction::Quit));
        assert_eq!(
            action_for_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(UiAction::Quit)
        );
        assert_eq!(action_for_key(key(KeyCode::Char('x'))), None);
    }

    #[test]
    fn test_key_release_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(action_for_key(release), None);
    }

    #[test]
    fn test_resample_stretches_and_squeezes() {
        assert_eq!(resample(&[10.0, 50.0], 4, 1.0), vec![10, 10, 50, 50]);
        assert_eq!(resample(&[0.1, 0.2, 0.3, 0.4], 2, 100.0), vec![10, 30]);
        assert_eq!(resample(&[], 3, 1.0), vec![0, 0, 0]);
        assert_eq!(resample(&[f32::NAN, -1.0], 2, 1.0), vec![0, 0]);
    }

    #[test]
    fn test_volume_label() {
        let mut view = EpisodeView {
            glyph: PlayGlyph::Play,
            is_playing: false,
            loading: false,
            errored: false,
            play_error: None,
            disabled: false,
            progress: 0.0,
            current_label: "0:00".to_string(),
            duration_label: "30:00".to_string(),
            volume: 0.0,
            volume_icon: VolumeIcon::Muted,
            last_volume: None,
            speed: Default::default(),
        };
        assert_eq!(volume_label(&view), "🔇   0%");
        view.volume = 0.75;
        view.volume_icon = VolumeIcon::High;
        assert_eq!(volume_label(&view), "🔊  75%");
    }
}
