use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, MouseButton,
        MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::warn;
use ratatui::{
    prelude::*,
    widgets::{
        block::{Position, Title},
        canvas::{self, Canvas, Points},
        *,
    },
    Terminal,
};
use std::{
    io,
    time::{Duration, Instant},
};

use crate::{
    affect_mapper::{AffectInputEvent, Quadrant},
    export::{ExportEngine, ExportTarget},
    gui::error::LoggerGuiError,
    session::SessionState,
    session_controller::{ClickOutcome, CommandOutcome, ReadyNotice, SessionController},
    stimulus::StimulusSource,
};

const TICK_RATE: Duration = Duration::from_millis(250);

/// State behind the logging screen.
pub struct LoggingApp<'a, S>
where
    S: StimulusSource,
{
    controller: SessionController<S>,
    engine: &'a ExportEngine,
    target: &'a ExportTarget,
    notice: ReadyNotice,
    status: String,
    grid_area: Rect,
}

impl<'a, S> LoggingApp<'a, S>
where
    S: StimulusSource,
{
    /// Wraps a controller. A stimulus is loaded if none is yet.
    pub fn new(
        mut controller: SessionController<S>,
        engine: &'a ExportEngine,
        target: &'a ExportTarget,
    ) -> Self {
        controller.ensure_stimulus();
        Self {
            controller,
            engine,
            target,
            notice: ReadyNotice::new(),
            status: "Press <S> to start logging".to_owned(),
            grid_area: Rect::default(),
        }
    }

    /// The controller, for inspection once the screen has closed.
    pub fn controller(&self) -> &SessionController<S> {
        &self.controller
    }

    /// The message shown at the bottom of the screen.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Handles a key press. Returns `true` when the screen should close.
    pub fn on_key(&mut self, code: KeyCode, now: Instant) -> Result<bool, LoggerGuiError> {
        let outcome = match code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('s') => self.controller.start_logging(now),
            KeyCode::Char('t') => self.controller.stop_logging(),
            KeyCode::Char('r') => self.controller.reset_log(),
            KeyCode::Char('n') => {
                self.export_if_logged()?;
                self.controller.advance_stimulus()
            }
            KeyCode::Char('e') => {
                self.export()?;
                return Ok(false);
            }
            _ => return Ok(false),
        };

        self.status = match outcome {
            CommandOutcome::Applied(state) => format!("Now {}", state),
            CommandOutcome::Ignored(_, reason) => format!("Ignored: {}", reason),
        };
        Ok(false)
    }

    /// Handles a left click at a terminal cell.
    pub fn on_click(&mut self, column: u16, row: u16, now: Instant) {
        let Some(event) = cell_event(self.grid_area, column, row) else {
            return;
        };
        match self.controller.click(&event, now) {
            Ok(ClickOutcome::Logged(sample)) => {
                self.status = format!(
                    "Logged valence {} arousal {} ({})",
                    sample.valence(),
                    sample.arousal(),
                    sample.quadrant()
                );
            }
            Ok(ClickOutcome::Duplicate) => self.status = "Same point as before".to_owned(),
            Ok(ClickOutcome::Ignored(reason)) => self.status = format!("Ignored: {}", reason),
            Err(e) => warn!("Click at ({}, {}) rejected: {}", column, row, e),
        }
    }

    /// Advisory refresh, only reads the session.
    pub fn on_tick(&mut self, now: Instant) {
        if self.notice.check(&self.controller, now) {
            self.status = "Target duration reached, ready for export <E>".to_owned();
        }
    }

    fn export(&mut self) -> Result<(), LoggerGuiError> {
        self.status = match self.target.export_current(&self.controller, self.engine)? {
            Some(paths) => format!("Exported {}", paths.table.display()),
            None => "Nothing to export".to_owned(),
        };
        Ok(())
    }

    fn export_if_logged(&mut self) -> Result<(), LoggerGuiError> {
        if self.controller.state() == SessionState::Completed
            || self.controller.session().samples().is_empty()
        {
            return Ok(());
        }
        self.export()
    }
}

/// Converts a terminal cell inside `area` to a click on a surface the size
/// of `area`, taking the centre of the cell.
pub fn cell_event(area: Rect, column: u16, row: u16) -> Option<AffectInputEvent> {
    let inside = column >= area.x
        && column < area.x + area.width
        && row >= area.y
        && row < area.y + area.height;
    inside.then(|| AffectInputEvent {
        pixel_x: (column - area.x) as f64 + 0.5,
        pixel_y: (row - area.y) as f64 + 0.5,
        width: area.width as f64,
        height: area.height as f64,
    })
}

fn quadrant_color(quadrant: Quadrant) -> Color {
    match quadrant {
        Quadrant::Green => Color::Green,
        Quadrant::Yellow => Color::Yellow,
        Quadrant::Red => Color::Red,
        Quadrant::Blue => Color::Blue,
    }
}

/// Runs the logging screen until the participant quits. Returns the
/// controller so the caller can report on the session.
pub fn logging_screen<S>(
    controller: SessionController<S>,
    engine: &ExportEngine,
    target: &ExportTarget,
) -> Result<SessionController<S>, LoggerGuiError>
where
    S: StimulusSource,
{
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = LoggingApp::new(controller, engine, target);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    res.map(|_| app.controller)
}

fn run_app<B, S>(terminal: &mut Terminal<B>, app: &mut LoggingApp<S>) -> Result<(), LoggerGuiError>
where
    B: Backend,
    S: StimulusSource,
{
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.on_key(key.code, Instant::now())? {
                        return Ok(());
                    }
                }
                Event::Mouse(MouseEvent {
                    kind: MouseEventKind::Down(MouseButton::Left),
                    column,
                    row,
                    ..
                }) => app.on_click(column, row, Instant::now()),
                _ => {}
            }
        }
        if last_tick.elapsed() >= TICK_RATE {
            app.on_tick(Instant::now());
            last_tick = Instant::now();
        }
    }
}

fn ui<S: StimulusSource>(f: &mut Frame, app: &mut LoggingApp<S>) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
        ])
        .split(f.size());

    let controller = &app.controller;
    let now = Instant::now();

    let header = match controller.current_stimulus() {
        Some(stimulus) => format!(
            "{}  [{}]  play: {}",
            stimulus.id,
            controller.state(),
            stimulus.location
        ),
        None => format!("[{}]", controller.state()),
    };
    let header = Paragraph::new(header).block(
        Block::default()
            .title(Title::from(" Emotion Logger ".magenta().bold()).alignment(Alignment::Center))
            .borders(Borders::ALL),
    );
    f.render_widget(header, layout[0]);

    let progress = controller.progress(now);
    let gauge = Gauge::default()
        .block(Block::default().title(" Progress ").borders(Borders::ALL))
        .gauge_style(Style::default().fg(Color::Magenta))
        .ratio(progress.and_then(|p| p.fraction()).unwrap_or(0.0))
        .label(
            progress
                .map(|p| p.to_string())
                .unwrap_or_else(|| "not logging".to_owned()),
        );
    f.render_widget(gauge, layout[1]);

    let grid_block = Block::default()
        .title(format!(" {} samples ", controller.session().samples().len()))
        .borders(Borders::ALL);
    app.grid_area = grid_block.inner(layout[2]);

    let quadrants = [
        Quadrant::Green,
        Quadrant::Yellow,
        Quadrant::Red,
        Quadrant::Blue,
    ];
    let coords: Vec<Vec<(f64, f64)>> = quadrants
        .iter()
        .map(|q| {
            controller
                .session()
                .samples()
                .samples()
                .iter()
                .filter(|s| s.quadrant() == *q)
                .map(|s| (s.valence(), s.arousal()))
                .collect()
        })
        .collect();

    let grid = Canvas::default()
        .block(grid_block)
        .marker(symbols::Marker::Braille)
        .x_bounds([-1.0, 1.0])
        .y_bounds([-1.0, 1.0])
        .paint(|ctx| {
            ctx.draw(&canvas::Line {
                x1: -1.0,
                y1: 0.0,
                x2: 1.0,
                y2: 0.0,
                color: Color::DarkGray,
            });
            ctx.draw(&canvas::Line {
                x1: 0.0,
                y1: -1.0,
                x2: 0.0,
                y2: 1.0,
                color: Color::DarkGray,
            });
            ctx.print(0.55, 0.9, "pleasant, activated".green());
            ctx.print(-0.95, 0.9, "unpleasant, activated".yellow());
            ctx.print(-0.95, -0.9, "unpleasant, calm".red());
            ctx.print(0.55, -0.9, "pleasant, calm".blue());
            ctx.layer();
            for (q, c) in quadrants.iter().zip(&coords) {
                ctx.draw(&Points {
                    coords: c.as_slice(),
                    color: quadrant_color(*q),
                });
            }
        });
    f.render_widget(grid, layout[2]);

    let instructions = Title::from(Line::from(vec![
        " Start ".into(),
        "<S>".magenta().bold(),
        " Stop ".into(),
        "<T>".magenta().bold(),
        " Reset ".into(),
        "<R>".magenta().bold(),
        " Next ".into(),
        "<N>".magenta().bold(),
        " Export ".into(),
        "<E>".magenta().bold(),
        " Quit ".into(),
        "<Q> ".magenta().bold(),
    ]));
    let footer = Paragraph::new(app.status.as_str()).block(
        Block::default()
            .title(
                instructions
                    .alignment(Alignment::Center)
                    .position(Position::Bottom),
            )
            .borders(Borders::ALL),
    );
    f.render_widget(footer, layout[3]);
}
