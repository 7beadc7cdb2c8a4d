//! Runs a session from a script of [ScriptCommand]s instead of a live
//! front-end.
//!
//! Time in a script only moves on `wait`, so every elapsed time in the
//! exported tables is exactly what the script says. The exports of a
//! stimulus are written whenever the script leaves it with samples logged
//! (`next`, `select`), on every `export`, and once more at the end.

use crate::{
    affect_mapper::AffectInputEvent,
    export::{ExportEngine, ExportError, ExportPaths, ExportTarget},
    input_event_decoder::{meaningful, ScriptCommand},
    session::SessionState,
    session_controller::{ClickOutcome, CommandOutcome, SessionController},
    stimulus::StimulusSource,
};
use log::{debug, info, warn};
use std::{
    borrow::Cow,
    fmt, fs, io,
    path::Path,
    time::Instant,
};

/// Errors that stop a replay.
#[derive(Debug)]
pub enum ScriptError {
    /// Returned when a line is not a valid command.
    Parse {
        /// 1-based line number
        line: usize,
        /// The part of the line that could not be decoded
        input: String,
    },

    /// Returned when the script cannot be read.
    IoError(io::Error),

    /// Returned when writing exports fails.
    ExportError(ExportError),

    /// Returned when a `wait` moves the clock past what [Instant] can hold.
    ClockOverflow {
        /// 1-based line number of the `wait`
        line: usize,
    },
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ScriptError::Parse { line, input } => {
                Cow::from(format!("line {}: cannot decode {:?}", line, input))
            }
            ScriptError::IoError(error) => Cow::from(format!("io error: {}", error)),
            ScriptError::ExportError(error) => Cow::from(format!("export error: {}", error)),
            ScriptError::ClockOverflow { line } => {
                Cow::from(format!("line {}: wait runs past the end of the clock", line))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ScriptError {}

impl From<io::Error> for ScriptError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<ExportError> for ScriptError {
    fn from(value: ExportError) -> Self {
        Self::ExportError(value)
    }
}

/// Decodes a whole script, with the line number of each command.
pub fn parse_script(text: &str) -> Result<Vec<(usize, ScriptCommand)>, ScriptError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| meaningful(line).map(|l| (i + 1, l)))
        .map(|(line, l)| {
            l.parse::<ScriptCommand>()
                .map(|cmd| (line, cmd))
                .map_err(|e| ScriptError::Parse {
                    line,
                    input: e.input,
                })
        })
        .collect()
}

/// Counts of what happened during a replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplaySummary {
    /// Commands executed
    pub commands: usize,
    /// Commands the controller ignored
    pub ignored: usize,
    /// Clicks appended as samples
    pub logged: usize,
    /// Clicks that could not be mapped
    pub rejected: usize,
    /// Files written, in order
    pub exports: Vec<ExportPaths>,
}

/// Feeds commands to a [SessionController] against a virtual clock.
pub struct ScriptRunner<'a, S>
where
    S: StimulusSource,
{
    controller: &'a mut SessionController<S>,
    engine: &'a ExportEngine,
    target: &'a ExportTarget,
    clock: Instant,
    summary: ReplaySummary,
}

impl<'a, S> ScriptRunner<'a, S>
where
    S: StimulusSource,
{
    /// A runner whose clock starts now.
    pub fn new(
        controller: &'a mut SessionController<S>,
        engine: &'a ExportEngine,
        target: &'a ExportTarget,
    ) -> Self {
        Self {
            controller,
            engine,
            target,
            clock: Instant::now(),
            summary: ReplaySummary::default(),
        }
    }

    /// Reads and runs the script at `path`.
    pub fn run_file(self, path: impl AsRef<Path>) -> Result<ReplaySummary, ScriptError> {
        let text = fs::read_to_string(path)?;
        self.run(&text)
    }

    /// Runs a script. Nothing is executed if any line fails to decode.
    pub fn run(mut self, script: &str) -> Result<ReplaySummary, ScriptError> {
        let commands = parse_script(script)?;
        self.controller.ensure_stimulus();

        for (line, command) in commands {
            self.step(line, &command)?;
        }

        self.export_if_logged()?;
        info!(
            "Replay finished: {} commands, {} samples logged, {} ignored",
            self.summary.commands, self.summary.logged, self.summary.ignored
        );
        Ok(self.summary)
    }

    fn step(&mut self, line: usize, command: &ScriptCommand) -> Result<(), ScriptError> {
        self.summary.commands += 1;
        let now = self.clock;

        let outcome = match command {
            ScriptCommand::Start => self.controller.start_logging(now),
            ScriptCommand::Stop => self.controller.stop_logging(),
            ScriptCommand::Reset => self.controller.reset_log(),
            ScriptCommand::Next => {
                self.export_if_logged()?;
                self.controller.advance_stimulus()
            }
            ScriptCommand::Select(index) => {
                if self.controller.session().stimulus().map(|s| s.index) != Some(*index) {
                    self.export_if_logged()?;
                }
                self.controller.select_stimulus(*index)
            }
            ScriptCommand::Export => {
                self.export()?;
                return Ok(());
            }
            ScriptCommand::Wait(d) => {
                self.clock = self
                    .clock
                    .checked_add(*d)
                    .ok_or(ScriptError::ClockOverflow { line })?;
                return Ok(());
            }
            ScriptCommand::Click { x, y, surface } => {
                self.click(line, *x, *y, *surface);
                return Ok(());
            }
        };

        if let CommandOutcome::Ignored(_, reason) = outcome {
            debug!("line {}: {:?} ignored, {}", line, command, reason);
            self.summary.ignored += 1;
        }
        Ok(())
    }

    fn click(&mut self, line: usize, x: f64, y: f64, surface: Option<(f64, f64)>) {
        let (width, height) = surface.unwrap_or_else(|| {
            let (w, h) = self.engine.dimensions();
            (w as f64, h as f64)
        });
        let event = AffectInputEvent {
            pixel_x: x,
            pixel_y: y,
            width,
            height,
        };

        match self.controller.click(&event, self.clock) {
            Ok(ClickOutcome::Logged(_)) => self.summary.logged += 1,
            Ok(ClickOutcome::Duplicate) => {}
            Ok(ClickOutcome::Ignored(_)) => self.summary.ignored += 1,
            Err(e) => {
                warn!("line {}: click rejected, {}", line, e);
                self.summary.rejected += 1;
            }
        }
    }

    fn export(&mut self) -> Result<(), ScriptError> {
        if let Some(paths) = self.target.export_current(&*self.controller, self.engine)? {
            self.summary.exports.push(paths);
        }
        Ok(())
    }

    fn export_if_logged(&mut self) -> Result<(), ScriptError> {
        if self.controller.state() == SessionState::Completed
            || self.controller.session().samples().is_empty()
        {
            return Ok(());
        }
        self.export()
    }
}
