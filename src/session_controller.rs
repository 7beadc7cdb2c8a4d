//! The `SessionController` is the only thing that changes a [Session]. Every
//! command runs to completion and reports the state it left the session in.
//!
//! ```text
//!   NoStimulus ──── advance / select ────▶ StimulusLoaded(Inactive) ◀─┐
//!                                            │        ▲               │
//!                                      start │        │ stop, reset   │
//!                                            ▼        │               │
//!                                         StimulusLoaded(Active) ─────┘
//!                                                        advance, select
//!                                                        (next stimulus)
//!   StimulusLoaded(_) ── advance, nothing remains ──▶ Completed
//! ```
//!
//! Commands that make no sense in the current state are ignored rather than
//! treated as errors, so a front-end can forward every button press without
//! checking first.

use crate::{
    affect_mapper::{AffectInputEvent, MapError},
    sample_store::{DedupPolicy, Sample, SampleSnapshot},
    session::{LoadedStimulus, Logging, Progress, Session, SessionState},
    stimulus::{DrawOrder, Stimulus, StimulusDrawer, StimulusSource},
};
use log::{debug, info, warn};
use std::{
    fmt,
    time::{Duration, Instant},
};

/// Knobs that change how the controller treats clicks and stimuli.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOptions {
    /// Drop a sample identical to the previous one
    pub dedup: DedupPolicy,
    /// Clamp mapped points into `[-1, 1]`
    pub clamp_to_grid: bool,
    /// Length after which the session counts as ready for export
    pub log_duration: Option<Duration>,
    /// How the next stimulus is drawn
    pub draw_order: DrawOrder,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            dedup: DedupPolicy::KeepAll,
            clamp_to_grid: false,
            log_duration: Some(Duration::from_secs(180)),
            draw_order: DrawOrder::Sequential,
        }
    }
}

/// Why a command did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No stimulus is loaded
    NoStimulus,
    /// Logging was already running
    AlreadyLogging,
    /// Logging is not running
    NotLogging,
    /// Every stimulus has been presented
    Completed,
    /// The requested stimulus is the one already loaded
    SameStimulus,
    /// There is no stimulus at this index
    NoSuchStimulus(usize),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IgnoreReason::NoStimulus => write!(f, "no stimulus loaded"),
            IgnoreReason::AlreadyLogging => write!(f, "already logging"),
            IgnoreReason::NotLogging => write!(f, "logging is not active"),
            IgnoreReason::Completed => write!(f, "all stimuli completed"),
            IgnoreReason::SameStimulus => write!(f, "stimulus already loaded"),
            IgnoreReason::NoSuchStimulus(i) => write!(f, "no stimulus number {}", i + 1),
        }
    }
}

/// What a command did, and the state it left the session in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The command changed the session
    Applied(SessionState),
    /// The command was a no-op
    Ignored(SessionState, IgnoreReason),
}

impl CommandOutcome {
    /// The session state after the command.
    pub fn state(&self) -> SessionState {
        match self {
            CommandOutcome::Applied(state) | CommandOutcome::Ignored(state, _) => *state,
        }
    }

    /// Whether the command changed anything.
    pub fn applied(&self) -> bool {
        matches!(self, CommandOutcome::Applied(_))
    }
}

/// What became of a click.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// The click was appended as this sample
    Logged(Sample),
    /// The click repeated the previous sample and was dropped
    Duplicate,
    /// Logging was not active
    Ignored(IgnoreReason),
}

/// Drives a [Session] using stimuli from a [StimulusSource].
pub struct SessionController<S>
where
    S: StimulusSource,
{
    session: Session,
    source: S,
    drawer: StimulusDrawer,
    options: ControllerOptions,
}

impl<S> SessionController<S>
where
    S: StimulusSource,
{
    /// A controller with a fresh session and nothing loaded yet.
    pub fn new(source: S, options: ControllerOptions) -> Self {
        Self {
            session: Session::new(options.dedup),
            source,
            drawer: StimulusDrawer::new(options.draw_order),
            options,
        }
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// The stimulus source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The options the controller was built with.
    pub fn options(&self) -> &ControllerOptions {
        &self.options
    }

    /// The loaded stimulus, looked up in the source.
    pub fn current_stimulus(&self) -> Option<&Stimulus> {
        self.session
            .stimulus
            .as_ref()
            .and_then(|loaded| self.source.stimuli().get(loaded.index))
    }

    /// A copy of the samples for export.
    pub fn snapshot(&self) -> SampleSnapshot {
        self.session.samples.snapshot()
    }

    /// Loads a stimulus if none is assigned yet.
    pub fn ensure_stimulus(&mut self) -> CommandOutcome {
        match self.state() {
            SessionState::NoStimulus => self.draw_next(None),
            SessionState::Completed => self.ignored(IgnoreReason::Completed),
            SessionState::StimulusLoaded(_) => self.ignored(IgnoreReason::SameStimulus),
        }
    }

    /// Starts recording clicks.
    pub fn start_logging(&mut self, now: Instant) -> CommandOutcome {
        match self.state() {
            SessionState::StimulusLoaded(Logging::Inactive) => {
                self.session.logging_active = true;
                self.session.logging_started_at = Some(now);
                info!("Logging started for {}", self.stimulus_label());
                self.applied()
            }
            SessionState::StimulusLoaded(Logging::Active) => {
                self.ignored(IgnoreReason::AlreadyLogging)
            }
            SessionState::NoStimulus => self.ignored(IgnoreReason::NoStimulus),
            SessionState::Completed => self.ignored(IgnoreReason::Completed),
        }
    }

    /// Stops recording clicks. Samples already taken are kept.
    pub fn stop_logging(&mut self) -> CommandOutcome {
        match self.state() {
            SessionState::StimulusLoaded(Logging::Active) => {
                self.session.logging_active = false;
                info!(
                    "Logging stopped for {} with {} samples",
                    self.stimulus_label(),
                    self.session.samples.len()
                );
                self.applied()
            }
            SessionState::StimulusLoaded(Logging::Inactive) => {
                self.ignored(IgnoreReason::NotLogging)
            }
            SessionState::NoStimulus => self.ignored(IgnoreReason::NoStimulus),
            SessionState::Completed => self.ignored(IgnoreReason::Completed),
        }
    }

    /// Discards every sample and stops logging.
    pub fn reset_log(&mut self) -> CommandOutcome {
        match self.state() {
            SessionState::StimulusLoaded(_) => {
                self.session.logging_active = false;
                self.session.samples.clear();
                info!("Log cleared for {}", self.stimulus_label());
                self.applied()
            }
            SessionState::NoStimulus => self.ignored(IgnoreReason::NoStimulus),
            SessionState::Completed => self.ignored(IgnoreReason::Completed),
        }
    }

    /// Marks the loaded stimulus as completed and loads the next one. When
    /// nothing remains the session becomes [SessionState::Completed] and
    /// the samples of the last stimulus are left in place.
    pub fn advance_stimulus(&mut self) -> CommandOutcome {
        match self.state() {
            SessionState::Completed => self.ignored(IgnoreReason::Completed),
            SessionState::NoStimulus => self.draw_next(None),
            SessionState::StimulusLoaded(_) => {
                let current = self.session.stimulus.clone();
                if let Some(LoadedStimulus { index, id }) = &current {
                    self.source.mark_completed(id);
                    self.session.completed_stimuli.insert(id.clone());
                    info!("Completed {}", id);
                    self.draw_next(Some(*index))
                } else {
                    self.draw_next(None)
                }
            }
        }
    }

    /// Loads the stimulus at `index` in the source's listing directly.
    pub fn select_stimulus(&mut self, index: usize) -> CommandOutcome {
        if self.state() == SessionState::Completed {
            return self.ignored(IgnoreReason::Completed);
        }
        if index >= self.source.stimuli().len() {
            return self.ignored(IgnoreReason::NoSuchStimulus(index));
        }
        if self.session.stimulus.as_ref().map(|s| s.index) == Some(index) {
            return self.ignored(IgnoreReason::SameStimulus);
        }

        self.load(index);
        self.applied()
    }

    /// Records a click as a sample if logging is active.
    ///
    /// Returns an error, and appends nothing, if the click cannot be mapped.
    pub fn click(
        &mut self,
        event: &AffectInputEvent,
        now: Instant,
    ) -> Result<ClickOutcome, MapError> {
        let (stimulus_id, started_at) = match (self.state(), &self.session.stimulus) {
            (SessionState::StimulusLoaded(Logging::Active), Some(loaded)) => (
                loaded.id.clone(),
                self.session.logging_started_at.unwrap_or(now),
            ),
            (SessionState::Completed, _) => {
                return Ok(ClickOutcome::Ignored(IgnoreReason::Completed))
            }
            (SessionState::NoStimulus, _) => {
                return Ok(ClickOutcome::Ignored(IgnoreReason::NoStimulus))
            }
            _ => {
                debug!("Ignoring click while logging is inactive");
                return Ok(ClickOutcome::Ignored(IgnoreReason::NotLogging));
            }
        };

        let (point, _) = event.map().map_err(|e| {
            warn!("Rejected click: {}", e);
            e
        })?;
        let point = if self.options.clamp_to_grid {
            point.clamped()
        } else {
            point
        };

        let elapsed = now.saturating_duration_since(started_at);
        let sample = Sample::new(elapsed, stimulus_id, point);

        if self.session.samples.append(sample.clone()) {
            debug!(
                "Logged valence={} arousal={} quadrant={}",
                sample.valence(),
                sample.arousal(),
                sample.quadrant()
            );
            Ok(ClickOutcome::Logged(sample))
        } else {
            Ok(ClickOutcome::Duplicate)
        }
    }

    /// Elapsed time and target while logging is active. This reads the
    /// session and never changes it.
    pub fn progress(&self, now: Instant) -> Option<Progress> {
        self.session.elapsed(now).map(|elapsed| Progress {
            elapsed,
            target: self.options.log_duration,
        })
    }

    fn draw_next(&mut self, current: Option<usize>) -> CommandOutcome {
        match self.drawer.pick(&self.source, current) {
            Some(index) => {
                self.load(index);
                self.applied()
            }
            None => {
                self.session.logging_active = false;
                self.session.finished = true;
                info!(
                    "All {} stimuli completed",
                    self.session.completed_stimuli.len()
                );
                self.applied()
            }
        }
    }

    fn load(&mut self, index: usize) {
        let id = self.source.stimuli()[index].id.clone();
        info!("Loaded stimulus {} ({})", index + 1, id);
        self.session.stimulus = Some(LoadedStimulus { index, id });
        self.session.samples.clear();
        self.session.logging_active = false;
        self.session.logging_started_at = None;
    }

    fn stimulus_label(&self) -> &str {
        self.session.stimulus_id().unwrap_or("<none>")
    }

    fn applied(&self) -> CommandOutcome {
        CommandOutcome::Applied(self.state())
    }

    fn ignored(&self, reason: IgnoreReason) -> CommandOutcome {
        debug!("Ignoring command: {}", reason);
        CommandOutcome::Ignored(self.state(), reason)
    }
}

/// Fires once per logging period when the configured duration is reached.
///
/// Kept outside the controller so that polling it from a refresh timer
/// cannot change the session.
#[derive(Debug, Clone, Default)]
pub struct ReadyNotice {
    fired_for: Option<Instant>,
}

impl ReadyNotice {
    /// A notice that has not fired yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time the target is reached in the current
    /// logging period, and `false` afterwards.
    pub fn check<S: StimulusSource>(&mut self, controller: &SessionController<S>, now: Instant) -> bool {
        let started_at = controller.session().logging_started_at();
        let reached = controller
            .progress(now)
            .map(|p| p.target_reached())
            .unwrap_or(false);

        if reached && started_at.is_some() && self.fired_for != started_at {
            self.fired_for = started_at;
            info!("Logging reached its target duration, ready for export");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{affect_mapper::Quadrant, stimulus::StimulusList};

    fn click(x: f64, y: f64) -> AffectInputEvent {
        AffectInputEvent {
            pixel_x: x,
            pixel_y: y,
            width: 1000.0,
            height: 1000.0,
        }
    }

    fn controller(n: usize) -> SessionController<StimulusList> {
        let list = StimulusList::from_locations((0..n).map(|i| format!("song{}.mp3", i)));
        SessionController::new(list, ControllerOptions::default())
    }

    fn loaded(n: usize) -> SessionController<StimulusList> {
        let mut c = controller(n);
        assert!(c.ensure_stimulus().applied());
        c
    }

    #[test]
    fn start_without_stimulus_is_a_no_op() {
        let mut c = controller(2);
        let t0 = Instant::now();

        let outcome = c.start_logging(t0);
        assert_eq!(
            outcome,
            CommandOutcome::Ignored(SessionState::NoStimulus, IgnoreReason::NoStimulus)
        );
        assert!(!c.session().logging_active());
        assert!(c.session().samples().is_empty());
    }

    #[test]
    fn ensure_loads_first_stimulus() {
        let mut c = controller(2);
        let outcome = c.ensure_stimulus();
        assert_eq!(
            outcome,
            CommandOutcome::Applied(SessionState::StimulusLoaded(Logging::Inactive))
        );
        assert_eq!(c.session().stimulus_id(), Some("Song 1"));
        assert_eq!(c.current_stimulus().unwrap().location, "song0.mp3");
    }

    #[test]
    fn logs_scenario_clicks() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);

        let outcome = c.click(&click(750.0, 250.0), t0 + Duration::from_secs(5)).unwrap();
        let ClickOutcome::Logged(sample) = outcome else {
            panic!("click was not logged: {:?}", outcome);
        };
        assert_eq!(sample.elapsed(), Duration::from_secs(5));
        assert_eq!(sample.stimulus_id(), "Song 1");
        assert_eq!(sample.valence(), 0.5);
        assert_eq!(sample.arousal(), 0.5);
        assert_eq!(sample.quadrant(), Quadrant::Green);

        let outcome = c.click(&click(100.0, 900.0), t0 + Duration::from_secs(6)).unwrap();
        let ClickOutcome::Logged(sample) = outcome else {
            panic!("click was not logged: {:?}", outcome);
        };
        assert_eq!(sample.valence(), -0.8);
        assert_eq!(sample.arousal(), -0.8);
        assert_eq!(sample.quadrant(), Quadrant::Red);
        assert_eq!(c.session().samples().len(), 2);
    }

    #[test]
    fn clicks_are_ignored_unless_logging() {
        let mut c = controller(1);
        let t0 = Instant::now();
        assert_eq!(
            c.click(&click(1.0, 1.0), t0).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::NoStimulus)
        );

        c.ensure_stimulus();
        assert_eq!(
            c.click(&click(1.0, 1.0), t0).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::NotLogging)
        );

        c.start_logging(t0);
        c.stop_logging();
        assert_eq!(
            c.click(&click(1.0, 1.0), t0).unwrap(),
            ClickOutcome::Ignored(IgnoreReason::NotLogging)
        );
        assert!(c.session().samples().is_empty());
    }

    #[test]
    fn nan_click_is_rejected() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);

        assert!(c.click(&click(f64::NAN, 3.0), t0).is_err());
        assert!(c.session().samples().is_empty());
        assert_eq!(c.state(), SessionState::StimulusLoaded(Logging::Active));
    }

    #[test]
    fn elapsed_is_monotonic_within_a_period() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);
        for ms in [0u64, 10, 10, 250, 1000, 4000] {
            c.click(&click(ms as f64 % 1000.0, 500.0), t0 + Duration::from_millis(ms))
                .unwrap();
        }

        let elapsed: Vec<Duration> = c.session().samples().samples().iter().map(|s| s.elapsed()).collect();
        assert_eq!(elapsed.len(), 6);
        assert!(elapsed.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn restart_keeps_earlier_samples() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);
        c.click(&click(10.0, 10.0), t0 + Duration::from_secs(8)).unwrap();
        c.stop_logging();

        let t1 = t0 + Duration::from_secs(20);
        assert!(c.start_logging(t1).applied());
        c.click(&click(20.0, 20.0), t1 + Duration::from_secs(2)).unwrap();

        let elapsed: Vec<u64> = c.session().samples().samples().iter().map(|s| s.elapsed().as_secs()).collect();
        assert_eq!(elapsed, vec![8, 2]);
    }

    #[test]
    fn double_start_is_ignored() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);
        let outcome = c.start_logging(t0 + Duration::from_secs(3));
        assert_eq!(
            outcome,
            CommandOutcome::Ignored(
                SessionState::StimulusLoaded(Logging::Active),
                IgnoreReason::AlreadyLogging
            )
        );
        assert_eq!(c.session().logging_started_at(), Some(t0));
    }

    #[test]
    fn reset_clears_samples_and_stops_logging() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);
        for i in 0..3 {
            c.click(&click(100.0 * i as f64, 0.0), t0).unwrap();
        }
        assert_eq!(c.session().samples().len(), 3);

        let outcome = c.reset_log();
        assert_eq!(
            outcome,
            CommandOutcome::Applied(SessionState::StimulusLoaded(Logging::Inactive))
        );
        assert!(c.session().samples().is_empty());
        assert!(c.snapshot().is_empty());
    }

    #[test]
    fn advance_clears_and_loads_next() {
        let mut c = loaded(2);
        let t0 = Instant::now();
        c.start_logging(t0);
        c.click(&click(10.0, 10.0), t0).unwrap();

        let outcome = c.advance_stimulus();
        assert_eq!(
            outcome,
            CommandOutcome::Applied(SessionState::StimulusLoaded(Logging::Inactive))
        );
        assert_eq!(c.session().stimulus_id(), Some("Song 2"));
        assert!(c.session().samples().is_empty());
        assert!(c.session().completed_stimuli().contains("Song 1"));
    }

    #[test]
    fn advance_past_the_last_stimulus_completes() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        c.start_logging(t0);
        c.click(&click(10.0, 10.0), t0).unwrap();

        let outcome = c.advance_stimulus();
        assert_eq!(outcome, CommandOutcome::Applied(SessionState::Completed));
        assert_eq!(c.session().samples().len(), 1);
        assert!(!c.session().logging_active());

        let outcome = c.advance_stimulus();
        assert_eq!(
            outcome,
            CommandOutcome::Ignored(SessionState::Completed, IgnoreReason::Completed)
        );
        assert_eq!(c.session().samples().len(), 1);
        assert!(!c.start_logging(t0).applied());
        assert!(!c.select_stimulus(0).applied());
    }

    #[test]
    fn empty_source_completes_immediately() {
        let mut c = controller(0);
        assert_eq!(c.ensure_stimulus().state(), SessionState::Completed);
    }

    #[test]
    fn select_loads_directly() {
        let mut c = loaded(3);
        let t0 = Instant::now();
        c.start_logging(t0);
        c.click(&click(10.0, 10.0), t0).unwrap();

        assert!(c.select_stimulus(2).applied());
        assert_eq!(c.session().stimulus_id(), Some("Song 3"));
        assert!(c.session().samples().is_empty());
        assert!(!c.session().logging_active());
        assert!(c.session().completed_stimuli().is_empty());

        assert_eq!(
            c.select_stimulus(2),
            CommandOutcome::Ignored(
                SessionState::StimulusLoaded(Logging::Inactive),
                IgnoreReason::SameStimulus
            )
        );
        assert!(!c.select_stimulus(7).applied());
    }

    #[test]
    fn dedup_option_drops_repeats() {
        let list = StimulusList::from_locations(["a.mp3"]);
        let options = ControllerOptions {
            dedup: DedupPolicy::SkipConsecutive,
            ..ControllerOptions::default()
        };
        let mut c = SessionController::new(list, options);
        c.ensure_stimulus();
        let t0 = Instant::now();
        c.start_logging(t0);

        assert!(matches!(c.click(&click(10.0, 10.0), t0), Ok(ClickOutcome::Logged(_))));
        assert_eq!(c.click(&click(10.0, 10.0), t0), Ok(ClickOutcome::Duplicate));
        assert_eq!(c.session().samples().len(), 1);
    }

    #[test]
    fn clamp_option_keeps_points_on_the_grid() {
        let list = StimulusList::from_locations(["a.mp3"]);
        let options = ControllerOptions {
            clamp_to_grid: true,
            ..ControllerOptions::default()
        };
        let mut c = SessionController::new(list, options);
        c.ensure_stimulus();
        let t0 = Instant::now();
        c.start_logging(t0);

        let Ok(ClickOutcome::Logged(sample)) = c.click(&click(-300.0, 2000.0), t0) else {
            panic!("click was not logged");
        };
        assert_eq!(sample.valence(), -1.0);
        assert_eq!(sample.arousal(), -1.0);
    }

    #[test]
    fn progress_is_read_only() {
        let mut c = loaded(1);
        let t0 = Instant::now();
        assert_eq!(c.progress(t0), None);

        c.start_logging(t0);
        let p = c.progress(t0 + Duration::from_secs(90)).unwrap();
        assert_eq!(p.elapsed, Duration::from_secs(90));
        assert_eq!(p.fraction(), Some(0.5));
        assert_eq!(c.state(), SessionState::StimulusLoaded(Logging::Active));
    }

    #[test]
    fn ready_notice_fires_once_per_period() {
        let mut c = loaded(1);
        let mut notice = ReadyNotice::new();
        let t0 = Instant::now();
        c.start_logging(t0);

        assert!(!notice.check(&c, t0 + Duration::from_secs(179)));
        assert!(notice.check(&c, t0 + Duration::from_secs(180)));
        assert!(!notice.check(&c, t0 + Duration::from_secs(200)));
        assert_eq!(c.state(), SessionState::StimulusLoaded(Logging::Active));

        c.stop_logging();
        let t1 = t0 + Duration::from_secs(300);
        c.start_logging(t1);
        assert!(notice.check(&c, t1 + Duration::from_secs(181)));
    }
}
