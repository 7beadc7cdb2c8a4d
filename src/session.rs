//! The data of one logging run: which stimulus is loaded, whether clicks
//! are being recorded, and the samples taken so far.
//!
//! A [Session] is only ever changed through the
//! [SessionController](crate::session_controller::SessionController); this
//! module just holds the state and read-only projections of it.

use crate::sample_store::{DedupPolicy, SampleStore};
use std::{
    collections::BTreeSet,
    fmt,
    time::{Duration, Instant},
};

/// Whether clicks are currently being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Logging {
    /// Clicks are ignored
    Inactive,
    /// Clicks are turned into samples
    Active,
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No stimulus has been assigned yet
    NoStimulus,
    /// A stimulus is loaded
    StimulusLoaded(Logging),
    /// Every stimulus has been presented
    Completed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SessionState::NoStimulus => write!(f, "no stimulus"),
            SessionState::StimulusLoaded(Logging::Inactive) => write!(f, "logging inactive"),
            SessionState::StimulusLoaded(Logging::Active) => write!(f, "logging"),
            SessionState::Completed => write!(f, "all stimuli completed"),
        }
    }
}

/// The stimulus currently assigned to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedStimulus {
    /// Position in the source's listing
    pub index: usize,
    /// The stimulus identifier
    pub id: String,
}

/// The active logging context.
#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) stimulus: Option<LoadedStimulus>,
    pub(crate) logging_active: bool,
    pub(crate) logging_started_at: Option<Instant>,
    pub(crate) samples: SampleStore,
    pub(crate) completed_stimuli: BTreeSet<String>,
    pub(crate) finished: bool,
}

impl Session {
    /// A fresh session with nothing loaded.
    pub fn new(dedup: DedupPolicy) -> Self {
        Session {
            stimulus: None,
            logging_active: false,
            logging_started_at: None,
            samples: SampleStore::new(dedup),
            completed_stimuli: BTreeSet::new(),
            finished: false,
        }
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        if self.finished {
            SessionState::Completed
        } else if self.stimulus.is_none() {
            SessionState::NoStimulus
        } else if self.logging_active {
            SessionState::StimulusLoaded(Logging::Active)
        } else {
            SessionState::StimulusLoaded(Logging::Inactive)
        }
    }

    /// The loaded stimulus. After completion this is the last one that was
    /// presented.
    pub fn stimulus(&self) -> Option<&LoadedStimulus> {
        self.stimulus.as_ref()
    }

    /// Shorthand for the id of [Session::stimulus].
    pub fn stimulus_id(&self) -> Option<&str> {
        self.stimulus.as_ref().map(|s| s.id.as_str())
    }

    /// Whether clicks are being recorded.
    pub fn logging_active(&self) -> bool {
        self.logging_active
    }

    /// When the current (or most recent) logging period began.
    pub fn logging_started_at(&self) -> Option<Instant> {
        self.logging_started_at
    }

    /// Time since logging started, while logging is active.
    pub fn elapsed(&self, now: Instant) -> Option<Duration> {
        match (self.logging_active, self.logging_started_at) {
            (true, Some(start)) => Some(now.saturating_duration_since(start)),
            _ => None,
        }
    }

    /// The samples logged for the loaded stimulus.
    pub fn samples(&self) -> &SampleStore {
        &self.samples
    }

    /// Ids of the stimuli already presented.
    pub fn completed_stimuli(&self) -> &BTreeSet<String> {
        &self.completed_stimuli
    }
}

/// How far logging has progressed towards the configured duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Time since logging started
    pub elapsed: Duration,
    /// The configured session length, if any
    pub target: Option<Duration>,
}

impl Progress {
    /// `elapsed / target`, capped at `1.0`. `None` without a target.
    pub fn fraction(&self) -> Option<f64> {
        self.target.map(|target| {
            if target.is_zero() {
                1.0
            } else {
                (self.elapsed.as_secs_f64() / target.as_secs_f64()).min(1.0)
            }
        })
    }

    /// Whether the target has been reached.
    pub fn target_reached(&self) -> bool {
        self.target
            .map(|target| self.elapsed >= target)
            .unwrap_or(false)
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.target {
            Some(target) => write!(f, "{}s / {}s", self.elapsed.as_secs(), target.as_secs()),
            None => write!(f, "{}s", self.elapsed.as_secs()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_session_has_no_stimulus() {
        let session = Session::new(DedupPolicy::KeepAll);
        assert_eq!(session.state(), SessionState::NoStimulus);
        assert!(!session.logging_active());
        assert!(session.samples().is_empty());
        assert_eq!(session.elapsed(Instant::now()), None);
    }

    #[test]
    fn progress_fraction_is_capped() {
        let p = Progress {
            elapsed: Duration::from_secs(90),
            target: Some(Duration::from_secs(180)),
        };
        assert_eq!(p.fraction(), Some(0.5));
        assert!(!p.target_reached());
        assert_eq!(p.to_string(), "90s / 180s");

        let p = Progress {
            elapsed: Duration::from_secs(200),
            target: Some(Duration::from_secs(180)),
        };
        assert_eq!(p.fraction(), Some(1.0));
        assert!(p.target_reached());

        let p = Progress {
            elapsed: Duration::from_secs(3),
            target: None,
        };
        assert_eq!(p.fraction(), None);
        assert!(!p.target_reached());
        assert_eq!(p.to_string(), "3s");
    }
}
