//! Where the audio stimuli come from, and the order they are presented in.
//!
//! The session controller only talks to a [StimulusSource]: it asks which
//! stimuli are still to be presented and reports the ones that are done.
//! How the list was obtained (a folder of audio files, a list of URLs in the
//! config file, ...) is up to the source.

use hound::WavReader;
use log::{debug, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    collections::HashSet,
    fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

/// File extensions picked up by [StimulusList::from_dir].
pub const AUDIO_EXTENSIONS: [&str; 4] = ["wav", "mp3", "ogg", "flac"];

/// One audio item to be rated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Stimulus {
    /// Identifier written into every sample and used for export names
    pub id: String,
    /// File path or URL handed to whatever plays the audio
    pub location: String,
    /// Length of the audio, when it could be determined
    #[serde(skip)]
    pub duration: Option<Duration>,
}

impl Stimulus {
    /// A stimulus of unknown length.
    pub fn new(id: impl Into<String>, location: impl Into<String>) -> Self {
        Stimulus {
            id: id.into(),
            location: location.into(),
            duration: None,
        }
    }
}

/// Something that can hand out stimuli.
pub trait StimulusSource {
    /// Every stimulus, in listing order.
    fn stimuli(&self) -> &[Stimulus];

    /// The stimuli that have not been completed yet, in listing order.
    fn remaining(&self) -> Vec<&Stimulus>;

    /// Records that the stimulus with this id has been presented.
    fn mark_completed(&mut self, id: &str);
}

/// Errors that come up while building a stimulus source.
#[derive(Debug)]
pub enum StimulusError {
    /// Returned when the stimulus folder cannot be listed.
    IoError(io::Error),

    /// Returned when a source would contain no stimuli at all.
    Empty(PathBuf),

    /// Returned when two stimuli share an identifier.
    DuplicateId(String),
}

impl fmt::Display for StimulusError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            StimulusError::IoError(error) => Cow::from(format!("io error: {}", error)),
            StimulusError::Empty(path) => {
                Cow::from(format!("no stimuli found in {}", path.display()))
            }
            StimulusError::DuplicateId(id) => {
                Cow::from(format!("more than one stimulus is named {:?}", id))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for StimulusError {}

impl From<io::Error> for StimulusError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// An in-memory [StimulusSource].
#[derive(Debug, Clone, Default)]
pub struct StimulusList {
    stimuli: Vec<Stimulus>,
    completed: HashSet<String>,
}

impl StimulusList {
    /// Wraps an explicit list of stimuli. Identifiers must be unique, since
    /// completion and export names are keyed on them.
    pub fn new(stimuli: Vec<Stimulus>) -> Result<Self, StimulusError> {
        let duplicate = {
            let mut seen = HashSet::new();
            stimuli
                .iter()
                .find(|s| !seen.insert(s.id.as_str()))
                .map(|s| s.id.clone())
        };
        if let Some(id) = duplicate {
            return Err(StimulusError::DuplicateId(id));
        }

        Ok(Self {
            stimuli,
            completed: HashSet::new(),
        })
    }

    /// Names each location `Song 1`, `Song 2`, ... in order.
    pub fn from_locations<I, L>(locations: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let stimuli = locations
            .into_iter()
            .enumerate()
            .map(|(i, loc)| Stimulus::new(format!("Song {}", i + 1), loc))
            .collect();
        Self {
            stimuli,
            completed: HashSet::new(),
        }
    }

    /// Lists the audio files in `dir`, sorted by file name. Each stimulus is
    /// named after its file stem.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, StimulusError> {
        let dir = dir.as_ref();
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, io::Error>>()?
            .into_iter()
            .filter(|p| p.is_file() && is_audio_file(p))
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(StimulusError::Empty(dir.to_path_buf()));
        }

        let stimuli = paths
            .iter()
            .map(|path| {
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                Stimulus {
                    id,
                    location: path.display().to_string(),
                    duration: probe_duration(path),
                }
            })
            .collect();

        Self::new(stimuli)
    }

    /// Number of stimuli, completed or not.
    pub fn len(&self) -> usize {
        self.stimuli.len()
    }

    /// Whether the list has no stimuli.
    pub fn is_empty(&self) -> bool {
        self.stimuli.is_empty()
    }
}

impl StimulusSource for StimulusList {
    fn stimuli(&self) -> &[Stimulus] {
        &self.stimuli
    }

    fn remaining(&self) -> Vec<&Stimulus> {
        self.stimuli
            .iter()
            .filter(|s| !self.completed.contains(&s.id))
            .collect()
    }

    fn mark_completed(&mut self, id: &str) {
        self.completed.insert(id.to_owned());
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Reads the length of a WAV file from its header. Other formats are left
/// unknown.
fn probe_duration(path: &Path) -> Option<Duration> {
    let is_wav = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wav"))
        .unwrap_or(false);
    if !is_wav {
        return None;
    }

    match WavReader::open(path) {
        Ok(reader) => {
            let rate = reader.spec().sample_rate;
            if rate == 0 {
                return None;
            }
            let secs = reader.duration() as f64 / rate as f64;
            debug!("{} is {:.1}s long", path.display(), secs);
            Some(Duration::from_secs_f64(secs))
        }
        Err(e) => {
            warn!("Could not read WAV header of {}: {}", path.display(), e);
            None
        }
    }
}

/// How the next stimulus is chosen among the remaining ones.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum DrawOrder {
    /// The next remaining stimulus after the current one in listing order,
    /// wrapping around to the start
    #[default]
    Sequential,
    /// Uniformly at random among the remaining stimuli, without replacement
    Random {
        /// Fixes the draw sequence when set
        seed: Option<u64>,
    },
}

/// Applies a [DrawOrder] to a [StimulusSource].
#[derive(Debug, Clone)]
pub struct StimulusDrawer {
    order: DrawOrder,
    rng: StdRng,
}

impl StimulusDrawer {
    /// A drawer for the given order. Random orders without a seed take one
    /// from the OS.
    pub fn new(order: DrawOrder) -> Self {
        let rng = match order {
            DrawOrder::Random { seed: Some(seed) } => StdRng::seed_from_u64(seed),
            _ => StdRng::from_entropy(),
        };
        Self { order, rng }
    }

    /// Picks the listing index of the next stimulus, or `None` when nothing
    /// remains. `current` is the listing index of the stimulus being left.
    pub fn pick<S: StimulusSource + ?Sized>(
        &mut self,
        source: &S,
        current: Option<usize>,
    ) -> Option<usize> {
        let remaining: HashSet<&str> = source
            .remaining()
            .into_iter()
            .map(|s| s.id.as_str())
            .collect();
        let candidates: Vec<usize> = source
            .stimuli()
            .iter()
            .enumerate()
            .filter(|(_, s)| remaining.contains(s.id.as_str()))
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return None;
        }

        match self.order {
            DrawOrder::Sequential => {
                let after = current.map(|c| c + 1).unwrap_or(0);
                candidates
                    .iter()
                    .copied()
                    .find(|&i| i >= after)
                    .or_else(|| candidates.first().copied())
            }
            DrawOrder::Random { .. } => {
                let choice = self.rng.gen_range(0..candidates.len());
                Some(candidates[choice])
            }
        }
    }
}

/// The listing indices in the order a fresh session would present them.
pub fn presentation_order<S>(source: &S, order: DrawOrder) -> Vec<usize>
where
    S: StimulusSource + Clone,
{
    let mut source = source.clone();
    let mut drawer = StimulusDrawer::new(order);
    let mut shown = Vec::new();
    let mut current = None;

    while let Some(index) = drawer.pick(&source, current) {
        let id = source.stimuli()[index].id.clone();
        source.mark_completed(&id);
        shown.push(index);
        current = Some(index);
    }
    shown
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};

    fn three() -> StimulusList {
        StimulusList::from_locations(["a.mp3", "b.mp3", "c.mp3"])
    }

    #[test]
    fn locations_are_named_in_order() {
        let list = three();
        let ids: Vec<&str> = list.stimuli().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Song 1", "Song 2", "Song 3"]);
    }

    #[test]
    fn completed_stimuli_leave_remaining() {
        let mut list = three();
        list.mark_completed("Song 2");
        let ids: Vec<&str> = list.remaining().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["Song 1", "Song 3"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn sequential_advances_and_wraps() {
        let mut list = three();
        let mut drawer = StimulusDrawer::new(DrawOrder::Sequential);

        assert_eq!(drawer.pick(&list, None), Some(0));
        list.mark_completed("Song 2");
        assert_eq!(drawer.pick(&list, Some(0)), Some(2));
        list.mark_completed("Song 3");
        assert_eq!(drawer.pick(&list, Some(2)), Some(0));
        list.mark_completed("Song 1");
        assert_eq!(drawer.pick(&list, Some(0)), None);
    }

    #[test]
    fn random_draws_without_replacement() {
        let mut list = StimulusList::from_locations((0..10).map(|i| format!("{}.wav", i)));
        let mut drawer = StimulusDrawer::new(DrawOrder::Random { seed: Some(7) });
        let mut seen = HashSet::new();

        while let Some(i) = drawer.pick(&list, None) {
            let id = list.stimuli()[i].id.clone();
            assert!(seen.insert(id.clone()));
            list.mark_completed(&id);
        }
        assert_eq!(seen.len(), 10);
    }

    #[test]
    fn seeded_draws_repeat() {
        let list = StimulusList::from_locations((0..10).map(|i| format!("{}.wav", i)));
        let mut a = StimulusDrawer::new(DrawOrder::Random { seed: Some(42) });
        let mut b = StimulusDrawer::new(DrawOrder::Random { seed: Some(42) });
        for _ in 0..5 {
            assert_eq!(a.pick(&list, None), b.pick(&list, None));
        }
    }

    #[test]
    fn presentation_order_covers_everything_once() {
        let list = three();
        assert_eq!(presentation_order(&list, DrawOrder::Sequential), vec![0, 1, 2]);

        let order = DrawOrder::Random { seed: Some(11) };
        let mut shuffled = presentation_order(&list, order);
        assert_eq!(shuffled, presentation_order(&list, order));
        shuffled.sort();
        assert_eq!(shuffled, vec![0, 1, 2]);
        assert_eq!(list.remaining().len(), 3);
    }

    #[test]
    fn folder_listing() {
        let dir = tempfile::tempdir().unwrap();
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(dir.path().join("b_track.wav"), spec).unwrap();
        for _ in 0..16000 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        fs::write(dir.path().join("a_track.mp3"), b"not really audio").unwrap();
        fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let list = StimulusList::from_dir(dir.path()).unwrap();
        let ids: Vec<&str> = list.stimuli().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a_track", "b_track"]);
        assert_eq!(list.stimuli()[0].duration, None);
        assert_eq!(list.stimuli()[1].duration, Some(Duration::from_secs(2)));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let twins = vec![Stimulus::new("x", "a.mp3"), Stimulus::new("x", "b.mp3")];
        assert!(matches!(
            StimulusList::new(twins),
            Err(StimulusError::DuplicateId(id)) if id == "x"
        ));

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("song.mp3"), b"one").unwrap();
        fs::write(dir.path().join("song.ogg"), b"two").unwrap();
        assert!(matches!(
            StimulusList::from_dir(dir.path()),
            Err(StimulusError::DuplicateId(_))
        ));
    }

    #[test]
    fn distinct_ids_are_each_presented() {
        let list =
            StimulusList::new(vec![Stimulus::new("x", "a.mp3"), Stimulus::new("y", "b.mp3")])
                .unwrap();
        assert_eq!(presentation_order(&list, DrawOrder::Sequential), vec![0, 1]);
    }

    #[test]
    fn empty_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), b"nothing").unwrap();
        assert!(matches!(
            StimulusList::from_dir(dir.path()),
            Err(StimulusError::Empty(_))
        ));
    }
}
