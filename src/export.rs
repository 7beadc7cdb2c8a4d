//! Renders a [SampleSnapshot] as a CSV table and as the grid image with a
//! marker at every sample.
//!
//! Both outputs of [ExportEngine::export] are produced from the same
//! snapshot, so every table row has exactly one marker, drawn where
//! [to_pixel] puts the row's (valence, arousal) on the base image. Markers
//! that would fall entirely outside the image are left out of it; their
//! rows are still written.
//!
//! The table looks like this:
//!
//! ```text
//! Time,Song,Valence,Arousal,Quadrant
//! 0:00:05,trackA,0.5,0.5,Green
//! 0:00:09,trackA,-0.8,-0.8,Red
//! ```

use crate::{
    affect_mapper::to_pixel,
    sample_store::{Sample, SampleSnapshot},
    session_controller::SessionController,
    stimulus::StimulusSource,
};
use image::{ImageError, ImageFormat, Rgba, RgbaImage};
use log::info;
use std::{
    borrow::Cow,
    fmt, fs,
    io::{self, Cursor},
    path::{Path, PathBuf},
    time::Duration,
};

/// The fixed header row of exported tables.
pub const TABLE_HEADER: &str = "Time,Song,Valence,Arousal,Quadrant";

/// Errors from loading the grid image or writing exports.
#[derive(Debug)]
pub enum ExportError {
    /// Returned when the base grid image does not exist.
    MissingGridImage(PathBuf),

    /// Returned when the image cannot be decoded or encoded.
    ImageError(ImageError),

    /// Returned when writing the exported files fails.
    IoError(io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ExportError::MissingGridImage(path) => {
                Cow::from(format!("missing emotion grid image {}", path.display()))
            }
            ExportError::ImageError(error) => Cow::from(format!("image error: {}", error)),
            ExportError::IoError(error) => Cow::from(format!("io error: {}", error)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ExportError {}

impl From<ImageError> for ExportError {
    fn from(value: ImageError) -> Self {
        Self::ImageError(value)
    }
}

impl From<io::Error> for ExportError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

/// How markers are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    /// Radius of the filled disc, in pixels
    pub radius: u32,
    /// RGBA fill color
    pub color: [u8; 4],
}

impl Default for MarkerStyle {
    fn default() -> Self {
        MarkerStyle {
            radius: 5,
            color: [0, 0, 255, 255],
        }
    }
}

/// The encoded outputs of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportBundle {
    /// UTF-8 CSV
    pub table: Vec<u8>,
    /// PNG
    pub image: Vec<u8>,
}

/// File names for the exports of one stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportNames {
    /// Name of the CSV file
    pub table: String,
    /// Name of the PNG file
    pub image: String,
}

impl ExportNames {
    /// `{participant}_{stimulus}_log.csv` and `{participant}_{stimulus}_dots.png`,
    /// with anything outside `[A-Za-z0-9_-]` replaced by `_`.
    pub fn for_stimulus(participant: &str, stimulus_id: &str) -> Self {
        let base = format!("{}_{}", sanitize(participant), sanitize(stimulus_id));
        ExportNames {
            table: format!("{}_log.csv", base),
            image: format!("{}_dots.png", base),
        }
    }
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Where [ExportBundle::write_to_dir] put the files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    /// Path of the CSV file
    pub table: PathBuf,
    /// Path of the PNG file
    pub image: PathBuf,
}

impl ExportBundle {
    /// Writes both files into `dir`, creating it if needed.
    pub fn write_to_dir(
        &self,
        dir: impl AsRef<Path>,
        names: &ExportNames,
    ) -> Result<ExportPaths, ExportError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let paths = ExportPaths {
            table: dir.join(&names.table),
            image: dir.join(&names.image),
        };
        fs::write(&paths.table, &self.table)?;
        fs::write(&paths.image, &self.image)?;

        info!(
            "Exported {} and {}",
            paths.table.display(),
            paths.image.display()
        );
        Ok(paths)
    }
}

/// Where and under which participant a session's exports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    /// Output directory
    pub dir: PathBuf,
    /// Participant identifier used in file names
    pub participant: String,
}

impl ExportTarget {
    /// Exports the samples of the stimulus loaded in `controller`. Returns
    /// `None` when no stimulus has been loaded yet.
    pub fn export_current<S: StimulusSource>(
        &self,
        controller: &SessionController<S>,
        engine: &ExportEngine,
    ) -> Result<Option<ExportPaths>, ExportError> {
        let Some(stimulus_id) = controller.session().stimulus_id() else {
            return Ok(None);
        };
        let bundle = engine.export(&controller.snapshot())?;
        let names = ExportNames::for_stimulus(&self.participant, stimulus_id);
        bundle.write_to_dir(&self.dir, &names).map(Some)
    }
}

/// Formats a duration as `H:MM:SS`, dropping fractions of a second.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Floats are written with at least one decimal, so `1` appears as `1.0`.
fn format_value(v: f64) -> String {
    format!("{:?}", v)
}

fn quote_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::from(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::from(field)
    }
}

fn table_row(sample: &Sample) -> String {
    format!(
        "{},{},{},{},{}",
        format_elapsed(sample.elapsed()),
        quote_field(sample.stimulus_id()),
        format_value(sample.valence()),
        format_value(sample.arousal()),
        sample.quadrant()
    )
}

/// Turns snapshots into tables and annotated images over a fixed base grid.
#[derive(Debug, Clone)]
pub struct ExportEngine {
    base: RgbaImage,
    style: MarkerStyle,
}

impl ExportEngine {
    /// An engine drawing over `base`.
    pub fn new(base: RgbaImage, style: MarkerStyle) -> Self {
        Self { base, style }
    }

    /// Loads the base grid image from disk.
    pub fn from_path(path: impl AsRef<Path>, style: MarkerStyle) -> Result<Self, ExportError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ExportError::MissingGridImage(path.to_path_buf()));
        }
        let base = image::open(path)?.to_rgba8();
        info!(
            "Loaded grid image {} ({}x{})",
            path.display(),
            base.width(),
            base.height()
        );
        Ok(Self::new(base, style))
    }

    /// Width and height of the base image.
    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }

    /// The base image without markers.
    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    /// The CSV table for a snapshot: the header and one row per sample in
    /// insertion order.
    pub fn table(&self, snapshot: &SampleSnapshot) -> String {
        let mut out = String::from(TABLE_HEADER);
        out.push('\n');
        for sample in snapshot {
            out.push_str(&table_row(sample));
            out.push('\n');
        }
        out
    }

    /// Pixel position of the marker for a sample on the base image, or
    /// `None` when no part of the marker would land on it.
    pub fn marker_position(&self, sample: &Sample) -> Option<(i64, i64)> {
        let (w, h) = self.base.dimensions();
        let (x, y) = to_pixel(&sample.point(), w as f64, h as f64);
        let r = self.style.radius as f64;
        let visible = |v: f64, size: u32| v >= -r - 1.0 && v <= size as f64 + r;
        (visible(x, w) && visible(y, h)).then(|| (x as i64, y as i64))
    }

    /// The base image with one filled disc per sample, drawn in insertion
    /// order.
    pub fn image(&self, snapshot: &SampleSnapshot) -> RgbaImage {
        let mut img = self.base.clone();
        for sample in snapshot {
            let Some((cx, cy)) = self.marker_position(sample) else {
                continue;
            };
            draw_disc(&mut img, cx, cy, self.style.radius, Rgba(self.style.color));
        }
        img
    }

    /// Produces both encoded outputs from the same snapshot.
    pub fn export(&self, snapshot: &SampleSnapshot) -> Result<ExportBundle, ExportError> {
        let table = self.table(snapshot).into_bytes();

        let mut image = Vec::new();
        self.image(snapshot)
            .write_to(&mut Cursor::new(&mut image), ImageFormat::Png)?;

        Ok(ExportBundle { table, image })
    }
}

/// Fills every pixel within `radius` of `(cx, cy)` that lies on the image.
fn draw_disc(img: &mut RgbaImage, cx: i64, cy: i64, radius: u32, color: Rgba<u8>) {
    let r = radius as i64;
    let (w, h) = (img.width() as i64, img.height() as i64);

    for y in cy.saturating_sub(r).max(0)..=cy.saturating_add(r).min(h - 1) {
        for x in cx.saturating_sub(r).max(0)..=cx.saturating_add(r).min(w - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}
