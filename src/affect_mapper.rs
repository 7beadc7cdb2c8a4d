//! Converts a click on the arousal–valence grid into a point in affect space.
//!
//! The grid image is read with valence on the horizontal axis (left is
//! unpleasant, right is pleasant) and arousal on the vertical axis (top is
//! activated, bottom is calm). Pixel `y` grows downward, so arousal is
//! flipped:
//!
//! ```text
//! valence = round(x / width * 2 - 1, 2)
//! arousal = round(-(y / height * 2 - 1), 2)
//! ```
//!
//! Clicks outside the image are still mapped, which produces values outside
//! `[-1, 1]`. Callers that want to keep those in range can use
//! [AffectPoint::clamped].

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt};

/// The coarse affect category of a point, decided by the signs of valence
/// and arousal.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Quadrant {
    /// Pleasant and activated
    Green,
    /// Unpleasant and activated
    Yellow,
    /// Unpleasant and calm
    Red,
    /// Pleasant and calm
    Blue,
}

impl Quadrant {
    /// The label used in exported tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Quadrant::Green => "Green",
            Quadrant::Yellow => "Yellow",
            Quadrant::Red => "Red",
            Quadrant::Blue => "Blue",
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized (valence, arousal) pair.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct AffectPoint {
    /// Pleasantness, `-1` is unpleasant
    pub valence: f64,
    /// Activation, `-1` is calm
    pub arousal: f64,
}

impl AffectPoint {
    /// The quadrant this point falls into, see [classify].
    pub fn quadrant(&self) -> Quadrant {
        classify(self.valence, self.arousal)
    }

    /// Returns a copy with both coordinates clamped into `[-1, 1]`.
    pub fn clamped(self) -> Self {
        AffectPoint {
            valence: self.valence.clamp(-1.0, 1.0),
            arousal: self.arousal.clamp(-1.0, 1.0),
        }
    }
}

/// A click on some surface that displays the grid. Mapping only depends on
/// where the click falls relative to the surface, so the surface does not
/// have to be the base image itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffectInputEvent {
    /// Horizontal pixel coordinate, measured from the left edge
    pub pixel_x: f64,
    /// Vertical pixel coordinate, measured from the top edge
    pub pixel_y: f64,
    /// Width of the surface that was clicked
    pub width: f64,
    /// Height of the surface that was clicked
    pub height: f64,
}

impl AffectInputEvent {
    /// Maps this click, see [map].
    pub fn map(&self) -> Result<(AffectPoint, Quadrant), MapError> {
        map(self.pixel_x, self.pixel_y, self.width, self.height)
    }
}

/// Reasons a click could not be turned into an [AffectPoint].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MapError {
    /// A pixel coordinate was NaN or infinite.
    NonFiniteCoordinate {
        /// The offending x coordinate
        x: f64,
        /// The offending y coordinate
        y: f64,
    },

    /// The image width or height was not a positive, finite number.
    InvalidDimensions {
        /// The offending width
        width: f64,
        /// The offending height
        height: f64,
    },
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            MapError::NonFiniteCoordinate { x, y } => {
                Cow::from(format!("non-finite click coordinate ({}, {})", x, y))
            }
            MapError::InvalidDimensions { width, height } => {
                Cow::from(format!("invalid image dimensions {}x{}", width, height))
            }
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for MapError {}

/// Rounds to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Maps a pixel coordinate on an image of the given size to a rounded
/// [AffectPoint] and its [Quadrant].
pub fn map(
    pixel_x: f64,
    pixel_y: f64,
    image_width: f64,
    image_height: f64,
) -> Result<(AffectPoint, Quadrant), MapError> {
    let dims_ok = |d: f64| d.is_finite() && d > 0.0;
    if !dims_ok(image_width) || !dims_ok(image_height) {
        return Err(MapError::InvalidDimensions {
            width: image_width,
            height: image_height,
        });
    }
    if !pixel_x.is_finite() || !pixel_y.is_finite() {
        return Err(MapError::NonFiniteCoordinate {
            x: pixel_x,
            y: pixel_y,
        });
    }

    let point = AffectPoint {
        valence: round2(pixel_x / image_width * 2.0 - 1.0),
        arousal: round2(-(pixel_y / image_height * 2.0 - 1.0)),
    };

    Ok((point, point.quadrant()))
}

/// Classifies a point. Zero counts as positive on both axes, so the origin
/// is [Quadrant::Green].
pub fn classify(valence: f64, arousal: f64) -> Quadrant {
    match (valence >= 0.0, arousal >= 0.0) {
        (true, true) => Quadrant::Green,
        (false, true) => Quadrant::Yellow,
        (false, false) => Quadrant::Red,
        (true, false) => Quadrant::Blue,
    }
}

/// Inverse of [map]: the pixel position on a `width` by `height` image that
/// corresponds to `point`.
pub fn to_pixel(point: &AffectPoint, width: f64, height: f64) -> (f64, f64) {
    let x = (point.valence + 1.0) / 2.0 * width;
    let y = (1.0 - (point.arousal + 1.0) / 2.0) * height;
    (x, y)
}
