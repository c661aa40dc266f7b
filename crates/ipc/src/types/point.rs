//! Signature points and strokes.

use serde::{Deserialize, Serialize};

/// Pressure assigned to points whose source carries none
pub const DEFAULT_PRESSURE: f32 = 1.0;

/// A single sampled position of the pen.
///
/// `pen_up` marks a stroke boundary; consecutive points with `pen_up == false`
/// belong to the same continuous stroke.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignaturePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f32>,
    #[serde(default)]
    pub pen_up: bool,
}

impl SignaturePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: None,
            pen_up: false,
        }
    }

    pub fn with_pressure(x: f64, y: f64, pressure: f32) -> Self {
        Self {
            x,
            y,
            pressure: Some(pressure),
            pen_up: false,
        }
    }

    pub fn pen_up(x: f64, y: f64) -> Self {
        Self {
            x,
            y,
            pressure: None,
            pen_up: true,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One continuous pen-down motion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<SignaturePoint>,
}

impl Stroke {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_points(points: Vec<SignaturePoint>) -> Self {
        Self { points }
    }

    /// Build a stroke from bare coordinate pairs
    pub fn from_xy(coords: &[(f64, f64)]) -> Self {
        Self {
            points: coords
                .iter()
                .map(|&(x, y)| SignaturePoint::new(x, y))
                .collect(),
        }
    }

    pub fn push(&mut self, point: SignaturePoint) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points that contribute geometry (pen-down and finite)
    pub fn drawable_points(&self) -> impl Iterator<Item = &SignaturePoint> {
        self.points.iter().filter(|p| !p.pen_up && p.is_finite())
    }

    pub fn last_point(&self) -> Option<&SignaturePoint> {
        self.points.last()
    }
}

/// Split a flat point stream into strokes at pen-up markers.
///
/// A pen-up point closes the current stroke and is not itself part of any
/// stroke. Empty strokes are never produced.
pub fn split_strokes(points: &[SignaturePoint]) -> Vec<Stroke> {
    let mut strokes = Vec::new();
    let mut current = Stroke::new();
    for point in points {
        if point.pen_up {
            if !current.is_empty() {
                strokes.push(std::mem::take(&mut current));
            }
        } else {
            current.push(*point);
        }
    }
    if !current.is_empty() {
        strokes.push(current);
    }
    strokes
}
