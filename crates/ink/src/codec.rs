//! Point-stream codec: strokes <-> scaled SVG path string.
//!
//! The encoded form is one `M x y L x y ...` subpath per stroke with integer
//! coordinates, fitted into a fixed logical canvas. The codec is lossy
//! (rescaling and rounding) but preserves stroke count and shape.

use std::fmt::Write;

use padsign_config::DEFAULT_PATH_PADDING;
use padsign_ipc::{DEFAULT_PRESSURE, SignaturePoint, Stroke};
use tracing::debug;

use crate::geometry::{Fit, stroke_bounds};

/// Encode strokes into a path fitted to `target_width` x `target_height`
/// with the default padding. Returns an empty string when there is nothing
/// to draw.
pub fn encode(strokes: &[Stroke], target_width: f64, target_height: f64) -> String {
    encode_with_padding(strokes, target_width, target_height, DEFAULT_PATH_PADDING)
}

pub fn encode_with_padding(
    strokes: &[Stroke],
    target_width: f64,
    target_height: f64,
    padding: f64,
) -> String {
    let Some(bounds) = stroke_bounds(strokes) else {
        return String::new();
    };
    let fit = Fit::new(&bounds, target_width, target_height, padding);

    let mut path = String::new();
    for stroke in strokes {
        let mut points = stroke.drawable_points();
        let Some(first) = points.next() else {
            continue;
        };
        if !path.is_empty() {
            path.push(' ');
        }
        let (x, y) = fit.apply(first.x, first.y);
        let _ = write!(path, "M {} {}", round_coord(x), round_coord(y));
        for point in points {
            let (x, y) = fit.apply(point.x, point.y);
            let _ = write!(path, " L {} {}", round_coord(x), round_coord(y));
        }
    }
    path
}

fn round_coord(value: f64) -> i64 {
    value.round() as i64
}

/// Decode a path produced by [`encode`] back into strokes.
///
/// Each `M`/`m` starts a new stroke; the numeric pairs that follow (with or
/// without `L` separators) become its points. Anything that is not a number,
/// separator or move/line command makes the whole input malformed, in which
/// case no strokes are returned.
pub fn decode(path: &str) -> Vec<Stroke> {
    match try_decode(path) {
        Some(strokes) => strokes,
        None => {
            debug!("decode: malformed path ({} bytes), returning no strokes", path.len());
            Vec::new()
        }
    }
}

fn try_decode(path: &str) -> Option<Vec<Stroke>> {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return Some(Vec::new());
    }
    if !trimmed.starts_with(['M', 'm']) {
        return None;
    }

    let mut strokes = Vec::new();
    for segment in trimmed.split(['M', 'm']).skip(1) {
        let values = segment
            .split(|c: char| c.is_whitespace() || c == ',' || c == 'L' || c == 'l')
            .filter(|token| !token.is_empty())
            .map(|token| token.parse::<f64>().ok().filter(|v| v.is_finite()))
            .collect::<Option<Vec<f64>>>()?;

        let points: Vec<SignaturePoint> = values
            .chunks_exact(2)
            .map(|pair| SignaturePoint::with_pressure(pair[0], pair[1], DEFAULT_PRESSURE))
            .collect();
        if !points.is_empty() {
            strokes.push(Stroke::from_points(points));
        }
    }
    Some(strokes)
}
