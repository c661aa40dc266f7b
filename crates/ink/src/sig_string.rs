//! Adapter for the vendor service's native signature format.
//!
//! The service returns a flat comma-separated list `x0,y0,x1,y1,...` where the
//! pair `0,0` is a pen-up sentinel between strokes.

use padsign_ipc::{SignaturePoint, Stroke, split_strokes};
use tracing::debug;

use crate::codec::encode;

/// Parse a flat coordinate list into strokes.
///
/// Non-numeric input makes the list malformed and yields no strokes. An odd
/// trailing value is ignored, as are empty strokes between consecutive
/// sentinels.
pub fn parse_sig_string(raw: &str) -> Vec<Stroke> {
    let values: Option<Vec<f64>> = raw
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    let Some(values) = values else {
        debug!("parse_sig_string: non-numeric token in {} byte input", raw.len());
        return Vec::new();
    };

    let points: Vec<SignaturePoint> = values
        .chunks_exact(2)
        .map(|pair| {
            if pair[0] == 0.0 && pair[1] == 0.0 {
                SignaturePoint::pen_up(0.0, 0.0)
            } else {
                SignaturePoint::new(pair[0], pair[1])
            }
        })
        .collect();

    split_strokes(&points)
}

/// Convert a raw service signature into a fitted SVG path
pub fn sig_string_to_svg_path(raw: &str, target_width: f64, target_height: f64) -> String {
    encode(&parse_sig_string(raw), target_width, target_height)
}

/// Emit strokes in the service-native format.
///
/// Coordinates are rounded to integers. A point that would round onto the
/// sentinel is nudged to `1,1` so it cannot split its stroke.
pub fn format_sig_string(strokes: &[Stroke]) -> String {
    let mut values: Vec<String> = Vec::new();
    for stroke in strokes {
        let mut points = stroke.drawable_points().peekable();
        if points.peek().is_none() {
            continue;
        }
        if !values.is_empty() {
            values.push("0".into());
            values.push("0".into());
        }
        for point in points {
            let mut x = point.x.round() as i64;
            let mut y = point.y.round() as i64;
            if x == 0 && y == 0 {
                x = 1;
                y = 1;
            }
            values.push(x.to_string());
            values.push(y.to_string());
        }
    }
    values.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode;

    #[test]
    fn test_sentinel_splits_strokes() {
        let strokes = parse_sig_string("10,10,50,50,0,0,60,60,90,90");
        assert_eq!(strokes.len(), 2);
        assert_eq!(strokes[0].points[1].x, 50.0);
        assert_eq!(strokes[1].points[0].y, 60.0);
    }

    #[test]
    fn test_service_signature_to_path() {
        let path = sig_string_to_svg_path("10,10,50,50,0,0,60,60,90,90", 400.0, 120.0);
        assert_eq!(decode(&path).len(), 2);
    }

    #[test]
    fn test_tolerant_parsing() {
        assert!(parse_sig_string("").is_empty());
        assert!(parse_sig_string("0,0,0,0").is_empty());
        assert_eq!(parse_sig_string(" 1 , 2 ,3,4,5").len(), 1);
        assert_eq!(parse_sig_string("0,0,1,2,0,0,0,0,3,4,0,0").len(), 2);
        assert!(parse_sig_string("1,2,abc,4").is_empty());
    }

    #[test]
    fn test_format_round_trip() {
        let strokes = vec![
            Stroke::from_xy(&[(10.2, 10.0), (20.0, 30.7)]),
            Stroke::new(),
            Stroke::from_xy(&[(0.0, 0.0), (5.0, 5.0)]),
        ];
        let raw = format_sig_string(&strokes);
        assert_eq!(raw, "10,10,20,31,0,0,1,1,5,5");
        assert_eq!(parse_sig_string(&raw).len(), 2);
    }
}
