//! Bounds and uniform fit of strokes into a target canvas.

use padsign_ipc::Stroke;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Bounding box of every drawable point, or `None` when there is nothing to draw
pub fn stroke_bounds(strokes: &[Stroke]) -> Option<Bounds> {
    let mut min_x = f64::MAX;
    let mut min_y = f64::MAX;
    let mut max_x = f64::MIN;
    let mut max_y = f64::MIN;
    for stroke in strokes {
        for point in stroke.drawable_points() {
            min_x = min_x.min(point.x);
            min_y = min_y.min(point.y);
            max_x = max_x.max(point.x);
            max_y = max_y.max(point.y);
        }
    }
    if min_x == f64::MAX {
        None
    } else {
        Some(Bounds {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }
}

/// Uniform scale plus offset mapping source coordinates into a target canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fit {
    pub scale: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Fit {
    /// Scale `bounds` uniformly into `width` x `height` minus `padding` on
    /// each side and center the result.
    ///
    /// Zero-extent bounds (a single point, or a perfectly straight line) use
    /// an extent of 1 on that axis. A scale that is not finite and positive
    /// (target smaller than its padding) falls back to 1.
    pub fn new(bounds: &Bounds, width: f64, height: f64, padding: f64) -> Self {
        let src_w = if bounds.width() > 0.0 { bounds.width() } else { 1.0 };
        let src_h = if bounds.height() > 0.0 { bounds.height() } else { 1.0 };

        let scale_x = (width - 2.0 * padding) / src_w;
        let scale_y = (height - 2.0 * padding) / src_h;
        let mut scale = scale_x.min(scale_y);
        if !scale.is_finite() || scale <= 0.0 {
            scale = 1.0;
        }

        let offset_x = (width - bounds.width() * scale) / 2.0 - bounds.min_x * scale;
        let offset_y = (height - bounds.height() * scale) / 2.0 - bounds.min_y * scale;

        Self {
            scale,
            offset_x,
            offset_y,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (x * self.scale + self.offset_x, y * self.scale + self.offset_y)
    }
}
