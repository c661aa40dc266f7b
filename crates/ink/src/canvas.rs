//! Canvas fallback capturer
//!
//! Turns pointer/touch input on an on-screen element into strokes in the
//! logical canvas space. The host UI forwards pointer events and draws the
//! returned segments immediately; the collected strokes are exported through
//! the codec.

use padsign_config::CanvasConfig;
use padsign_ipc::{SignaturePoint, Stroke};
use tracing::debug;

use crate::codec::encode_with_padding;

/// Strokes shorter than this are discarded as taps
pub const MIN_STROKE_POINTS: usize = 2;

/// Rendered position and size of the drawing element, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    fn is_usable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Pointer input in screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    Down {
        client_x: f64,
        client_y: f64,
        pressure: Option<f32>,
    },
    Move {
        client_x: f64,
        client_y: f64,
        pressure: Option<f32>,
    },
    Up,
    Leave,
}

/// A line piece to render right away, in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: SignaturePoint,
    pub to: SignaturePoint,
}

pub struct CanvasCapturer {
    config: CanvasConfig,
    rect: SurfaceRect,
    strokes: Vec<Stroke>,
    /// Stroke being drawn (None if the pointer is up)
    current: Option<Stroke>,
}

impl CanvasCapturer {
    /// Create a capturer whose element is rendered at its logical size
    pub fn new(config: CanvasConfig) -> Self {
        let rect = SurfaceRect::new(0.0, 0.0, config.width_f64(), config.height_f64());
        Self {
            config,
            rect,
            strokes: Vec::new(),
            current: None,
        }
    }

    /// Update the element's rendered rect (after layout or resize)
    pub fn set_surface_rect(&mut self, rect: SurfaceRect) {
        if rect.is_usable() {
            self.rect = rect;
        } else {
            debug!("set_surface_rect: ignoring unusable rect {:?}", rect);
        }
    }

    /// Map screen coordinates into logical canvas units
    pub fn to_logical(&self, client_x: f64, client_y: f64) -> Option<(f64, f64)> {
        if !client_x.is_finite() || !client_y.is_finite() {
            return None;
        }
        let scale_x = self.config.width_f64() / self.rect.width;
        let scale_y = self.config.height_f64() / self.rect.height;
        Some((
            (client_x - self.rect.left) * scale_x,
            (client_y - self.rect.top) * scale_y,
        ))
    }

    /// Dispatch a pointer event; returns a segment when one should be drawn
    pub fn handle(&mut self, event: PointerEvent) -> Option<Segment> {
        match event {
            PointerEvent::Down {
                client_x,
                client_y,
                pressure,
            } => {
                self.pointer_down(client_x, client_y, pressure);
                None
            }
            PointerEvent::Move {
                client_x,
                client_y,
                pressure,
            } => self.pointer_move(client_x, client_y, pressure),
            PointerEvent::Up | PointerEvent::Leave => {
                self.pointer_up();
                None
            }
        }
    }

    /// Begin a stroke. An unfinished stroke is closed first.
    pub fn pointer_down(&mut self, client_x: f64, client_y: f64, pressure: Option<f32>) {
        if self.current.is_some() {
            self.pointer_up();
        }
        let Some((x, y)) = self.to_logical(client_x, client_y) else {
            return;
        };
        let mut stroke = Stroke::new();
        stroke.push(make_point(x, y, pressure));
        self.current = Some(stroke);
    }

    /// Extend the current stroke; ignored while the pointer is up
    pub fn pointer_move(
        &mut self,
        client_x: f64,
        client_y: f64,
        pressure: Option<f32>,
    ) -> Option<Segment> {
        let (x, y) = self.to_logical(client_x, client_y)?;
        let stroke = self.current.as_mut()?;
        let from = *stroke.last_point()?;
        let to = make_point(x, y, pressure);
        stroke.push(to);
        Some(Segment { from, to })
    }

    /// Close the current stroke. Returns true if it was kept.
    pub fn pointer_up(&mut self) -> bool {
        let Some(stroke) = self.current.take() else {
            return false;
        };
        if stroke.len() >= MIN_STROKE_POINTS {
            self.strokes.push(stroke);
            true
        } else {
            debug!("pointer_up: discarding {}-point stroke", stroke.len());
            false
        }
    }

    pub fn is_drawing(&self) -> bool {
        self.current.is_some()
    }

    /// Remove the most recent committed stroke
    pub fn undo(&mut self) -> Option<Stroke> {
        self.strokes.pop()
    }

    /// Drop all strokes, including one in progress
    pub fn clear(&mut self) {
        self.strokes.clear();
        self.current = None;
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }

    /// Total points across committed strokes
    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }

    pub fn has_signature(&self) -> bool {
        !self.strokes.is_empty()
    }

    /// Export committed strokes as a fitted path
    pub fn svg_path(&self, target_width: f64, target_height: f64) -> String {
        encode_with_padding(
            &self.strokes,
            target_width,
            target_height,
            self.config.padding,
        )
    }
}

fn make_point(x: f64, y: f64, pressure: Option<f32>) -> SignaturePoint {
    match pressure {
        Some(p) => SignaturePoint::with_pressure(x, y, p),
        None => SignaturePoint::new(x, y),
    }
}
