//! View transform for the infinite canvas: pan offset and zoom factor.
//!
//! The same shape is persisted remotely as a session's canvas view, so the
//! type serializes as `{ "zoom": f64, "pan": { "x": f64, "y": f64 } }`.

#[cfg(test)]
#[path = "camera_test.rs"]
mod camera_test;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_ZOOM, MIN_ZOOM, PLACEMENT_MARGIN_PX};

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Canvas view transform.
///
/// `pan` is in screen pixels, `zoom` is a scale factor (1.0 = no zoom).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub zoom: f64,
    pub pan: Point,
}

impl Default for View {
    fn default() -> Self {
        Self { zoom: 1.0, pan: Point::default() }
    }
}

impl View {
    /// Convert a screen-space point to canvas coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        Point { x: (screen.x - self.pan.x) / self.zoom, y: (screen.y - self.pan.y) / self.zoom }
    }

    /// Convert a canvas point to screen coordinates.
    #[must_use]
    pub fn world_to_screen(&self, world: Point) -> Point {
        Point { x: world.x * self.zoom + self.pan.x, y: world.y * self.zoom + self.pan.y }
    }

    /// Shift the view by a screen-space delta.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// Set the zoom factor, keeping the canvas point under `anchor` fixed on screen.
    /// The factor is clamped to `[MIN_ZOOM, MAX_ZOOM]`; a non-finite factor or
    /// anchor leaves the view unchanged.
    pub fn zoom_at(&mut self, anchor: Point, zoom: f64) {
        if !(zoom.is_finite() && anchor.x.is_finite() && anchor.y.is_finite()) {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.zoom = clamp_zoom(zoom);
        self.pan.x = anchor.x - world.x * self.zoom;
        self.pan.y = anchor.y - world.y * self.zoom;
    }

    /// Canvas point where newly generated items start their placement search:
    /// just inside the top-left corner of the visible area.
    #[must_use]
    pub fn placement_origin(&self) -> Point {
        self.screen_to_world(Point::new(PLACEMENT_MARGIN_PX, PLACEMENT_MARGIN_PX))
    }

    /// Copy of this view with the zoom clamped into range. Remote views are
    /// passed through this on hydration.
    #[must_use]
    pub fn sanitized(self) -> Self {
        let zoom = if self.zoom.is_finite() { clamp_zoom(self.zoom) } else { 1.0 };
        let pan = if self.pan.x.is_finite() && self.pan.y.is_finite() { self.pan } else { Point::default() };
        Self { zoom, pan }
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}
