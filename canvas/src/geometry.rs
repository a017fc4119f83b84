//! Rectangle geometry: overlap tests and grid placement for new items.
//!
//! Placement is a greedy row/column scan over a fixed-width grid that starts
//! at a caller-chosen origin. It is deterministic and never fails: when the
//! search budget runs out, the last probed cell is returned even if it
//! overlaps something.

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;

use serde::{Deserialize, Serialize};

use crate::consts::GRID_COLUMNS;

/// Width and height of an item, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Size for an aspect ratio string such as `"16:9"`, with the longer
    /// edge set to `edge`. Unparseable or degenerate ratios yield a square.
    #[must_use]
    pub fn from_aspect_ratio(ratio: &str, edge: f64) -> Self {
        let Some((w, h)) = parse_ratio(ratio) else {
            return Self::new(edge, edge);
        };
        if w >= h {
            Self::new(edge, edge * h / w)
        } else {
            Self::new(edge * w / h, edge)
        }
    }
}

fn parse_ratio(ratio: &str) -> Option<(f64, f64)> {
    let (w, h) = ratio.split_once(':')?;
    let (Ok(w), Ok(h)) = (w.trim().parse::<f64>(), h.trim().parse::<f64>()) else {
        return None;
    };
    if w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0 {
        Some((w, h))
    } else {
        None
    }
}

/// Axis-aligned bounding box in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn from_size(x: f64, y: f64, size: Size) -> Self {
        Self { x, y, width: size.width, height: size.height }
    }

    #[must_use]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Whether `a` and `b` come closer than `padding` to each other.
///
/// Each rectangle is inflated by `padding / 2` on every side, so two
/// rectangles separated by a gap of exactly `padding` do not overlap.
#[must_use]
pub fn overlaps(a: &Rect, b: &Rect, padding: f64) -> bool {
    a.x < b.right() + padding && a.right() + padding > b.x && a.y < b.bottom() + padding && a.bottom() + padding > b.y
}

/// Grid cell probed on the given attempt, relative to `(start_x, start_y)`.
#[must_use]
pub fn grid_cell(size: Size, start_x: f64, start_y: f64, attempt: usize, padding: f64) -> Rect {
    let row = attempt / GRID_COLUMNS;
    let col = attempt % GRID_COLUMNS;
    #[allow(clippy::cast_precision_loss)]
    let (row, col) = (row as f64, col as f64);
    Rect::from_size(
        start_x + col * (size.width + padding),
        start_y + row * (size.height + padding),
        size,
    )
}

/// Find a position for a new rectangle of `size` that keeps at least
/// `padding` clear of every rectangle in `existing`.
///
/// Probes up to `max_attempts` grid cells. If all are occupied, returns the
/// last probed cell; with a zero budget, returns the start cell.
#[must_use]
pub fn find_non_overlapping_position(
    size: Size,
    existing: &[Rect],
    start_x: f64,
    start_y: f64,
    max_attempts: usize,
    padding: f64,
) -> Rect {
    let mut candidate = Rect::from_size(start_x, start_y, size);
    for attempt in 0..max_attempts {
        candidate = grid_cell(size, start_x, start_y, attempt, padding);
        if !existing.iter().any(|r| overlaps(&candidate, r, padding)) {
            return candidate;
        }
    }
    candidate
}

/// Place several rectangles one after another, each avoiding `existing`
/// and every rectangle placed before it.
#[must_use]
pub fn place_many(
    sizes: &[Size],
    existing: &[Rect],
    start_x: f64,
    start_y: f64,
    max_attempts: usize,
    padding: f64,
) -> Vec<Rect> {
    let mut occupied = existing.to_vec();
    let mut placed = Vec::with_capacity(sizes.len());
    for size in sizes {
        let rect = find_non_overlapping_position(*size, &occupied, start_x, start_y, max_attempts, padding);
        occupied.push(rect);
        placed.push(rect);
    }
    placed
}
