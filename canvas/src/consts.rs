//! Shared numeric constants for the canvas crate.

// ── Placement ───────────────────────────────────────────────────

/// Number of columns in the placement search grid.
pub const GRID_COLUMNS: usize = 5;

/// Default gap, in canvas units, kept between auto-placed items.
pub const DEFAULT_PADDING: f64 = 12.0;

/// Default number of grid cells probed before placement gives up.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

/// Length of the longer edge of a freshly generated item, in canvas units.
pub const DEFAULT_ITEM_EDGE: f64 = 320.0;

/// Screen-space inset from the viewport corner where new items start.
pub const PLACEMENT_MARGIN_PX: f64 = 40.0;

// ── View ────────────────────────────────────────────────────────

/// Smallest allowed zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Largest allowed zoom factor.
pub const MAX_ZOOM: f64 = 10.0;
