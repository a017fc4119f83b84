//! Canvas model for the generation studio.
//!
//! This crate holds the pure, synchronous parts of the canvas: what an item
//! is, where new items go, how the view maps screen to canvas coordinates,
//! and what is selected. It performs no I/O; the `studio` crate owns the
//! async engine that persists and schedules around it.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`geometry`] | Rects, overlap test, grid placement search |
//! | [`doc`] | Canvas items, transform patches, ordered item store |
//! | [`camera`] | View transform (pan/zoom) and coordinate conversions |
//! | [`selection`] | Primary + multi-item selection |
//! | [`consts`] | Shared numeric constants (padding, zoom limits, etc.) |

pub mod camera;
pub mod consts;
pub mod doc;
pub mod geometry;
pub mod selection;
