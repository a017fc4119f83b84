#![allow(clippy::float_cmp)]

use super::*;

fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    Rect::new(x, y, w, h)
}

fn assert_clear_of_all(candidate: &Rect, others: &[Rect], padding: f64) {
    for other in others {
        assert!(
            !overlaps(candidate, other, padding),
            "{candidate:?} overlaps {other:?} with padding {padding}"
        );
    }
}

// =============================================================
// overlaps
// =============================================================

#[test]
fn overlaps_identical_rects() {
    let a = rect(0.0, 0.0, 100.0, 100.0);
    assert!(overlaps(&a, &a, 0.0));
}

#[test]
fn overlaps_is_symmetric() {
    let a = rect(0.0, 0.0, 100.0, 100.0);
    let b = rect(50.0, 50.0, 100.0, 100.0);
    assert_eq!(overlaps(&a, &b, 12.0), overlaps(&b, &a, 12.0));
    let c = rect(500.0, 0.0, 10.0, 10.0);
    assert_eq!(overlaps(&a, &c, 12.0), overlaps(&c, &a, 12.0));
}

#[test]
fn overlaps_touching_edges_without_padding_is_clear() {
    let a = rect(0.0, 0.0, 100.0, 100.0);
    let b = rect(100.0, 0.0, 100.0, 100.0);
    assert!(!overlaps(&a, &b, 0.0));
}

#[test]
fn overlaps_gap_equal_to_padding_is_clear() {
    let a = rect(0.0, 0.0, 200.0, 200.0);
    let b = rect(212.0, 0.0, 200.0, 200.0);
    assert!(!overlaps(&a, &b, 12.0));
}

#[test]
fn overlaps_gap_smaller_than_padding_conflicts() {
    let a = rect(0.0, 0.0, 200.0, 200.0);
    let b = rect(211.0, 0.0, 200.0, 200.0);
    assert!(overlaps(&a, &b, 12.0));
}

#[test]
fn overlaps_vertical_gap_respects_padding() {
    let a = rect(0.0, 0.0, 100.0, 100.0);
    assert!(overlaps(&a, &rect(0.0, 105.0, 100.0, 100.0), 10.0));
    assert!(!overlaps(&a, &rect(0.0, 110.0, 100.0, 100.0), 10.0));
}

#[test]
fn overlaps_diagonal_neighbours_clear() {
    let a = rect(0.0, 0.0, 100.0, 100.0);
    let b = rect(150.0, 150.0, 100.0, 100.0);
    assert!(!overlaps(&a, &b, 12.0));
}

// =============================================================
// Size
// =============================================================

#[test]
fn size_from_landscape_ratio() {
    let s = Size::from_aspect_ratio("16:9", 320.0);
    assert_eq!(s.width, 320.0);
    assert_eq!(s.height, 180.0);
}

#[test]
fn size_from_portrait_ratio() {
    let s = Size::from_aspect_ratio("9:16", 320.0);
    assert_eq!(s.width, 180.0);
    assert_eq!(s.height, 320.0);
}

#[test]
fn size_from_square_ratio() {
    let s = Size::from_aspect_ratio("1:1", 256.0);
    assert_eq!(s, Size::new(256.0, 256.0));
}

#[test]
fn size_from_garbage_ratio_is_square() {
    assert_eq!(Size::from_aspect_ratio("wide", 100.0), Size::new(100.0, 100.0));
    assert_eq!(Size::from_aspect_ratio("0:9", 100.0), Size::new(100.0, 100.0));
    assert_eq!(Size::from_aspect_ratio("", 100.0), Size::new(100.0, 100.0));
}

// =============================================================
// find_non_overlapping_position
// =============================================================

#[test]
fn placement_on_empty_canvas_uses_start() {
    let placed = find_non_overlapping_position(Size::new(200.0, 200.0), &[], 40.0, 60.0, 100, 12.0);
    assert_eq!(placed, rect(40.0, 60.0, 200.0, 200.0));
}

#[test]
fn placement_steps_right_by_width_plus_padding() {
    let existing = [rect(0.0, 0.0, 200.0, 200.0)];
    let placed = find_non_overlapping_position(Size::new(200.0, 200.0), &existing, 0.0, 0.0, 100, 12.0);
    assert_eq!(placed, rect(212.0, 0.0, 200.0, 200.0));
    assert_clear_of_all(&placed, &existing, 12.0);
}

#[test]
fn placement_wraps_to_next_row_after_five_columns() {
    let size = Size::new(100.0, 50.0);
    let existing: Vec<Rect> = (0..5)
        .map(|i| grid_cell(size, 0.0, 0.0, i, 10.0))
        .collect();
    let placed = find_non_overlapping_position(size, &existing, 0.0, 0.0, 100, 10.0);
    assert_eq!(placed, rect(0.0, 60.0, 100.0, 50.0));
    assert_clear_of_all(&placed, &existing, 10.0);
}

#[test]
fn placement_skips_large_obstacle() {
    let existing = [rect(0.0, 0.0, 500.0, 120.0)];
    let placed = find_non_overlapping_position(Size::new(100.0, 100.0), &existing, 0.0, 0.0, 100, 12.0);
    assert_clear_of_all(&placed, &existing, 12.0);
    // Row 0 sits beside the obstacle and row 1 is within padding of its bottom edge.
    assert_eq!(placed, rect(0.0, 224.0, 100.0, 100.0));
}

#[test]
fn placement_exhausted_budget_returns_last_cell() {
    let size = Size::new(100.0, 100.0);
    let blocker = [rect(-1000.0, -1000.0, 5000.0, 5000.0)];
    let placed = find_non_overlapping_position(size, &blocker, 0.0, 0.0, 7, 12.0);
    // attempt 6 -> row 1, col 1
    assert_eq!(placed, grid_cell(size, 0.0, 0.0, 6, 12.0));
    assert_eq!(placed, rect(112.0, 112.0, 100.0, 100.0));
}

#[test]
fn placement_zero_budget_returns_start() {
    let blocker = [rect(0.0, 0.0, 100.0, 100.0)];
    let placed = find_non_overlapping_position(Size::new(50.0, 50.0), &blocker, 5.0, 5.0, 0, 12.0);
    assert_eq!(placed, rect(5.0, 5.0, 50.0, 50.0));
}

#[test]
fn placement_is_deterministic() {
    let existing = [
        rect(0.0, 0.0, 200.0, 200.0),
        rect(212.0, 0.0, 200.0, 200.0),
        rect(30.0, 250.0, 80.0, 80.0),
    ];
    let size = Size::new(200.0, 200.0);
    let a = find_non_overlapping_position(size, &existing, 0.0, 0.0, 50, 12.0);
    let b = find_non_overlapping_position(size, &existing, 0.0, 0.0, 50, 12.0);
    assert_eq!(a, b);
}

#[test]
fn placement_no_overlap_whenever_a_cell_is_free() {
    // Sweep a range of obstacle layouts; every one leaves free cells in the budget.
    let size = Size::new(120.0, 90.0);
    let padding = 12.0;
    for seed in 0..40_u32 {
        let existing: Vec<Rect> = (0..seed % 9)
            .map(|i| {
                let fi = f64::from(i);
                let fs = f64::from(seed);
                let (x, y) = ((fi * 97.0 + fs * 13.0) % 600.0, (fi * 53.0 + fs * 7.0) % 400.0);
                rect(x, y, 80.0 + fi * 10.0, 60.0 + fs % 50.0)
            })
            .collect();
        let placed = find_non_overlapping_position(size, &existing, 0.0, 0.0, 200, padding);
        assert_clear_of_all(&placed, &existing, padding);
    }
}

// =============================================================
// place_many
// =============================================================

#[test]
fn place_many_avoids_each_other() {
    let existing = [rect(0.0, 0.0, 200.0, 200.0)];
    let sizes = [Size::new(200.0, 200.0); 3];
    let placed = place_many(&sizes, &existing, 0.0, 0.0, 100, 12.0);
    assert_eq!(placed.len(), 3);
    let mut all = existing.to_vec();
    for r in &placed {
        assert_clear_of_all(r, &all, 12.0);
        all.push(*r);
    }
}

#[test]
fn place_many_empty_sizes_is_empty() {
    assert!(place_many(&[], &[], 0.0, 0.0, 10, 12.0).is_empty());
}
