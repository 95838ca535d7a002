// src/image/boundary.rs

//! External-boundary extraction for rectangle sets.
//!
//! The external boundary of a set of rectangles is `dilate(set, 1) \ set`:
//! the unit-thickness shell of points adjacent to the set but not inside
//! it, decomposed into disjoint unit-thin strips. The straight-only variant
//! excludes the diagonal unit corners, keeping only the four side strips of
//! each rectangle.

use crate::image::geom::IRect;
use crate::utils::error::{MapError, Result};

/// Unit-thickness external boundary, diagonal corners included.
pub fn external_boundary(rects: &[IRect]) -> Result<Vec<IRect>> {
    let mut candidates = Vec::with_capacity(rects.len());
    for rect in rects {
        candidates.push(rect.dilate(1, 1)?);
    }
    collect_strips(rects, &candidates)
}

/// Unit-thickness external boundary restricted to straight (axis-adjacent)
/// neighbours: the four side strips of each rectangle, corners excluded.
pub fn external_straight_boundary(rects: &[IRect]) -> Result<Vec<IRect>> {
    let mut candidates = Vec::with_capacity(rects.len() * 4);
    for rect in rects {
        candidates.extend(side_strips(rect)?);
    }
    collect_strips(rects, &candidates)
}

fn side_strips(rect: &IRect) -> Result<[IRect; 4]> {
    let overflow =
        || MapError::BadShape(format!("boundary of {:?} overflows the plane", rect));
    let left = rect.min_x().checked_sub(1).ok_or_else(overflow)?;
    let right = rect.max_x().checked_add(1).ok_or_else(overflow)?;
    let top = rect.min_y().checked_sub(1).ok_or_else(overflow)?;
    let bottom = rect.max_y().checked_add(1).ok_or_else(overflow)?;
    Ok([
        IRect::new(left, left, rect.min_y(), rect.max_y())?,
        IRect::new(right, right, rect.min_y(), rect.max_y())?,
        IRect::new(rect.min_x(), rect.max_x(), top, top)?,
        IRect::new(rect.min_x(), rect.max_x(), bottom, bottom)?,
    ])
}

/// Subtracts the source set (and already-emitted strips, so the result is
/// disjoint) from every candidate, asserting that each surviving piece is
/// unit-thin on at least one axis.
fn collect_strips(rects: &[IRect], candidates: &[IRect]) -> Result<Vec<IRect>> {
    let mut strips: Vec<IRect> = Vec::new();
    for candidate in candidates {
        let outside = candidate.subtract_all(rects);
        for piece in outside {
            for strip in piece.subtract_all(strips.iter()) {
                if strip.size_x() != 1 && strip.size_y() != 1 {
                    return Err(MapError::Internal(format!(
                        "boundary piece {:?} is not unit-thin",
                        strip
                    )));
                }
                strips.push(strip);
            }
        }
    }
    Ok(strips)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_area(rects: &[IRect]) -> i64 {
        rects.iter().map(|r| r.pixel_count().unwrap()).sum()
    }

    #[test]
    fn single_rectangle_ring() {
        let r = IRect::new(0, 3, 0, 1).unwrap();
        let boundary = external_boundary(&[r]).unwrap();
        // Dilated 6x4 minus 4x2 leaves a ring of 16 unit cells.
        assert_eq!(total_area(&boundary), 16);
        for s in &boundary {
            assert!(s.size_x() == 1 || s.size_y() == 1);
        }
    }

    #[test]
    fn straight_boundary_excludes_corners() {
        let r = IRect::new(0, 3, 0, 1).unwrap();
        let boundary = external_straight_boundary(&[r]).unwrap();
        // Ring minus the 4 diagonal corner cells.
        assert_eq!(total_area(&boundary), 12);
        for s in &boundary {
            assert!(!s.contains(-1, -1));
            assert!(!s.contains(4, 2));
        }
    }

    #[test]
    fn touching_rectangles_share_no_internal_boundary() {
        let a = IRect::new(0, 1, 0, 1).unwrap();
        let b = IRect::new(2, 3, 0, 1).unwrap();
        let boundary = external_boundary(&[a, b]).unwrap();
        // The seam column x=2 belongs to b, x=1 to a: neither is boundary.
        for s in &boundary {
            assert!(!a.intersects(s) && !b.intersects(s));
        }
        // Disjoint strips: area equals the dilated union minus the set.
        assert_eq!(total_area(&boundary), 6 * 4 - 8);
    }
}
