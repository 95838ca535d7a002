// src/image/geom.rs

//! Geometric primitives for inclusive integer rectangles on the signed
//! 64-bit plane.
//!
//! All positions in the map-buffer subsystem are signed 64-bit integers. A
//! rectangle is `[min_x, max_x] x [min_y, max_y]` with *inclusive* bounds
//! and size >= 1 on both axes. Rectangle construction goes through checked
//! arithmetic so that coordinate overflow surfaces as `BadShape` instead of
//! wrapping.

use crate::utils::error::{MapError, Result};

/// An axis-aligned rectangle with inclusive integer bounds.
///
/// This struct is `Copy`, so it can be passed around cheaply by value.
/// Invariant: `min_x <= max_x`, `min_y <= max_y`, and both spans fit in
/// `i64` (enforced at construction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IRect {
    min_x: i64,
    max_x: i64,
    min_y: i64,
    max_y: i64,
}

impl IRect {
    /// Creates a rectangle from inclusive bounds.
    pub fn new(min_x: i64, max_x: i64, min_y: i64, max_y: i64) -> Result<Self> {
        if min_x > max_x || min_y > max_y {
            return Err(MapError::BadShape(format!(
                "degenerate rectangle [{}, {}] x [{}, {}]",
                min_x, max_x, min_y, max_y
            )));
        }
        // Both spans must be representable: size_x/size_y are infallible
        // afterwards.
        let span_ok = |min: i64, max: i64| {
            max.checked_sub(min).and_then(|d| d.checked_add(1)).is_some()
        };
        if !span_ok(min_x, max_x) || !span_ok(min_y, max_y) {
            return Err(MapError::BadShape(format!(
                "rectangle span overflows i64: [{}, {}] x [{}, {}]",
                min_x, max_x, min_y, max_y
            )));
        }
        Ok(IRect {
            min_x,
            max_x,
            min_y,
            max_y,
        })
    }

    /// Creates a rectangle from its left-top corner and sizes.
    pub fn from_origin_and_sizes(x: i64, y: i64, size_x: i64, size_y: i64) -> Result<Self> {
        if size_x < 1 || size_y < 1 {
            return Err(MapError::BadShape(format!(
                "rectangle sizes must be positive, got {}x{}",
                size_x, size_y
            )));
        }
        let max_x = x.checked_add(size_x - 1).ok_or_else(|| {
            MapError::BadShape(format!("x + size_x overflows: {} + {}", x, size_x))
        })?;
        let max_y = y.checked_add(size_y - 1).ok_or_else(|| {
            MapError::BadShape(format!("y + size_y overflows: {} + {}", y, size_y))
        })?;
        IRect::new(x, max_x, y, max_y)
    }

    pub fn min_x(&self) -> i64 {
        self.min_x
    }

    pub fn max_x(&self) -> i64 {
        self.max_x
    }

    pub fn min_y(&self) -> i64 {
        self.min_y
    }

    pub fn max_y(&self) -> i64 {
        self.max_y
    }

    /// Horizontal size (inclusive bounds, so always >= 1).
    pub fn size_x(&self) -> i64 {
        self.max_x - self.min_x + 1
    }

    /// Vertical size (inclusive bounds, so always >= 1).
    pub fn size_y(&self) -> i64 {
        self.max_y - self.min_y + 1
    }

    /// Total number of integer points covered by this rectangle.
    pub fn pixel_count(&self) -> Result<i64> {
        self.size_x().checked_mul(self.size_y()).ok_or_else(|| {
            MapError::BadShape(format!("pixel count of {:?} overflows i64", self))
        })
    }

    /// Checks if a point is contained within the rectangle's bounds.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Checks if `other` lies entirely inside `self`.
    pub fn contains_rect(&self, other: &IRect) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Two rectangles intersect iff their closed intervals overlap on both
    /// axes.
    pub fn intersects(&self, other: &IRect) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    /// Returns the intersection, or `None` when the rectangles are disjoint.
    pub fn intersection(&self, other: &IRect) -> Option<IRect> {
        if !self.intersects(other) {
            return None;
        }
        Some(IRect {
            min_x: self.min_x.max(other.min_x),
            max_x: self.max_x.min(other.max_x),
            min_y: self.min_y.max(other.min_y),
            max_y: self.max_y.min(other.max_y),
        })
    }

    /// Returns the smallest rectangle containing both `self` and `other`.
    pub fn bounding(&self, other: &IRect) -> Result<IRect> {
        IRect::new(
            self.min_x.min(other.min_x),
            self.max_x.max(other.max_x),
            self.min_y.min(other.min_y),
            self.max_y.max(other.max_y),
        )
    }

    /// Grows the rectangle by `dx`/`dy` on each side, with overflow checking.
    pub fn dilate(&self, dx: i64, dy: i64) -> Result<IRect> {
        let min_x = self.min_x.checked_sub(dx);
        let max_x = self.max_x.checked_add(dx);
        let min_y = self.min_y.checked_sub(dy);
        let max_y = self.max_y.checked_add(dy);
        match (min_x, max_x, min_y, max_y) {
            (Some(a), Some(b), Some(c), Some(d)) => IRect::new(a, b, c, d),
            _ => Err(MapError::BadShape(format!(
                "dilation by ({}, {}) overflows {:?}",
                dx, dy, self
            ))),
        }
    }

    /// Subtracts `other` from `self`, producing up to four disjoint pieces.
    ///
    /// The decomposition is the standard one: full-width slabs above and
    /// below the intersection, then side slabs at the intersection's height.
    pub fn subtract(&self, other: &IRect) -> Vec<IRect> {
        let isect = match self.intersection(other) {
            Some(r) => r,
            None => return vec![*self],
        };
        let mut pieces = Vec::with_capacity(4);
        if isect.min_y > self.min_y {
            pieces.push(IRect {
                min_x: self.min_x,
                max_x: self.max_x,
                min_y: self.min_y,
                max_y: isect.min_y - 1,
            });
        }
        if isect.max_y < self.max_y {
            pieces.push(IRect {
                min_x: self.min_x,
                max_x: self.max_x,
                min_y: isect.max_y + 1,
                max_y: self.max_y,
            });
        }
        if isect.min_x > self.min_x {
            pieces.push(IRect {
                min_x: self.min_x,
                max_x: isect.min_x - 1,
                min_y: isect.min_y,
                max_y: isect.max_y,
            });
        }
        if isect.max_x < self.max_x {
            pieces.push(IRect {
                min_x: isect.max_x + 1,
                max_x: self.max_x,
                min_y: isect.min_y,
                max_y: isect.max_y,
            });
        }
        pieces
    }

    /// Subtracts every rectangle of `holes` from `self`, returning the
    /// remaining disjoint pieces (empty when `self` is fully covered).
    pub fn subtract_all<'a, I>(&self, holes: I) -> Vec<IRect>
    where
        I: IntoIterator<Item = &'a IRect>,
    {
        let mut work = vec![*self];
        for hole in holes {
            if work.is_empty() {
                break;
            }
            let mut next = Vec::with_capacity(work.len());
            for piece in &work {
                next.extend(piece.subtract(hole));
            }
            work = next;
        }
        work
    }

    /// `self` is covered by a set of rectangles iff the union of the set
    /// contains `self` as a set of points.
    pub fn is_covered_by<'a, I>(&self, rects: I) -> bool
    where
        I: IntoIterator<Item = &'a IRect>,
    {
        self.subtract_all(rects).is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_and_pixel_count() {
        let r = IRect::new(-2, 2, 0, 0).unwrap();
        assert_eq!(r.size_x(), 5);
        assert_eq!(r.size_y(), 1);
        assert_eq!(r.pixel_count().unwrap(), 5);
    }

    #[test]
    fn degenerate_rectangle_rejected() {
        assert!(IRect::new(1, 0, 0, 0).is_err());
        assert!(IRect::from_origin_and_sizes(0, 0, 0, 5).is_err());
    }

    #[test]
    fn origin_overflow_rejected() {
        assert!(IRect::from_origin_and_sizes(i64::MAX - 1, 0, 10, 1).is_err());
    }

    #[test]
    fn intersection_inclusive_edges() {
        let a = IRect::new(0, 3, 0, 3).unwrap();
        let b = IRect::new(3, 5, 3, 5).unwrap();
        // Closed intervals: touching at a single point still intersects.
        let i = a.intersection(&b).unwrap();
        assert_eq!(i, IRect::new(3, 3, 3, 3).unwrap());
    }

    #[test]
    fn subtract_produces_ring() {
        let outer = IRect::new(-1, 4, -1, 4).unwrap();
        let inner = IRect::new(0, 3, 0, 3).unwrap();
        let ring = outer.subtract(&inner);
        assert_eq!(ring.len(), 4);
        let total: i64 = ring.iter().map(|r| r.pixel_count().unwrap()).sum();
        assert_eq!(total, 36 - 16);
        for piece in &ring {
            assert!(piece.size_x() == 1 || piece.size_y() == 1);
        }
    }

    #[test]
    fn coverage_by_two_halves() {
        let whole = IRect::new(0, 9, 0, 9).unwrap();
        let left = IRect::new(0, 4, 0, 9).unwrap();
        let right = IRect::new(5, 9, 0, 9).unwrap();
        assert!(whole.is_covered_by([&left, &right]));
        assert!(!whole.is_covered_by([&left]));
        // Overlapping halves still cover.
        let wide_right = IRect::new(3, 9, 0, 9).unwrap();
        assert!(whole.is_covered_by([&left, &wide_right]));
    }
}
