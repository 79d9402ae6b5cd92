//! Cell location along a single grid axis.
//!
//! [`AxisLocator::locate`] finds the pair of grid points enclosing a
//! query value, together with the linear blending weight, or reports the
//! query as out of bounds. Circular longitude axes wrap the query into
//! the native span first and treat the seam between the last and first
//! point as a regular cell. Descending axes are handled symmetrically;
//! the fraction is always the weight of the `upper` index.
//!
//! [`AxisLocator::containing_cell`] applies the nearest-neighbour
//! tie-break: a value on a cell boundary belongs to the cell whose upper
//! bound (in value space) it equals.

use ndarray::{Array2, ArrayView1};

use crate::coords::Coordinate;
use crate::vector_extensions::VectorExtensions;

/// Which side of the covered span an out-of-bounds query lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Below,
    Above,
}

/// Result of locating a query value along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellResult {
    /// The query lies between `points[lower]` and `points[upper]`;
    /// `fraction` is the linear weight of `upper`. On the seam cell of
    /// a circular axis `upper` is `0`.
    Enclosed {
        lower: usize,
        upper: usize,
        fraction: f64,
    },
    /// The query lies outside the covered span; `nearest` is the index
    /// of the closest edge point.
    OutOfBounds { nearest: usize, side: Side },
}

/// Cell lookup over one coordinate axis or one extracted vertical
/// profile.
#[derive(Debug)]
pub struct AxisLocator<'a> {
    points: ArrayView1<'a, f64>,
    bounds: Option<&'a Array2<f64>>,
    circular: bool,
    ascending: bool,
}

impl<'a> AxisLocator<'a> {
    pub fn new(coord: &'a Coordinate) -> Self {
        AxisLocator {
            points: coord.points().view(),
            bounds: coord.bounds(),
            circular: coord.is_circular(),
            ascending: coord.is_ascending(),
        }
    }

    /// Locator over a vertical profile extracted from a hybrid
    /// coordinate. The direction is taken from the profile ends; no
    /// monotonicity is enforced.
    pub(crate) fn for_profile(points: ArrayView1<'a, f64>) -> Self {
        let ascending = points.len() < 2 || points[0] <= points[points.len() - 1];
        AxisLocator {
            points,
            bounds: None,
            circular: false,
            ascending,
        }
    }

    /// Wrap a query value into the native span of a circular axis.
    pub fn normalize(&self, value: f64) -> f64 {
        if !self.circular {
            return value;
        }
        let base = self.points[0];
        base + (value - base).rem_euclid(360.0)
    }

    /// Locate the enclosing cell for `value`.
    pub fn locate(&self, value: f64) -> CellResult {
        let p = &self.points;
        let n = p.len();
        if n == 1 {
            return if value == p[0] {
                CellResult::Enclosed {
                    lower: 0,
                    upper: 0,
                    fraction: 0.0,
                }
            } else {
                let side = if value < p[0] { Side::Below } else { Side::Above };
                CellResult::OutOfBounds { nearest: 0, side }
            };
        }

        let value = self.normalize(value);
        if self.circular && value > p[n - 1] {
            // seam cell between the last and first point
            let gap = p[0] + 360.0 - p[n - 1];
            return CellResult::Enclosed {
                lower: n - 1,
                upper: 0,
                fraction: (value - p[n - 1]) / gap,
            };
        }

        if self.ascending {
            if value < p[0] {
                return CellResult::OutOfBounds {
                    nearest: 0,
                    side: Side::Below,
                };
            }
            if value > p[n - 1] {
                return CellResult::OutOfBounds {
                    nearest: n - 1,
                    side: Side::Above,
                };
            }
            let lower = p.get_lower_index(value);
            CellResult::Enclosed {
                lower,
                upper: lower + 1,
                fraction: self.fraction_in(lower, value),
            }
        } else {
            if value > p[0] {
                return CellResult::OutOfBounds {
                    nearest: 0,
                    side: Side::Above,
                };
            }
            if value < p[n - 1] {
                return CellResult::OutOfBounds {
                    nearest: n - 1,
                    side: Side::Below,
                };
            }
            let lower = self.falling_lower_index(value);
            CellResult::Enclosed {
                lower,
                upper: lower + 1,
                fraction: self.fraction_in(lower, value),
            }
        }
    }

    /// The cell containing `value` per the tie-break rule
    /// "greater than the lower bound, less than or equal to the upper
    /// bound", or `None` when the value is outside the covered span.
    pub fn containing_cell(&self, value: f64) -> Option<usize> {
        match self.locate(value) {
            CellResult::OutOfBounds { .. } => None,
            CellResult::Enclosed { lower, upper, .. } if lower == upper => Some(lower),
            CellResult::Enclosed { lower, upper, .. } => {
                let v = self.normalize(value);
                let seam = upper == 0;
                // index of the cell on the smaller-value side of the
                // shared boundary
                let (value_low, value_high) = if self.ascending {
                    (lower, upper)
                } else {
                    (upper, lower)
                };
                let boundary = self.shared_boundary(lower, upper, seam, value_low);
                if v <= boundary {
                    Some(value_low)
                } else {
                    Some(value_high)
                }
            }
        }
    }

    /// The edge cell used for linear extrapolation, with the fraction
    /// left unclamped so the blending formula continues the edge slope.
    pub(crate) fn edge_cell(&self, value: f64, side: Side) -> (usize, usize, f64) {
        let n = self.points.len();
        if n < 2 {
            return (0, 0, 0.0);
        }
        let lower = match (side, self.ascending) {
            (Side::Below, true) | (Side::Above, false) => 0,
            (Side::Above, true) | (Side::Below, false) => n - 2,
        };
        (lower, lower + 1, self.fraction_in(lower, value))
    }

    /// Linear weight of `lower + 1` for a value inside (or beyond) the
    /// cell starting at `lower`.
    fn fraction_in(&self, lower: usize, value: f64) -> f64 {
        let a = self.points[lower];
        let b = self.points[lower + 1];
        (value - a) / (b - a)
    }

    /// Value of the boundary between the two candidate cells.
    fn shared_boundary(&self, lower: usize, upper: usize, seam: bool, value_low: usize) -> f64 {
        if seam {
            let n = self.points.len();
            return (self.points[n - 1] + self.points[0] + 360.0) / 2.0;
        }
        match self.bounds {
            Some(bounds) => bounds[[value_low, 0]].max(bounds[[value_low, 1]]),
            None => (self.points[lower] + self.points[upper]) / 2.0,
        }
    }

    /// Largest index `i <= n - 2` with `points[i] >= value` on a
    /// falling axis.
    fn falling_lower_index(&self, value: f64) -> usize {
        let p = &self.points;
        let n = p.len();
        if value >= p[n - 2] {
            return n - 2;
        }
        let mut lo = 0usize;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = lo + (hi - lo) / 2;
            if p[mid] >= value {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        lo
    }
}
