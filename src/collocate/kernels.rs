//! Nearest-neighbour and multi-linear collocation kernels.

use ndarray::ArrayD;

use crate::CollocationError;

/// Per-axis cell and weight information for one sample point.
///
/// `lower == upper` marks an axis collapsed to a fixed index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct AxisCell {
    pub lower: usize,
    pub upper: usize,
    /// linear weight of `upper`; lies outside `[0, 1]` when the cell
    /// extrapolates beyond the axis edge
    pub fraction: f64,
    /// containing cell per the upper-bound-inclusive tie-break, or the
    /// nearest edge for extrapolated cells
    pub nearest: usize,
}

impl AxisCell {
    pub fn fixed(index: usize) -> Self {
        AxisCell {
            lower: index,
            upper: index,
            fraction: 0.0,
            nearest: index,
        }
    }
}

/// Combines per-axis cells into one output value.
pub(crate) trait Kernel: Sync {
    /// `None` marks missing source data at the resolved location.
    fn evaluate(&self, data: &ArrayD<f64>, cells: &[AxisCell]) -> Option<f64>;
}

/// Coordinate-wise nearest selection: for each axis independently the
/// cell containing the query is picked, no blending across axes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct NearestNeighbour;

impl Kernel for NearestNeighbour {
    fn evaluate(&self, data: &ArrayD<f64>, cells: &[AxisCell]) -> Option<f64> {
        let index: Vec<usize> = cells.iter().map(|c| c.nearest).collect();
        let value = data[index.as_slice()];
        (!value.is_nan()).then_some(value)
    }
}

/// Tensor-product linear blending across all enclosed axes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MultiLinear;

impl Kernel for MultiLinear {
    fn evaluate(&self, data: &ArrayD<f64>, cells: &[AxisCell]) -> Option<f64> {
        let blend_axes: Vec<usize> = cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.lower != c.upper)
            .map(|(axis, _)| axis)
            .collect();

        let mut index: Vec<usize> = cells.iter().map(|c| c.lower).collect();
        let mut acc = 0.0;
        for corner in 0u32..(1 << blend_axes.len()) {
            let mut weight = 1.0;
            for (bit, &axis) in blend_axes.iter().enumerate() {
                if corner & (1 << bit) != 0 {
                    index[axis] = cells[axis].upper;
                    weight *= cells[axis].fraction;
                } else {
                    index[axis] = cells[axis].lower;
                    weight *= 1.0 - cells[axis].fraction;
                }
            }
            let value = data[index.as_slice()];
            if value.is_nan() {
                return None;
            }
            acc += weight * value;
        }
        Some(acc)
    }
}

/// Kernel selection by configuration name.
#[derive(Debug, Clone, Copy)]
pub(crate) enum KernelKind {
    NearestNeighbour(NearestNeighbour),
    MultiLinear(MultiLinear),
}

impl KernelKind {
    pub fn from_name(name: &str) -> Result<Self, CollocationError> {
        match name {
            "nn" => Ok(KernelKind::NearestNeighbour(NearestNeighbour)),
            "lin" => Ok(KernelKind::MultiLinear(MultiLinear)),
            other => Err(CollocationError::UnknownKernel(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            KernelKind::NearestNeighbour(_) => "nn",
            KernelKind::MultiLinear(_) => "lin",
        }
    }

    pub fn kernel(&self) -> &dyn Kernel {
        match self {
            KernelKind::NearestNeighbour(k) => k,
            KernelKind::MultiLinear(k) => k,
        }
    }
}
