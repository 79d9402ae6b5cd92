//! Hybrid (terrain-following) vertical coordinates.
//!
//! A hybrid coordinate is an auxiliary vertical field computed from a
//! formula term set and a reference field, e.g. hybrid height
//! `z = delta + sigma * orography` or hybrid pressure
//! `p = ap + b * surface_pressure`. Its values are defined pointwise
//! over the full spanned domain, so vertical lookups extract a 1-D
//! profile at the already resolved indices of the other dimensions
//! instead of consulting a shared 1-D axis.
//!
//! Dimensions are referenced by name; the field carries no knowledge of
//! the storage order of the data array it is attached to.

use ndarray::{Array1, ArrayD, Axis, IxDyn, Zip};

use crate::coords::AxisRole;
use crate::BuilderError;

/// An auxiliary vertical coordinate spanning several dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridCoordinate {
    name: String,
    role: AxisRole,
    values: ArrayD<f64>,
    dims: Vec<String>,
    units: String,
}

impl HybridCoordinate {
    /// Create a hybrid coordinate from an already computed field.
    ///
    /// `dims` names the dimensions of `values` in storage order and
    /// must include the vertical level dimension.
    pub fn new(
        name: impl Into<String>,
        role: AxisRole,
        values: ArrayD<f64>,
        dims: Vec<String>,
        units: impl Into<String>,
    ) -> Result<Self, BuilderError> {
        let name = name.into();
        if !matches!(role, AxisRole::Altitude | AxisRole::Pressure) {
            return Err(BuilderError::ShapeError(format!(
                "hybrid coordinate \"{name}\" needs an altitude or pressure role"
            )));
        }
        if dims.len() != values.ndim() {
            return Err(BuilderError::ShapeError(format!(
                "hybrid coordinate \"{name}\": {} dimension names for a {}-d field",
                dims.len(),
                values.ndim()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(BuilderError::ShapeError(format!(
                    "hybrid coordinate \"{name}\": duplicate dimension \"{dim}\""
                )));
            }
        }
        Ok(HybridCoordinate {
            name,
            role,
            values,
            dims,
            units: units.into(),
        })
    }

    /// Hybrid height: `z[k, ...] = delta[k] + sigma[k] * orography[...]`.
    ///
    /// The result spans `level_dim` followed by the orography
    /// dimensions, with altitude role and meter units.
    pub fn hybrid_height(
        delta: &Array1<f64>,
        sigma: &Array1<f64>,
        level_dim: &str,
        orography: &ArrayD<f64>,
        orography_dims: &[&str],
    ) -> Result<Self, BuilderError> {
        let values = formula_field(delta, sigma, orography, orography_dims.len())?;
        let dims = std::iter::once(level_dim)
            .chain(orography_dims.iter().copied())
            .map(String::from)
            .collect();
        HybridCoordinate::new("altitude", AxisRole::Altitude, values, dims, "m")
    }

    /// Hybrid pressure: `p[k, ...] = ap[k] + b[k] * surface_pressure[...]`.
    pub fn hybrid_pressure(
        ap: &Array1<f64>,
        b: &Array1<f64>,
        level_dim: &str,
        surface_pressure: &ArrayD<f64>,
        surface_pressure_dims: &[&str],
    ) -> Result<Self, BuilderError> {
        let values = formula_field(ap, b, surface_pressure, surface_pressure_dims.len())?;
        let dims = std::iter::once(level_dim)
            .chain(surface_pressure_dims.iter().copied())
            .map(String::from)
            .collect();
        HybridCoordinate::new("air_pressure", AxisRole::Pressure, values, dims, "Pa")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AxisRole {
        self.role
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    /// Position of a dimension name within this field.
    pub fn dim_position(&self, name: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == name)
    }

    /// Extract the vertical profile along the dimension at `level_pos`,
    /// with every other dimension fixed at `fixed[pos]`.
    pub(crate) fn profile(&self, level_pos: usize, fixed: &[usize]) -> Array1<f64> {
        let mut view = self.values.view();
        for ax in (0..self.values.ndim()).rev() {
            if ax != level_pos {
                view.collapse_axis(Axis(ax), fixed[ax]);
            }
        }
        view.iter().copied().collect()
    }
}

/// `out[k, ...] = offset[k] + factor[k] * reference[...]`
fn formula_field(
    offset: &Array1<f64>,
    factor: &Array1<f64>,
    reference: &ArrayD<f64>,
    reference_ndim: usize,
) -> Result<ArrayD<f64>, BuilderError> {
    if offset.len() != factor.len() {
        return Err(BuilderError::ShapeError(format!(
            "formula terms differ in length: {} and {}",
            offset.len(),
            factor.len()
        )));
    }
    if offset.is_empty() {
        return Err(BuilderError::NotEnoughData(
            "formula terms have no levels".into(),
        ));
    }
    if reference.ndim() != reference_ndim {
        return Err(BuilderError::ShapeError(format!(
            "{} dimension names for a {}-d reference field",
            reference_ndim,
            reference.ndim()
        )));
    }

    let mut shape = vec![offset.len()];
    shape.extend_from_slice(reference.shape());
    let mut values = ArrayD::zeros(IxDyn(&shape));
    for (k, mut level) in values.outer_iter_mut().enumerate() {
        Zip::from(&mut level)
            .and(reference)
            .for_each(|out, &r| *out = offset[k] + factor[k] * r);
    }
    Ok(values)
}
