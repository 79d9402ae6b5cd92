//! Coordinate metadata for gridded axes.
//!
//! A [`Coordinate`] couples an ordered vector of point values with the
//! metadata the collocation and subsetting machinery needs: a semantic
//! [`AxisRole`], a unit string, optional per-cell bounds and the
//! circularity flag for longitude axes.

use ndarray::{Array1, Array2};

use crate::vector_extensions::{Monotonic, VectorExtensions};
use crate::BuilderError;

/// Semantic role of an axis.
///
/// Roles drive all sample/source correspondence; storage positions are
/// never compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisRole {
    /// X axis
    Longitude,
    /// Y axis
    Latitude,
    /// Z axis
    Altitude,
    /// P axis
    Pressure,
    /// T axis
    Time,
    Unclassified,
}

impl AxisRole {
    /// Resolve a single-letter axis alias (`X`, `Y`, `Z`, `P`, `T`),
    /// case insensitive.
    pub fn from_axis_letter(letter: &str) -> Option<AxisRole> {
        match letter.to_ascii_uppercase().as_str() {
            "X" => Some(AxisRole::Longitude),
            "Y" => Some(AxisRole::Latitude),
            "Z" => Some(AxisRole::Altitude),
            "P" => Some(AxisRole::Pressure),
            "T" => Some(AxisRole::Time),
            _ => None,
        }
    }

    /// Guess the role from a CF standard name.
    pub fn from_standard_name(name: &str) -> AxisRole {
        match name.to_ascii_lowercase().as_str() {
            "longitude" | "grid_longitude" | "projection_x_coordinate" => AxisRole::Longitude,
            "latitude" | "grid_latitude" | "projection_y_coordinate" => AxisRole::Latitude,
            "altitude" => AxisRole::Altitude,
            "air_pressure" => AxisRole::Pressure,
            "time" => AxisRole::Time,
            _ => AxisRole::Unclassified,
        }
    }

    /// The canonical axis letter, if the role has one.
    pub fn axis_letter(self) -> Option<char> {
        match self {
            AxisRole::Longitude => Some('X'),
            AxisRole::Latitude => Some('Y'),
            AxisRole::Altitude => Some('Z'),
            AxisRole::Pressure => Some('P'),
            AxisRole::Time => Some('T'),
            AxisRole::Unclassified => None,
        }
    }
}

/// A dimension coordinate: named, ordered point values with optional
/// per-cell bounds.
///
/// Points must be strictly monotonic (either direction). Bounds, when
/// present, partition the axis into contiguous cells, one per point.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    name: String,
    role: AxisRole,
    points: Array1<f64>,
    bounds: Option<Array2<f64>>,
    units: String,
    circular: bool,
    ascending: bool,
}

impl Coordinate {
    /// Create a coordinate, guessing the [`AxisRole`] from `name`.
    pub fn new(
        name: impl Into<String>,
        points: Array1<f64>,
        units: impl Into<String>,
    ) -> Result<Self, BuilderError> {
        let name = name.into();
        let role = AxisRole::from_standard_name(&name);
        Self::with_role(name, role, points, units)
    }

    /// Create a coordinate with an explicit role.
    pub fn with_role(
        name: impl Into<String>,
        role: AxisRole,
        points: Array1<f64>,
        units: impl Into<String>,
    ) -> Result<Self, BuilderError> {
        let name = name.into();
        if points.is_empty() {
            return Err(BuilderError::NotEnoughData(format!(
                "coordinate \"{name}\" has no points"
            )));
        }
        let ascending = match points.monotonic_prop() {
            Monotonic::Rising { strict: true } => true,
            Monotonic::Falling { strict: true } => false,
            _ if points.len() == 1 => true,
            _ => {
                return Err(BuilderError::Monotonic(format!(
                    "coordinate \"{name}\" needs strictly monotonic points"
                )))
            }
        };
        Ok(Coordinate {
            name,
            role,
            points,
            bounds: None,
            units: units.into(),
            circular: false,
            ascending,
        })
    }

    /// Attach per-cell bounds, shape `(len, 2)`.
    ///
    /// Bounds must partition the axis: the upper bound of each cell is
    /// the lower bound of the next.
    pub fn with_bounds(mut self, bounds: Array2<f64>) -> Result<Self, BuilderError> {
        if bounds.nrows() != self.points.len() || bounds.ncols() != 2 {
            return Err(BuilderError::ShapeError(format!(
                "coordinate \"{}\": bounds shape {:?} does not match {} points",
                self.name,
                bounds.shape(),
                self.points.len()
            )));
        }
        for i in 0..bounds.nrows().saturating_sub(1) {
            let gap = (bounds[[i, 1]] - bounds[[i + 1, 0]]).abs();
            let scale = bounds[[i, 1]].abs().max(1.0);
            if gap > scale * 1e-8 {
                return Err(BuilderError::ShapeError(format!(
                    "coordinate \"{}\": bounds do not partition the axis at cell {i}",
                    self.name
                )));
            }
        }
        self.bounds = Some(bounds);
        Ok(self)
    }

    /// Mark a longitude axis as circular (360 degree wrap-around).
    ///
    /// Only meaningful for ascending longitude axes spanning less than
    /// a full revolution.
    pub fn with_circular(mut self) -> Result<Self, BuilderError> {
        if self.role != AxisRole::Longitude {
            return Err(BuilderError::ShapeError(format!(
                "coordinate \"{}\" is not a longitude axis, cannot be circular",
                self.name
            )));
        }
        if !self.ascending {
            return Err(BuilderError::Monotonic(format!(
                "circular longitude \"{}\" needs ascending points",
                self.name
            )));
        }
        let span = self.points[self.points.len() - 1] - self.points[0];
        if span >= 360.0 {
            return Err(BuilderError::ShapeError(format!(
                "circular longitude \"{}\" spans {span} degrees, expected less than 360",
                self.name
            )));
        }
        self.circular = true;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> AxisRole {
        self.role
    }

    pub fn points(&self) -> &Array1<f64> {
        &self.points
    }

    pub fn bounds(&self) -> Option<&Array2<f64>> {
        self.bounds.as_ref()
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn is_circular(&self) -> bool {
        self.circular
    }

    pub fn is_ascending(&self) -> bool {
        self.ascending
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Smallest and largest point value.
    pub fn value_span(&self) -> (f64, f64) {
        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        if self.ascending {
            (first, last)
        } else {
            (last, first)
        }
    }

    /// Select a subset of the points (and bounds), optionally shifting
    /// each kept value. Used by the subsetting engine; the circular
    /// flag is dropped because a subset no longer wraps.
    pub(crate) fn select(&self, keep: &[(usize, f64)]) -> Result<Coordinate, BuilderError> {
        let points = keep.iter().map(|&(i, shift)| self.points[i] + shift).collect();
        let mut coord = Coordinate::with_role(self.name.clone(), self.role, points, self.units.clone())?;
        if let Some(bounds) = &self.bounds {
            let mut rows = Array2::zeros((keep.len(), 2));
            for (row, &(i, shift)) in keep.iter().enumerate() {
                rows[[row, 0]] = bounds[[i, 0]] + shift;
                rows[[row, 1]] = bounds[[i, 1]] + shift;
            }
            coord = coord.with_bounds(rows)?;
        }
        Ok(coord)
    }
}
