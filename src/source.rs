//! Gridded and ungridded source data containers.
//!
//! [`SourceData`] is the closed sum over the two layouts. Gridded data
//! is a rectilinear array addressed by one dimension coordinate per
//! axis, optionally with attached hybrid vertical fields; ungridded
//! data is a flat point collection where every value carries its own
//! coordinates. Subsetting works on both variants, collocation
//! requires the gridded capability.

use ndarray::{ArrayD, IxDyn};

use crate::coords::{AxisRole, Coordinate};
use crate::hybrid::HybridCoordinate;
use crate::sample::SamplePoints;
use crate::BuilderError;

/// Descriptive metadata carried alongside the data values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub units: String,
    /// the files the variable was loaded from, for provenance
    pub filenames: Vec<String>,
    /// human readable processing history
    pub history: String,
}

impl Metadata {
    pub fn new(name: impl Into<String>, units: impl Into<String>) -> Self {
        Metadata {
            name: name.into(),
            units: units.into(),
            filenames: Vec::new(),
            history: String::new(),
        }
    }

    pub fn with_filenames(mut self, filenames: Vec<String>) -> Self {
        self.filenames = filenames;
        self
    }

    pub fn append_history(&mut self, entry: &str) {
        if self.history.is_empty() {
            self.history = entry.to_string();
        } else {
            self.history.push('\n');
            self.history.push_str(entry);
        }
    }
}

/// One line of processing provenance: the operation, the tool version,
/// the variable, its source files and the operation detail.
pub(crate) fn history_line(operation: &str, metadata: &Metadata, detail: &str) -> String {
    format!(
        "{operation} using ndarray-colloc version {}\nvariable: {}\nfrom files: {:?}\n{detail}",
        env!("CARGO_PKG_VERSION"),
        metadata.name,
        metadata.filenames,
    )
}

/// An N-dimensional rectilinear variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedData {
    data: ArrayD<f64>,
    coords: Vec<Coordinate>,
    hybrids: Vec<HybridCoordinate>,
    metadata: Metadata,
}

impl GriddedData {
    /// Create a gridded variable from its payload and one dimension
    /// coordinate per axis, in storage order. Missing values are `NaN`.
    pub fn new(
        data: ArrayD<f64>,
        coords: Vec<Coordinate>,
        metadata: Metadata,
    ) -> Result<Self, BuilderError> {
        if coords.len() != data.ndim() {
            return Err(BuilderError::ShapeError(format!(
                "variable \"{}\": {} coordinates for a {}-d array",
                metadata.name,
                coords.len(),
                data.ndim()
            )));
        }
        for (axis, coord) in coords.iter().enumerate() {
            if coord.len() != data.shape()[axis] {
                return Err(BuilderError::ShapeError(format!(
                    "variable \"{}\": coordinate \"{}\" has {} points but axis {} has length {}",
                    metadata.name,
                    coord.name(),
                    coord.len(),
                    axis,
                    data.shape()[axis]
                )));
            }
            if coords[..axis].iter().any(|c| c.name() == coord.name()) {
                return Err(BuilderError::ShapeError(format!(
                    "variable \"{}\": duplicate coordinate \"{}\"",
                    metadata.name,
                    coord.name()
                )));
            }
        }
        Ok(GriddedData {
            data,
            coords,
            hybrids: Vec::new(),
            metadata,
        })
    }

    /// Attach a hybrid vertical coordinate. Its dimension names must
    /// resolve against this variable's coordinates and its shape must
    /// agree with theirs.
    pub fn with_hybrid(mut self, hybrid: HybridCoordinate) -> Result<Self, BuilderError> {
        for (pos, dim) in hybrid.dims().iter().enumerate() {
            let axis = self.axis_of(dim).ok_or_else(|| {
                BuilderError::ShapeError(format!(
                    "hybrid coordinate \"{}\" spans unknown dimension \"{dim}\"",
                    hybrid.name()
                ))
            })?;
            if hybrid.values().shape()[pos] != self.data.shape()[axis] {
                return Err(BuilderError::ShapeError(format!(
                    "hybrid coordinate \"{}\": dimension \"{dim}\" has length {} but axis has {}",
                    hybrid.name(),
                    hybrid.values().shape()[pos],
                    self.data.shape()[axis]
                )));
            }
        }
        self.hybrids.push(hybrid);
        Ok(self)
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn coords(&self) -> &[Coordinate] {
        &self.coords
    }

    pub fn hybrids(&self) -> &[HybridCoordinate] {
        &self.hybrids
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn ndim(&self) -> usize {
        self.data.ndim()
    }

    /// Axis position of the named dimension.
    pub fn axis_of(&self, name: &str) -> Option<usize> {
        self.coords.iter().position(|c| c.name() == name)
    }

    /// Axis position of the first dimension coordinate with `role`.
    pub fn axis_of_role(&self, role: AxisRole) -> Option<usize> {
        self.coords.iter().position(|c| c.role() == role)
    }

    /// Fetch a single value; out-of-range indices yield `NaN`.
    pub fn value(&self, index: &[usize]) -> f64 {
        self.data.get(IxDyn(index)).copied().unwrap_or(f64::NAN)
    }

    /// Permute the storage order of the axes. Results of collocation
    /// and subsetting are invariant under this.
    pub fn transposed(self, order: &[usize]) -> Result<Self, BuilderError> {
        let ndim = self.data.ndim();
        let mut seen = vec![false; ndim];
        for &axis in order {
            if axis >= ndim || seen[axis] {
                return Err(BuilderError::ShapeError(format!(
                    "invalid axis permutation {order:?} for a {ndim}-d array"
                )));
            }
            seen[axis] = true;
        }
        if order.len() != ndim {
            return Err(BuilderError::ShapeError(format!(
                "invalid axis permutation {order:?} for a {ndim}-d array"
            )));
        }
        let coords = order.iter().map(|&axis| self.coords[axis].clone()).collect();
        let data = self.data.permuted_axes(IxDyn(order));
        Ok(GriddedData {
            data,
            coords,
            hybrids: self.hybrids,
            metadata: self.metadata,
        })
    }
}

/// A flat point collection where every value carries its own
/// coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct UngriddedData {
    points: SamplePoints,
    data: ArrayD<f64>,
    metadata: Metadata,
}

impl UngriddedData {
    /// Create an ungridded variable; `data` must be 1-d with one value
    /// per point. Missing values are `NaN`.
    pub fn new(
        points: SamplePoints,
        data: ArrayD<f64>,
        metadata: Metadata,
    ) -> Result<Self, BuilderError> {
        if data.ndim() != 1 {
            return Err(BuilderError::ShapeError(format!(
                "variable \"{}\": ungridded data must be 1-d, got {}-d",
                metadata.name,
                data.ndim()
            )));
        }
        if data.len() != points.len() {
            return Err(BuilderError::ShapeError(format!(
                "variable \"{}\": {} values for {} points",
                metadata.name,
                data.len(),
                points.len()
            )));
        }
        Ok(UngriddedData {
            points,
            data,
            metadata,
        })
    }

    pub fn points(&self) -> &SamplePoints {
        &self.points
    }

    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Keep only the points where `keep` is true.
    pub(crate) fn filter(&self, keep: &[bool]) -> UngriddedData {
        let data = self
            .data
            .iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(&v, _)| v)
            .collect::<Vec<f64>>();
        UngriddedData {
            points: self.points.filter(keep),
            data: ArrayD::from_shape_vec(IxDyn(&[data.len()]), data)
                .unwrap_or_else(|_| unreachable!()),
            metadata: self.metadata.clone(),
        }
    }
}

/// Source data is either gridded or ungridded.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceData {
    Gridded(GriddedData),
    Ungridded(UngriddedData),
}

impl SourceData {
    pub fn metadata(&self) -> &Metadata {
        match self {
            SourceData::Gridded(g) => g.metadata(),
            SourceData::Ungridded(u) => u.metadata(),
        }
    }

    pub fn metadata_mut(&mut self) -> &mut Metadata {
        match self {
            SourceData::Gridded(g) => g.metadata_mut(),
            SourceData::Ungridded(u) => u.metadata_mut(),
        }
    }

    /// The cell-lookup capability; present only for gridded data.
    pub fn as_gridded(&self) -> Option<&GriddedData> {
        match self {
            SourceData::Gridded(g) => Some(g),
            SourceData::Ungridded(_) => None,
        }
    }

    pub fn as_ungridded(&self) -> Option<&UngriddedData> {
        match self {
            SourceData::Gridded(_) => None,
            SourceData::Ungridded(u) => Some(u),
        }
    }

    /// Enumerate the available coordinates as `(name, role)` pairs.
    pub fn coords(&self) -> Vec<(String, AxisRole)> {
        match self {
            SourceData::Gridded(g) => g
                .coords()
                .iter()
                .map(|c| (c.name().to_string(), c.role()))
                .chain(
                    g.hybrids()
                        .iter()
                        .map(|h| (h.name().to_string(), h.role())),
                )
                .collect(),
            SourceData::Ungridded(u) => {
                let points = u.points();
                [
                    (AxisRole::Latitude, "latitude"),
                    (AxisRole::Longitude, "longitude"),
                    (AxisRole::Altitude, "altitude"),
                    (AxisRole::Pressure, "air_pressure"),
                    (AxisRole::Time, "time"),
                ]
                .into_iter()
                .filter(|&(role, _)| points.field(role).is_some())
                .map(|(role, name)| (name.to_string(), role))
                .collect()
            }
        }
    }
}

impl From<GriddedData> for SourceData {
    fn from(data: GriddedData) -> Self {
        SourceData::Gridded(data)
    }
}

impl From<UngriddedData> for SourceData {
    fn from(data: UngriddedData) -> Self {
        SourceData::Ungridded(data)
    }
}
