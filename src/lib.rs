//! The ndarray-colloc crate resamples gridded geophysical data onto
//! ungridded sample locations ("collocation") and subsets data by
//! coordinate ranges.
//!
//! [`collocate`] drives the per-sample interpolation loop: for every
//! sample point the enclosing grid cells are located along each axis
//! that corresponds to one of the sample's coordinates, and a kernel
//! (nearest-neighbour `"nn"` or multi-linear `"lin"`) combines the
//! surrounding values into one output value per point.
//!
//! Axis correspondence is always by name and semantic role, never by
//! storage position, so transposing a source array does not change the
//! result. Circular longitude axes, descending axes and hybrid
//! (terrain-following) vertical coordinates are handled by the cell
//! locator, see [`AxisLocator`] and [`HybridCoordinate`].
//!
//! ```rust
//! use ndarray::{array, Array};
//! use ndarray_colloc::{
//!     collocate, CollocationOptions, Coordinate, GriddedData, Metadata, SamplePoints,
//!     SourceData,
//! };
//!
//! let lat = Coordinate::new("latitude", Array::linspace(-10.0, 10.0, 5), "degrees_north")?;
//! let lon = Coordinate::new("longitude", Array::linspace(-5.0, 5.0, 3), "degrees_east")?;
//! let values = Array::linspace(1.0, 15.0, 15)
//!     .into_shape_with_order((5, 3))?
//!     .into_dyn();
//! let cube = SourceData::from(GriddedData::new(
//!     values,
//!     vec![lat, lon],
//!     Metadata::new("rainfall_rate", "kg m-2 s-1"),
//! )?);
//!
//! let sample = SamplePoints::builder()
//!     .latitude(array![1.0])
//!     .longitude(array![1.0])
//!     .build()?;
//!
//! let nearest = collocate(&sample, &cube, None, "nn", CollocationOptions::new())?;
//! assert_eq!(nearest[0].values[0], 8.0);
//!
//! let linear = collocate(&sample, &cube, None, "lin", CollocationOptions::new())?;
//! assert!((linear[0].values[0] - 8.8).abs() < 1e-12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
mod collocate;
mod coords;
mod hybrid;
mod locate;
mod reader;
mod sample;
mod source;
mod subset;
mod time_unit;
mod vector_extensions;

pub use collocate::{collocate, collocate_list, CollocationOptions, CollocationOutput};
pub use coords::{AxisRole, Coordinate};
pub use hybrid::HybridCoordinate;
pub use locate::{AxisLocator, CellResult, Side};
pub use reader::{read_with_context, DataReader, ReadError};
pub use sample::{SamplePoints, SamplePointsBuilder};
pub use source::{GriddedData, Metadata, SourceData, UngriddedData};
pub use subset::{subset, SubsetConstraint};
pub use time_unit::TimeUnit;
pub use vector_extensions::{Monotonic, VectorExtensions};

use thiserror::Error;

/// Errors during construction and validation of coordinates, sample
/// point sets and data containers
#[derive(Debug, Error)]
pub enum BuilderError {
    /// coordinate values need to be monotonic
    #[error("{0}")]
    Monotonic(String),
    /// array lengths or shapes do not agree
    #[error("{0}")]
    ShapeError(String),
    /// not enough data for the requested operation
    #[error("{0}")]
    NotEnoughData(String),
    /// a unit string could not be interpreted
    #[error("{0}")]
    UnitError(String),
}

/// Errors raised while collocating or subsetting
#[derive(Debug, Error)]
pub enum CollocationError {
    /// no usable coordinate correspondence between sample and source;
    /// this fails the whole call, never a single point
    #[error("{0}")]
    CoordinateResolution(String),
    /// the kernel name is not one of `"nn"` or `"lin"`
    #[error("unknown kernel \"{0}\", expected \"nn\" or \"lin\"")]
    UnknownKernel(String),
    /// a pre-collocation constraint excluded every point of the source
    #[error("constraint excludes all points of variable \"{0}\"")]
    EmptySubset(String),
    #[error(transparent)]
    Builder(#[from] BuilderError),
}
