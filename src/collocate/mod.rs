//! Collocation of gridded source data onto ungridded sample points.
//!
//! # Entry points
//!  - [`collocate`] resample one variable onto a [`SamplePoints`] set
//!  - [`collocate_list`] resample several variables sharing one call
//!
//! # Kernels
//! Kernels are selected by configuration name: `"nn"` picks the
//! containing grid cell per axis, `"lin"` blends the surrounding cells
//! with a tensor-product of per-axis weights.
//!
//! The coordinate correspondence between sample and source is resolved
//! once per variable, by role and name only. Each sample point is then
//! evaluated independently; the per-sample loop runs in parallel over a
//! shared read-only resolved mapping. Variables with identical
//! dimension coordinates reuse the per-sample geometric lookups.

mod kernels;

use ndarray::Array1;
use rayon::prelude::*;

use crate::coords::{AxisRole, Coordinate};
use crate::hybrid::HybridCoordinate;
use crate::locate::{AxisLocator, CellResult};
use crate::sample::SamplePoints;
use crate::source::{history_line, GriddedData, SourceData};
use crate::subset::{subset, SubsetConstraint};
use crate::time_unit::TimeUnit;
use crate::CollocationError;

use kernels::{AxisCell, Kernel, KernelKind};

/// Policy knobs for a collocation call.
///
/// The defaults mask out-of-bounds samples, keep masked sample points
/// and mark missing output entries with a mask flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct CollocationOptions {
    extrapolate: bool,
    fill_value: Option<f64>,
    missing_data_for_missing_sample: bool,
}

impl CollocationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill out-of-bounds samples by continuing the edge cell's slope
    /// (or picking the nearest edge cell for `"nn"`) instead of
    /// masking them. Default is `false`.
    pub fn extrapolate(mut self, extrapolate: bool) -> Self {
        self.extrapolate = extrapolate;
        self
    }

    /// Write this sentinel into missing output entries instead of
    /// setting their mask flag.
    pub fn fill_value(mut self, fill_value: f64) -> Self {
        self.fill_value = Some(fill_value);
        self
    }

    /// Force a masked output wherever the sample provider's own data
    /// is masked, regardless of the geometric result. Default is
    /// `false`.
    pub fn missing_data_for_missing_sample(mut self, missing: bool) -> Self {
        self.missing_data_for_missing_sample = missing;
        self
    }
}

/// One collocated output variable: one entry per sample point.
///
/// The arrays are freshly allocated and hold no reference back to the
/// source data.
#[derive(Debug, Clone)]
pub struct CollocationOutput {
    pub name: String,
    pub units: String,
    pub values: Array1<f64>,
    pub mask: Array1<bool>,
    /// provenance: tool version, variable, source files and kernel
    pub history: String,
}

/// Collocate a single source variable onto `sample`.
///
/// `kernel` is `"nn"` or `"lin"`; an optional `constraint` subsets the
/// source before interpolation. The source must be gridded.
pub fn collocate(
    sample: &SamplePoints,
    source: &SourceData,
    constraint: Option<&SubsetConstraint>,
    kernel: &str,
    options: CollocationOptions,
) -> Result<Vec<CollocationOutput>, CollocationError> {
    collocate_list(sample, std::slice::from_ref(source), constraint, kernel, options)
}

/// Collocate a list of source variables onto `sample`, one output per
/// variable.
///
/// Items are processed independently; items whose dimension
/// coordinates are identical share the per-sample cell lookups.
pub fn collocate_list(
    sample: &SamplePoints,
    sources: &[SourceData],
    constraint: Option<&SubsetConstraint>,
    kernel: &str,
    options: CollocationOptions,
) -> Result<Vec<CollocationOutput>, CollocationError> {
    let kind = KernelKind::from_name(kernel)?;
    let mut outputs = Vec::with_capacity(sources.len());
    let mut cache: Option<LookupCache> = None;

    for source in sources {
        let subsetted;
        let item = match constraint {
            Some(constraint) => {
                subsetted = subset(source, constraint)?.ok_or_else(|| {
                    CollocationError::EmptySubset(source.metadata().name.clone())
                })?;
                &subsetted
            }
            None => source,
        };
        let gridded = item.as_gridded().ok_or_else(|| {
            CollocationError::CoordinateResolution(format!(
                "cannot collocate from ungridded variable \"{}\": a gridded source is required",
                item.metadata().name
            ))
        })?;

        let cached = cache
            .as_ref()
            .is_some_and(|c| c.coords == gridded.coords() && c.hybrids == gridded.hybrids());
        if !cached {
            let plan = AxisPlan::resolve(gridded, sample)?;
            let lookups = compute_lookups(gridded, &plan, sample, options.extrapolate);
            cache = Some(LookupCache {
                coords: gridded.coords().to_vec(),
                hybrids: gridded.hybrids().to_vec(),
                lookups,
            });
        }
        let lookups = &cache.as_ref().unwrap_or_else(|| unreachable!()).lookups;

        outputs.push(evaluate_variable(gridded, lookups, kind, sample, options));
    }
    Ok(outputs)
}

/// Per-sample lookups shared between variables with identical
/// dimension coordinates.
struct LookupCache {
    coords: Vec<Coordinate>,
    hybrids: Vec<HybridCoordinate>,
    lookups: Vec<Option<Vec<AxisCell>>>,
}

fn evaluate_variable(
    gridded: &GriddedData,
    lookups: &[Option<Vec<AxisCell>>],
    kind: KernelKind,
    sample: &SamplePoints,
    options: CollocationOptions,
) -> CollocationOutput {
    let kernel = kind.kernel();
    let data = gridded.data();

    let results: Vec<(f64, bool)> = lookups
        .par_iter()
        .enumerate()
        .map(|(i, cells)| {
            let geometric = cells.as_ref().and_then(|cells| kernel.evaluate(data, cells));
            let masked = geometric.is_none()
                || (options.missing_data_for_missing_sample && sample.is_masked(i));
            if masked {
                match options.fill_value {
                    Some(fill) => (fill, false),
                    None => (f64::NAN, true),
                }
            } else {
                (geometric.unwrap_or_else(|| unreachable!()), false)
            }
        })
        .collect();

    let metadata = gridded.metadata();
    let mut history = metadata.history.clone();
    let line = history_line(
        "Collocated",
        metadata,
        &format!(
            "onto {} sample points using kernel: {}",
            sample.len(),
            kind.name()
        ),
    );
    if history.is_empty() {
        history = line;
    } else {
        history.push('\n');
        history.push_str(&line);
    }

    CollocationOutput {
        name: metadata.name.clone(),
        units: metadata.units.clone(),
        values: results.iter().map(|r| r.0).collect(),
        mask: results.iter().map(|r| r.1).collect(),
        history,
    }
}

/// How each source axis is driven by the sample coordinates.
enum Binding {
    /// length-1 axis, skipped permissively at index 0
    Fixed,
    /// a dimension coordinate queried with these sample values
    Dim { values: Array1<f64> },
    /// the level axis of a hybrid vertical coordinate
    HybridLevel {
        hybrid_index: usize,
        /// position of the level dimension within the hybrid field
        level_pos: usize,
        /// data axis for each hybrid dimension
        dim_axes: Vec<usize>,
        values: Array1<f64>,
    },
}

/// The resolved role mapping for one source variable, one binding per
/// data axis in storage order.
struct AxisPlan {
    bindings: Vec<Binding>,
}

enum VerticalSource {
    DimCoord(usize),
    Hybrid(usize),
}

impl AxisPlan {
    fn resolve(gridded: &GriddedData, sample: &SamplePoints) -> Result<AxisPlan, CollocationError> {
        // vertical preference: altitude wherever sample and source both
        // carry it, pressure otherwise; redundant sample verticals are
        // ignored
        let vertical = match (vertical_source(gridded, AxisRole::Altitude), sample.altitude()) {
            (Some(source), Some(values)) => Some((source, values)),
            _ => match (vertical_source(gridded, AxisRole::Pressure), sample.air_pressure()) {
                (Some(source), Some(values)) => Some((source, values)),
                _ => None,
            },
        };

        let (level_axis, mut vertical_binding) = match vertical {
            None => (None, None),
            Some((VerticalSource::DimCoord(axis), values)) => (
                Some(axis),
                Some(Binding::Dim {
                    values: values.clone(),
                }),
            ),
            Some((VerticalSource::Hybrid(hybrid_index), values)) => {
                let hybrid = &gridded.hybrids()[hybrid_index];
                let dim_axes: Vec<usize> = hybrid
                    .dims()
                    .iter()
                    .map(|dim| gridded.axis_of(dim).unwrap_or_else(|| unreachable!()))
                    .collect();
                let candidates: Vec<usize> = dim_axes
                    .iter()
                    .copied()
                    .filter(|&axis| {
                        gridded.coords()[axis].len() > 1
                            && !matches!(
                                gridded.coords()[axis].role(),
                                AxisRole::Longitude | AxisRole::Latitude | AxisRole::Time
                            )
                    })
                    .collect();
                let &[axis] = candidates.as_slice() else {
                    return Err(CollocationError::CoordinateResolution(format!(
                        "cannot identify the level dimension of hybrid coordinate \"{}\"",
                        hybrid.name()
                    )));
                };
                let level_pos = dim_axes
                    .iter()
                    .position(|&a| a == axis)
                    .unwrap_or_else(|| unreachable!());
                (
                    Some(axis),
                    Some(Binding::HybridLevel {
                        hybrid_index,
                        level_pos,
                        dim_axes,
                        values: values.clone(),
                    }),
                )
            }
        };

        let mut bindings = Vec::with_capacity(gridded.ndim());
        for (axis, coord) in gridded.coords().iter().enumerate() {
            if coord.len() == 1 {
                // scalar axes never constrain the lookup, even when the
                // query lies outside their bounds
                tracing::debug!(
                    coordinate = coord.name(),
                    "length-1 axis skipped during collocation"
                );
                bindings.push(Binding::Fixed);
                continue;
            }
            if Some(axis) == level_axis {
                bindings.push(vertical_binding.take().unwrap_or_else(|| unreachable!()));
                continue;
            }
            match sample.field(coord.role()) {
                Some(values) => {
                    let values = if coord.role() == AxisRole::Time {
                        convert_times(values, sample.time_unit(), coord)
                    } else {
                        values.clone()
                    };
                    bindings.push(Binding::Dim { values });
                }
                None => {
                    return Err(CollocationError::CoordinateResolution(format!(
                        "no sample coordinate corresponds to source axis \"{}\" of variable \"{}\"",
                        coord.name(),
                        gridded.metadata().name
                    )))
                }
            }
        }
        Ok(AxisPlan { bindings })
    }
}

fn vertical_source(gridded: &GriddedData, role: AxisRole) -> Option<VerticalSource> {
    if let Some(axis) = gridded.axis_of_role(role) {
        return Some(VerticalSource::DimCoord(axis));
    }
    gridded
        .hybrids()
        .iter()
        .position(|h| h.role() == role)
        .map(VerticalSource::Hybrid)
}

fn convert_times(
    values: &Array1<f64>,
    sample_unit: Option<&TimeUnit>,
    coord: &Coordinate,
) -> Array1<f64> {
    match (sample_unit, TimeUnit::parse(coord.units()).ok()) {
        (Some(from), Some(to)) => values.mapv(|v| from.convert(v, &to)),
        _ => {
            tracing::debug!(
                coordinate = coord.name(),
                "time values compared without unit conversion"
            );
            values.clone()
        }
    }
}

fn compute_lookups(
    gridded: &GriddedData,
    plan: &AxisPlan,
    sample: &SamplePoints,
    extrapolate: bool,
) -> Vec<Option<Vec<AxisCell>>> {
    let locators: Vec<Option<AxisLocator>> = gridded
        .coords()
        .iter()
        .zip(&plan.bindings)
        .map(|(coord, binding)| matches!(binding, Binding::Dim { .. }).then(|| AxisLocator::new(coord)))
        .collect();

    (0..sample.len())
        .into_par_iter()
        .map(|i| sample_cells(gridded, plan, &locators, i, extrapolate))
        .collect()
}

/// Resolve the per-axis cells for one sample point; `None` marks a
/// point masked by the out-of-bounds policy or an unlocatable (NaN)
/// coordinate value.
fn sample_cells(
    gridded: &GriddedData,
    plan: &AxisPlan,
    locators: &[Option<AxisLocator>],
    i: usize,
    extrapolate: bool,
) -> Option<Vec<AxisCell>> {
    let mut cells = Vec::with_capacity(plan.bindings.len());
    let mut hybrid_axis = None;
    for (axis, binding) in plan.bindings.iter().enumerate() {
        let cell = match binding {
            Binding::Fixed => AxisCell::fixed(0),
            Binding::Dim { values } => {
                let locator = locators[axis].as_ref().unwrap_or_else(|| unreachable!());
                axis_cell(locator, values[i], extrapolate)?
            }
            Binding::HybridLevel { .. } => {
                // placeholder, the profile needs the other indices first
                hybrid_axis = Some(axis);
                AxisCell::fixed(0)
            }
        };
        cells.push(cell);
    }

    if let Some(axis) = hybrid_axis {
        let Binding::HybridLevel {
            hybrid_index,
            level_pos,
            dim_axes,
            values,
        } = &plan.bindings[axis]
        else {
            unreachable!()
        };
        let hybrid = &gridded.hybrids()[*hybrid_index];
        let fixed: Vec<usize> = dim_axes.iter().map(|&ax| cells[ax].nearest).collect();
        let profile = hybrid.profile(*level_pos, &fixed);
        let locator = AxisLocator::for_profile(profile.view());
        cells[axis] = axis_cell(&locator, values[i], extrapolate)?;
    }
    Some(cells)
}

fn axis_cell(locator: &AxisLocator, value: f64, extrapolate: bool) -> Option<AxisCell> {
    if value.is_nan() {
        return None;
    }
    match locator.locate(value) {
        CellResult::Enclosed {
            lower,
            upper,
            fraction,
        } => {
            let nearest = locator.containing_cell(value).unwrap_or(lower);
            Some(AxisCell {
                lower,
                upper,
                fraction,
                nearest,
            })
        }
        CellResult::OutOfBounds { nearest, side } => extrapolate.then(|| {
            let (lower, upper, fraction) = locator.edge_cell(value, side);
            AxisCell {
                lower,
                upper,
                fraction,
                nearest,
            }
        }),
    }
}
