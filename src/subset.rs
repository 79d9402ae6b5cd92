//! Coordinate-range subsetting of gridded and ungridded data.
//!
//! A [`SubsetConstraint`] holds inclusive per-coordinate ranges, keyed
//! by raw coordinate name or by canonical axis letter (`X`, `Y`, `Z`,
//! `P`, `T`). Longitude requests lying wholly outside the covered span
//! are shifted by 360 degrees into the source's native span when that
//! span is [-180, 180] or [0, 360] compatible; swapped numeric limits
//! on other axes are silently reordered. Both fix-ups are logged and
//! never alter control flow.
//!
//! A subset that excludes every point is a distinguished non-error:
//! [`subset`] returns `Ok(None)`.

use std::fmt;

use chrono::NaiveDateTime;
use ndarray::Axis;

use crate::coords::AxisRole;
use crate::hybrid::HybridCoordinate;
use crate::source::{history_line, GriddedData, SourceData, UngriddedData};
use crate::time_unit::TimeUnit;
use crate::{BuilderError, CollocationError};

#[derive(Debug, Clone, PartialEq)]
enum LimitKey {
    Name(String),
    Role(AxisRole),
}

#[derive(Debug, Clone, PartialEq)]
enum LimitRange {
    Values(f64, f64),
    Times(NaiveDateTime, NaiveDateTime),
}

/// Inclusive per-coordinate range constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubsetConstraint {
    limits: Vec<(LimitKey, LimitRange)>,
}

impl SubsetConstraint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Constrain a coordinate to `[start, end]`. `key` is a raw
    /// coordinate name or a single axis letter.
    pub fn with_range(mut self, key: &str, start: f64, end: f64) -> Self {
        self.limits
            .push((parse_key(key), LimitRange::Values(start, end)));
        self
    }

    /// Constrain a time coordinate to `[start, end]`; the datetimes
    /// are re-expressed in the coordinate's stored unit before
    /// comparison.
    pub fn with_time_range(mut self, key: &str, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        self.limits
            .push((parse_key(key), LimitRange::Times(start, end)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    fn find(&self, name: &str, role: AxisRole) -> Option<&LimitRange> {
        self.limits
            .iter()
            .find(|(key, _)| match key {
                LimitKey::Name(n) => n.eq_ignore_ascii_case(name),
                LimitKey::Role(r) => *r == role,
            })
            .map(|(_, range)| range)
    }

    /// Keys that match none of the available `(name, role)` pairs.
    fn unmatched(&self, available: &[(String, AxisRole)]) -> Vec<String> {
        self.limits
            .iter()
            .filter(|(key, _)| {
                !available.iter().any(|(name, role)| match key {
                    LimitKey::Name(n) => n.eq_ignore_ascii_case(name),
                    LimitKey::Role(r) => r == role,
                })
            })
            .map(|(key, _)| match key {
                LimitKey::Name(n) => n.clone(),
                LimitKey::Role(r) => r.axis_letter().unwrap_or('?').to_string(),
            })
            .collect()
    }
}

impl fmt::Display for SubsetConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, range)) in self.limits.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            match key {
                LimitKey::Name(n) => write!(f, "{n}")?,
                LimitKey::Role(r) => write!(f, "{}", r.axis_letter().unwrap_or('?'))?,
            }
            match range {
                LimitRange::Values(start, end) => write!(f, ": [{start}, {end}]")?,
                LimitRange::Times(start, end) => write!(f, ": [{start}, {end}]")?,
            }
        }
        Ok(())
    }
}

fn parse_key(key: &str) -> LimitKey {
    if key.len() == 1 {
        if let Some(role) = AxisRole::from_axis_letter(key) {
            return LimitKey::Role(role);
        }
    }
    LimitKey::Name(key.to_string())
}

/// Apply `constraint` to `data`.
///
/// Returns `Ok(None)` when the constraint excludes every point. The
/// result's history records the applied limits.
pub fn subset(
    data: &SourceData,
    constraint: &SubsetConstraint,
) -> Result<Option<SourceData>, CollocationError> {
    let unmatched = constraint.unmatched(&data.coords());
    if !unmatched.is_empty() {
        tracing::debug!(?unmatched, "constraint keys match no coordinate");
    }

    let mut result = match data {
        SourceData::Gridded(gridded) => match subset_gridded(gridded, constraint)? {
            Some(gridded) => SourceData::Gridded(gridded),
            None => return Ok(None),
        },
        SourceData::Ungridded(ungridded) => match subset_ungridded(ungridded, constraint)? {
            Some(ungridded) => SourceData::Ungridded(ungridded),
            None => return Ok(None),
        },
    };

    let line = history_line(
        "Subsetted",
        result.metadata(),
        &format!("using limits: {constraint}"),
    );
    result.metadata_mut().append_history(&line);
    Ok(Some(result))
}

/// Numeric limits after unit conversion and fix-ups, plus whether the
/// selection wraps around a longitude seam.
struct ResolvedLimit {
    start: f64,
    end: f64,
    wrapped: bool,
}

fn resolve_limit(
    range: &LimitRange,
    role: AxisRole,
    name: &str,
    time_unit: Option<&TimeUnit>,
    value_span: (f64, f64),
    ascending: bool,
) -> Result<ResolvedLimit, CollocationError> {
    let (start, end) = match range {
        LimitRange::Values(start, end) => (*start, *end),
        LimitRange::Times(start, end) => {
            let unit = time_unit.ok_or_else(|| {
                BuilderError::UnitError(format!(
                    "cannot subset \"{name}\" by datetime: coordinate has no time unit"
                ))
            })?;
            (unit.num_from_datetime(*start), unit.num_from_datetime(*end))
        }
    };

    if role == AxisRole::Longitude {
        let (coord_min, coord_max) = value_span;
        let (start, end) = fix_longitude_limits(start, end, coord_min, coord_max);
        if start > end && ascending {
            tracing::info!(coordinate = name, start, end, "longitude limits wrap the seam");
            return Ok(ResolvedLimit {
                start,
                end,
                wrapped: true,
            });
        }
        if start > end {
            tracing::info!(
                coordinate = name,
                "limits: original: ({start}, {end})  after fix: ({end}, {start})"
            );
            return Ok(ResolvedLimit {
                start: end,
                end: start,
                wrapped: false,
            });
        }
        return Ok(ResolvedLimit {
            start,
            end,
            wrapped: false,
        });
    }

    if start > end {
        tracing::info!(
            coordinate = name,
            "limits: original: ({start}, {end})  after fix: ({end}, {start})"
        );
        return Ok(ResolvedLimit {
            start: end,
            end: start,
            wrapped: false,
        });
    }
    Ok(ResolvedLimit {
        start,
        end,
        wrapped: false,
    })
}

/// Shift angular limits into the coordinate's native span, per the
/// covered extent. Only attempted when the request lies wholly outside
/// the covered span and the span is [-180, 180] or [0, 360]
/// compatible.
fn fix_longitude_limits(
    limit_start: f64,
    limit_end: f64,
    coord_min: f64,
    coord_max: f64,
) -> (f64, f64) {
    let in_span = |v: f64| coord_min <= v && v <= coord_max;
    let mut range_start = None;
    if !(in_span(limit_start) && in_span(limit_end)) {
        if (-180.0..0.0).contains(&coord_min) && coord_max <= 180.0 {
            range_start = Some(-180.0);
        } else if 0.0 <= coord_min && coord_max <= 360.0 {
            range_start = Some(0.0);
        }
    }
    match range_start {
        Some(range_start) => {
            let fixed = (
                fix_angular_limit(limit_start, range_start),
                fix_angular_limit(limit_end, range_start),
            );
            tracing::info!(
                "angular limits: original: ({limit_start}, {limit_end})  after fix: ({}, {})",
                fixed.0,
                fixed.1
            );
            fixed
        }
        None => (limit_start, limit_end),
    }
}

/// Force an angular value into the 360 range starting at `range_start`.
fn fix_angular_limit(value: f64, range_start: f64) -> f64 {
    let mut ret = value % 360.0;
    if ret < range_start {
        ret += 360.0;
    }
    if ret > range_start + 360.0 {
        ret -= 360.0;
    }
    ret
}

fn subset_gridded(
    gridded: &GriddedData,
    constraint: &SubsetConstraint,
) -> Result<Option<GriddedData>, CollocationError> {
    let mut data = gridded.data().clone();
    let mut coords = Vec::with_capacity(gridded.ndim());
    let mut selections: Vec<Option<Vec<usize>>> = vec![None; gridded.ndim()];

    for (axis, coord) in gridded.coords().iter().enumerate() {
        let Some(range) = constraint.find(coord.name(), coord.role()) else {
            coords.push(coord.clone());
            continue;
        };
        let time_unit = TimeUnit::parse(coord.units()).ok();
        let limit = resolve_limit(
            range,
            coord.role(),
            coord.name(),
            time_unit.as_ref(),
            coord.value_span(),
            coord.is_ascending(),
        )?;

        let points = coord.points();
        let keep: Vec<(usize, f64)> = if limit.wrapped {
            // indices above the start come first, re-expressed 360
            // degrees down so the subset axis stays monotonic
            let high = points
                .iter()
                .enumerate()
                .filter(|(_, &v)| v >= limit.start)
                .map(|(i, _)| (i, -360.0));
            let low = points
                .iter()
                .enumerate()
                .filter(|(_, &v)| v <= limit.end)
                .map(|(i, _)| (i, 0.0));
            high.chain(low).collect()
        } else {
            points
                .iter()
                .enumerate()
                .filter(|(_, &v)| limit.start <= v && v <= limit.end)
                .map(|(i, _)| (i, 0.0))
                .collect()
        };

        if keep.is_empty() {
            return Ok(None);
        }
        let indices: Vec<usize> = keep.iter().map(|&(i, _)| i).collect();
        data = data.select(Axis(axis), &indices);
        coords.push(coord.select(&keep)?);
        selections[axis] = Some(indices);
    }

    let mut result = GriddedData::new(data, coords, gridded.metadata().clone())?;
    for hybrid in gridded.hybrids() {
        let mut values = hybrid.values().clone();
        for (pos, dim) in hybrid.dims().iter().enumerate() {
            let axis = gridded.axis_of(dim).unwrap_or_else(|| unreachable!());
            if let Some(indices) = &selections[axis] {
                values = values.select(Axis(pos), indices);
            }
        }
        result = result.with_hybrid(HybridCoordinate::new(
            hybrid.name(),
            hybrid.role(),
            values,
            hybrid.dims().to_vec(),
            hybrid.units(),
        )?)?;
    }
    Ok(Some(result))
}

fn subset_ungridded(
    ungridded: &UngriddedData,
    constraint: &SubsetConstraint,
) -> Result<Option<UngriddedData>, CollocationError> {
    let points = ungridded.points();
    let mut keep = vec![true; points.len()];

    let fields = [
        (AxisRole::Latitude, "latitude"),
        (AxisRole::Longitude, "longitude"),
        (AxisRole::Altitude, "altitude"),
        (AxisRole::Pressure, "air_pressure"),
        (AxisRole::Time, "time"),
    ];
    for (role, name) in fields {
        let Some(values) = points.field(role) else {
            continue;
        };
        let Some(range) = constraint.find(name, role) else {
            continue;
        };
        let span = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |acc, &v| {
                (acc.0.min(v), acc.1.max(v))
            });
        let limit = resolve_limit(range, role, name, points.time_unit(), span, true)?;
        for (i, &v) in values.iter().enumerate() {
            let inside = if limit.wrapped {
                v >= limit.start || v <= limit.end
            } else {
                limit.start <= v && v <= limit.end
            };
            keep[i] = keep[i] && inside;
        }
    }

    if keep.iter().all(|&k| !k) {
        return Ok(None);
    }
    Ok(Some(ungridded.filter(&keep)))
}
