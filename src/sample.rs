//! Ungridded sample point sets.

use chrono::NaiveDateTime;
use ndarray::Array1;

use crate::coords::AxisRole;
use crate::time_unit::TimeUnit;
use crate::BuilderError;

/// A flat collection of query locations.
///
/// Any subset of the coordinates may be present; all present arrays
/// share one length. The optional mask mirrors the sample provider's
/// own data array and only drives the
/// `missing_data_for_missing_sample` policy, the sample's physical
/// values are irrelevant to the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplePoints {
    latitude: Option<Array1<f64>>,
    longitude: Option<Array1<f64>>,
    altitude: Option<Array1<f64>>,
    air_pressure: Option<Array1<f64>>,
    time: Option<Array1<f64>>,
    time_unit: Option<TimeUnit>,
    mask: Option<Array1<bool>>,
    len: usize,
}

impl SamplePoints {
    /// Get the [SamplePointsBuilder]
    pub fn builder() -> SamplePointsBuilder {
        SamplePointsBuilder::new()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn latitude(&self) -> Option<&Array1<f64>> {
        self.latitude.as_ref()
    }

    pub fn longitude(&self) -> Option<&Array1<f64>> {
        self.longitude.as_ref()
    }

    pub fn altitude(&self) -> Option<&Array1<f64>> {
        self.altitude.as_ref()
    }

    pub fn air_pressure(&self) -> Option<&Array1<f64>> {
        self.air_pressure.as_ref()
    }

    pub fn time(&self) -> Option<&Array1<f64>> {
        self.time.as_ref()
    }

    pub fn time_unit(&self) -> Option<&TimeUnit> {
        self.time_unit.as_ref()
    }

    pub fn mask(&self) -> Option<&Array1<bool>> {
        self.mask.as_ref()
    }

    /// Whether the sample provider flagged point `index` as missing.
    pub fn is_masked(&self, index: usize) -> bool {
        self.mask.as_ref().is_some_and(|m| m[index])
    }

    /// The coordinate array backing `role`, if present.
    pub fn field(&self, role: AxisRole) -> Option<&Array1<f64>> {
        match role {
            AxisRole::Latitude => self.latitude(),
            AxisRole::Longitude => self.longitude(),
            AxisRole::Altitude => self.altitude(),
            AxisRole::Pressure => self.air_pressure(),
            AxisRole::Time => self.time(),
            AxisRole::Unclassified => None,
        }
    }

    /// Keep only the points where `keep` is true.
    pub(crate) fn filter(&self, keep: &[bool]) -> SamplePoints {
        let pick = |field: &Option<Array1<f64>>| {
            field.as_ref().map(|values| {
                values
                    .iter()
                    .zip(keep)
                    .filter(|(_, &k)| k)
                    .map(|(&v, _)| v)
                    .collect::<Array1<f64>>()
            })
        };
        let mask = self.mask.as_ref().map(|mask| {
            mask.iter()
                .zip(keep)
                .filter(|(_, &k)| k)
                .map(|(&m, _)| m)
                .collect::<Array1<bool>>()
        });
        SamplePoints {
            latitude: pick(&self.latitude),
            longitude: pick(&self.longitude),
            altitude: pick(&self.altitude),
            air_pressure: pick(&self.air_pressure),
            time: pick(&self.time),
            time_unit: self.time_unit.clone(),
            mask,
            len: keep.iter().filter(|&&k| k).count(),
        }
    }
}

/// Create and validate a [SamplePoints] set.
#[derive(Debug, Default)]
pub struct SamplePointsBuilder {
    latitude: Option<Array1<f64>>,
    longitude: Option<Array1<f64>>,
    altitude: Option<Array1<f64>>,
    air_pressure: Option<Array1<f64>>,
    time: Option<Array1<f64>>,
    time_unit: Option<TimeUnit>,
    mask: Option<Array1<bool>>,
}

impl SamplePointsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latitude(mut self, values: Array1<f64>) -> Self {
        self.latitude = Some(values);
        self
    }

    pub fn longitude(mut self, values: Array1<f64>) -> Self {
        self.longitude = Some(values);
        self
    }

    pub fn altitude(mut self, values: Array1<f64>) -> Self {
        self.altitude = Some(values);
        self
    }

    pub fn air_pressure(mut self, values: Array1<f64>) -> Self {
        self.air_pressure = Some(values);
        self
    }

    /// Numeric time values; pair with [`time_unit`](Self::time_unit) so
    /// they can be re-expressed in a source coordinate's unit.
    pub fn time(mut self, values: Array1<f64>) -> Self {
        self.time = Some(values);
        self
    }

    pub fn time_unit(mut self, unit: TimeUnit) -> Self {
        self.time_unit = Some(unit);
        self
    }

    /// Convenience: set the time values from datetimes, stored as
    /// seconds since the Unix epoch.
    pub fn datetimes(mut self, datetimes: &[NaiveDateTime]) -> Self {
        let unit = TimeUnit::unix();
        self.time = Some(
            datetimes
                .iter()
                .map(|&dt| unit.num_from_datetime(dt))
                .collect(),
        );
        self.time_unit = Some(unit);
        self
    }

    /// The sample provider's missing-data mask.
    pub fn mask(mut self, mask: Array1<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Validate lengths and create the [SamplePoints].
    pub fn build(self) -> Result<SamplePoints, BuilderError> {
        let lengths: Vec<usize> = [
            self.latitude.as_ref(),
            self.longitude.as_ref(),
            self.altitude.as_ref(),
            self.air_pressure.as_ref(),
            self.time.as_ref(),
        ]
        .into_iter()
        .flatten()
        .map(|a| a.len())
        .collect();

        let Some(&len) = lengths.first() else {
            return Err(BuilderError::NotEnoughData(
                "sample points need at least one coordinate".into(),
            ));
        };
        if len == 0 {
            return Err(BuilderError::NotEnoughData("sample points are empty".into()));
        }
        if lengths.iter().any(|&l| l != len) {
            return Err(BuilderError::ShapeError(format!(
                "sample coordinate lengths differ: {lengths:?}"
            )));
        }
        if let Some(mask) = &self.mask {
            if mask.len() != len {
                return Err(BuilderError::ShapeError(format!(
                    "sample mask length {} does not match {} points",
                    mask.len(),
                    len
                )));
            }
        }

        Ok(SamplePoints {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            air_pressure: self.air_pressure,
            time: self.time,
            time_unit: self.time_unit,
            mask: self.mask,
            len,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use ndarray::array;

    use super::SamplePoints;
    use crate::BuilderError;

    #[test]
    fn lengths_must_agree() {
        let err = SamplePoints::builder()
            .latitude(array![1.0, 2.0])
            .longitude(array![1.0])
            .build();
        assert!(matches!(err, Err(BuilderError::ShapeError(_))));

        let err = SamplePoints::builder().build();
        assert!(matches!(err, Err(BuilderError::NotEnoughData(_))));
    }

    #[test]
    fn datetimes_store_unix_seconds() {
        let dt = NaiveDate::from_ymd_opt(1970, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let sample = SamplePoints::builder().datetimes(&[dt]).build().unwrap();
        assert_eq!(sample.time().unwrap()[0], 86400.0);
        assert!(sample.time_unit().is_some());
    }

    #[test]
    fn filter_keeps_mask_and_unit() {
        let sample = SamplePoints::builder()
            .latitude(array![1.0, 2.0, 3.0])
            .mask(array![false, true, false])
            .build()
            .unwrap();
        let kept = sample.filter(&[true, false, true]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept.latitude().unwrap(), &array![1.0, 3.0]);
        assert!(!kept.is_masked(0));
    }
}
