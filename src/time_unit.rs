//! CF style time units, e.g. `"days since 1984-08-27 00:00:00"`.

use chrono::{NaiveDate, NaiveDateTime};

use crate::BuilderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimeScale {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeScale {
    fn seconds(self) -> f64 {
        match self {
            TimeScale::Seconds => 1.0,
            TimeScale::Minutes => 60.0,
            TimeScale::Hours => 3600.0,
            TimeScale::Days => 86400.0,
        }
    }
}

/// A numeric time coordinate unit: a scale and an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUnit {
    scale: TimeScale,
    epoch: NaiveDateTime,
}

impl TimeUnit {
    /// Parse a `"<scale> since <epoch>"` unit string.
    ///
    /// The scale is one of seconds, minutes, hours or days (singular or
    /// plural); the epoch accepts `%Y-%m-%d %H:%M:%S`,
    /// `%Y-%m-%dT%H:%M:%S` or a bare date.
    pub fn parse(unit: &str) -> Result<TimeUnit, BuilderError> {
        let lower = unit.trim().to_ascii_lowercase();
        let (scale_word, epoch_str) = lower.split_once(" since ").ok_or_else(|| {
            BuilderError::UnitError(format!("\"{unit}\" is not a \"<scale> since <epoch>\" unit"))
        })?;
        let scale = match scale_word.trim() {
            "second" | "seconds" | "sec" | "secs" | "s" => TimeScale::Seconds,
            "minute" | "minutes" | "min" | "mins" => TimeScale::Minutes,
            "hour" | "hours" | "hr" | "hrs" | "h" => TimeScale::Hours,
            "day" | "days" | "d" => TimeScale::Days,
            other => {
                return Err(BuilderError::UnitError(format!(
                    "unknown time scale \"{other}\" in \"{unit}\""
                )))
            }
        };
        let epoch = parse_epoch(epoch_str.trim()).ok_or_else(|| {
            BuilderError::UnitError(format!("cannot parse epoch \"{epoch_str}\" in \"{unit}\""))
        })?;
        Ok(TimeUnit { scale, epoch })
    }

    /// Seconds since the Unix epoch; the unit of
    /// [`SamplePointsBuilder::datetimes`](crate::SamplePointsBuilder::datetimes).
    pub fn unix() -> TimeUnit {
        TimeUnit {
            scale: TimeScale::Seconds,
            epoch: NaiveDate::from_ymd_opt(1970, 1, 1)
                .unwrap_or_else(|| unreachable!())
                .and_hms_opt(0, 0, 0)
                .unwrap_or_else(|| unreachable!()),
        }
    }

    /// Express a datetime as a numeric value in this unit.
    pub fn num_from_datetime(&self, datetime: NaiveDateTime) -> f64 {
        let millis = datetime.signed_duration_since(self.epoch).num_milliseconds();
        millis as f64 / 1000.0 / self.scale.seconds()
    }

    /// Re-express a numeric value of this unit in `target`.
    pub fn convert(&self, value: f64, target: &TimeUnit) -> f64 {
        let offset = self
            .epoch
            .signed_duration_since(target.epoch)
            .num_milliseconds() as f64
            / 1000.0;
        (value * self.scale.seconds() + offset) / target.scale.seconds()
    }
}

fn parse_epoch(s: &str) -> Option<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
