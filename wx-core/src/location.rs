//! Position sources and the filter that decides which fixes are usable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::{fmt, fmt::Debug, time::Duration};

use crate::{
    error::LocationError,
    model::{Coordinate, Position},
};

/// Stream of position updates for one request.
///
/// The provider keeps reporting until the stream is dropped; dropping it is
/// how a consumer stops updates and releases the underlying hardware.
pub type PositionUpdates = BoxStream<'static, Result<Position, LocationError>>;

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    /// Begin reporting positions, aiming for `desired_accuracy_m`.
    ///
    /// Fails immediately with [`LocationError::Denied`] when the user has
    /// refused access.
    async fn start_updates(&self, desired_accuracy_m: f64) -> Result<PositionUpdates, LocationError>;
}

/// A fixed coordinate, reported as a fresh fix on every request.
#[derive(Debug, Clone)]
pub struct StaticLocation {
    coordinate: Coordinate,
    accuracy_m: f64,
}

impl StaticLocation {
    pub fn new(coordinate: Coordinate, accuracy_m: f64) -> Self {
        Self { coordinate, accuracy_m }
    }
}

#[async_trait]
impl LocationProvider for StaticLocation {
    async fn start_updates(&self, _desired_accuracy_m: f64) -> Result<PositionUpdates, LocationError> {
        if !self.coordinate.is_valid() {
            return Err(LocationError::Unavailable(format!(
                "configured coordinate {} is out of range",
                self.coordinate
            )));
        }

        let fix = Position {
            coordinate: self.coordinate,
            horizontal_accuracy_m: self.accuracy_m,
            timestamp: Utc::now(),
        };
        Ok(stream::once(async move { Ok(fix) }).boxed())
    }
}

/// Why a fix was discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum FixRejection {
    InvalidCoordinate(Coordinate),
    UnknownAccuracy,
    TooInaccurate { accuracy_m: f64, limit_m: f64 },
    Stale { age: Duration, limit: Duration },
}

impl fmt::Display for FixRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FixRejection::InvalidCoordinate(c) => write!(f, "coordinate {c} is out of range"),
            FixRejection::UnknownAccuracy => f.write_str("accuracy is unknown"),
            FixRejection::TooInaccurate { accuracy_m, limit_m } => {
                write!(f, "accuracy {accuracy_m:.0} m exceeds {limit_m:.0} m")
            }
            FixRejection::Stale { age, limit } => {
                write!(f, "fix is {}s old, limit is {}s", age.as_secs(), limit.as_secs())
            }
        }
    }
}

/// Accuracy and staleness thresholds for accepting a fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixFilter {
    pub max_accuracy_m: f64,
    pub max_age: Duration,
}

impl Default for FixFilter {
    fn default() -> Self {
        Self {
            max_accuracy_m: 1000.0,
            max_age: Duration::from_secs(300),
        }
    }
}

impl FixFilter {
    pub fn check(&self, fix: &Position, now: DateTime<Utc>) -> Result<(), FixRejection> {
        if !fix.coordinate.is_valid() {
            return Err(FixRejection::InvalidCoordinate(fix.coordinate));
        }
        if fix.horizontal_accuracy_m.is_nan() || fix.horizontal_accuracy_m < 0.0 {
            return Err(FixRejection::UnknownAccuracy);
        }
        if fix.horizontal_accuracy_m > self.max_accuracy_m {
            return Err(FixRejection::TooInaccurate {
                accuracy_m: fix.horizontal_accuracy_m,
                limit_m: self.max_accuracy_m,
            });
        }

        // A fix stamped slightly in the future counts as brand new.
        let age = (now - fix.timestamp).to_std().unwrap_or(Duration::ZERO);
        if age > self.max_age {
            return Err(FixRejection::Stale { age, limit: self.max_age });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fix(accuracy: f64, age_secs: i64) -> (Position, DateTime<Utc>) {
        let now = Utc::now();
        let position = Position {
            coordinate: Coordinate::new(37.77, -122.41),
            horizontal_accuracy_m: accuracy,
            timestamp: now - chrono::Duration::seconds(age_secs),
        };
        (position, now)
    }

    #[test]
    fn accepts_fresh_accurate_fix() {
        let (p, now) = fix(10.0, 0);
        assert_eq!(FixFilter::default().check(&p, now), Ok(()));
    }

    #[test]
    fn accepts_fix_exactly_at_limits() {
        let filter = FixFilter { max_accuracy_m: 50.0, max_age: Duration::from_secs(60) };
        let (p, now) = fix(50.0, 60);
        assert_eq!(filter.check(&p, now), Ok(()));
    }

    #[test]
    fn rejects_inaccurate_fix() {
        let filter = FixFilter { max_accuracy_m: 100.0, ..FixFilter::default() };
        let (p, now) = fix(250.0, 0);
        assert!(matches!(filter.check(&p, now), Err(FixRejection::TooInaccurate { .. })));
    }

    #[test]
    fn rejects_stale_fix() {
        let filter = FixFilter { max_age: Duration::from_secs(30), ..FixFilter::default() };
        let (p, now) = fix(10.0, 31);
        let err = filter.check(&p, now).unwrap_err();
        assert!(matches!(err, FixRejection::Stale { .. }));
        assert!(err.to_string().contains("31s old"));
    }

    #[test]
    fn rejects_negative_accuracy() {
        let (p, now) = fix(-1.0, 0);
        assert_eq!(FixFilter::default().check(&p, now), Err(FixRejection::UnknownAccuracy));
    }

    #[test]
    fn future_timestamp_counts_as_fresh() {
        let (p, now) = fix(10.0, -5);
        assert_eq!(FixFilter::default().check(&p, now), Ok(()));
    }

    #[tokio::test]
    async fn static_location_reports_one_fresh_fix() {
        let provider = StaticLocation::new(Coordinate::new(37.77, -122.41), 10.0);
        let updates = provider.start_updates(100.0).await.unwrap();
        let fixes: Vec<_> = updates.collect().await;

        assert_eq!(fixes.len(), 1);
        let p = fixes[0].as_ref().unwrap();
        assert_eq!(p.coordinate, Coordinate::new(37.77, -122.41));
        assert_eq!(FixFilter::default().check(p, Utc::now()), Ok(()));
    }

    #[tokio::test]
    async fn static_location_rejects_invalid_coordinate() {
        let provider = StaticLocation::new(Coordinate::new(123.0, 0.0), 10.0);
        let err = provider.start_updates(100.0).await.err().unwrap();
        assert!(matches!(err, LocationError::Unavailable(_)));
    }
}
