//! Plain-text rendering of a snapshot.

use std::fmt;

use chrono::{DateTime, Local, Utc};
use wx_core::{Snapshot, Units, WeatherRecord};

/// Human-readable view of one snapshot.
pub struct Report<'a> {
    snapshot: &'a Snapshot,
    units: Units,
}

impl<'a> Report<'a> {
    pub fn new(snapshot: &'a Snapshot, units: Units) -> Self {
        Self { snapshot, units }
    }

    fn degrees(&self, value: f64) -> String {
        format!("{:.0}{}", value, self.units.temperature_suffix())
    }

    fn wind(&self, record: &WeatherRecord) -> String {
        let speed = format!("{:.1} {}", record.wind_speed, self.units.speed_suffix());
        match record.wind_bearing_deg {
            Some(deg) => format!("{speed} from {}", compass(deg)),
            None => speed,
        }
    }
}

fn local(at: DateTime<Utc>, pattern: &str) -> String {
    at.with_timezone(&Local).format(pattern).to_string()
}

fn compass(bearing_deg: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let index = (bearing_deg.rem_euclid(360.0) / 45.0).round() as usize % POINTS.len();
    POINTS[index]
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.snapshot;
        let current = &snapshot.current;

        let place = current.location_name.as_deref().unwrap_or("Unknown location");
        writeln!(f, "{place} ({})", snapshot.location.coordinate)?;
        writeln!(f, "Updated {}", local(snapshot.committed_at, "%Y-%m-%d %H:%M"))?;
        writeln!(f)?;

        match current.temperature() {
            Some(now) => writeln!(
                f,
                "  {}  {} [{}]",
                self.degrees(now),
                current.condition_description,
                current.icon()
            )?,
            None => writeln!(f, "  {} [{}]", current.condition_description, current.icon())?,
        }
        writeln!(
            f,
            "  High {} / Low {}",
            self.degrees(current.high()),
            self.degrees(current.low())
        )?;
        writeln!(f, "  Humidity {}%", current.humidity_pct)?;
        writeln!(f, "  Wind {}", self.wind(current))?;
        if let (Some(rise), Some(set)) = (current.sunrise, current.sunset) {
            writeln!(f, "  Sunrise {} / Sunset {}", local(rise, "%H:%M"), local(set, "%H:%M"))?;
        }

        if !snapshot.hourly.is_empty() {
            writeln!(f)?;
            writeln!(f, "Hourly")?;
            for hour in &snapshot.hourly {
                let temp = hour.temperature().unwrap_or_else(|| hour.high());
                writeln!(
                    f,
                    "  {}  {:>5}  {}",
                    local(hour.timestamp, "%H:%M"),
                    self.degrees(temp),
                    hour.condition
                )?;
            }
        }

        if !snapshot.daily.is_empty() {
            writeln!(f)?;
            writeln!(f, "Daily")?;
            for day in &snapshot.daily {
                writeln!(
                    f,
                    "  {}  {:>5} / {:<5}  {}",
                    local(day.timestamp, "%a %d"),
                    self.degrees(day.high()),
                    self.degrees(day.low()),
                    day.condition
                )?;
            }
        }

        Ok(())
    }
}
