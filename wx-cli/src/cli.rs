use std::{sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select};
use tokio::time::MissedTickBehavior;
use tracing::debug;
use wx_core::{
    Config, Coordinate, Coordinator, LocationError, RefreshError, StaticLocation, Units,
    client_from_config,
};

use crate::render::Report;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "wx", version, about = "Location-driven weather client")]
pub struct Cli {
    /// Log refresh activity to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the API key, units and a default location.
    Configure,

    /// Fetch and print the weather once.
    Show {
        #[command(flatten)]
        source: SourceArgs,

        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Refresh periodically until interrupted.
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Seconds between refreshes.
        #[arg(long, default_value_t = 600, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: u64,
    },
}

/// Where to get the position and credentials from.
#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Latitude; overrides the configured location.
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude; overrides the configured location.
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// OpenWeatherMap API key; overrides the configured key.
    #[arg(long, env = "WX_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

impl SourceArgs {
    fn coordinate(&self, config: &Config) -> anyhow::Result<Coordinate> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinate::new(lat, lon)),
            _ => config.fixed_coordinate().ok_or_else(|| {
                anyhow!(
                    "No location configured.\n\
                     Hint: pass --lat and --lon, or run `wx configure`."
                )
            }),
        }
    }

    fn coordinator(&self, config: &Config) -> anyhow::Result<Coordinator> {
        let coordinate = self.coordinate(config)?;
        let location = Arc::new(StaticLocation::new(coordinate, config.location.accuracy_m));
        let client = client_from_config(config, self.api_key.as_deref())?;

        Ok(Coordinator::new(location, client, config.coordinator_config()))
    }
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { source, json } => {
                let config = Config::load()?;
                let coordinator = source.coordinator(&config)?;

                let snapshot = coordinator.refresh().await.context("Weather refresh failed")?;

                if json {
                    println!("{}", serde_json::to_string_pretty(&*snapshot)?);
                } else {
                    print!("{}", Report::new(&snapshot, config.service.units));
                }
                Ok(())
            }
            Command::Watch { source, interval_secs } => {
                let config = Config::load()?;
                let coordinator = source.coordinator(&config)?;
                watch(
                    coordinator,
                    config.service.units,
                    Duration::from_secs(interval_secs),
                )
                .await
            }
        }
    }
}

async fn watch(coordinator: Coordinator, units: Units, every: Duration) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!(interval_secs = every.as_secs(), "Watching for weather updates");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            outcome = coordinator.refresh() => outcome,
        };

        match outcome {
            Ok(snapshot) => print!("{}", Report::new(&snapshot, units)),
            Err(RefreshError::Location(LocationError::Denied)) => {
                coordinator.shutdown();
                return Err(anyhow!("Location access denied; giving up."));
            }
            Err(err) => {
                eprintln!("Refresh failed: {err}");
                if let Some(last) = coordinator.current_snapshot() {
                    eprintln!(
                        "Showing data from {}",
                        last.committed_at.with_timezone(&Local).format("%H:%M")
                    );
                    print!("{}", Report::new(&last, units));
                }
            }
        }
    }

    debug!("Interrupted; stopping watch");
    coordinator.shutdown();
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key_prompt = if config.api_key().is_some() {
        "OpenWeatherMap API key (leave empty to keep current):"
    } else {
        "OpenWeatherMap API key:"
    };
    let api_key = Password::new(key_prompt)
        .without_confirmation()
        .with_display_mode(PasswordDisplayMode::Masked)
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key.trim().to_string());
    }

    let choices = vec!["imperial", "metric", "standard"];
    let cursor = units_cursor(&choices, config.service.units);
    let units = Select::new("Units:", choices)
        .with_starting_cursor(cursor)
        .prompt()?;
    config.service.units = Units::try_from(units)?;

    if Confirm::new("Set a default location?").with_default(true).prompt()? {
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please enter a number, e.g. 37.77")
            .prompt()?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please enter a number, e.g. -122.41")
            .prompt()?;

        let coordinate = Coordinate::new(latitude, longitude);
        if !coordinate.is_valid() {
            return Err(anyhow!("Coordinate {coordinate} is out of range."));
        }
        config.set_fixed_location(coordinate);
    }

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn units_cursor(choices: &[&str], current: Units) -> usize {
    choices
        .iter()
        .position(|choice| *choice == current.as_str())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_accepts_negative_coordinates() {
        let cli = Cli::try_parse_from(["wx", "show", "--lat", "37.77", "--lon", "-122.41"]).unwrap();
        match cli.command {
            Command::Show { source, json } => {
                assert_eq!(source.lat, Some(37.77));
                assert_eq!(source.lon, Some(-122.41));
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn lat_requires_lon() {
        assert!(Cli::try_parse_from(["wx", "show", "--lat", "37.77"]).is_err());
    }

    #[test]
    fn watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["wx", "watch", "--interval-secs", "0"]).is_err());

        let cli = Cli::try_parse_from(["wx", "watch"]).unwrap();
        assert!(matches!(cli.command, Command::Watch { interval_secs: 600, .. }));
    }

    #[test]
    fn flags_override_configured_location() {
        let mut config = Config::default();
        config.set_fixed_location(Coordinate::new(1.0, 2.0));

        let args = SourceArgs { lat: Some(3.0), lon: Some(4.0), api_key: None };
        assert_eq!(args.coordinate(&config).unwrap(), Coordinate::new(3.0, 4.0));

        let args = SourceArgs { lat: None, lon: None, api_key: None };
        assert_eq!(args.coordinate(&config).unwrap(), Coordinate::new(1.0, 2.0));
    }

    #[test]
    fn missing_location_has_hint() {
        let args = SourceArgs { lat: None, lon: None, api_key: None };
        let err = args.coordinate(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("wx configure"));
    }

    #[test]
    fn coordinator_requires_api_key() {
        let args = SourceArgs { lat: Some(3.0), lon: Some(4.0), api_key: None };
        let err = args.coordinator(&Config::default()).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn units_prompt_starts_on_configured_units() {
        let choices = ["imperial", "metric", "standard"];
        assert_eq!(units_cursor(&choices, Units::Imperial), 0);
        assert_eq!(units_cursor(&choices, Units::Metric), 1);
        assert_eq!(units_cursor(&choices, Units::Standard), 2);
    }
}
