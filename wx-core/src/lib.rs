//! Core library for the `wx` weather client.
//!
//! This crate defines:
//! - The refresh [`Coordinator`]: locate the device, fetch current conditions
//!   plus hourly and daily forecasts, and publish them as one [`Snapshot`]
//! - The [`FetchClient`] and [`LocationProvider`] seams, with an
//!   OpenWeatherMap client and a fixed-coordinate provider
//! - Shared domain models and the condition-code icon lookup
//! - Configuration handling
//!
//! It is used by `wx-cli`, but any front-end can drive a [`Coordinator`].

pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod icon;
pub mod location;
pub mod model;

pub use client::{FetchClient, client_from_config, openweather::OpenWeatherClient};
pub use config::{AcquisitionConfig, Config, LocationConfig, ServiceConfig};
pub use coordinator::{
    Coordinator, CoordinatorConfig, CoordinatorState, CycleOutcome, CycleReport, ReentrancyPolicy,
};
pub use error::{FetchError, LocationError, RefreshError, TransportError};
pub use icon::ConditionCode;
pub use location::{FixFilter, FixRejection, LocationProvider, PositionUpdates, StaticLocation};
pub use model::{Coordinate, Position, RequestKind, Snapshot, Temperatures, Units, WeatherRecord};
