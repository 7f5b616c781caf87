//! In-memory location provider and fetch client for driving the coordinator.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use wx_core::{
    ConditionCode, Coordinate, CoordinatorConfig, FetchClient, FetchError, LocationError,
    LocationProvider, Position, PositionUpdates, RequestKind, Temperatures, WeatherRecord,
};

pub fn fix(latitude: f64, longitude: f64, accuracy_m: f64, age_secs: i64) -> Position {
    Position {
        coordinate: Coordinate::new(latitude, longitude),
        horizontal_accuracy_m: accuracy_m,
        timestamp: Utc::now() - ChronoDuration::seconds(age_secs),
    }
}

pub fn sf_fix() -> Position {
    fix(37.77, -122.41, 10.0, 0)
}

pub fn config() -> CoordinatorConfig {
    CoordinatorConfig {
        location_timeout: Duration::from_secs(5),
        fetch_timeout: Duration::from_secs(3),
        ..CoordinatorConfig::default()
    }
}

/// What the provider does on one `start_updates` call.
#[derive(Debug, Clone)]
pub enum LocationScript {
    Deny,
    /// Report these updates, then end the stream.
    Fixes(Vec<Result<Position, LocationError>>),
    /// Report these updates, then stay silent forever.
    FixesThenSilence(Vec<Result<Position, LocationError>>),
}

/// Plays one script per request; the last script repeats.
#[derive(Debug)]
pub struct ScriptedLocation {
    scripts: Mutex<VecDeque<LocationScript>>,
    requests: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl ScriptedLocation {
    pub fn new(scripts: Vec<LocationScript>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            requests: AtomicUsize::new(0),
            active: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn fixed(position: Position) -> Arc<Self> {
        Self::new(vec![LocationScript::Fixes(vec![Ok(position)])])
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Update streams handed out and not yet dropped.
    pub fn active_streams(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    fn next_script(&self) -> Option<LocationScript> {
        let mut scripts = self.scripts.lock();
        if scripts.len() > 1 {
            scripts.pop_front()
        } else {
            scripts.front().cloned()
        }
    }
}

struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn new(active: Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(active)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationProvider for ScriptedLocation {
    async fn start_updates(&self, _desired_accuracy_m: f64) -> Result<PositionUpdates, LocationError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        let (fixes, silence) = match self.next_script() {
            None => return Err(LocationError::Unavailable("no script".into())),
            Some(LocationScript::Deny) => return Err(LocationError::Denied),
            Some(LocationScript::Fixes(fixes)) => (fixes, false),
            Some(LocationScript::FixesThenSilence(fixes)) => (fixes, true),
        };

        let updates = if silence {
            stream::iter(fixes).chain(stream::pending()).boxed()
        } else {
            stream::iter(fixes).boxed()
        };

        let guard = StreamGuard::new(Arc::clone(&self.active));
        Ok(updates
            .map(move |update| {
                let _held = &guard;
                update
            })
            .boxed())
    }
}

pub fn observed(at: Coordinate, timestamp: DateTime<Utc>) -> WeatherRecord {
    WeatherRecord {
        timestamp,
        humidity_pct: 70,
        temperatures: Temperatures::Observed { current: 61.0, high: 64.0, low: 55.0 },
        location_name: Some(at.to_string()),
        sunrise: Some(timestamp - ChronoDuration::hours(6)),
        sunset: Some(timestamp + ChronoDuration::hours(6)),
        condition: "Clear".into(),
        condition_description: "clear sky".into(),
        condition_code: ConditionCode::ClearDay,
        wind_bearing_deg: Some(270.0),
        wind_speed: 8.0,
    }
}

pub fn daily(at: Coordinate, timestamp: DateTime<Utc>) -> WeatherRecord {
    WeatherRecord {
        temperatures: Temperatures::Range { high: 68.0, low: 52.0 },
        sunrise: None,
        sunset: None,
        condition: "Rain".into(),
        condition_description: "light rain".into(),
        condition_code: ConditionCode::RainDay,
        ..observed(at, timestamp)
    }
}

#[derive(Debug, Default)]
struct KindState {
    failure: Option<FetchError>,
    panics: bool,
    delay: Duration,
    calls: usize,
    completed: usize,
}

/// Echoes the requested coordinate into every record's location name, so a
/// snapshot can be checked for cross-cycle mixing.
#[derive(Debug, Default)]
pub struct FakeFetch {
    current: Mutex<KindState>,
    hourly: Mutex<KindState>,
    daily: Mutex<KindState>,
}

impl FakeFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn kind(&self, kind: RequestKind) -> &Mutex<KindState> {
        match kind {
            RequestKind::Current => &self.current,
            RequestKind::Hourly => &self.hourly,
            RequestKind::Daily => &self.daily,
        }
    }

    pub fn fail(&self, kind: RequestKind, err: FetchError) {
        self.kind(kind).lock().failure = Some(err);
    }

    pub fn succeed(&self, kind: RequestKind) {
        self.kind(kind).lock().failure = None;
    }

    /// Make `kind` panic instead of answering, as a buggy client would.
    pub fn panic_on(&self, kind: RequestKind, panics: bool) {
        self.kind(kind).lock().panics = panics;
    }

    pub fn delay(&self, kind: RequestKind, delay: Duration) {
        self.kind(kind).lock().delay = delay;
    }

    pub fn calls(&self, kind: RequestKind) -> usize {
        self.kind(kind).lock().calls
    }

    pub fn completed(&self, kind: RequestKind) -> usize {
        self.kind(kind).lock().completed
    }

    pub fn total_calls(&self) -> usize {
        [RequestKind::Current, RequestKind::Hourly, RequestKind::Daily]
            .into_iter()
            .map(|k| self.calls(k))
            .sum()
    }

    async fn run(&self, kind: RequestKind) -> Result<(), FetchError> {
        let delay = {
            let mut state = self.kind(kind).lock();
            state.calls += 1;
            state.delay
        };
        tokio::time::sleep(delay).await;

        let mut state = self.kind(kind).lock();
        state.completed += 1;
        if state.panics {
            drop(state);
            panic!("{kind} client blew up");
        }
        match &state.failure {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl FetchClient for FakeFetch {
    async fn fetch_current_conditions(&self, at: Coordinate) -> Result<WeatherRecord, FetchError> {
        self.run(RequestKind::Current).await?;
        Ok(observed(at, Utc::now()))
    }

    async fn fetch_hourly_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError> {
        self.run(RequestKind::Hourly).await?;
        let start = Utc::now();
        Ok((0..12)
            .map(|h| observed(at, start + ChronoDuration::hours(h)))
            .collect())
    }

    async fn fetch_daily_forecast(&self, at: Coordinate) -> Result<Vec<WeatherRecord>, FetchError> {
        self.run(RequestKind::Daily).await?;
        let start = Utc::now();
        Ok((0..7)
            .map(|d| daily(at, start + ChronoDuration::days(d)))
            .collect())
    }
}
