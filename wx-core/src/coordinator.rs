//! The refresh cycle: locate, fetch all three request kinds, commit.
//!
//! A [`Coordinator`] is a cheap handle around shared state; clone it and hand
//! it to every consumer. At most one cycle is in flight at any time. Readers
//! only ever see snapshots committed by a completed cycle, and a cycle that
//! fails or is cancelled leaves the previous snapshot in place.

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    client::FetchClient,
    error::{FetchError, LocationError, RefreshError, TransportError},
    location::{FixFilter, LocationProvider},
    model::{Position, RequestKind, Snapshot},
};

/// What `refresh()` does while another cycle is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReentrancyPolicy {
    /// Wait for the running cycle and share its outcome.
    #[default]
    Join,
    /// Fail immediately with [`RefreshError::Busy`].
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    #[default]
    Idle,
    LocatingPosition,
    FetchingWeather,
    Ready,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    pub fix_filter: FixFilter,
    /// Accuracy hint passed to the location provider.
    pub desired_accuracy_m: f64,
    pub location_timeout: Duration,
    pub fetch_timeout: Duration,
    pub reentrancy: ReentrancyPolicy,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            fix_filter: FixFilter::default(),
            desired_accuracy_m: 100.0,
            location_timeout: Duration::from_secs(15),
            fetch_timeout: Duration::from_secs(10),
            reentrancy: ReentrancyPolicy::default(),
        }
    }
}

pub type CycleOutcome = Result<Arc<Snapshot>, RefreshError>;

/// Published once for every cycle, successful or not.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub outcome: CycleOutcome,
}

#[derive(Debug, Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    location: Arc<dyn LocationProvider>,
    client: Arc<dyn FetchClient>,
    config: CoordinatorConfig,
    state: watch::Sender<CoordinatorState>,
    snapshot: watch::Sender<Option<Arc<Snapshot>>>,
    reports: broadcast::Sender<CycleReport>,
    cycles: Mutex<Cycles>,
    shutdown: CancellationToken,
}

#[derive(Debug, Default)]
struct Cycles {
    last_id: u64,
    in_flight: Option<InFlight>,
    location_denied: bool,
}

#[derive(Debug)]
struct InFlight {
    id: u64,
    outcome: watch::Receiver<Option<CycleOutcome>>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        client: Arc<dyn FetchClient>,
        config: CoordinatorConfig,
    ) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Idle);
        let (snapshot, _) = watch::channel(None);
        let (reports, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(Inner {
                location,
                client,
                config,
                state,
                snapshot,
                reports,
                cycles: Mutex::new(Cycles::default()),
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Run one full cycle, or join the one already running.
    ///
    /// Resolves with the snapshot committed by the cycle. Must be called from
    /// within a Tokio runtime; the cycle itself runs on a spawned task and
    /// completes even if this future is dropped.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, RefreshError> {
        let mut outcome = self.start_or_join()?;

        let settled = outcome
            .wait_for(Option::is_some)
            .await
            .map_err(|_| RefreshError::Cancelled)?;

        match &*settled {
            Some(result) => result.clone(),
            None => Err(RefreshError::Cancelled),
        }
    }

    /// The last committed snapshot, or `None` before the first success.
    pub fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<CoordinatorState> {
        self.inner.state.subscribe()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.inner.snapshot.subscribe()
    }

    /// Completion reports, one per cycle started after subscribing.
    pub fn subscribe(&self) -> broadcast::Receiver<CycleReport> {
        self.inner.reports.subscribe()
    }

    /// Cancel the running cycle. Returns `false` if nothing was in flight.
    pub fn cancel(&self) -> bool {
        let mut cycles = self.inner.cycles.lock();
        match cycles.in_flight.take() {
            Some(in_flight) => {
                in_flight.cancel.cancel();
                self.inner.state.send_replace(CoordinatorState::Idle);
                info!(cycle = in_flight.id, "refresh cancelled");
                true
            }
            None => false,
        }
    }

    pub fn is_location_denied(&self) -> bool {
        self.inner.cycles.lock().location_denied
    }

    /// Forget a recorded permission denial so the next refresh asks again.
    pub fn clear_location_denial(&self) {
        self.inner.cycles.lock().location_denied = false;
    }

    /// Cancel any running cycle and refuse new ones.
    pub fn shutdown(&self) {
        let mut cycles = self.inner.cycles.lock();
        self.inner.shutdown.cancel();
        if let Some(in_flight) = cycles.in_flight.take() {
            debug!(cycle = in_flight.id, "cancelling refresh on shutdown");
            self.inner.state.send_replace(CoordinatorState::Idle);
        }
    }

    fn start_or_join(&self) -> Result<watch::Receiver<Option<CycleOutcome>>, RefreshError> {
        let inner = &self.inner;
        let mut cycles = inner.cycles.lock();

        if inner.shutdown.is_cancelled() {
            return Err(RefreshError::Cancelled);
        }
        if cycles.location_denied {
            debug!("location access was denied earlier, not refreshing");
            return Err(LocationError::Denied.into());
        }
        if let Some(in_flight) = &cycles.in_flight {
            return match inner.config.reentrancy {
                ReentrancyPolicy::Join => {
                    debug!(cycle = in_flight.id, "joining refresh in progress");
                    Ok(in_flight.outcome.clone())
                }
                ReentrancyPolicy::Reject => {
                    debug!(cycle = in_flight.id, "rejecting refresh, one is in progress");
                    Err(RefreshError::Busy)
                }
            };
        }

        cycles.last_id += 1;
        let id = cycles.last_id;
        let cancel = inner.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(None);
        cycles.in_flight = Some(InFlight {
            id,
            outcome: done_rx.clone(),
            cancel: cancel.clone(),
        });
        inner.state.send_replace(CoordinatorState::LocatingPosition);
        drop(cycles);

        info!(cycle = id, "starting refresh");

        let task = Arc::clone(inner);
        tokio::spawn(async move {
            // A panic inside a collaborator must still settle the cycle.
            let cycle = Arc::clone(&task);
            let run = tokio::spawn(async move { cycle.run_cycle(id, &cancel).await });
            let result = match run.await {
                Ok(result) => result,
                Err(err) => {
                    warn!(cycle = id, error = %err, "refresh task aborted");
                    Err(RefreshError::Aborted)
                }
            };
            let outcome = task.finish_cycle(id, result);
            done_tx.send_replace(Some(outcome));
        });

        Ok(done_rx)
    }
}

impl Inner {
    async fn run_cycle(&self, id: u64, cancel: &CancellationToken) -> Result<Snapshot, RefreshError> {
        let location = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
            fix = self.acquire_position(id) => fix?,
        };

        info!(
            cycle = id,
            coordinate = %location.coordinate,
            accuracy_m = location.horizontal_accuracy_m,
            "accepted position fix"
        );
        self.advance(id, CoordinatorState::FetchingWeather);

        let at = location.coordinate;
        let fetches = async {
            tokio::try_join!(
                self.timed(RequestKind::Current, self.client.fetch_current_conditions(at)),
                self.timed(RequestKind::Hourly, self.client.fetch_hourly_forecast(at)),
                self.timed(RequestKind::Daily, self.client.fetch_daily_forecast(at))
            )
        };

        let (current, hourly, daily) = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RefreshError::Cancelled),
            fetched = fetches => fetched?,
        };

        for (stage, entries) in [(RequestKind::Hourly, hourly.len()), (RequestKind::Daily, daily.len())] {
            if entries == 0 {
                return Err(RefreshError::Fetch {
                    stage,
                    source: FetchError::decode(format!("{stage} contained no entries")),
                });
            }
        }

        Ok(Snapshot {
            cycle: id,
            location,
            current,
            hourly,
            daily,
            committed_at: Utc::now(),
        })
    }

    /// Wait for the first usable fix, bounded by the location timeout.
    ///
    /// The update stream is dropped on return, which stops the provider.
    async fn acquire_position(&self, id: u64) -> Result<Position, LocationError> {
        match tokio::time::timeout(self.config.location_timeout, self.first_usable_fix(id)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(cycle = id, "no usable position fix before timeout");
                Err(LocationError::Timeout)
            }
        }
    }

    async fn first_usable_fix(&self, id: u64) -> Result<Position, LocationError> {
        let filter = self.config.fix_filter;
        let mut updates = self
            .location
            .start_updates(self.config.desired_accuracy_m)
            .await?;

        while let Some(update) = updates.next().await {
            let fix = update?;
            match filter.check(&fix, Utc::now()) {
                Ok(()) => return Ok(fix),
                Err(reason) => debug!(cycle = id, %reason, "discarding position fix"),
            }
        }

        Err(LocationError::Unavailable(
            "position updates ended without a usable fix".to_string(),
        ))
    }

    async fn timed<T>(
        &self,
        stage: RequestKind,
        fetch: impl Future<Output = Result<T, FetchError>>,
    ) -> Result<T, RefreshError> {
        let result = match tokio::time::timeout(self.config.fetch_timeout, fetch).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout.into()),
        };

        result.map_err(|source| {
            warn!(%stage, error = %source, "fetch failed");
            RefreshError::Fetch { stage, source }
        })
    }

    /// Move to `state` unless cycle `id` has been cancelled meanwhile.
    fn advance(&self, id: u64, state: CoordinatorState) {
        let cycles = self.cycles.lock();
        if cycles.in_flight.as_ref().is_some_and(|f| f.id == id) {
            self.state.send_replace(state);
        }
    }

    fn finish_cycle(&self, id: u64, result: Result<Snapshot, RefreshError>) -> CycleOutcome {
        let mut cycles = self.cycles.lock();
        let is_current = cycles.in_flight.as_ref().is_some_and(|f| f.id == id);

        let outcome = if is_current {
            cycles.in_flight = None;
            match result {
                Ok(snapshot) => {
                    let snapshot = Arc::new(snapshot);
                    self.snapshot.send_replace(Some(Arc::clone(&snapshot)));
                    self.state.send_replace(CoordinatorState::Ready);
                    info!(
                        cycle = id,
                        hourly = snapshot.hourly.len(),
                        daily = snapshot.daily.len(),
                        "committed weather snapshot"
                    );
                    Ok(snapshot)
                }
                Err(err) => {
                    if err == RefreshError::Location(LocationError::Denied) {
                        cycles.location_denied = true;
                    }
                    self.state.send_replace(CoordinatorState::Failed);
                    warn!(cycle = id, error = %err, "refresh failed");
                    Err(err)
                }
            }
        } else {
            debug!(cycle = id, "dropping results of cancelled refresh");
            Err(RefreshError::Cancelled)
        };
        drop(cycles);

        // No subscribers is fine.
        let _ = self.reports.send(CycleReport {
            cycle: id,
            outcome: outcome.clone(),
        });
        outcome
    }
}
