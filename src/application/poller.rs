use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::series::SeriesRegistry;
use crate::domain::{translate, ContainerObservation};
use crate::ports::{ContainerSource, SeriesSink, SourceError};

/// Inspections in flight at once during a poll
const INSPECT_CONCURRENCY: usize = 8;

const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Result of the polling phase: everything the runtime reported this cycle
#[derive(Debug, Default)]
pub struct Snapshot {
    pub observations: Vec<ContainerObservation>,
    /// Containers that vanished or were rejected between list and inspect
    pub skipped: usize,
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub generation: u64,
    pub observed: usize,
    pub skipped: usize,
    pub evicted: usize,
    /// Rows still exported after eviction
    pub tracked: usize,
}

/// Exponential delay used while the runtime is unreachable
#[derive(Debug, Clone)]
struct Backoff {
    current: Duration,
}

impl Backoff {
    fn new() -> Self {
        Self {
            current: BACKOFF_INITIAL,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(BACKOFF_MAX);
        delay
    }

    fn reset(&mut self) {
        self.current = BACKOFF_INITIAL;
    }
}

/// Polls the container source and keeps the exported series in step with it.
///
/// Cycles run one at a time: the next wait only starts once the previous
/// cycle has been reconciled, so an overrunning cycle delays the schedule
/// instead of overlapping it.
pub struct Poller {
    source: Arc<dyn ContainerSource>,
    series: SeriesRegistry,
    interval: Duration,
    backoff: Backoff,
}

impl Poller {
    pub fn new(source: Arc<dyn ContainerSource>, sink: Arc<dyn SeriesSink>, interval: Duration) -> Self {
        Self {
            source,
            series: SeriesRegistry::new(sink),
            interval,
            backoff: Backoff::new(),
        }
    }

    /// List and inspect every container.
    ///
    /// A container that disappears mid-cycle is skipped. Any other failure
    /// aborts the poll before anything is written.
    pub async fn poll_once(&self) -> Result<Snapshot, SourceError> {
        let ids = self.source.list_containers().await?;
        let mut snapshot = Snapshot {
            observations: Vec::with_capacity(ids.len()),
            skipped: 0,
        };

        let mut inspections = pin!(stream::iter(ids)
            .map(|id| {
                let source = self.source.clone();
                async move {
                    let result = source.inspect_container(&id).await;
                    (id, result)
                }
            })
            .buffered(INSPECT_CONCURRENCY));

        while let Some((id, result)) = inspections.next().await {
            match result {
                Ok(observation) => snapshot.observations.push(observation),
                Err(e @ SourceError::ContainerVanished { .. }) => {
                    debug!(container = %id, error = %e, "Skipping container");
                    snapshot.skipped += 1;
                }
                Err(e) if e.is_per_container() => {
                    warn!(container = %id, error = %e, "Skipping container");
                    snapshot.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(snapshot)
    }

    /// Write every observed row, then evict rows this cycle did not refresh
    pub fn reconcile(&mut self, snapshot: Snapshot) -> CycleReport {
        let generation = self.series.generation();

        for observation in &snapshot.observations {
            let (labels, values) = translate(observation);
            for (key, value) in values.rows(&labels) {
                self.series.upsert(key, value);
            }
        }

        let evicted = self.series.evict_stale();
        CycleReport {
            generation,
            observed: snapshot.observations.len(),
            skipped: snapshot.skipped,
            evicted,
            tracked: self.series.len(),
        }
    }

    /// One full Polling → Reconciling pass
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SourceError> {
        let snapshot = self.poll_once().await?;
        Ok(self.reconcile(snapshot))
    }

    /// Delay before the next cycle, given how this one ended
    fn next_delay(&mut self, outcome: &Result<CycleReport, SourceError>) -> Duration {
        match outcome {
            Ok(report) => {
                debug!(
                    cycle = report.generation,
                    observed = report.observed,
                    skipped = report.skipped,
                    evicted = report.evicted,
                    tracked = report.tracked,
                    "Poll cycle complete"
                );
                self.backoff.reset();
                self.interval
            }
            Err(e) => {
                let delay = self.backoff.next_delay();
                error!(error = %e, retry_in = ?delay, "Poll cycle aborted, keeping previous series");
                delay
            }
        }
    }

    /// Poll until shutdown. The first cycle starts immediately.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "Poll loop started");

        loop {
            let outcome = tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown requested, abandoning in-flight poll");
                    break;
                }
                outcome = self.run_cycle() => outcome,
            };

            let delay = self.next_delay(&outcome);

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Poll loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::adapters::prom::Exposition;
    use crate::domain::{ContainerId, Family, HealthStatus, LabelTuple, SeriesKey, StatusLabel};

    /// In-memory runtime whose answers tests can change between cycles
    #[derive(Default)]
    struct FakeSource {
        state: Mutex<FakeState>,
    }

    #[derive(Default)]
    struct FakeState {
        containers: Vec<ContainerObservation>,
        unavailable: bool,
        vanished: HashSet<String>,
        inspect_unavailable: HashSet<String>,
        /// Inspections of these ids never complete
        hung: HashSet<String>,
    }

    impl FakeSource {
        fn set(&self, containers: Vec<ContainerObservation>) {
            self.state.lock().unwrap().containers = containers;
        }

        fn update(&self, f: impl FnOnce(&mut FakeState)) {
            f(&mut self.state.lock().unwrap());
        }
    }

    #[async_trait]
    impl ContainerSource for FakeSource {
        async fn list_containers(&self) -> Result<Vec<ContainerId>, SourceError> {
            let state = self.state.lock().unwrap();
            if state.unavailable {
                return Err(SourceError::RuntimeUnavailable {
                    reason: "connection refused".to_string(),
                });
            }
            Ok(state.containers.iter().map(|c| c.id.clone()).collect())
        }

        async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerObservation, SourceError> {
            let hung = self.state.lock().unwrap().hung.contains(id.as_str());
            if hung {
                std::future::pending::<()>().await;
            }

            let state = self.state.lock().unwrap();
            if state.inspect_unavailable.contains(id.as_str()) {
                return Err(SourceError::Timeout {
                    after: Duration::from_secs(5),
                });
            }
            if state.vanished.contains(id.as_str()) {
                return Err(SourceError::ContainerVanished { id: id.clone() });
            }
            state
                .containers
                .iter()
                .find(|c| &c.id == id)
                .cloned()
                .ok_or_else(|| SourceError::ContainerVanished { id: id.clone() })
        }
    }

    fn web1() -> ContainerObservation {
        ContainerObservation::new("abc123", "host1")
            .with_name("/web1")
            .with_image("nginx:latest")
            .with_running(true)
            .with_health(HealthStatus::Unhealthy)
            .with_restart_count(2)
            .with_started_at("2023-11-14T22:13:20Z")
    }

    fn db1() -> ContainerObservation {
        ContainerObservation::new("def456", "host1")
            .with_name("/db1")
            .with_image("postgres:16")
            .with_running(false)
    }

    fn setup() -> (Arc<FakeSource>, Arc<Exposition>, Poller) {
        let source = Arc::new(FakeSource::default());
        let exposition = Arc::new(Exposition::new().unwrap());
        let poller = Poller::new(source.clone(), exposition.clone(), Duration::from_secs(60));
        (source, exposition, poller)
    }

    fn web1_labels() -> LabelTuple {
        LabelTuple::new("web1", "nginx:latest", "abc123", "host1")
    }

    fn rows_with_id(exposition: &Exposition, id: &str) -> usize {
        exposition
            .render()
            .unwrap()
            .lines()
            .filter(|line| line.contains(&format!("id=\"{}\"", id)))
            .count()
    }

    #[tokio::test]
    async fn test_unhealthy_running_scenario() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1()]);

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.observed, 1);
        assert_eq!(report.evicted, 0);

        let labels = web1_labels();
        assert_eq!(exposition.value(&SeriesKey::plain(Family::Health, labels.clone())), Some(0.0));
        assert_eq!(exposition.value(&SeriesKey::plain(Family::Running, labels.clone())), Some(1.0));
        assert_eq!(exposition.value(&SeriesKey::plain(Family::RestartCount, labels.clone())), Some(2.0));
        assert_eq!(
            exposition.value(&SeriesKey::plain(Family::StartedAt, labels.clone())),
            Some(1_700_000_000.0)
        );
        for status in StatusLabel::ALL {
            let expected = if status == StatusLabel::Unhealthy { 1.0 } else { 0.0 };
            assert_eq!(
                exposition.value(&SeriesKey::status(labels.clone(), status)),
                Some(expected)
            );
        }
    }

    #[tokio::test]
    async fn test_removed_container_disappears_after_next_cycle() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1(), db1()]);

        for _ in 0..5 {
            poller.run_cycle().await.unwrap();
        }
        assert_eq!(rows_with_id(&exposition, "def456"), 8);

        source.set(vec![web1()]);
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.evicted, 8);
        assert_eq!(rows_with_id(&exposition, "def456"), 0);
        assert_eq!(rows_with_id(&exposition, "abc123"), 8);
        assert_eq!(exposition.row_count(), 8);
    }

    #[tokio::test]
    async fn test_runtime_unavailable_preserves_series() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1(), db1()]);
        poller.run_cycle().await.unwrap();
        let before = exposition.render().unwrap();

        source.update(|s| s.unavailable = true);
        assert!(matches!(
            poller.run_cycle().await,
            Err(SourceError::RuntimeUnavailable { .. })
        ));
        assert_eq!(exposition.render().unwrap(), before);

        // The next successful cycle still sees the rows as its own.
        source.update(|s| s.unavailable = false);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.evicted, 0);
        assert_eq!(exposition.render().unwrap(), before);
    }

    #[tokio::test]
    async fn test_inspect_timeout_aborts_without_partial_writes() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1()]);
        poller.run_cycle().await.unwrap();
        let before = exposition.render().unwrap();

        let mut restarted = web1().with_restart_count(3);
        restarted.running = Some(false);
        source.set(vec![restarted, db1()]);
        source.update(|s| {
            s.inspect_unavailable.insert("def456".to_string());
        });

        assert!(matches!(poller.run_cycle().await, Err(SourceError::Timeout { .. })));
        assert_eq!(exposition.render().unwrap(), before);
    }

    #[tokio::test]
    async fn test_polling_is_idempotent() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1(), db1()]);

        poller.run_cycle().await.unwrap();
        let first = exposition.render().unwrap();
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.evicted, 0);
        assert_eq!(report.tracked, 16);
        assert_eq!(exposition.render().unwrap(), first);
        assert_eq!(exposition.row_count(), 16);
    }

    #[tokio::test]
    async fn test_vanished_container_is_skipped() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1(), db1()]);
        source.update(|s| {
            s.vanished.insert("def456".to_string());
        });

        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.observed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(rows_with_id(&exposition, "abc123"), 8);
        assert_eq!(rows_with_id(&exposition, "def456"), 0);
    }

    #[tokio::test]
    async fn test_single_missed_inspect_evicts_then_recovers() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1(), db1()]);
        poller.run_cycle().await.unwrap();

        source.update(|s| {
            s.vanished.insert("def456".to_string());
        });
        poller.run_cycle().await.unwrap();
        assert_eq!(rows_with_id(&exposition, "def456"), 0);

        source.update(|s| s.vanished.clear());
        poller.run_cycle().await.unwrap();
        assert_eq!(rows_with_id(&exposition, "def456"), 8);
    }

    #[tokio::test]
    async fn test_status_change_keeps_all_one_hot_rows() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1().with_health(HealthStatus::Starting)]);
        poller.run_cycle().await.unwrap();

        source.set(vec![web1().with_health(HealthStatus::Healthy)]);
        let report = poller.run_cycle().await.unwrap();
        assert_eq!(report.evicted, 0);

        let labels = web1_labels();
        assert_eq!(exposition.value(&SeriesKey::plain(Family::Health, labels.clone())), Some(1.0));
        assert_eq!(exposition.value(&SeriesKey::status(labels.clone(), StatusLabel::Healthy)), Some(1.0));
        assert_eq!(exposition.value(&SeriesKey::status(labels.clone(), StatusLabel::Starting)), Some(0.0));
        assert_eq!(exposition.value(&SeriesKey::status(labels.clone(), StatusLabel::Unhealthy)), Some(0.0));
        assert_eq!(exposition.value(&SeriesKey::status(labels, StatusLabel::None)), Some(0.0));
    }

    #[tokio::test]
    async fn test_renamed_container_replaces_old_series() {
        let (source, exposition, mut poller) = setup();
        source.set(vec![web1()]);
        poller.run_cycle().await.unwrap();

        source.set(vec![web1().with_name("/web1-renamed")]);
        let report = poller.run_cycle().await.unwrap();

        assert_eq!(report.evicted, 8);
        assert_eq!(exposition.row_count(), 8);
        assert!(!exposition.render().unwrap().contains("container=\"web1\""));
    }

    #[tokio::test]
    async fn test_run_polls_immediately_and_stops_on_shutdown() {
        let (source, exposition, poller) = setup();
        source.set(vec![web1()]);
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(poller.run(rx));

        tokio::time::timeout(Duration::from_secs(5), async {
            while exposition.row_count() == 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("first poll should not wait for the interval");

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poll loop should stop promptly")
            .unwrap();
        assert_eq!(exposition.row_count(), 8);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_cycle() {
        let (source, exposition, poller) = setup();
        source.set(vec![web1(), db1()]);
        source.update(|s| {
            s.hung.insert("def456".to_string());
        });
        let (tx, rx) = broadcast::channel(1);

        let handle = tokio::spawn(poller.run(rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!handle.is_finished());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("in-flight cycle should be abandoned on shutdown")
            .unwrap();
        assert_eq!(exposition.row_count(), 0);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let mut backoff = Backoff::new();
        let delays: Vec<u64> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }
}
