use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Thread-safe counters for order commands and the order event stream.
#[derive(Debug)]
pub struct CommandMetrics {
    // Commands
    commands_started: AtomicU64,
    commands_completed: AtomicU64,
    commands_failed: AtomicU64,
    commands_suppressed: AtomicU64,

    // Attempts
    attempts: AtomicU64,
    retries: AtomicU64,
    rejects: AtomicU64,
    executor_faults: AtomicU64,

    // Event stream
    events_published: AtomicU64,
    events_lagged: AtomicU64,

    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    start_time: Instant,
    last_event_time: Option<Instant>,
    last_failure_time: Option<Instant>,
}

impl Default for CommandMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandMetrics {
    pub fn new() -> Self {
        Self {
            commands_started: AtomicU64::new(0),
            commands_completed: AtomicU64::new(0),
            commands_failed: AtomicU64::new(0),
            commands_suppressed: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            rejects: AtomicU64::new(0),
            executor_faults: AtomicU64::new(0),
            events_published: AtomicU64::new(0),
            events_lagged: AtomicU64::new(0),
            inner: RwLock::new(MetricsInner {
                start_time: Instant::now(),
                last_event_time: None,
                last_failure_time: None,
            }),
        }
    }

    // --- Increment methods ---

    pub fn inc_commands_started(&self) {
        self.commands_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_completed(&self) {
        self.commands_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_commands_failed(&self) {
        self.commands_failed.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_failure_time = Some(Instant::now());
    }

    pub fn inc_commands_suppressed(&self) {
        self.commands_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_attempts(&self) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_retries(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_rejects(&self) {
        self.rejects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_executor_faults(&self) {
        self.executor_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_events_published(&self) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.inner.write().last_event_time = Some(Instant::now());
    }

    pub fn add_events_lagged(&self, skipped: u64) {
        self.events_lagged.fetch_add(skipped, Ordering::Relaxed);
    }

    // --- Getter methods ---

    pub fn commands_started(&self) -> u64 {
        self.commands_started.load(Ordering::Relaxed)
    }

    pub fn commands_completed(&self) -> u64 {
        self.commands_completed.load(Ordering::Relaxed)
    }

    pub fn commands_failed(&self) -> u64 {
        self.commands_failed.load(Ordering::Relaxed)
    }

    pub fn commands_suppressed(&self) -> u64 {
        self.commands_suppressed.load(Ordering::Relaxed)
    }

    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    pub fn rejects(&self) -> u64 {
        self.rejects.load(Ordering::Relaxed)
    }

    pub fn executor_faults(&self) -> u64 {
        self.executor_faults.load(Ordering::Relaxed)
    }

    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    pub fn events_lagged(&self) -> u64 {
        self.events_lagged.load(Ordering::Relaxed)
    }

    pub fn uptime_secs(&self) -> f64 {
        self.inner.read().start_time.elapsed().as_secs_f64()
    }

    pub fn secs_since_last_event(&self) -> Option<f64> {
        self.inner
            .read()
            .last_event_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    pub fn secs_since_last_failure(&self) -> Option<f64> {
        self.inner
            .read()
            .last_failure_time
            .map(|t| t.elapsed().as_secs_f64())
    }

    /// Generate a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_started: self.commands_started(),
            commands_completed: self.commands_completed(),
            commands_failed: self.commands_failed(),
            commands_suppressed: self.commands_suppressed(),
            attempts: self.attempts(),
            retries: self.retries(),
            rejects: self.rejects(),
            executor_faults: self.executor_faults(),
            events_published: self.events_published(),
            events_lagged: self.events_lagged(),
            uptime_secs: self.uptime_secs(),
            secs_since_last_event: self.secs_since_last_event(),
            secs_since_last_failure: self.secs_since_last_failure(),
        }
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub commands_started: u64,
    pub commands_completed: u64,
    pub commands_failed: u64,
    pub commands_suppressed: u64,
    pub attempts: u64,
    pub retries: u64,
    pub rejects: u64,
    pub executor_faults: u64,
    pub events_published: u64,
    pub events_lagged: u64,
    pub uptime_secs: f64,
    pub secs_since_last_event: Option<f64>,
    pub secs_since_last_failure: Option<f64>,
}

/// Health of the command pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    /// More commands failed than completed.
    Degraded,
    /// Subscribers lost events; commands waiting on them may never finish.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

impl MetricsSnapshot {
    pub fn health_status(&self) -> HealthStatus {
        if self.events_lagged > 0 {
            HealthStatus::Unhealthy
        } else if self.commands_failed > self.commands_completed {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    /// Commands that started but have not finished yet.
    pub fn commands_in_flight(&self) -> u64 {
        self.commands_started
            .saturating_sub(self.commands_completed + self.commands_failed)
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Command Metrics ===")?;
        writeln!(f, "Uptime:              {:.1}s", self.uptime_secs)?;
        writeln!(f, "Commands started:    {}", self.commands_started)?;
        writeln!(f, "Commands completed:  {}", self.commands_completed)?;
        writeln!(f, "Commands failed:     {}", self.commands_failed)?;
        writeln!(f, "Commands suppressed: {}", self.commands_suppressed)?;
        writeln!(f, "Attempts:            {}", self.attempts)?;
        writeln!(f, "Retries:             {}", self.retries)?;
        writeln!(f, "Rejects:             {}", self.rejects)?;
        writeln!(f, "Executor faults:     {}", self.executor_faults)?;
        writeln!(f, "Events published:    {}", self.events_published)?;
        writeln!(f, "Events lagged:       {}", self.events_lagged)?;
        if let Some(secs) = self.secs_since_last_event {
            writeln!(f, "Since last event:    {:.1}s", secs)?;
        }
        if let Some(secs) = self.secs_since_last_failure {
            writeln!(f, "Since last failure:  {:.1}s", secs)?;
        }
        Ok(())
    }
}

/// Shared handle to metrics.
pub type SharedMetrics = Arc<CommandMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(CommandMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot_with(completed: u64, failed: u64, lagged: u64) -> MetricsSnapshot {
        MetricsSnapshot {
            commands_started: completed + failed,
            commands_completed: completed,
            commands_failed: failed,
            commands_suppressed: 0,
            attempts: completed + failed,
            retries: 0,
            rejects: failed,
            executor_faults: 0,
            events_published: 10,
            events_lagged: lagged,
            uptime_secs: 60.0,
            secs_since_last_event: Some(1.0),
            secs_since_last_failure: None,
        }
    }

    #[test]
    fn test_metrics_increment() {
        let metrics = CommandMetrics::new();

        metrics.inc_commands_started();
        metrics.inc_commands_started();
        metrics.inc_attempts();
        metrics.inc_retries();
        metrics.add_events_lagged(3);

        assert_eq!(metrics.commands_started(), 2);
        assert_eq!(metrics.attempts(), 1);
        assert_eq!(metrics.retries(), 1);
        assert_eq!(metrics.events_lagged(), 3);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = CommandMetrics::new();

        metrics.inc_commands_started();
        metrics.inc_commands_failed();
        metrics.inc_events_published();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.commands_failed, 1);
        assert_eq!(snapshot.events_published, 1);
        assert_eq!(snapshot.commands_in_flight(), 0);
        assert!(snapshot.secs_since_last_failure.is_some());
        assert!(snapshot.uptime_secs >= 0.0);
    }

    #[test]
    fn test_last_event_time() {
        let metrics = CommandMetrics::new();
        assert!(metrics.secs_since_last_event().is_none());

        metrics.inc_events_published();

        let secs = metrics.secs_since_last_event();
        assert!(secs.is_some());
        assert!(secs.unwrap() < 1.0);
    }

    #[test]
    fn test_in_flight_count() {
        let metrics = CommandMetrics::new();
        metrics.inc_commands_started();
        metrics.inc_commands_started();
        metrics.inc_commands_completed();

        assert_eq!(metrics.snapshot().commands_in_flight(), 1);
    }

    #[test]
    fn test_health_status() {
        assert_eq!(snapshot_with(5, 1, 0).health_status(), HealthStatus::Healthy);
        assert_eq!(snapshot_with(1, 5, 0).health_status(), HealthStatus::Degraded);
        assert_eq!(snapshot_with(5, 0, 2).health_status(), HealthStatus::Unhealthy);
    }

    #[test]
    fn test_display_contains_counters() {
        let text = snapshot_with(4, 1, 0).to_string();
        assert!(text.contains("Commands completed:  4"));
        assert!(text.contains("Commands failed:     1"));
    }
}
