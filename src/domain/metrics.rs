use chrono::{DateTime, NaiveDateTime};

use super::{ContainerObservation, HealthStatus, LabelTuple, StatusLabel};

/// Placeholder for label values the runtime did not report
pub const UNKNOWN: &str = "unknown";

/// Values exported for one container in one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValues {
    /// 1 healthy or no healthcheck, 0.5 starting, 0 otherwise
    pub health: f64,
    /// Row of the one-hot status family set to 1
    pub status: StatusLabel,
    pub running: f64,
    pub restart_count: f64,
    pub started_at_seconds: f64,
}

impl MetricValues {
    /// All four one-hot rows, the active one at 1 and the rest at 0
    pub fn status_rows(&self) -> [(StatusLabel, f64); 4] {
        StatusLabel::ALL.map(|s| (s, if s == self.status { 1.0 } else { 0.0 }))
    }
}

/// Map one inspection payload onto its label tuple and metric values.
///
/// Never fails: a missing name or image becomes `unknown`, a missing
/// running flag is `false`, a missing or negative restart count is 0 and an
/// absent or unparseable start time is 0.
pub fn translate(observation: &ContainerObservation) -> (LabelTuple, MetricValues) {
    let labels = LabelTuple::new(
        non_empty_or_unknown(observation.name.as_deref().map(|n| n.trim_start_matches('/'))),
        non_empty_or_unknown(observation.image.as_deref()),
        observation.id.short(),
        observation.hostname.as_str(),
    );

    let (health, status) = match &observation.health {
        None => (1.0, StatusLabel::None),
        Some(HealthStatus::Healthy) => (1.0, StatusLabel::Healthy),
        Some(HealthStatus::Starting) => (0.5, StatusLabel::Starting),
        Some(HealthStatus::Unhealthy) => (0.0, StatusLabel::Unhealthy),
        Some(HealthStatus::Other(_)) => (0.0, StatusLabel::None),
    };

    let values = MetricValues {
        health,
        status,
        running: if observation.running.unwrap_or(false) { 1.0 } else { 0.0 },
        restart_count: observation.restart_count.unwrap_or(0).max(0) as f64,
        started_at_seconds: observation
            .started_at
            .as_deref()
            .map(parse_started_at)
            .unwrap_or(0.0),
    };

    (labels, values)
}

/// Parse `State.StartedAt` into Unix seconds, keeping the fraction down to
/// microseconds.
///
/// Accepts RFC 3339 with any fractional precision, or a bare
/// `YYYY-MM-DDTHH:MM:SS[.f]` taken as UTC. The zero time the runtime
/// reports for never-started containers, like anything before the epoch,
/// yields 0.
pub fn parse_started_at(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let micros = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp_micros())
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc().timestamp_micros())
        });

    match micros {
        Ok(us) if us > 0 => us as f64 / 1e6,
        _ => 0.0,
    }
}

fn non_empty_or_unknown(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
