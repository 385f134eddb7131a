use super::{LabelTuple, MetricValues, StatusLabel, LABEL_NAMES, STATUS_LABEL};

/// Exported metric families. Names and label sets are the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Family {
    Health,
    HealthStatus,
    Running,
    RestartCount,
    StartedAt,
}

impl Family {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Health => "docker_container_health",
            Self::HealthStatus => "docker_container_health_status",
            Self::Running => "docker_container_running",
            Self::RestartCount => "docker_container_restart_count",
            Self::StartedAt => "docker_container_started_at_seconds",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Self::Health => {
                "Numeric health of container (1=healthy, 0.5=starting, 0=unhealthy; 1 when no healthcheck)"
            }
            Self::HealthStatus => "Per-container health status (one-hot). status: {healthy, starting, unhealthy, none}",
            Self::Running => "1 if Docker reports the container State.Running, else 0",
            Self::RestartCount => "Docker engine RestartCount for the container (monotonic counter exposed as gauge)",
            Self::StartedAt => "Container start time (unix seconds) from State.StartedAt",
        }
    }

    pub fn label_names(&self) -> Vec<&'static str> {
        let mut names = LABEL_NAMES.to_vec();
        if *self == Self::HealthStatus {
            names.push(STATUS_LABEL);
        }
        names
    }
}

/// One exported row: a family plus the full set of label values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    family: Family,
    labels: LabelTuple,
    status: Option<StatusLabel>,
}

impl SeriesKey {
    /// Row of a family labelled only by the container identity
    ///
    /// `Family::HealthStatus` rows must go through [`SeriesKey::status`];
    /// passing it here yields its `none` row.
    pub fn plain(family: Family, labels: LabelTuple) -> Self {
        let status = (family == Family::HealthStatus).then_some(StatusLabel::None);
        Self { family, labels, status }
    }

    /// Row of the one-hot health status family
    pub fn status(labels: LabelTuple, status: StatusLabel) -> Self {
        Self {
            family: Family::HealthStatus,
            labels,
            status: Some(status),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    /// Label values in the order of `Family::label_names`
    pub fn label_values(&self) -> Vec<&str> {
        match self.status {
            Some(status) => self.labels.values_with_status(status).to_vec(),
            None => self.labels.values().to_vec(),
        }
    }
}

impl MetricValues {
    /// Every row written for one container in one cycle: one per plain
    /// family plus all four one-hot status rows.
    pub fn rows(&self, labels: &LabelTuple) -> Vec<(SeriesKey, f64)> {
        let mut rows = vec![
            (SeriesKey::plain(Family::Health, labels.clone()), self.health),
            (SeriesKey::plain(Family::Running, labels.clone()), self.running),
            (SeriesKey::plain(Family::RestartCount, labels.clone()), self.restart_count),
            (SeriesKey::plain(Family::StartedAt, labels.clone()), self.started_at_seconds),
        ];
        rows.extend(
            self.status_rows()
                .into_iter()
                .map(|(status, value)| (SeriesKey::status(labels.clone(), status), value)),
        );
        rows
    }
}
