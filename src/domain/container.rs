use std::fmt;

/// Length of the abbreviated container id used as the `id` label
pub const SHORT_ID_LEN: usize = 12;

/// Unique identifier for a container
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 12-character form shown by `docker ps`
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(SHORT_ID_LEN) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl From<String> for ContainerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ContainerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Status reported by a container's healthcheck block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Starting,
    Unhealthy,
    /// Anything the runtime reports that is not one of the three above
    Other(String),
}

impl HealthStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "healthy" => Self::Healthy,
            "starting" => Self::Starting,
            "unhealthy" => Self::Unhealthy,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Inspection payload for one container, as produced by a poll.
///
/// Every field the runtime may omit is optional here; the translator
/// supplies the defaults, so building an observation never fails.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerObservation {
    pub id: ContainerId,
    pub name: Option<String>,
    pub image: Option<String>,
    pub hostname: String,
    pub running: Option<bool>,
    /// `None` when no healthcheck is configured
    pub health: Option<HealthStatus>,
    pub restart_count: Option<i64>,
    /// Raw `State.StartedAt` value
    pub started_at: Option<String>,
}

impl ContainerObservation {
    pub fn new(id: impl Into<ContainerId>, hostname: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            image: None,
            hostname: hostname.into(),
            running: None,
            health: None,
            restart_count: None,
            started_at: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    pub fn with_health(mut self, health: HealthStatus) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_restart_count(mut self, restart_count: i64) -> Self {
        self.restart_count = Some(restart_count);
        self
    }

    pub fn with_started_at(mut self, started_at: impl Into<String>) -> Self {
        self.started_at = Some(started_at.into());
        self
    }
}
