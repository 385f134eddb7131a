/// Label names shared by every exported family, in registration order
pub const LABEL_NAMES: [&str; 4] = ["container", "image", "id", "hostname"];

/// Extra label carried by the one-hot health status family
pub const STATUS_LABEL: &str = "status";

/// Identity of a container's series across poll cycles
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LabelTuple {
    pub container: String,
    pub image: String,
    pub id: String,
    pub hostname: String,
}

impl LabelTuple {
    pub fn new(
        container: impl Into<String>,
        image: impl Into<String>,
        id: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            container: container.into(),
            image: image.into(),
            id: id.into(),
            hostname: hostname.into(),
        }
    }

    /// Label values in `LABEL_NAMES` order
    pub fn values(&self) -> [&str; 4] {
        [&self.container, &self.image, &self.id, &self.hostname]
    }

    /// Label values for one row of the one-hot status family
    pub fn values_with_status(&self, status: StatusLabel) -> [&str; 5] {
        [
            &self.container,
            &self.image,
            &self.id,
            &self.hostname,
            status.as_str(),
        ]
    }
}

/// Value of the `status` label on `docker_container_health_status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusLabel {
    Healthy,
    Starting,
    Unhealthy,
    None,
}

impl StatusLabel {
    pub const ALL: [StatusLabel; 4] = [
        StatusLabel::Healthy,
        StatusLabel::Starting,
        StatusLabel::Unhealthy,
        StatusLabel::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Starting => "starting",
            Self::Unhealthy => "unhealthy",
            Self::None => "none",
        }
    }
}
