pub mod container;
pub mod labels;
pub mod metrics;
pub mod series;

pub use container::{ContainerId, ContainerObservation, HealthStatus};
pub use labels::{LabelTuple, StatusLabel, LABEL_NAMES, STATUS_LABEL};
pub use metrics::{translate, MetricValues};
pub use series::{Family, SeriesKey};
