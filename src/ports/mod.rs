pub mod container_source;
pub mod series_sink;

pub use container_source::{ContainerSource, SourceError};
pub use series_sink::SeriesSink;
