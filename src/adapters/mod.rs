pub mod docker;
pub mod host;
pub mod prom;

pub use docker::{DockerAdapter, DockerSettings};
pub use prom::Exposition;
