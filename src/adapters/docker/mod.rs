mod client;
pub mod endpoint;

pub use client::{DockerAdapter, DockerSettings};
