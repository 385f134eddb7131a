use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ContainerId, ContainerObservation};

/// Errors raised by a container source
#[derive(Debug, Error)]
pub enum SourceError {
    /// The runtime endpoint could not be reached; aborts the whole cycle
    #[error("container runtime unavailable: {reason}")]
    RuntimeUnavailable { reason: String },

    /// A bounded call ran out of time; treated like an unreachable runtime
    #[error("container runtime did not answer within {after:?}")]
    Timeout { after: Duration },

    /// The container was removed between listing and inspection
    #[error("container {id} vanished before it could be inspected")]
    ContainerVanished { id: ContainerId },

    /// The runtime answered but refused to describe this one container
    #[error("runtime rejected inspection of {id} ({status}): {message}")]
    Rejected {
        id: ContainerId,
        status: u16,
        message: String,
    },
}

impl SourceError {
    /// Whether this error only concerns a single container.
    ///
    /// Per-container errors skip that container; anything else aborts the
    /// poll cycle and leaves the exported series untouched.
    pub fn is_per_container(&self) -> bool {
        matches!(self, Self::ContainerVanished { .. } | Self::Rejected { .. })
    }
}

/// Port for fetching container information
#[async_trait]
pub trait ContainerSource: Send + Sync {
    /// List all containers (running and stopped)
    async fn list_containers(&self) -> Result<Vec<ContainerId>, SourceError>;

    /// Inspect a single container
    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerObservation, SourceError>;
}
