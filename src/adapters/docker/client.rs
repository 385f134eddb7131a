use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::errors::Error as BollardError;
use bollard::models::{ContainerInspectResponse, ImageInspect};
use bollard::Docker;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::endpoint::{resolve_candidates, Endpoint};
use crate::domain::{ContainerId, ContainerObservation, HealthStatus};
use crate::ports::{ContainerSource, SourceError};

/// Settings needed to locate and talk to the daemon
#[derive(Debug, Clone)]
pub struct DockerSettings {
    pub docker_host: Option<String>,
    pub xdg_runtime_dir: Option<String>,
    pub request_timeout: Duration,
    /// Reporting host stamped onto every observation
    pub hostname: String,
}

/// A live client and the endpoint it was resolved from
#[derive(Clone)]
struct Connection {
    client: Docker,
    endpoint: Endpoint,
}

/// Length of an abbreviated image id, `sha256:` prefix included
const SHORT_IMAGE_ID_LEN: usize = 17;

/// Docker adapter using bollard client.
///
/// The endpoint is resolved on first use and the client is reused for every
/// later call. When the daemon stops answering the cached client is dropped
/// so the next poll resolves the endpoint again.
pub struct DockerAdapter {
    settings: DockerSettings,
    connection: Mutex<Option<Connection>>,
    /// First repo tag per image id, `None` for untagged images
    image_tags: Mutex<HashMap<String, Option<String>>>,
}

impl DockerAdapter {
    pub fn new(settings: DockerSettings) -> Self {
        Self {
            settings,
            connection: Mutex::new(None),
            image_tags: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve and probe an endpoint now instead of on the first poll
    pub async fn connect(&self) -> Result<(), SourceError> {
        self.client().await.map(|_| ())
    }

    async fn client(&self) -> Result<Docker, SourceError> {
        let mut connection = self.connection.lock().await;
        if let Some(conn) = connection.as_ref() {
            return Ok(conn.client.clone());
        }

        let conn = self.resolve().await?;
        let client = conn.client.clone();
        *connection = Some(conn);
        Ok(client)
    }

    async fn disconnect(&self) {
        if let Some(conn) = self.connection.lock().await.take() {
            warn!(endpoint = %conn.endpoint, "Dropping Docker connection");
        }
        self.image_tags.lock().await.clear();
    }

    async fn resolve(&self) -> Result<Connection, SourceError> {
        let uid = nix::unistd::getuid().as_raw();
        let candidates = resolve_candidates(
            self.settings.docker_host.as_deref(),
            self.settings.xdg_runtime_dir.as_deref(),
            uid,
        );

        let mut failures = Vec::new();
        for endpoint in candidates {
            if !endpoint.is_present() {
                debug!(%endpoint, "Skipping missing socket");
                continue;
            }

            match self.probe(&endpoint).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    debug!(%endpoint, error = %e, "Endpoint probe failed");
                    failures.push(format!("{}: {}", endpoint, e));
                }
            }
        }

        for failure in &failures {
            warn!("Tried {}", failure);
        }

        Err(SourceError::RuntimeUnavailable {
            reason: "unable to connect to Docker daemon via any known endpoint".to_string(),
        })
    }

    async fn probe(&self, endpoint: &Endpoint) -> Result<Connection, SourceError> {
        let timeout_secs = self.settings.request_timeout.as_secs().max(1);
        let client = match endpoint {
            Endpoint::Address(addr) if addr.starts_with("tcp://") || addr.starts_with("http://") => {
                Docker::connect_with_http(addr, timeout_secs, bollard::API_DEFAULT_VERSION)
            }
            Endpoint::Address(addr) => Docker::connect_with_socket(addr, timeout_secs, bollard::API_DEFAULT_VERSION),
            Endpoint::Defaults => Docker::connect_with_defaults(),
        }
        .map_err(unavailable)?;

        let version = self.bounded(client.version()).await?;
        info!(
            %endpoint,
            engine = version.version.as_deref().unwrap_or("unknown"),
            api = version.api_version.as_deref().unwrap_or("unknown"),
            "✓ Connected to Docker daemon"
        );

        Ok(Connection {
            client,
            endpoint: endpoint.clone(),
        })
    }

    /// Await a bollard call, giving up after the configured timeout.
    ///
    /// The daemon's own error is handed back untouched so callers can tell
    /// a missing object from a broken connection.
    async fn timed<T, F>(&self, call: F) -> Result<Result<T, BollardError>, SourceError>
    where
        F: Future<Output = Result<T, BollardError>>,
    {
        tokio::time::timeout(self.settings.request_timeout, call)
            .await
            .map_err(|_| SourceError::Timeout {
                after: self.settings.request_timeout,
            })
    }

    /// Like [`DockerAdapter::timed`], with any daemon error meaning unavailable
    async fn bounded<T, F>(&self, call: F) -> Result<T, SourceError>
    where
        F: Future<Output = Result<T, BollardError>>,
    {
        self.timed(call).await?.map_err(unavailable)
    }

    /// First repo tag of an image, looked up once per image id
    async fn repo_tag(&self, client: &Docker, image_id: &str) -> Result<Option<String>, SourceError> {
        if let Some(tag) = self.image_tags.lock().await.get(image_id) {
            return Ok(tag.clone());
        }

        match self.timed(client.inspect_image(image_id)).await? {
            Ok(image) => {
                let tag = first_repo_tag(image);
                self.image_tags
                    .lock()
                    .await
                    .insert(image_id.to_string(), tag.clone());
                Ok(tag)
            }
            Err(BollardError::DockerResponseServerError { status_code, message }) => {
                debug!(image = image_id, status = status_code, %message, "Image lookup refused, using image id");
                Ok(None)
            }
            Err(e) => {
                self.disconnect().await;
                Err(unavailable(e))
            }
        }
    }

    fn map_inspection(
        &self,
        id: &ContainerId,
        inspect: ContainerInspectResponse,
        repo_tag: Option<String>,
    ) -> ContainerObservation {
        let id = inspect.id.map(ContainerId::new).unwrap_or_else(|| id.clone());
        let state = inspect.state.unwrap_or_default();

        let mut observation = ContainerObservation::new(id, self.settings.hostname.clone());
        observation.name = inspect.name;
        observation.image = repo_tag.or_else(|| {
            inspect
                .image
                .as_deref()
                .filter(|i| !i.is_empty())
                .map(|i| short_image_id(i).to_string())
        });
        observation.running = state.running;
        observation.restart_count = inspect.restart_count;
        observation.started_at = state.started_at;
        observation.health = state
            .health
            .map(|h| HealthStatus::parse(&h.status.map(|s| s.to_string()).unwrap_or_default()));
        observation
    }
}

fn first_repo_tag(image: ImageInspect) -> Option<String> {
    image
        .repo_tags
        .unwrap_or_default()
        .into_iter()
        .find(|tag| !tag.is_empty() && tag != "<none>:<none>")
}

/// `sha256:` plus ten hex digits, the form `docker images` abbreviates to
fn short_image_id(image_id: &str) -> &str {
    let len = if image_id.starts_with("sha256:") {
        SHORT_IMAGE_ID_LEN
    } else {
        SHORT_IMAGE_ID_LEN - "sha256:".len()
    };
    image_id.get(..len).unwrap_or(image_id)
}

fn unavailable(err: BollardError) -> SourceError {
    SourceError::RuntimeUnavailable {
        reason: err.to_string(),
    }
}

#[async_trait]
impl ContainerSource for DockerAdapter {
    async fn list_containers(&self) -> Result<Vec<ContainerId>, SourceError> {
        let client = self.client().await?;
        let options = Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        });

        let summaries = match self.bounded(client.list_containers(options)).await {
            Ok(s) => s,
            Err(e) => {
                self.disconnect().await;
                return Err(e);
            }
        };

        Ok(summaries
            .into_iter()
            .filter_map(|summary| summary.id)
            .map(ContainerId::new)
            .collect())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerObservation, SourceError> {
        let client = self.client().await?;
        let call = client.inspect_container(id.as_str(), None::<InspectContainerOptions>);

        let inspect = match self.timed(call).await? {
            Ok(inspect) => inspect,
            Err(BollardError::DockerResponseServerError { status_code: 404, .. }) => {
                return Err(SourceError::ContainerVanished { id: id.clone() });
            }
            Err(BollardError::DockerResponseServerError { status_code, message }) => {
                return Err(SourceError::Rejected {
                    id: id.clone(),
                    status: status_code,
                    message,
                });
            }
            Err(e) => {
                self.disconnect().await;
                return Err(unavailable(e));
            }
        };

        let repo_tag = match inspect.image.as_deref().filter(|i| !i.is_empty()) {
            Some(image_id) => self.repo_tag(&client, image_id).await?,
            None => None,
        };
        Ok(self.map_inspection(id, inspect, repo_tag))
    }
}
