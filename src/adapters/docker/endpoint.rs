use std::fmt;
use std::path::Path;

const DEFAULT_UNIX_SOCKET: &str = "unix:///var/run/docker.sock";
const DEFAULT_NAMED_PIPE: &str = "npipe:////./pipe/docker_engine";
const FALLBACK_ROOTLESS_SOCKET: &str = "unix:///run/user/1000/docker.sock";

/// A place the Docker daemon may be listening
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `unix://`, `npipe://`, `tcp://` or `http://` address
    Address(String),
    /// Let bollard resolve the daemon from its own environment defaults
    Defaults,
}

impl Endpoint {
    /// Unix socket path, if this endpoint is one
    pub fn unix_path(&self) -> Option<&str> {
        match self {
            Self::Address(addr) => addr.strip_prefix("unix://"),
            Self::Defaults => None,
        }
    }

    /// Cheap local check performed before probing.
    ///
    /// Unix sockets must exist on disk; every other endpoint is assumed
    /// reachable until the probe says otherwise.
    pub fn is_present(&self) -> bool {
        match self.unix_path() {
            Some(path) => Path::new(path).exists(),
            None => true,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(addr) => f.write_str(addr),
            Self::Defaults => f.write_str("environment defaults"),
        }
    }
}

/// Map docker-py style schemes onto addresses bollard understands
pub fn canonicalize(address: &str) -> String {
    let lower = address.to_ascii_lowercase();
    if lower.starts_with("http+docker://") || lower.starts_with("http+unix://") {
        DEFAULT_UNIX_SOCKET.to_string()
    } else if lower.starts_with("npipe://") {
        DEFAULT_NAMED_PIPE.to_string()
    } else {
        address.to_string()
    }
}

/// Ordered list of endpoints to probe.
///
/// An explicit `DOCKER_HOST` comes first, then the system socket, the
/// rootless socket of the current user, the conventional uid 1000 rootless
/// socket, and finally bollard's environment defaults. Duplicates are
/// dropped while keeping the first occurrence.
pub fn resolve_candidates(docker_host: Option<&str>, xdg_runtime_dir: Option<&str>, uid: u32) -> Vec<Endpoint> {
    let rootless = match xdg_runtime_dir {
        Some(dir) if !dir.is_empty() => format!("unix://{}/docker.sock", dir.trim_end_matches('/')),
        _ => format!("unix:///run/user/{}/docker.sock", uid),
    };

    let mut addresses: Vec<String> = Vec::new();
    let configured = docker_host.map(canonicalize);
    let well_known = [
        DEFAULT_UNIX_SOCKET.to_string(),
        rootless,
        FALLBACK_ROOTLESS_SOCKET.to_string(),
    ];

    for address in configured.into_iter().chain(well_known) {
        if !addresses.contains(&address) {
            addresses.push(address);
        }
    }

    addresses
        .into_iter()
        .map(Endpoint::Address)
        .chain(std::iter::once(Endpoint::Defaults))
        .collect()
}
