use std::fs;

use tracing::warn;

use crate::domain::metrics::UNKNOWN;

/// Name of the host this exporter reports from.
///
/// Resolved once at startup: the kernel hostname first, then
/// `/etc/hostname`, then `unknown`.
pub fn hostname() -> String {
    match nix::unistd::gethostname() {
        Ok(name) => {
            let name = name.to_string_lossy().trim().to_string();
            if !name.is_empty() {
                return name;
            }
        }
        Err(e) => warn!(error = %e, "gethostname failed, falling back to /etc/hostname"),
    }

    fs::read_to_string("/etc/hostname")
        .map(|content| content.trim().to_string())
        .ok()
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}
