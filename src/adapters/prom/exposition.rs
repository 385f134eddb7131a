//! Prometheus exposition surface.
//!
//! Holds one `GaugeVec` per exported family on a private registry. The poll
//! loop writes rows through [`SeriesSink`]; the HTTP handler renders the
//! registry on every scrape. `GaugeVec` synchronizes each row on its own, so
//! a scrape never waits for a whole poll cycle.

use prometheus::{Encoder, GaugeVec, Opts, Registry, TextEncoder};
use thiserror::Error;
use tracing::debug;

use crate::domain::{Family, SeriesKey};
use crate::ports::SeriesSink;

#[derive(Debug, Error)]
pub enum ExpositionError {
    #[error("metric family error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("exposition is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// The set of gauge families scrapes read from
pub struct Exposition {
    registry: Registry,
    health: GaugeVec,
    health_status: GaugeVec,
    running: GaugeVec,
    restart_count: GaugeVec,
    started_at: GaugeVec,
}

impl Exposition {
    pub fn new() -> Result<Self, ExpositionError> {
        let registry = Registry::new();
        let register = |family: Family| -> Result<GaugeVec, ExpositionError> {
            let gauge = GaugeVec::new(Opts::new(family.name(), family.help()), &family.label_names())?;
            registry.register(Box::new(gauge.clone()))?;
            Ok(gauge)
        };

        Ok(Self {
            health: register(Family::Health)?,
            health_status: register(Family::HealthStatus)?,
            running: register(Family::Running)?,
            restart_count: register(Family::RestartCount)?,
            started_at: register(Family::StartedAt)?,
            registry,
        })
    }

    fn gauge(&self, family: Family) -> &GaugeVec {
        match family {
            Family::Health => &self.health,
            Family::HealthStatus => &self.health_status,
            Family::Running => &self.running,
            Family::RestartCount => &self.restart_count,
            Family::StartedAt => &self.started_at,
        }
    }

    /// Render the text exposition format
    pub fn render(&self) -> Result<String, ExpositionError> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl SeriesSink for Exposition {
    fn write(&self, key: &SeriesKey, value: f64) {
        self.gauge(key.family())
            .with_label_values(&key.label_values())
            .set(value);
    }

    fn remove(&self, key: &SeriesKey) -> bool {
        match self.gauge(key.family()).remove_label_values(&key.label_values()) {
            Ok(()) => true,
            Err(e) => {
                debug!(family = key.family().name(), error = %e, "Row already absent");
                false
            }
        }
    }
}

#[cfg(test)]
impl Exposition {
    /// Current value of a row, if it is exported
    pub fn value(&self, key: &SeriesKey) -> Option<f64> {
        let values = key.label_values();
        self.registry
            .gather()
            .into_iter()
            .find(|mf| mf.get_name() == key.family().name())?
            .get_metric()
            .iter()
            .find(|m| {
                let pairs = m.get_label();
                key.family()
                    .label_names()
                    .iter()
                    .zip(&values)
                    .all(|(name, value)| pairs.iter().any(|p| p.get_name() == *name && p.get_value() == *value))
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Number of exported rows across all families
    pub fn row_count(&self) -> usize {
        self.registry.gather().iter().map(|mf| mf.get_metric().len()).sum()
    }
}
