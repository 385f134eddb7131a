use crate::domain::SeriesKey;

/// Port for the surface that scrapes read exported rows from.
///
/// Implementations must tolerate concurrent readers while rows are being
/// written; each call locks at most the single row it touches.
pub trait SeriesSink: Send + Sync {
    /// Create or overwrite one row
    fn write(&self, key: &SeriesKey, value: f64);

    /// Delete one row. Returns false if it was not exported.
    fn remove(&self, key: &SeriesKey) -> bool;
}
