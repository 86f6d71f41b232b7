//! Series persistence.
//!
//! The allocator only needs one atomic primitive from storage: a
//! compare-and-set on the counter state. [`InMemorySeriesStore`] provides it
//! in-process; a database-backed store would map it to a conditional
//! `UPDATE ... WHERE next_number = $expected`.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tracing::warn;

use super::error::InvoicingError;
use super::numbering::CounterState;
use super::types::Series;

/// Storage for numbering series.
pub trait SeriesStore: Send + Sync {
    /// Load a series by prefix.
    fn load(&self, prefix: &str) -> Result<Option<Series>, InvoicingError>;

    /// Register a new series. Fails with `DuplicateSeries` if the prefix is taken.
    fn insert(&self, series: Series) -> Result<(), InvoicingError>;

    /// Replace the configuration of an existing series.
    fn update(&self, series: Series) -> Result<(), InvoicingError>;

    /// Remove a series, returning it.
    fn remove(&self, prefix: &str) -> Result<Series, InvoicingError>;

    /// All series, ordered by prefix.
    fn list(&self) -> Result<Vec<Series>, InvoicingError>;

    /// Atomically replace the counter state if it still equals `expected`.
    ///
    /// Fails with `ConcurrencyConflict` (writing nothing) when another writer
    /// committed first.
    fn compare_and_set(
        &self,
        prefix: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<(), InvoicingError>;
}

/// In-memory series store.
#[derive(Debug, Default)]
pub struct InMemorySeriesStore {
    series: RwLock<BTreeMap<String, Series>>,
}

impl InMemorySeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `series`.
    pub fn with_series(series: impl IntoIterator<Item = Series>) -> Result<Self, InvoicingError> {
        let store = Self::new();
        for s in series {
            store.insert(s)?;
        }
        Ok(store)
    }
}

impl SeriesStore for InMemorySeriesStore {
    fn load(&self, prefix: &str) -> Result<Option<Series>, InvoicingError> {
        Ok(self.series.read().get(prefix).cloned())
    }

    fn insert(&self, series: Series) -> Result<(), InvoicingError> {
        let mut map = self.series.write();
        if map.contains_key(&series.prefix) {
            return Err(InvoicingError::DuplicateSeries(series.prefix));
        }
        map.insert(series.prefix.clone(), series);
        Ok(())
    }

    fn update(&self, series: Series) -> Result<(), InvoicingError> {
        let mut map = self.series.write();
        let slot = map
            .get_mut(&series.prefix)
            .ok_or_else(|| InvoicingError::SeriesNotFound(series.prefix.clone()))?;
        *slot = series;
        Ok(())
    }

    fn remove(&self, prefix: &str) -> Result<Series, InvoicingError> {
        self.series
            .write()
            .remove(prefix)
            .ok_or_else(|| InvoicingError::SeriesNotFound(prefix.to_string()))
    }

    fn list(&self) -> Result<Vec<Series>, InvoicingError> {
        Ok(self.series.read().values().cloned().collect())
    }

    fn compare_and_set(
        &self,
        prefix: &str,
        expected: CounterState,
        next: CounterState,
    ) -> Result<(), InvoicingError> {
        let mut map = self.series.write();
        let series = map
            .get_mut(prefix)
            .ok_or_else(|| InvoicingError::SeriesNotFound(prefix.to_string()))?;

        let current = series.counter();
        if current != expected {
            warn!(
                series = prefix,
                expected = expected.next_number,
                actual = current.next_number,
                "counter changed before commit"
            );
            return Err(InvoicingError::ConcurrencyConflict(prefix.to_string()));
        }

        series.period_year = next.year;
        series.next_number = next.next_number;
        Ok(())
    }
}
