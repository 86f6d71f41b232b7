use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::{InvoicingError, ValidationError};
use super::numbering::AllocatedNumber;
use super::store::{InMemorySeriesStore, SeriesStore};
use super::types::{InvoiceType, ResetPolicy, Series};

/// Default number of retries after a conflicting counter commit.
pub const DEFAULT_ALLOCATION_RETRIES: u32 = 3;

/// Hands out invoice numbers, exactly once each, per series.
///
/// Allocations on the same series are serialized by a per-series mutex and
/// committed through [`SeriesStore::compare_and_set`], so writers outside
/// this allocator cannot cause a duplicate either. Allocations on different
/// series only share the brief lookup of their lock.
///
/// ```
/// use facturacion::core::*;
///
/// let store = InMemorySeriesStore::with_series([
///     SeriesBuilder::new("F", "Facturas").build(),
/// ]).unwrap();
/// let allocator = SeriesAllocator::new(store);
///
/// assert_eq!(allocator.allocate("F").unwrap().number, "F-000001");
/// assert_eq!(allocator.allocate("F").unwrap().number, "F-000002");
/// assert!(matches!(allocator.allocate("X"), Err(InvoicingError::SeriesNotFound(_))));
/// ```
pub struct SeriesAllocator<S: SeriesStore = InMemorySeriesStore> {
    store: S,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    max_retries: u32,
}

impl<S: SeriesStore> SeriesAllocator<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            max_retries: DEFAULT_ALLOCATION_RETRIES,
        }
    }

    /// Set how often a conflicting commit is retried before
    /// `ConcurrencyConflict` is returned.
    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// The underlying series store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Allocate the next number of `prefix`, dated today (UTC).
    pub fn allocate(&self, prefix: &str) -> Result<AllocatedNumber, InvoicingError> {
        self.allocate_on(prefix, Utc::now().date_naive())
    }

    /// Allocate the next number of `prefix` for an invoice dated `date`.
    pub fn allocate_on(
        &self,
        prefix: &str,
        date: NaiveDate,
    ) -> Result<AllocatedNumber, InvoicingError> {
        self.allocate_inner(prefix, None, date, |_| {})
    }

    /// Like [`allocate_on`](Self::allocate_on), but also checks that the
    /// series accepts `invoice_type`.
    pub fn allocate_for(
        &self,
        prefix: &str,
        invoice_type: InvoiceType,
        date: NaiveDate,
    ) -> Result<AllocatedNumber, InvoicingError> {
        self.allocate_inner(prefix, Some(invoice_type), date, |_| {})
    }

    /// Like [`allocate_for`](Self::allocate_for), running `committed` right
    /// after the counter commit while the series is still locked. Anything
    /// `committed` records is therefore ordered like the numbers.
    pub fn allocate_then<F>(
        &self,
        prefix: &str,
        invoice_type: InvoiceType,
        date: NaiveDate,
        committed: F,
    ) -> Result<AllocatedNumber, InvoicingError>
    where
        F: FnOnce(&AllocatedNumber),
    {
        self.allocate_inner(prefix, Some(invoice_type), date, committed)
    }

    /// Preview the next number of `prefix` without consuming it.
    pub fn peek(&self, prefix: &str) -> Result<String, InvoicingError> {
        let series = self
            .store
            .load(prefix)?
            .ok_or_else(|| InvoicingError::SeriesNotFound(prefix.to_string()))?;
        series.peek_on(Utc::now().date_naive())
    }

    /// Change a series' configuration while holding its allocation lock.
    ///
    /// `change` edits a copy. The result must not bring back a number the
    /// series may already have handed out:
    ///
    /// - `period_year` never decreases. `next_number` never decreases for
    ///   a `Never` series, nor within the same period for a `Yearly` one.
    /// - Once the current counter has moved past 1, the reset policy and
    ///   separator are fixed and the digit width can only grow.
    pub fn modify<F>(&self, prefix: &str, change: F) -> Result<Series, InvoicingError>
    where
        F: FnOnce(&mut Series) -> Result<(), InvoicingError>,
    {
        let lock = self.series_lock(prefix);
        let _guard = lock.lock();

        let current = self
            .store
            .load(prefix)?
            .ok_or_else(|| InvoicingError::SeriesNotFound(prefix.to_string()))?;
        let mut updated = current.clone();
        change(&mut updated)?;

        if updated.prefix != current.prefix {
            return Err(InvoicingError::Builder(
                "a series prefix cannot be changed".into(),
            ));
        }
        let errors = reconfiguration_errors(&current, &updated);
        if !errors.is_empty() {
            warn!(series = prefix, "series change rejected");
            return Err(InvoicingError::Validation(errors));
        }

        self.store.update(updated.clone())?;
        Ok(updated)
    }

    /// Drop the lock entry of a removed series.
    pub fn forget(&self, prefix: &str) {
        self.locks.lock().remove(prefix);
    }

    fn series_lock(&self, prefix: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(prefix.to_string())
            .or_default()
            .clone()
    }

    fn allocate_inner<F>(
        &self,
        prefix: &str,
        invoice_type: Option<InvoiceType>,
        date: NaiveDate,
        committed: F,
    ) -> Result<AllocatedNumber, InvoicingError>
    where
        F: FnOnce(&AllocatedNumber),
    {
        let lock = self.series_lock(prefix);
        let _guard = lock.lock();

        let mut retries = 0;
        loop {
            let series = self
                .store
                .load(prefix)?
                .ok_or_else(|| InvoicingError::SeriesNotFound(prefix.to_string()))?;

            if !series.is_active {
                return Err(InvoicingError::SeriesInactive(series.prefix));
            }
            if let Some(t) = invoice_type {
                if !series.scope.accepts(t) {
                    return Err(InvoicingError::SeriesScopeMismatch {
                        prefix: series.prefix,
                        invoice_type: t,
                    });
                }
            }

            let (allocated, next) = series.draw(date).inspect_err(|e| {
                if matches!(e, InvoicingError::SeriesExhausted { .. }) {
                    warn!(series = prefix, digits = series.number_digits, "series exhausted");
                }
            })?;

            match self.store.compare_and_set(prefix, series.counter(), next) {
                Ok(()) => {
                    debug!(series = prefix, number = %allocated.number, "number allocated");
                    committed(&allocated);
                    return Ok(allocated);
                }
                Err(e) if e.is_retryable() && retries < self.max_retries => {
                    retries += 1;
                    debug!(series = prefix, retries, "retrying allocation after conflict");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Changes that could make `updated` format a number `current` already
/// issued.
fn reconfiguration_errors(current: &Series, updated: &Series) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if updated.period_year < current.period_year {
        errors.push(ValidationError::with_code(
            "period_year",
            format!(
                "period year cannot go back from {} to {}",
                current.period_year, updated.period_year
            ),
            "SERIES-YEAR",
        ));
    }
    let same_period = match current.reset_policy {
        ResetPolicy::Never => true,
        ResetPolicy::Yearly => updated.period_year == current.period_year,
    };
    if same_period && updated.next_number < current.next_number {
        errors.push(ValidationError::with_code(
            "next_number",
            format!(
                "counter cannot decrease from {} to {}",
                current.next_number, updated.next_number
            ),
            "SERIES-NEXT",
        ));
    }

    if current.next_number > 1 {
        if updated.reset_policy != current.reset_policy {
            errors.push(ValidationError::with_code(
                "reset_policy",
                "reset policy cannot change once numbers have been issued",
                "SERIES-FORMAT",
            ));
        }
        if updated.separator != current.separator {
            errors.push(ValidationError::with_code(
                "separator",
                "separator cannot change once numbers have been issued",
                "SERIES-FORMAT",
            ));
        }
        if updated.number_digits < current.number_digits {
            errors.push(ValidationError::with_code(
                "number_digits",
                format!(
                    "digit width cannot shrink from {} to {} once numbers have been issued",
                    current.number_digits, updated.number_digits
                ),
                "SERIES-FORMAT",
            ));
        }
    }

    errors
}
