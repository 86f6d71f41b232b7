//! In-memory invoice register.
//!
//! Owns the series allocator and the invoices, and exposes series
//! management, the invoice lifecycle, listings and dashboard statistics.
//! Every operation takes `&self`; share the register behind an `Arc`.
//!
//! # Example
//!
//! ```
//! use facturacion::core::*;
//! use facturacion::register::*;
//! use rust_decimal_macros::dec;
//!
//! let register: InvoiceRegister = InvoiceRegister::default();
//! register
//!     .create_series(SeriesBuilder::new("F", "Facturas").default_series(true).build())
//!     .unwrap();
//!
//! let draft = register
//!     .create_invoice(
//!         InvoiceBuilder::new("F")
//!             .customer(CustomerBuilder::new("Cliente SL").build())
//!             .add_line(InvoiceLineBuilder::new("Servicio", dec!(1), dec!(100)).build()),
//!     )
//!     .unwrap();
//! let issued = register.issue(draft.id).unwrap();
//! assert_eq!(issued.number.as_deref(), Some("F-000001"));
//! ```

mod dashboard;
mod hooks;
mod query;
mod sale;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::{
    InMemorySeriesStore, Invoice, InvoiceBuilder, InvoiceId, InvoiceStatus, InvoicingError,
    InvoicingSettings, Payment, Series, SeriesAllocator, SeriesStore, ValidationError,
    validate_for_issue, validate_series,
};

pub use dashboard::{DashboardStats, RECENT_LIMIT};
pub use hooks::{EventLog, InvoiceEvent, InvoiceHook, IssuedInvoice};

use hooks::Outbox;
pub use query::{
    InvoiceQuery, InvoiceSummary, PER_PAGE_CHOICES, Page, SEARCH_LIMIT, SEARCH_MIN_LEN,
    SortDirection, SortField, paginate,
};
pub use sale::{SaleLine, SaleSnapshot};

/// A series with the number of invoices referencing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesOverview {
    pub series: Series,
    pub invoice_count: usize,
}

type InvoiceCell = Arc<Mutex<Invoice>>;

/// Series and invoices of one installation.
pub struct InvoiceRegister<S: SeriesStore = InMemorySeriesStore> {
    allocator: SeriesAllocator<S>,
    invoices: RwLock<BTreeMap<InvoiceId, InvoiceCell>>,
    settings: RwLock<InvoicingSettings>,
    hooks: RwLock<Vec<Arc<dyn InvoiceHook>>>,
    outbox: Outbox,
    // Serializes changes that touch the default flag of several series.
    series_admin: Mutex<()>,
}

impl Default for InvoiceRegister<InMemorySeriesStore> {
    fn default() -> Self {
        Self::new(InMemorySeriesStore::new(), InvoicingSettings::default())
    }
}

impl<S: SeriesStore> InvoiceRegister<S> {
    /// `settings.allocation_retries` is read once, here.
    pub fn new(store: S, settings: InvoicingSettings) -> Self {
        Self {
            allocator: SeriesAllocator::new(store).with_retries(settings.allocation_retries),
            invoices: RwLock::new(BTreeMap::new()),
            settings: RwLock::new(settings),
            hooks: RwLock::new(Vec::new()),
            outbox: Outbox::new(),
            series_admin: Mutex::new(()),
        }
    }

    pub fn allocator(&self) -> &SeriesAllocator<S> {
        &self.allocator
    }

    pub fn settings(&self) -> InvoicingSettings {
        self.settings.read().clone()
    }

    pub fn update_settings(&self, change: impl FnOnce(&mut InvoicingSettings)) {
        change(&mut self.settings.write());
        info!("invoicing settings updated");
    }

    /// Register a hook; hooks run in registration order.
    pub fn add_hook(&self, hook: Arc<dyn InvoiceHook>) {
        self.hooks.write().push(hook);
    }

    // ---- Series -----------------------------------------------------------

    /// Add a new series. A default series takes the flag from all others.
    pub fn create_series(&self, series: Series) -> Result<(), InvoicingError> {
        check_series(&series)?;
        let _admin = self.series_admin.lock();

        let prefix = series.prefix.clone();
        let is_default = series.is_default;
        self.allocator.store().insert(series)?;
        if is_default {
            self.clear_other_defaults(&prefix)?;
        }
        info!(series = %prefix, is_default, "series created");
        Ok(())
    }

    /// Replace a series' configuration. The prefix is fixed, and nothing may
    /// change that would reissue a number; see [`SeriesAllocator::modify`].
    pub fn update_series(&self, series: Series) -> Result<Series, InvoicingError> {
        check_series(&series)?;
        let _admin = self.series_admin.lock();

        let updated = self.allocator.modify(&series.prefix, |current| {
            *current = series.clone();
            Ok(())
        })?;
        if updated.is_default {
            self.clear_other_defaults(&updated.prefix)?;
        }
        info!(series = %updated.prefix, next_number = updated.next_number, "series updated");
        Ok(updated)
    }

    /// Flip a series between active and locked.
    pub fn toggle_series(&self, prefix: &str) -> Result<Series, InvoicingError> {
        let updated = self.allocator.modify(prefix, |s| {
            s.is_active = !s.is_active;
            Ok(())
        })?;
        info!(series = %prefix, active = updated.is_active, "series toggled");
        Ok(updated)
    }

    pub fn set_default_series(&self, prefix: &str) -> Result<Series, InvoicingError> {
        let _admin = self.series_admin.lock();
        let updated = self.allocator.modify(prefix, |s| {
            s.is_default = true;
            Ok(())
        })?;
        self.clear_other_defaults(prefix)?;
        info!(series = %prefix, "default series set");
        Ok(updated)
    }

    /// The series flagged as default, else the one named by
    /// `default_series_prefix` in the settings.
    pub fn default_series(&self) -> Result<Series, InvoicingError> {
        if let Some(series) = self
            .allocator
            .store()
            .list()?
            .into_iter()
            .find(|s| s.is_default)
        {
            return Ok(series);
        }
        let prefix = self.settings.read().default_series_prefix.clone();
        self.allocator
            .store()
            .load(&prefix)?
            .ok_or(InvoicingError::SeriesNotFound(prefix))
    }

    /// Remove a series no invoice references.
    pub fn delete_series(&self, prefix: &str) -> Result<Series, InvoicingError> {
        // Holding the read lock keeps invoices from being created meanwhile.
        let invoices = self.invoices.read();
        let in_use = invoices
            .values()
            .filter(|cell| cell.lock().series == prefix)
            .count();
        if in_use > 0 {
            return Err(InvoicingError::SeriesInUse {
                prefix: prefix.to_string(),
                invoices: in_use,
            });
        }

        let removed = self.allocator.store().remove(prefix)?;
        self.allocator.forget(prefix);
        info!(series = %prefix, "series deleted");
        Ok(removed)
    }

    /// Every series with its invoice count, ordered by prefix.
    pub fn series_overview(&self) -> Result<Vec<SeriesOverview>, InvoicingError> {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for cell in self.invoices.read().values() {
            *counts.entry(cell.lock().series.clone()).or_default() += 1;
        }
        Ok(self
            .allocator
            .store()
            .list()?
            .into_iter()
            .map(|series| SeriesOverview {
                invoice_count: counts.get(&series.prefix).copied().unwrap_or(0),
                series,
            })
            .collect())
    }

    fn clear_other_defaults(&self, keep: &str) -> Result<(), InvoicingError> {
        for other in self.allocator.store().list()? {
            if other.is_default && other.prefix != keep {
                self.allocator.modify(&other.prefix, |s| {
                    s.is_default = false;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    // ---- Invoices ---------------------------------------------------------

    /// Build and store a draft. Its series must exist, be active and accept
    /// the invoice type; a rectifying draft must point at an issued or paid
    /// invoice.
    pub fn create_invoice(&self, builder: InvoiceBuilder) -> Result<Invoice, InvoicingError> {
        let invoice = builder.build()?;
        {
            let mut invoices = self.invoices.write();

            let series = self
                .allocator
                .store()
                .load(&invoice.series)?
                .ok_or_else(|| InvoicingError::SeriesNotFound(invoice.series.clone()))?;
            if !series.is_active {
                return Err(InvoicingError::SeriesInactive(series.prefix));
            }
            if !series.scope.accepts(invoice.invoice_type) {
                return Err(InvoicingError::SeriesScopeMismatch {
                    prefix: series.prefix,
                    invoice_type: invoice.invoice_type,
                });
            }

            if let Some(original) = invoice.rectified_invoice {
                let status = invoices
                    .get(&original)
                    .ok_or(InvoicingError::InvoiceNotFound(original))?
                    .lock()
                    .status;
                if !matches!(status, InvoiceStatus::Issued | InvoiceStatus::Paid) {
                    return Err(InvoicingError::Validation(vec![ValidationError::with_code(
                        "rectified_invoice",
                        format!("only issued or paid invoices can be rectified, not {}", status.code()),
                        "RECTIFIED",
                    )]));
                }
            }

            invoices.insert(invoice.id, Arc::new(Mutex::new(invoice.clone())));
            self.outbox.push(InvoiceEvent::Created {
                id: invoice.id,
                series: invoice.series.clone(),
                invoice_type: invoice.invoice_type,
            });
        }

        info!(invoice = %invoice.id, series = %invoice.series, "draft created");
        self.outbox.deliver(&self.hooks);
        Ok(invoice)
    }

    pub fn get(&self, id: InvoiceId) -> Result<Invoice, InvoicingError> {
        Ok(self.cell(id)?.lock().clone())
    }

    pub fn find_by_number(&self, number: &str) -> Option<Invoice> {
        self.invoices
            .read()
            .values()
            .map(|cell| cell.lock())
            .find(|inv| inv.number.as_deref() == Some(number))
            .map(|inv| inv.clone())
    }

    /// Issue a draft today (UTC).
    pub fn issue(&self, id: InvoiceId) -> Result<Invoice, InvoicingError> {
        self.issue_on(id, Utc::now().date_naive())
    }

    /// Validate the draft, consult the hooks and allocate its number.
    ///
    /// Nothing is allocated unless validation and every hook pass. Hooks see
    /// a snapshot and run without the invoice locked; the draft is checked
    /// again before its number is allocated.
    pub fn issue_on(&self, id: InvoiceId, date: NaiveDate) -> Result<Invoice, InvoicingError> {
        let cell = self.cell(id)?;
        let mut candidate = cell.lock().clone();
        if candidate.status != InvoiceStatus::Draft {
            return Err(InvoicingError::InvalidTransition {
                from: candidate.status,
                to: InvoiceStatus::Issued,
            });
        }

        candidate.issue_date = date;
        let errors = validate_for_issue(&candidate, &self.settings.read());
        if !errors.is_empty() {
            return Err(InvoicingError::Validation(errors));
        }

        let hooks = self.hooks.read().clone();
        for hook in hooks {
            hook.before_issue(&candidate).map_err(|reason| {
                warn!(invoice = %id, %reason, "issue rejected by hook");
                InvoicingError::Rejected(reason)
            })?;
        }

        let invoice = {
            let mut invoice = cell.lock();
            // A concurrent issue or cancel fails the transition check here.
            invoice.issue_then(&self.allocator, date, |issued, allocated| {
                self.outbox
                    .push(InvoiceEvent::Issued(IssuedInvoice::new(issued, allocated)));
            })?;
            invoice.clone()
        };

        self.outbox.deliver(&self.hooks);
        Ok(invoice)
    }

    pub fn mark_paid(&self, id: InvoiceId, payment: Payment) -> Result<Invoice, InvoicingError> {
        let invoice = {
            let cell = self.cell(id)?;
            let mut invoice = cell.lock();
            invoice.mark_paid(payment)?;
            self.outbox.push(InvoiceEvent::Paid {
                id,
                number: invoice.number.clone().unwrap_or_default(),
                amount: invoice.payment.as_ref().map(|p| p.amount).unwrap_or_default(),
            });
            invoice.clone()
        };
        self.outbox.deliver(&self.hooks);
        Ok(invoice)
    }

    /// Cancel a draft or an issued invoice; an issued number stays consumed.
    pub fn cancel(&self, id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let invoice = {
            let cell = self.cell(id)?;
            let mut invoice = cell.lock();
            invoice.cancel()?;
            self.outbox.push(InvoiceEvent::Cancelled {
                id,
                number: invoice.number.clone(),
            });
            invoice.clone()
        };
        self.outbox.deliver(&self.hooks);
        Ok(invoice)
    }

    /// Remove a draft. Issued invoices can only be cancelled.
    pub fn delete_draft(&self, id: InvoiceId) -> Result<Invoice, InvoicingError> {
        let mut invoices = self.invoices.write();
        let status = invoices
            .get(&id)
            .ok_or(InvoicingError::InvoiceNotFound(id))?
            .lock()
            .status;
        if status != InvoiceStatus::Draft {
            return Err(InvoicingError::Rejected(format!(
                "only drafts can be deleted, invoice is {}",
                status.code()
            )));
        }

        let cell = invoices
            .remove(&id)
            .ok_or(InvoicingError::InvoiceNotFound(id))?;
        info!(invoice = %id, "draft deleted");
        let invoice = cell.lock().clone();
        Ok(invoice)
    }

    /// Turn a completed sale into a draft in the default series, issuing it
    /// right away when `auto_generate_invoice` is set.
    pub fn invoice_from_sale(&self, sale: &SaleSnapshot) -> Result<Invoice, InvoicingError> {
        let series = self.default_series()?;
        let draft = self.create_invoice(sale.to_builder(&series.prefix))?;
        info!(invoice = %draft.id, sale = %sale.reference, "invoice generated from sale");

        if self.settings.read().auto_generate_invoice {
            self.issue(draft.id)
        } else {
            Ok(draft)
        }
    }

    // ---- Queries ----------------------------------------------------------

    /// Snapshot of all invoices, oldest first.
    pub fn invoices(&self) -> Vec<Invoice> {
        self.invoices
            .read()
            .values()
            .map(|cell| cell.lock().clone())
            .collect()
    }

    pub fn list(&self, query: &InvoiceQuery) -> Page<Invoice> {
        query::run_query(query, self.invoices())
    }

    /// Issued or paid invoices whose number or customer name contains `q`.
    pub fn search_issued(&self, q: &str) -> Vec<InvoiceSummary> {
        query::search_issued(q, &self.invoices())
    }

    pub fn dashboard(&self, today: NaiveDate) -> DashboardStats {
        DashboardStats::compute(&self.invoices(), today)
    }

    fn cell(&self, id: InvoiceId) -> Result<InvoiceCell, InvoicingError> {
        self.invoices
            .read()
            .get(&id)
            .cloned()
            .ok_or(InvoicingError::InvoiceNotFound(id))
    }
}

fn check_series(series: &Series) -> Result<(), InvoicingError> {
    let errors = validate_series(series);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(InvoicingError::Validation(errors))
    }
}
