use std::cell::Cell;
use std::collections::VecDeque;
use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{AllocatedNumber, Invoice, InvoiceId, InvoiceType, Totals};

/// Hand-off data for an issued invoice. Emitted only after the number has
/// been committed, so it is final.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedInvoice {
    pub id: InvoiceId,
    pub series: String,
    pub number: String,
    pub sequence: u64,
    pub invoice_type: InvoiceType,
    pub issue_date: NaiveDate,
    pub customer_tax_id: Option<String>,
    pub totals: Totals,
}

impl IssuedInvoice {
    pub(crate) fn new(invoice: &Invoice, allocated: &AllocatedNumber) -> Self {
        Self {
            id: invoice.id,
            series: allocated.series.clone(),
            number: allocated.number.clone(),
            sequence: allocated.sequence,
            invoice_type: invoice.invoice_type,
            issue_date: invoice.issue_date,
            customer_tax_id: invoice.customer.as_ref().and_then(|c| c.tax_id.clone()),
            totals: invoice.totals.clone(),
        }
    }
}

/// Lifecycle events published by the register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    Created {
        id: InvoiceId,
        series: String,
        invoice_type: InvoiceType,
    },
    Issued(IssuedInvoice),
    Paid {
        id: InvoiceId,
        number: String,
        amount: Decimal,
    },
    Cancelled {
        id: InvoiceId,
        /// `None` for a voided draft.
        number: Option<String>,
    },
}

/// Extension point for other modules (compliance submission, notifications,
/// fiscal checks).
///
/// No register lock is held while a hook runs, so hooks may call back into
/// the register.
pub trait InvoiceHook: Send + Sync {
    /// Called before a number is allocated, with the draft as it will be
    /// issued. Returning `Err` blocks the issue; no number is consumed.
    ///
    /// The draft is re-checked after the hooks ran. If another caller issued
    /// or cancelled it meanwhile, the issue fails with `InvalidTransition`.
    fn before_issue(&self, _invoice: &Invoice) -> Result<(), String> {
        Ok(())
    }

    /// Called after a state change has been applied.
    ///
    /// Events arrive one at a time in commit order: `Issued` events of a
    /// series follow their numbers, and an invoice's events follow its
    /// lifecycle. Events caused from inside `on_event` are delivered after
    /// the current one. Blocking here on another register caller deadlocks.
    fn on_event(&self, _event: &InvoiceEvent) {}
}

/// Events waiting for delivery, in the order they were committed.
pub(crate) struct Outbox {
    queue: Mutex<VecDeque<InvoiceEvent>>,
    // Set while this thread is inside `deliver`.
    delivering: ReentrantMutex<Cell<bool>>,
}

impl Outbox {
    pub(crate) fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            delivering: ReentrantMutex::new(Cell::new(false)),
        }
    }

    /// Queue an event. Call while holding the lock that orders it.
    pub(crate) fn push(&self, event: InvoiceEvent) {
        self.queue.lock().push_back(event);
    }

    /// Hand every queued event to `hooks`. Returns once the queue is empty,
    /// or at once when called from a hook on the delivering thread.
    pub(crate) fn deliver(&self, hooks: &RwLock<Vec<Arc<dyn InvoiceHook>>>) {
        let delivering = self.delivering.lock();
        if delivering.replace(true) {
            return;
        }
        let _reset = ResetOnDrop(&*delivering);

        loop {
            let next = self.queue.lock().pop_front();
            let Some(event) = next else {
                return;
            };
            let hooks = hooks.read().clone();
            for hook in hooks {
                hook.on_event(&event);
            }
        }
    }
}

struct ResetOnDrop<'a>(&'a Cell<bool>);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Hook that records every event, in order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<InvoiceEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InvoiceEvent> {
        self.events.lock().clone()
    }

    /// Issued events only.
    pub fn issued(&self) -> Vec<IssuedInvoice> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                InvoiceEvent::Issued(issued) => Some(issued.clone()),
                _ => None,
            })
            .collect()
    }
}

impl InvoiceHook for EventLog {
    fn on_event(&self, event: &InvoiceEvent) {
        self.events.lock().push(event.clone());
    }
}
