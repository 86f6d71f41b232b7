//! Invoice status transitions.
//!
//! ```text
//! Draft --issue--> Issued --mark_paid--> Paid
//!   |                 |
//!   +----cancel-------+--cancel--> Cancelled
//! ```
//!
//! Issuing consumes a number from the invoice's series. The number stays on
//! the invoice forever, including after cancellation.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use super::allocator::SeriesAllocator;
use super::error::{InvoicingError, ValidationError};
use super::numbering::AllocatedNumber;
use super::store::SeriesStore;
use super::types::{Invoice, InvoiceStatus, Payment};

impl Invoice {
    /// Issue the draft today (UTC). See [`issue_on`](Self::issue_on).
    pub fn issue<S: SeriesStore>(
        &mut self,
        allocator: &SeriesAllocator<S>,
    ) -> Result<AllocatedNumber, InvoicingError> {
        self.issue_on(allocator, Utc::now().date_naive())
    }

    /// Allocate a number from the invoice's series and mark it Issued.
    ///
    /// Only drafts can be issued. On error the invoice is unchanged and no
    /// number has been consumed.
    pub fn issue_on<S: SeriesStore>(
        &mut self,
        allocator: &SeriesAllocator<S>,
        date: NaiveDate,
    ) -> Result<AllocatedNumber, InvoicingError> {
        self.issue_then(allocator, date, |_, _| {})
    }

    /// Like [`issue_on`](Self::issue_on), handing the issued invoice to
    /// `committed` before the series lock is released.
    pub fn issue_then<S, F>(
        &mut self,
        allocator: &SeriesAllocator<S>,
        date: NaiveDate,
        committed: F,
    ) -> Result<AllocatedNumber, InvoicingError>
    where
        S: SeriesStore,
        F: FnOnce(&Invoice, &AllocatedNumber),
    {
        self.check_transition(InvoiceStatus::Issued)?;

        let series = self.series.clone();
        let allocated = allocator.allocate_then(&series, self.invoice_type, date, |allocated| {
            self.number = Some(allocated.number.clone());
            self.status = InvoiceStatus::Issued;
            self.issue_date = date;
            committed(self, allocated);
        })?;

        info!(invoice = %self.id, number = %allocated.number, "invoice issued");
        Ok(allocated)
    }

    /// Record a payment on an issued invoice.
    pub fn mark_paid(&mut self, payment: Payment) -> Result<(), InvoicingError> {
        self.check_transition(InvoiceStatus::Paid)?;
        if payment.amount < Decimal::ZERO {
            return Err(InvoicingError::Validation(vec![ValidationError::with_code(
                "payment.amount",
                "paid amount must not be negative",
                "PAYMENT",
            )]));
        }

        info!(invoice = %self.id, amount = %payment.amount, "invoice paid");
        self.payment = Some(payment);
        self.status = InvoiceStatus::Paid;
        Ok(())
    }

    /// Convenience for a payment of the full total, now.
    pub fn mark_paid_in_full(&mut self, method: impl Into<String>) -> Result<(), InvoicingError> {
        let payment = Payment {
            method: method.into(),
            amount: self.totals.total,
            paid_at: Utc::now(),
        };
        self.mark_paid(payment)
    }

    /// Cancel a draft or issued invoice. An issued invoice keeps its number.
    pub fn cancel(&mut self) -> Result<(), InvoicingError> {
        self.check_transition(InvoiceStatus::Cancelled)?;
        info!(
            invoice = %self.id,
            number = self.number.as_deref().unwrap_or("-"),
            "invoice cancelled"
        );
        self.status = InvoiceStatus::Cancelled;
        Ok(())
    }

    fn check_transition(&self, to: InvoiceStatus) -> Result<(), InvoicingError> {
        if self.status.can_transition_to(to) {
            Ok(())
        } else {
            Err(InvoicingError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}
