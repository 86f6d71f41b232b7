use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::query::{InvoiceSummary, SortField};
use crate::core::{Invoice, InvoiceStatus};

/// How many invoices the dashboard lists as recent.
pub const RECENT_LIMIT: usize = 10;

/// Invoice statistics for the month containing a reference date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    /// Total of issued and paid invoices dated in the month.
    pub monthly_total: Decimal,
    pub monthly_count: usize,
    /// Total of the month's invoices that have been paid.
    pub monthly_paid: Decimal,
    pub draft_count: usize,
    pub issued_count: usize,
    pub paid_count: usize,
    /// Drafts voided before a number was drawn.
    pub cancelled_draft_count: usize,
    /// Issued invoices cancelled afterwards; their numbers stay consumed.
    pub cancelled_issued_count: usize,
    /// Most recently created invoices first.
    pub recent: Vec<InvoiceSummary>,
}

impl DashboardStats {
    pub(crate) fn compute(invoices: &[Invoice], today: NaiveDate) -> Self {
        let mut stats = Self::default();
        let in_month =
            |d: NaiveDate| d.year() == today.year() && d.month() == today.month();

        for inv in invoices {
            match inv.status {
                InvoiceStatus::Draft => stats.draft_count += 1,
                InvoiceStatus::Issued => stats.issued_count += 1,
                InvoiceStatus::Paid => stats.paid_count += 1,
                InvoiceStatus::Cancelled if inv.was_issued() => {
                    stats.cancelled_issued_count += 1
                }
                InvoiceStatus::Cancelled => stats.cancelled_draft_count += 1,
            }

            if matches!(inv.status, InvoiceStatus::Issued | InvoiceStatus::Paid)
                && in_month(inv.issue_date)
            {
                stats.monthly_total += inv.totals.total;
                stats.monthly_count += 1;
                if inv.status == InvoiceStatus::Paid {
                    stats.monthly_paid += inv.totals.total;
                }
            }
        }

        let mut recent: Vec<&Invoice> = invoices.iter().collect();
        recent.sort_by(|a, b| super::query::compare(b, a, SortField::Created));
        stats.recent = recent
            .into_iter()
            .take(RECENT_LIMIT)
            .map(InvoiceSummary::from)
            .collect();
        stats
    }
}
