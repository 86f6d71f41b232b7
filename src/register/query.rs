//! Listing, search and pagination over invoices.

use std::cmp::Ordering;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Invoice, InvoiceId, InvoiceStatus, InvoiceType};

/// Accepted page sizes; anything else falls back to the first.
pub const PER_PAGE_CHOICES: [usize; 4] = [10, 25, 50, 100];

/// Maximum number of results of [`search_issued`].
pub const SEARCH_LIMIT: usize = 20;

/// Minimum query length for [`search_issued`].
pub const SEARCH_MIN_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Number,
    Date,
    Customer,
    Total,
    #[default]
    Created,
}

impl SortField {
    /// Parse a sort key; unknown keys sort by creation.
    pub fn from_code(code: &str) -> Self {
        match code {
            "number" => Self::Number,
            "date" => Self::Date,
            "customer" => Self::Customer,
            "total" => Self::Total,
            _ => Self::Created,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Filters, ordering and page selection for [`InvoiceRegister::list`](super::InvoiceRegister::list).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceQuery {
    /// Case-insensitive match on number, customer name or customer tax id.
    pub search: String,
    pub status: Option<InvoiceStatus>,
    pub invoice_type: Option<InvoiceType>,
    pub sort: SortField,
    pub direction: SortDirection,
    /// 1-based; clamped to the available pages.
    pub page: usize,
    pub per_page: usize,
}

impl Default for InvoiceQuery {
    fn default() -> Self {
        Self {
            search: String::new(),
            status: None,
            invoice_type: None,
            sort: SortField::Created,
            direction: SortDirection::Desc,
            page: 1,
            per_page: PER_PAGE_CHOICES[0],
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Effective page number after clamping.
    pub page: usize,
    pub per_page: usize,
    pub total_items: usize,
    /// At least 1, even for an empty result.
    pub total_pages: usize,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// Compact invoice view for search results and dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    pub id: InvoiceId,
    pub number: Option<String>,
    pub customer_name: String,
    pub total: Decimal,
    pub issue_date: NaiveDate,
    pub status: InvoiceStatus,
}

impl From<&Invoice> for InvoiceSummary {
    fn from(inv: &Invoice) -> Self {
        Self {
            id: inv.id,
            number: inv.number.clone(),
            customer_name: inv.customer_name().to_string(),
            total: inv.totals.total,
            issue_date: inv.issue_date,
            status: inv.status,
        }
    }
}

fn matches_search(inv: &Invoice, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
    inv.number.as_deref().is_some_and(contains)
        || contains(inv.customer_name())
        || contains(inv.customer_tax_id())
}

pub(crate) fn compare(a: &Invoice, b: &Invoice, field: SortField) -> Ordering {
    let by_created = || a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
    match field {
        SortField::Number => a.number.cmp(&b.number).then_with(by_created),
        SortField::Date => a.issue_date.cmp(&b.issue_date).then_with(by_created),
        SortField::Customer => a
            .customer_name()
            .to_lowercase()
            .cmp(&b.customer_name().to_lowercase())
            .then_with(by_created),
        SortField::Total => a.totals.total.cmp(&b.totals.total).then_with(by_created),
        SortField::Created => by_created(),
    }
}

/// Filter, sort and paginate `invoices` according to `query`.
pub(crate) fn run_query(query: &InvoiceQuery, invoices: Vec<Invoice>) -> Page<Invoice> {
    let needle = query.search.trim().to_lowercase();
    let mut matched: Vec<Invoice> = invoices
        .into_iter()
        .filter(|inv| needle.is_empty() || matches_search(inv, &needle))
        .filter(|inv| query.status.is_none_or(|s| inv.status == s))
        .filter(|inv| query.invoice_type.is_none_or(|t| inv.invoice_type == t))
        .collect();

    matched.sort_by(|a, b| match query.direction {
        SortDirection::Asc => compare(a, b, query.sort),
        SortDirection::Desc => compare(b, a, query.sort),
    });

    paginate(matched, query.page, query.per_page)
}

/// Slice `items` into a page, clamping the page number like a lenient paginator.
pub fn paginate<T>(items: Vec<T>, page: usize, per_page: usize) -> Page<T> {
    let per_page = if PER_PAGE_CHOICES.contains(&per_page) {
        per_page
    } else {
        PER_PAGE_CHOICES[0]
    };
    let total_items = items.len();
    let total_pages = total_items.div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);

    let items = items
        .into_iter()
        .skip((page - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        page,
        per_page,
        total_items,
        total_pages,
    }
}

/// Lookup of issued or paid invoices by number or customer name, e.g. to
/// pick the invoice a rectifying invoice corrects.
pub(crate) fn search_issued<'a>(
    query: &str,
    invoices: impl IntoIterator<Item = &'a Invoice>,
) -> Vec<InvoiceSummary> {
    let needle = query.trim().to_lowercase();
    if needle.chars().count() < SEARCH_MIN_LEN {
        return Vec::new();
    }

    let mut hits: Vec<&Invoice> = invoices
        .into_iter()
        .filter(|inv| matches!(inv.status, InvoiceStatus::Issued | InvoiceStatus::Paid))
        .filter(|inv| {
            inv.number
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle))
                || inv.customer_name().to_lowercase().contains(&needle)
        })
        .collect();
    hits.sort_by(|a, b| compare(b, a, SortField::Created));
    hits.into_iter()
        .take(SEARCH_LIMIT)
        .map(InvoiceSummary::from)
        .collect()
}
