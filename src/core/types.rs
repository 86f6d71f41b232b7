use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice identifier (UUID v7, so ids sort by creation time).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub Uuid);

impl InvoiceId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for InvoiceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

/// When a series restarts its counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResetPolicy {
    /// One counter for the lifetime of the series: "F-000123".
    #[default]
    Never,
    /// Counter restarts at 1 each calendar year; the year is part of the
    /// number: "F-2025-000001".
    Yearly,
}

/// Which invoice types may draw numbers from a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesScope {
    /// Every invoice type shares the numbering space.
    #[default]
    Shared,
    /// Only invoices of this type (e.g. a receipt series for simplified invoices).
    Dedicated(InvoiceType),
}

impl SeriesScope {
    pub fn accepts(&self, invoice_type: InvoiceType) -> bool {
        match self {
            Self::Shared => true,
            Self::Dedicated(t) => *t == invoice_type,
        }
    }
}

/// Invoice numbering series, e.g. F (facturas), R (rectificativas), T (tickets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    /// Short identifying prefix, unique within a store.
    pub prefix: String,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Next number to be issued within the current period.
    pub next_number: u64,
    /// Zero-padding width of the sequential part (1..=10).
    pub number_digits: u8,
    /// Placed between prefix, year and sequential part.
    pub separator: String,
    /// Counter reset policy.
    pub reset_policy: ResetPolicy,
    /// Numbering year of the current period (only meaningful for
    /// [`ResetPolicy::Yearly`]).
    pub period_year: i32,
    /// Inactive series are locked and cannot issue numbers.
    pub is_active: bool,
    /// Default series for new invoices.
    pub is_default: bool,
    /// Invoice types accepted by this series.
    pub scope: SeriesScope,
}

impl Series {
    /// Largest sequential number the configured width can represent.
    pub fn max_number(&self) -> u64 {
        10u64
            .checked_pow(u32::from(self.number_digits))
            .map_or(u64::MAX, |p| p - 1)
    }
}

impl std::fmt::Display for Series {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.prefix, self.name)
    }
}

/// Invoice lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Issued,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    /// Lowercase code as used in listings and serialized data.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
        }
    }

    /// Capitalized name shown in exports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Draft => "Draft",
            Self::Issued => "Issued",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "draft" => Some(Self::Draft),
            "issued" => Some(Self::Issued),
            "paid" => Some(Self::Paid),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid | Self::Cancelled)
    }

    /// Whether `self -> to` is an edge of the lifecycle.
    pub fn can_transition_to(&self, to: InvoiceStatus) -> bool {
        matches!(
            (self, to),
            (Self::Draft, Self::Issued)
                | (Self::Draft, Self::Cancelled)
                | (Self::Issued, Self::Paid)
                | (Self::Issued, Self::Cancelled)
        )
    }
}

/// Invoice variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceType {
    /// Full invoice with customer identification.
    Invoice,
    /// Receipt-like invoice without mandatory customer identification.
    Simplified,
    /// Corrects a previously issued invoice.
    Rectifying,
}

impl InvoiceType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Simplified => "simplified",
            Self::Rectifying => "rectifying",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "invoice" => Some(Self::Invoice),
            "simplified" => Some(Self::Simplified),
            "rectifying" => Some(Self::Rectifying),
            _ => None,
        }
    }
}

/// Customer data, snapshotted onto the invoice when it is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    /// Tax identifier (NIF/CIF/VAT id).
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Invoice line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// Display order within the invoice.
    pub position: u32,
    pub description: String,
    /// Seller's product SKU, for traceability.
    pub product_sku: Option<String>,
    pub quantity: Decimal,
    /// Net price per unit.
    pub unit_price: Decimal,
    /// Line discount percentage (0..=100).
    pub discount_percent: Decimal,
    /// Tax rate percentage for this line.
    pub tax_rate: Decimal,
    /// quantity * unit_price - discount, set by `calculate_totals()`.
    pub total: Decimal,
}

/// Tax breakdown per rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBreakdown {
    pub rate: Decimal,
    pub taxable_amount: Decimal,
    pub tax_amount: Decimal,
}

/// Invoice totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Sum of all line totals.
    pub subtotal: Decimal,
    /// Sum of the per-rate tax amounts.
    pub tax_amount: Decimal,
    /// subtotal + tax_amount.
    pub total: Decimal,
    /// Tax breakdown, ordered by rate.
    pub breakdown: Vec<TaxBreakdown>,
}

/// Payment recorded when an invoice is marked as paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Free text, e.g. "cash", "card", "transfer".
    pub method: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
}

/// Fiscal invoice document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    /// Prefix of the series the number is (or will be) drawn from.
    pub series: String,
    /// Allocated number; `None` until issued.
    pub number: Option<String>,
    pub invoice_type: InvoiceType,
    pub status: InvoiceStatus,
    /// Creation date for drafts, allocation date once issued.
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    /// Optional for simplified invoices.
    pub customer: Option<Customer>,
    /// Reference of the sale this invoice was generated from.
    pub sale_reference: Option<String>,
    /// For rectifying invoices: the invoice being corrected.
    pub rectified_invoice: Option<InvoiceId>,
    pub notes: String,
    pub lines: Vec<InvoiceLine>,
    /// Calculated by `calculate_totals()`.
    pub totals: Totals,
    pub payment: Option<Payment>,
    /// Employee who created or issued the invoice.
    pub employee: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    /// Customer name, or empty for anonymous simplified invoices.
    pub fn customer_name(&self) -> &str {
        self.customer.as_ref().map_or("", |c| c.name.as_str())
    }

    pub fn customer_tax_id(&self) -> &str {
        self.customer
            .as_ref()
            .and_then(|c| c.tax_id.as_deref())
            .unwrap_or("")
    }

    /// True once a number has been consumed, including invoices that were
    /// cancelled after issue. A cancelled draft never was.
    pub fn was_issued(&self) -> bool {
        self.number.is_some()
    }
}

impl std::fmt::Display for Invoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}",
            self.number.as_deref().unwrap_or("DRAFT"),
            self.customer_name()
        )
    }
}
