use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;

use super::error::InvoicingError;
use super::types::*;
use super::validation;

/// Builder for numbering series.
///
/// ```
/// use facturacion::core::*;
///
/// let series = SeriesBuilder::new("T", "Tickets")
///     .digits(8)
///     .scope(SeriesScope::Dedicated(InvoiceType::Simplified))
///     .build();
/// assert_eq!(series.format_number(5, 2024), "T-00000005");
/// ```
pub struct SeriesBuilder {
    prefix: String,
    name: String,
    description: String,
    next_number: u64,
    number_digits: u8,
    separator: String,
    reset_policy: ResetPolicy,
    period_year: i32,
    is_active: bool,
    is_default: bool,
    scope: SeriesScope,
}

impl SeriesBuilder {
    pub fn new(prefix: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            name: name.into(),
            description: String::new(),
            next_number: 1,
            number_digits: 6,
            separator: "-".to_string(),
            reset_policy: ResetPolicy::Never,
            period_year: Utc::now().year(),
            is_active: true,
            is_default: false,
            scope: SeriesScope::Shared,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Zero-padding width (default: 6, so "000001").
    pub fn digits(mut self, digits: u8) -> Self {
        self.number_digits = digits;
        self
    }

    /// Separator between prefix and number (default: "-").
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    /// Continue an existing numbering at `next_number`.
    pub fn starting_at(mut self, next_number: u64) -> Self {
        self.next_number = next_number;
        self
    }

    pub fn reset_policy(mut self, policy: ResetPolicy) -> Self {
        self.reset_policy = policy;
        self
    }

    /// Numbering year of the first period (default: current UTC year).
    pub fn period_year(mut self, year: i32) -> Self {
        self.period_year = year;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    pub fn default_series(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    pub fn scope(mut self, scope: SeriesScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn build(self) -> Series {
        Series {
            prefix: self.prefix,
            name: self.name,
            description: self.description,
            next_number: self.next_number,
            number_digits: self.number_digits,
            separator: self.separator,
            reset_policy: self.reset_policy,
            period_year: self.period_year,
            is_active: self.is_active,
            is_default: self.is_default,
            scope: self.scope,
        }
    }
}

/// Builder for the customer snapshot.
pub struct CustomerBuilder {
    name: String,
    tax_id: Option<String>,
    address: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl CustomerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tax_id: None,
            address: None,
            email: None,
            phone: None,
        }
    }

    pub fn tax_id(mut self, tax_id: impl Into<String>) -> Self {
        self.tax_id = Some(tax_id.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn build(self) -> Customer {
        Customer {
            name: self.name,
            tax_id: self.tax_id,
            address: self.address,
            email: self.email,
            phone: self.phone,
        }
    }
}

/// Builder for InvoiceLine.
pub struct InvoiceLineBuilder {
    description: String,
    product_sku: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    discount_percent: Decimal,
    tax_rate: Decimal,
}

impl InvoiceLineBuilder {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            description: description.into(),
            product_sku: None,
            quantity,
            unit_price,
            discount_percent: Decimal::ZERO,
            tax_rate: Decimal::new(21, 0),
        }
    }

    /// Tax rate percentage (default: 21).
    pub fn tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn discount_percent(mut self, percent: Decimal) -> Self {
        self.discount_percent = percent;
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.product_sku = Some(sku.into());
        self
    }

    pub fn build(self) -> InvoiceLine {
        let mut line = InvoiceLine {
            position: 0,
            description: self.description,
            product_sku: self.product_sku,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount_percent: self.discount_percent,
            tax_rate: self.tax_rate,
            total: Decimal::ZERO,
        };
        // An overflowing line is reported by `InvoiceBuilder::build`.
        line.total = validation::line_total(&line).unwrap_or_default();
        line
    }
}

/// Builder for draft invoices.
///
/// ```
/// use facturacion::core::*;
/// use rust_decimal_macros::dec;
///
/// let draft = InvoiceBuilder::new("F")
///     .customer(CustomerBuilder::new("Cliente SL").build())
///     .add_line(InvoiceLineBuilder::new("Caja", dec!(2), dec!(10)).build())
///     .build()
///     .unwrap();
/// assert_eq!(draft.status, InvoiceStatus::Draft);
/// assert!(draft.number.is_none());
/// ```
pub struct InvoiceBuilder {
    series: String,
    invoice_type: InvoiceType,
    issue_date: Option<NaiveDate>,
    due_date: Option<NaiveDate>,
    customer: Option<Customer>,
    sale_reference: Option<String>,
    rectified_invoice: Option<InvoiceId>,
    notes: String,
    lines: Vec<InvoiceLine>,
    employee: Option<String>,
}

impl InvoiceBuilder {
    pub fn new(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            invoice_type: InvoiceType::Invoice,
            issue_date: None,
            due_date: None,
            customer: None,
            sale_reference: None,
            rectified_invoice: None,
            notes: String::new(),
            lines: Vec::new(),
            employee: None,
        }
    }

    /// Prefix of the target series.
    pub fn series(&self) -> &str {
        &self.series
    }

    pub fn invoice_type(mut self, invoice_type: InvoiceType) -> Self {
        self.invoice_type = invoice_type;
        self
    }

    /// Draft date; replaced by the allocation date on issue.
    pub fn issue_date(mut self, date: NaiveDate) -> Self {
        self.issue_date = Some(date);
        self
    }

    pub fn due_date(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn sale_reference(mut self, reference: impl Into<String>) -> Self {
        self.sale_reference = Some(reference.into());
        self
    }

    /// Mark as rectifying invoice for `original`.
    pub fn rectifies(mut self, original: InvoiceId) -> Self {
        self.invoice_type = InvoiceType::Rectifying;
        self.rectified_invoice = Some(original);
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn employee(mut self, employee: impl Into<String>) -> Self {
        self.employee = Some(employee.into());
        self
    }

    pub fn add_line(mut self, line: InvoiceLine) -> Self {
        self.lines.push(line);
        self
    }

    /// Build the draft, numbering lines in insertion order and calculating
    /// totals. Lines may still be empty; issuing validates that.
    pub fn build(self) -> Result<Invoice, InvoicingError> {
        if self.series.trim().is_empty() {
            return Err(InvoicingError::Builder("series is required".into()));
        }

        // Input limits to prevent abuse
        if self.lines.len() > 10_000 {
            return Err(InvoicingError::Builder(
                "invoice cannot have more than 10,000 line items".into(),
            ));
        }
        if self.notes.chars().count() > 2_000 {
            return Err(InvoicingError::Builder(
                "invoice notes cannot exceed 2,000 characters".into(),
            ));
        }

        let now = Utc::now();
        let mut lines = self.lines;
        for (i, line) in lines.iter_mut().enumerate() {
            line.position = i as u32;
        }

        let mut invoice = Invoice {
            id: InvoiceId::new(),
            series: self.series,
            number: None,
            invoice_type: self.invoice_type,
            status: InvoiceStatus::Draft,
            issue_date: self.issue_date.unwrap_or_else(|| now.date_naive()),
            due_date: self.due_date,
            customer: self.customer,
            sale_reference: self.sale_reference,
            rectified_invoice: self.rectified_invoice,
            notes: self.notes,
            lines,
            totals: Totals::default(),
            payment: None,
            employee: self.employee,
            created_at: now,
        };
        validation::calculate_totals(&mut invoice)?;
        Ok(invoice)
    }
}
