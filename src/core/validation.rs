use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::{InvoicingError, ValidationError};
use super::settings::InvoicingSettings;
use super::types::*;

/// Longest accepted series prefix.
pub const MAX_PREFIX_LEN: usize = 10;

/// Accepted range for a series' digit width.
pub const DIGITS_RANGE: std::ops::RangeInclusive<u8> = 1..=10;

/// Line total: quantity * unit_price minus the percentage discount,
/// rounded half-up to cents. `None` if an intermediate amount overflows.
pub fn line_total(line: &InvoiceLine) -> Option<Decimal> {
    let gross = line.quantity.checked_mul(line.unit_price)?;
    let discount = gross
        .checked_mul(line.discount_percent)?
        .checked_div(dec!(100))?;
    Some(round_half_up(gross.checked_sub(discount)?, 2))
}

/// Calculate line totals and invoice totals (mutates in place).
///
/// Fails with [`InvoicingError::Builder`] when an amount does not fit a
/// `Decimal`; the invoice is left unchanged in that case.
pub fn calculate_totals(invoice: &mut Invoice) -> Result<(), InvoicingError> {
    let mut line_totals = Vec::with_capacity(invoice.lines.len());
    for line in &invoice.lines {
        let total = line_total(line).ok_or_else(|| {
            InvoicingError::Builder(format!("amount of line {} overflows", line.position))
        })?;
        line_totals.push(total);
    }

    let subtotal = checked_sum(line_totals.iter().copied())?;

    // Group by rate; BTreeMap keeps the breakdown ordered.
    let mut groups: BTreeMap<Decimal, Decimal> = BTreeMap::new();
    for (line, total) in invoice.lines.iter().zip(&line_totals) {
        let taxable = groups.entry(line.tax_rate).or_insert(Decimal::ZERO);
        *taxable = taxable.checked_add(*total).ok_or_else(totals_overflow)?;
    }

    let mut breakdown = Vec::with_capacity(groups.len());
    for (rate, taxable_amount) in groups {
        let tax = taxable_amount
            .checked_mul(rate)
            .and_then(|t| t.checked_div(dec!(100)))
            .ok_or_else(totals_overflow)?;
        breakdown.push(TaxBreakdown {
            rate,
            taxable_amount,
            tax_amount: round_half_up(tax, 2),
        });
    }
    let tax_amount = checked_sum(breakdown.iter().map(|b| b.tax_amount))?;
    let total = subtotal
        .checked_add(tax_amount)
        .ok_or_else(totals_overflow)?;

    for (line, total) in invoice.lines.iter_mut().zip(line_totals) {
        line.total = total;
    }
    invoice.totals = Totals {
        subtotal,
        tax_amount,
        total,
        breakdown,
    };
    Ok(())
}

fn checked_sum(mut amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, InvoicingError> {
    amounts
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(totals_overflow)
}

fn totals_overflow() -> InvoicingError {
    InvoicingError::Builder("invoice totals overflow".into())
}

/// Round a Decimal to `dp` decimal places using half-up (commercial rounding).
fn round_half_up(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// Validate a series configuration.
/// Returns all validation errors found (not just the first).
pub fn validate_series(series: &Series) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let prefix_len = series.prefix.chars().count();
    if prefix_len == 0 || prefix_len > MAX_PREFIX_LEN {
        errors.push(ValidationError::with_code(
            "prefix",
            format!("prefix must be 1 to {MAX_PREFIX_LEN} characters"),
            "SERIES-PREFIX",
        ));
    } else if series.prefix.chars().any(char::is_whitespace) {
        errors.push(ValidationError::with_code(
            "prefix",
            "prefix must not contain whitespace",
            "SERIES-PREFIX",
        ));
    }

    if series.name.trim().is_empty() {
        errors.push(ValidationError::with_code(
            "name",
            "name must not be empty",
            "SERIES-NAME",
        ));
    }

    if !DIGITS_RANGE.contains(&series.number_digits) {
        errors.push(ValidationError::with_code(
            "number_digits",
            format!(
                "number digits must be between {} and {}",
                DIGITS_RANGE.start(),
                DIGITS_RANGE.end()
            ),
            "SERIES-DIGITS",
        ));
    }

    if series.next_number == 0 {
        errors.push(ValidationError::with_code(
            "next_number",
            "next number must be at least 1",
            "SERIES-NEXT",
        ));
    }

    if series.separator.chars().any(char::is_control) {
        errors.push(ValidationError::with_code(
            "separator",
            "separator must not contain control characters",
            "SERIES-SEPARATOR",
        ));
    }

    errors
}

/// Validate a draft before a number is allocated for it.
/// Returns all validation errors found (not just the first).
pub fn validate_for_issue(invoice: &Invoice, settings: &InvoicingSettings) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if invoice.lines.is_empty() {
        errors.push(ValidationError::with_code(
            "lines",
            "invoice must have at least one line",
            "LINES",
        ));
    }

    for (i, line) in invoice.lines.iter().enumerate() {
        validate_line(line, i, &mut errors);
    }

    // Simplified invoices omit the customer identification.
    if settings.require_customer && invoice.invoice_type != InvoiceType::Simplified {
        let has_name = invoice
            .customer
            .as_ref()
            .is_some_and(|c| !c.name.trim().is_empty());
        if !has_name {
            errors.push(ValidationError::with_code(
                "customer.name",
                "customer name is required",
                "CUSTOMER",
            ));
        }
    }

    if invoice.invoice_type == InvoiceType::Rectifying && invoice.rectified_invoice.is_none() {
        errors.push(ValidationError::with_code(
            "rectified_invoice",
            "rectifying invoice must reference the invoice it corrects",
            "RECTIFIED",
        ));
    }

    if let Some(due) = invoice.due_date {
        if due < invoice.issue_date {
            errors.push(ValidationError::with_code(
                "due_date",
                format!("due date {due} is before issue date {}", invoice.issue_date),
                "DUE-DATE",
            ));
        }
    }

    errors.extend(validate_totals(invoice));
    errors
}

/// Check that stored totals match a fresh calculation.
pub fn validate_totals(invoice: &Invoice) -> Vec<ValidationError> {
    let mut recalculated = invoice.clone();
    let mut errors = Vec::new();
    if let Err(e) = calculate_totals(&mut recalculated) {
        errors.push(ValidationError::with_code("totals", e.to_string(), "TOTALS"));
        return errors;
    }

    if recalculated.totals != invoice.totals {
        errors.push(ValidationError::with_code(
            "totals",
            format!(
                "stored total {} does not match calculated total {}",
                invoice.totals.total, recalculated.totals.total
            ),
            "TOTALS",
        ));
    }
    errors
}

fn validate_line(line: &InvoiceLine, index: usize, errors: &mut Vec<ValidationError>) {
    let prefix = format!("lines[{index}]");

    if line.description.trim().is_empty() {
        errors.push(ValidationError::with_code(
            format!("{prefix}.description"),
            "description must not be empty",
            "LINE-DESC",
        ));
    }
    if line.quantity <= Decimal::ZERO {
        errors.push(ValidationError::with_code(
            format!("{prefix}.quantity"),
            format!("quantity must be positive, got {}", line.quantity),
            "LINE-QTY",
        ));
    }
    if line.unit_price < Decimal::ZERO {
        errors.push(ValidationError::with_code(
            format!("{prefix}.unit_price"),
            format!("unit price must not be negative, got {}", line.unit_price),
            "LINE-PRICE",
        ));
    }
    if line.discount_percent < Decimal::ZERO || line.discount_percent > dec!(100) {
        errors.push(ValidationError::with_code(
            format!("{prefix}.discount_percent"),
            "discount must be between 0 and 100",
            "LINE-DISCOUNT",
        ));
    }
    if line.tax_rate < Decimal::ZERO || line.tax_rate > dec!(100) {
        errors.push(ValidationError::with_code(
            format!("{prefix}.tax_rate"),
            "tax rate must be between 0 and 100",
            "LINE-TAX",
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::*;

    fn customer() -> Customer {
        CustomerBuilder::new("Cliente SL").tax_id("B12345678").build()
    }

    fn codes(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().filter_map(|e| e.code.as_deref()).collect()
    }

    #[test]
    fn line_total_with_discount() {
        let line = InvoiceLineBuilder::new("Producto", dec!(2), dec!(50))
            .discount_percent(dec!(10))
            .build();
        assert_eq!(line.total, dec!(90.00));
    }

    #[test]
    fn line_total_rounds_half_up() {
        // 3 * 0.335 = 1.005 → 1.01
        let line = InvoiceLineBuilder::new("x", dec!(3), dec!(0.335)).build();
        assert_eq!(line.total, dec!(1.01));
    }

    #[test]
    fn totals_single_rate() {
        let inv = InvoiceBuilder::new("F")
            .customer(customer())
            .add_line(InvoiceLineBuilder::new("A", dec!(2), dec!(100)).build())
            .add_line(InvoiceLineBuilder::new("B", dec!(1), dec!(50)).build())
            .build()
            .unwrap();
        assert_eq!(inv.totals.subtotal, dec!(250));
        assert_eq!(inv.totals.tax_amount, dec!(52.50));
        assert_eq!(inv.totals.total, dec!(302.50));
        assert_eq!(inv.totals.breakdown.len(), 1);
    }

    #[test]
    fn totals_mixed_rates_are_grouped_and_ordered() {
        let inv = InvoiceBuilder::new("F")
            .customer(customer())
            .add_line(
                InvoiceLineBuilder::new("Libro", dec!(3), dec!(29.99))
                    .tax_rate(dec!(4))
                    .build(),
            )
            .add_line(InvoiceLineBuilder::new("Software", dec!(1), dec!(199)).build())
            .add_line(
                InvoiceLineBuilder::new("Comida", dec!(1), dec!(10))
                    .tax_rate(dec!(10))
                    .build(),
            )
            .build()
            .unwrap();

        let rates: Vec<Decimal> = inv.totals.breakdown.iter().map(|b| b.rate).collect();
        assert_eq!(rates, vec![dec!(4), dec!(10), dec!(21)]);

        // 89.97 * 0.04 = 3.5988 → 3.60
        assert_eq!(inv.totals.breakdown[0].tax_amount, dec!(3.60));
        // 199 * 0.21 = 41.79
        assert_eq!(inv.totals.breakdown[2].tax_amount, dec!(41.79));
        assert_eq!(inv.totals.tax_amount, dec!(46.39));
        assert_eq!(inv.totals.total, inv.totals.subtotal + inv.totals.tax_amount);
    }

    #[test]
    fn valid_series() {
        let s = SeriesBuilder::new("F", "Facturas").build();
        assert!(validate_series(&s).is_empty());
    }

    #[test]
    fn invalid_series_reports_every_problem() {
        let mut s = SeriesBuilder::new("", " ").digits(0).starting_at(0).build();
        s.separator = "\n".into();
        let errors = validate_series(&s);
        assert_eq!(
            codes(&errors),
            vec![
                "SERIES-PREFIX",
                "SERIES-NAME",
                "SERIES-DIGITS",
                "SERIES-NEXT",
                "SERIES-SEPARATOR"
            ]
        );
    }

    #[test]
    fn prefix_too_long_or_spaced() {
        let long = SeriesBuilder::new("ABCDEFGHIJK", "Long").build();
        assert_eq!(codes(&validate_series(&long)), vec!["SERIES-PREFIX"]);
        let spaced = SeriesBuilder::new("F 1", "Spaced").build();
        assert_eq!(codes(&validate_series(&spaced)), vec!["SERIES-PREFIX"]);
    }

    #[test]
    fn issue_requires_lines() {
        let inv = InvoiceBuilder::new("F").customer(customer()).build().unwrap();
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(codes(&errors), vec!["LINES"]);
    }

    #[test]
    fn issue_requires_customer_unless_simplified() {
        let line = InvoiceLineBuilder::new("Caja", dec!(1), dec!(5)).build();
        let settings = InvoicingSettings::default();

        let standard = InvoiceBuilder::new("F").add_line(line.clone()).build().unwrap();
        assert_eq!(codes(&validate_for_issue(&standard, &settings)), vec!["CUSTOMER"]);

        let simplified = InvoiceBuilder::new("T")
            .invoice_type(InvoiceType::Simplified)
            .add_line(line.clone())
            .build()
            .unwrap();
        assert!(validate_for_issue(&simplified, &settings).is_empty());

        let relaxed = InvoicingSettings {
            require_customer: false,
            ..InvoicingSettings::default()
        };
        assert!(validate_for_issue(&standard, &relaxed).is_empty());
    }

    #[test]
    fn rectifying_requires_reference() {
        let inv = InvoiceBuilder::new("R")
            .invoice_type(InvoiceType::Rectifying)
            .customer(customer())
            .add_line(InvoiceLineBuilder::new("Abono", dec!(1), dec!(5)).build())
            .build()
            .unwrap();
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(codes(&errors), vec!["RECTIFIED"]);
    }

    #[test]
    fn bad_lines() {
        let inv = InvoiceBuilder::new("F")
            .customer(customer())
            .add_line(
                InvoiceLineBuilder::new("", dec!(0), dec!(-1))
                    .discount_percent(dec!(150))
                    .tax_rate(dec!(-5))
                    .build(),
            )
            .build()
            .unwrap();
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(
            codes(&errors),
            vec![
                "LINE-DESC",
                "LINE-QTY",
                "LINE-PRICE",
                "LINE-DISCOUNT",
                "LINE-TAX"
            ]
        );
        assert_eq!(errors[1].field, "lines[0].quantity");
    }

    #[test]
    fn tampered_totals_detected() {
        let mut inv = InvoiceBuilder::new("F")
            .customer(customer())
            .add_line(InvoiceLineBuilder::new("A", dec!(1), dec!(10)).build())
            .build()
            .unwrap();
        inv.totals.total = dec!(1);
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(codes(&errors), vec!["TOTALS"]);
    }

    #[test]
    fn due_date_before_issue_date() {
        let d = |m, day| chrono::NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let inv = InvoiceBuilder::new("F")
            .issue_date(d(6, 15))
            .due_date(d(6, 1))
            .customer(customer())
            .add_line(InvoiceLineBuilder::new("A", dec!(1), dec!(10)).build())
            .build()
            .unwrap();
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(codes(&errors), vec!["DUE-DATE"]);
    }

    #[test]
    fn overflowing_line_total_is_none() {
        let mut line = InvoiceLineBuilder::new("x", dec!(1), dec!(1)).build();
        line.quantity = Decimal::MAX;
        line.unit_price = dec!(10);
        assert_eq!(line_total(&line), None);
    }

    #[test]
    fn overflowing_stored_lines_fail_totals_check() {
        let mut inv = InvoiceBuilder::new("F")
            .customer(customer())
            .add_line(InvoiceLineBuilder::new("A", dec!(1), dec!(10)).build())
            .build()
            .unwrap();
        inv.lines[0].quantity = Decimal::MAX;
        let errors = validate_for_issue(&inv, &InvoicingSettings::default());
        assert_eq!(codes(&errors), vec!["TOTALS"]);
    }
}
