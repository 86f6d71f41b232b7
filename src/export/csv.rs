//! CSV generation for invoice listings.
//!
//! Comma separated, `\r\n` line endings, ISO-8601 dates and `.` as decimal
//! separator with two decimals.

use rust_decimal::Decimal;

use crate::core::Invoice;

/// Column titles of [`to_csv`].
pub const CSV_HEADER: [&str; 9] = [
    "Number",
    "Customer",
    "Tax ID",
    "Issue Date",
    "Due Date",
    "Subtotal",
    "Tax",
    "Total",
    "Status",
];

/// Render `invoices` as CSV, one row per invoice after a header row.
///
/// Drafts have an empty number.
pub fn to_csv(invoices: &[Invoice]) -> String {
    let mut out = String::new();
    for (i, title) in CSV_HEADER.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        csv_field_str(&mut out, title);
    }
    out.push_str("\r\n");

    for inv in invoices {
        csv_field_str(&mut out, inv.number.as_deref().unwrap_or(""));
        out.push(',');
        csv_field_str(&mut out, inv.customer_name());
        out.push(',');
        csv_field_str(&mut out, inv.customer_tax_id());
        out.push(',');
        out.push_str(&inv.issue_date.format("%Y-%m-%d").to_string());
        out.push(',');
        if let Some(d) = inv.due_date {
            out.push_str(&d.format("%Y-%m-%d").to_string());
        }
        out.push(',');
        csv_field_decimal(&mut out, inv.totals.subtotal);
        out.push(',');
        csv_field_decimal(&mut out, inv.totals.tax_amount);
        out.push(',');
        csv_field_decimal(&mut out, inv.totals.total);
        out.push(',');
        out.push_str(inv.status.label());
        out.push_str("\r\n");
    }
    out
}

/// Quote only when the value contains a separator, quote or line break.
fn csv_field_str(out: &mut String, value: &str) {
    if !value.contains([',', '"', '\r', '\n']) {
        out.push_str(value);
        return;
    }
    out.push('"');
    for ch in value.chars() {
        if ch == '"' {
            out.push_str("\"\"");
        } else {
            out.push(ch);
        }
    }
    out.push('"');
}

fn csv_field_decimal(out: &mut String, d: Decimal) {
    out.push_str(&format!("{:.2}", d.round_dp(2)));
}
