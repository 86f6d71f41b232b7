use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{Customer, InvoiceBuilder, InvoiceLine, InvoiceLineBuilder, InvoiceType};

/// Completed sale as handed over by the sales module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleSnapshot {
    /// Sale reference, copied onto the invoice.
    pub reference: String,
    /// Without a customer the invoice becomes a simplified one.
    pub customer: Option<Customer>,
    pub lines: Vec<SaleLine>,
    pub employee: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleLine {
    pub product_name: String,
    pub product_sku: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub discount_percent: Decimal,
    pub tax_rate: Decimal,
}

impl From<&SaleLine> for InvoiceLine {
    fn from(line: &SaleLine) -> Self {
        let mut builder =
            InvoiceLineBuilder::new(line.product_name.clone(), line.quantity, line.unit_price)
                .tax_rate(line.tax_rate)
                .discount_percent(line.discount_percent);
        if let Some(sku) = &line.product_sku {
            builder = builder.sku(sku.clone());
        }
        builder.build()
    }
}

impl SaleSnapshot {
    /// Draft builder for this sale in `series`.
    pub(crate) fn to_builder(&self, series: &str) -> InvoiceBuilder {
        let mut builder = InvoiceBuilder::new(series).sale_reference(self.reference.clone());
        builder = match &self.customer {
            Some(customer) => builder.customer(customer.clone()),
            None => builder.invoice_type(InvoiceType::Simplified),
        };
        if let Some(employee) = &self.employee {
            builder = builder.employee(employee.clone());
        }
        self.lines
            .iter()
            .fold(builder, |b, line| b.add_line(InvoiceLine::from(line)))
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::core::{CustomerBuilder, InvoiceStatus};

    fn line() -> SaleLine {
        SaleLine {
            product_name: "Cafe".into(),
            product_sku: Some("CAF-01".into()),
            quantity: dec!(2),
            unit_price: dec!(1.50),
            discount_percent: Decimal::ZERO,
            tax_rate: dec!(10),
        }
    }

    #[test]
    fn anonymous_sale_is_simplified() {
        let sale = SaleSnapshot {
            reference: "S-1".into(),
            customer: None,
            lines: vec![line()],
            employee: Some("ana".into()),
        };
        let inv = sale.to_builder("T").build().unwrap();
        assert_eq!(inv.invoice_type, InvoiceType::Simplified);
        assert_eq!(inv.status, InvoiceStatus::Draft);
        assert_eq!(inv.sale_reference.as_deref(), Some("S-1"));
        assert_eq!(inv.employee.as_deref(), Some("ana"));
        assert_eq!(inv.lines[0].product_sku.as_deref(), Some("CAF-01"));
        assert_eq!(inv.totals.total, dec!(3.30));
    }

    #[test]
    fn sale_with_customer_is_full_invoice() {
        let sale = SaleSnapshot {
            reference: "S-2".into(),
            customer: Some(CustomerBuilder::new("Bar Pepe").tax_id("B12345678").build()),
            lines: vec![line(), line()],
            employee: None,
        };
        let inv = sale.to_builder("F").build().unwrap();
        assert_eq!(inv.invoice_type, InvoiceType::Invoice);
        assert_eq!(inv.customer_tax_id(), "B12345678");
        assert_eq!(inv.lines.len(), 2);
        assert_eq!(inv.lines[1].position, 1);
    }
}
