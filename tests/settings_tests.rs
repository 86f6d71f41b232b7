#![cfg(all(feature = "json", feature = "register"))]

use facturacion::core::*;
use facturacion::register::*;
use rust_decimal_macros::dec;

const CONFIG: &str = r#"{
    "company": { "name": "Ferretería Luna SL", "tax_id": "B87654321" },
    "default_series_prefix": "T",
    "require_customer": false,
    "auto_generate_invoice": true
}"#;

#[test]
fn register_follows_loaded_settings() {
    let settings = InvoicingSettings::from_json_str(CONFIG).unwrap();
    assert_eq!(settings.allocation_retries, 3);

    let register = InvoiceRegister::new(InMemorySeriesStore::new(), settings);
    register
        .create_series(SeriesBuilder::new("T", "Tickets").digits(5).build())
        .unwrap();
    assert_eq!(register.default_series().unwrap().prefix, "T");

    // No customer needed on a regular invoice.
    let draft = register
        .create_invoice(
            InvoiceBuilder::new("T")
                .add_line(InvoiceLineBuilder::new("Tornillos", dec!(100), dec!(0.05)).build()),
        )
        .unwrap();
    let issued = register.issue(draft.id).unwrap();
    assert_eq!(issued.number.as_deref(), Some("T-00001"));
}

#[test]
fn settings_survive_a_json_round_trip() {
    let settings = InvoicingSettings::from_json_str(CONFIG).unwrap();
    let json = settings.to_json_string().unwrap();
    assert_eq!(InvoicingSettings::from_json_str(&json).unwrap(), settings);
}

#[test]
fn invoices_serialize_with_string_amounts() {
    let invoice = InvoiceBuilder::new("T")
        .add_line(InvoiceLineBuilder::new("Tornillos", dec!(100), dec!(0.05)).build())
        .build()
        .unwrap();
    let value = serde_json::to_value(&invoice).unwrap();
    assert_eq!(value["status"], "draft");
    assert_eq!(value["number"], serde_json::Value::Null);
    assert_eq!(value["totals"]["total"], "6.05");
}
