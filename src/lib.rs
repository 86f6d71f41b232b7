//! # facturacion
//!
//! Invoicing library built around gapless, concurrency-safe numbering
//! series: invoice drafts, totals, the Draft/Issued/Paid/Cancelled
//! lifecycle, an in-memory invoice register and CSV export.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use facturacion::core::*;
//! use rust_decimal_macros::dec;
//!
//! let allocator = SeriesAllocator::new(InMemorySeriesStore::new());
//! allocator
//!     .store()
//!     .insert(SeriesBuilder::new("F", "Facturas").digits(6).build())
//!     .unwrap();
//!
//! let mut invoice = InvoiceBuilder::new("F")
//!     .customer(CustomerBuilder::new("Cliente SL").tax_id("B12345678").build())
//!     .add_line(InvoiceLineBuilder::new("Consultoría", dec!(10), dec!(50)).build())
//!     .build()
//!     .unwrap();
//!
//! let issued = invoice.issue(&allocator).unwrap();
//! assert_eq!(issued.number, "F-000001");
//! assert_eq!(invoice.totals.total, dec!(605.00));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Series allocator, invoice types, totals, validation, lifecycle |
//! | `register` (default) | In-memory invoice register: series management, queries, hooks, dashboard |
//! | `export` | CSV export of invoice listings |
//! | `json` | JSON loading of [`core::InvoicingSettings`] |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "register")]
pub mod register;

#[cfg(feature = "export")]
pub mod export;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
