//! Export of invoice listings.
//!
//! # Example
//!
//! ```
//! use facturacion::export;
//!
//! let csv = export::to_csv(&[]);
//! assert!(csv.starts_with("Number,Customer,Tax ID"));
//! ```

mod csv;

pub use csv::{CSV_HEADER, to_csv};
