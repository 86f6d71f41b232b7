//! Core invoice types, numbering series and the series allocator.
//!
//! This module provides the series allocator with its storage seam, the
//! invoice model with totals and validation, and the invoice lifecycle.

mod allocator;
mod builder;
mod error;
mod lifecycle;
mod numbering;
mod settings;
mod store;
mod types;
mod validation;

pub use allocator::*;
pub use builder::*;
pub use error::*;
pub use numbering::*;
pub use settings::*;
pub use store::*;
pub use types::*;
pub use validation::*;
