use thiserror::Error;

use super::types::{InvoiceId, InvoiceStatus, InvoiceType};

/// Errors that can occur while configuring series, allocating numbers or
/// moving invoices through their lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvoicingError {
    /// No series is registered under this prefix.
    #[error("series '{0}' not found")]
    SeriesNotFound(String),

    /// The next number does not fit the series' configured digit width.
    /// Requires operator reconfiguration of the series.
    #[error("series '{prefix}' exhausted: {digits} digits cannot represent {next_number}")]
    SeriesExhausted {
        prefix: String,
        digits: u8,
        next_number: u64,
    },

    /// The counter changed underneath a commit. Safe to retry.
    #[error("concurrent update of series '{0}', retry the allocation")]
    ConcurrencyConflict(String),

    /// The series is disabled and cannot issue numbers.
    #[error("series '{0}' is inactive")]
    SeriesInactive(String),

    /// A series with this prefix already exists.
    #[error("series '{0}' already exists")]
    DuplicateSeries(String),

    /// The series still has invoices and cannot be removed.
    #[error("series '{prefix}' has {invoices} invoice(s) and cannot be deleted")]
    SeriesInUse { prefix: String, invoices: usize },

    /// The series is dedicated to a different invoice type.
    #[error("series '{prefix}' does not accept {invoice_type:?} invoices")]
    SeriesScopeMismatch {
        prefix: String,
        invoice_type: InvoiceType,
    },

    /// No invoice with this id.
    #[error("invoice {0} not found")]
    InvoiceNotFound(InvoiceId),

    /// The requested status change is not part of the lifecycle.
    #[error("invalid transition from {from:?} to {to:?}")]
    InvalidTransition {
        from: InvoiceStatus,
        to: InvoiceStatus,
    },

    /// One or more validation rules failed.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Settings could not be loaded or serialized.
    #[error("configuration error: {0}")]
    Config(String),

    /// A hook refused the operation.
    #[error("rejected: {0}")]
    Rejected(String),
}

impl InvoicingError {
    /// True for transient errors where repeating the same call is safe.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict(_))
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "lines[0].quantity").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Stable machine-readable code (e.g. "LINE-QTY").
    pub code: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(code) = &self.code {
            write!(f, "[{}] {}: {}", code, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a code.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: None,
        }
    }

    /// Create a validation error with a code.
    pub fn with_code(
        field: impl Into<String>,
        message: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            code: Some(code.into()),
        }
    }
}
