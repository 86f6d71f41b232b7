//! Per-installation invoicing configuration.

use serde::{Deserialize, Serialize};

#[cfg(feature = "json")]
use super::error::InvoicingError;

/// Company data printed on invoices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyInfo {
    pub name: String,
    /// Tax ID (NIF/CIF).
    pub tax_id: String,
    pub address: String,
    pub phone: String,
    pub email: String,
}

/// Invoicing settings. Missing fields take their defaults when deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoicingSettings {
    pub company: CompanyInfo,
    /// Series used for invoices generated without an explicit series.
    pub default_series_prefix: String,
    /// Issue invoices for completed sales immediately.
    pub auto_generate_invoice: bool,
    /// Require a customer name on non-simplified invoices.
    pub require_customer: bool,
    /// Text shown at the bottom of invoices.
    pub invoice_footer: String,
    /// How often the allocator retries a conflicting counter commit.
    pub allocation_retries: u32,
}

impl Default for InvoicingSettings {
    fn default() -> Self {
        Self {
            company: CompanyInfo::default(),
            default_series_prefix: "F".into(),
            auto_generate_invoice: false,
            require_customer: true,
            invoice_footer: String::new(),
            allocation_retries: 3,
        }
    }
}

impl InvoicingSettings {
    /// Restore every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Load settings from JSON; absent keys keep their defaults.
    #[cfg(feature = "json")]
    pub fn from_json_str(json: &str) -> Result<Self, InvoicingError> {
        serde_json::from_str(json).map_err(|e| InvoicingError::Config(e.to_string()))
    }

    #[cfg(feature = "json")]
    pub fn to_json_string(&self) -> Result<String, InvoicingError> {
        serde_json::to_string_pretty(self).map_err(|e| InvoicingError::Config(e.to_string()))
    }
}
