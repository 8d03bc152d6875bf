use serde::{Deserialize, Serialize};

use invoicely_core::DomainResult;

use crate::validation::{self, MAX_ADDRESS_LEN, MAX_NAME_LEN};

/// The billed party on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub name: String,
    pub address: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Client {
    /// Trimmed copy; a blank phone becomes `None`.
    pub fn normalized(self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            address: self.address.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: validation::normalize_optional(self.phone),
        }
    }

    /// Field paths are relative (`email`); callers nest them under `client`.
    pub fn validate(&self) -> DomainResult<()> {
        validation::require_text("name", &self.name, MAX_NAME_LEN)?;
        validation::require_text("address", &self.address, MAX_ADDRESS_LEN)?;
        validation::validate_email("email", &self.email)?;
        if let Some(phone) = &self.phone {
            validation::validate_phone("phone", phone)?;
        }
        Ok(())
    }
}
