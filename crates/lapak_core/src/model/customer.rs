//! CRM customer model.
//!
//! # Invariants
//! - `phone` is unique within one company and stored normalized.
//! - A customer with recorded sales is never hard-deleted.

use super::org::CompanyId;
use super::{non_blank, require_text, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type CustomerId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub company_id: CompanyId,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: i64,
}

impl Customer {
    pub fn new(company_id: CompanyId, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into().trim().to_string(),
            phone: normalize_phone(&phone.into()),
            email: None,
            address: None,
            created_at: super::now_epoch_ms(),
        }
    }

    pub fn with_contact(mut self, email: Option<String>, address: Option<String>) -> Self {
        self.email = non_blank(email).map(|value| value.to_ascii_lowercase());
        self.address = non_blank(address);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("customer.name", &self.name)?;
        require_text("customer.phone", &self.phone)?;
        let digits = self.phone.trim_start_matches('+');
        if digits.len() < 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(ValidationError::Malformed {
                field: "customer.phone",
                value: self.phone.clone(),
            });
        }
        if let Some(email) = self.email.as_deref() {
            if !super::org::looks_like_email(email) {
                return Err(ValidationError::Malformed {
                    field: "customer.email",
                    value: email.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Keeps digits and an optional leading `+`; drops spaces, dashes and dots.
///
/// Non-digit characters other than separators are kept so validation can
/// reject them instead of silently producing a different number.
pub fn normalize_phone(value: &str) -> String {
    let trimmed = value.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    for (index, ch) in trimmed.chars().enumerate() {
        match ch {
            '+' if index == 0 => normalized.push(ch),
            ' ' | '-' | '.' | '(' | ')' => {}
            other => normalized.push(other),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::{normalize_phone, Customer};
    use uuid::Uuid;

    #[test]
    fn phone_separators_are_stripped() {
        assert_eq!(normalize_phone(" +62 812-3456.789 "), "+628123456789");
        assert_eq!(normalize_phone("(021) 555 0101"), "0215550101");
    }

    #[test]
    fn validate_rejects_letters_in_phone_and_bad_email() {
        let company = Uuid::new_v4();
        let customer = Customer::new(company, "Budi", "0812abc999");
        assert!(customer.validate().is_err());

        let customer = Customer::new(company, "Budi", "081299990000")
            .with_contact(Some("budi-at-mail".to_string()), None);
        assert!(customer.validate().is_err());

        let customer = Customer::new(company, "Budi", "081299990000")
            .with_contact(Some(" Budi@Mail.com ".to_string()), Some(" ".to_string()));
        assert_eq!(customer.email.as_deref(), Some("budi@mail.com"));
        assert_eq!(customer.address, None);
        customer.validate().unwrap();
    }
}
