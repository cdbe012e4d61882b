//! Tenant organisation records: companies, stores and employees.

use super::{require_text, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub type CompanyId = Uuid;
pub type StoreId = Uuid;
pub type EmployeeId = Uuid;

/// Subscription plan; drives the assistant quota limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "pro" => Some(Self::Pro),
            _ => None,
        }
    }
}

/// Staff role. A super admin is the only role without a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform operator managing tenants.
    SuperAdmin,
    /// Company owner with full control of the tenant.
    Owner,
    /// Back-office staff managing catalog and customers.
    Admin,
    /// Cashier working the point-of-sale screen.
    Kasir,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Kasir => "kasir",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "super_admin" | "superadmin" => Some(Self::SuperAdmin),
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "kasir" | "cashier" => Some(Self::Kasir),
            _ => None,
        }
    }
}

/// Tenant root. Every other tenant-owned row points here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub plan: Plan,
    pub created_at: i64,
}

impl Company {
    pub fn new(name: impl Into<String>, plan: Plan) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            plan,
            created_at: super::now_epoch_ms(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("company.name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: StoreId,
    pub company_id: CompanyId,
    pub name: String,
    pub address: Option<String>,
}

impl Store {
    pub fn new(company_id: CompanyId, name: impl Into<String>, address: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            name: name.into().trim().to_string(),
            address: super::non_blank(address),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("store.name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    /// `None` only for [`Role::SuperAdmin`].
    pub company_id: Option<CompanyId>,
    pub store_id: Option<StoreId>,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
}

impl Employee {
    pub fn new(
        company_id: Option<CompanyId>,
        name: impl Into<String>,
        email: impl Into<String>,
        role: Role,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            company_id,
            store_id: None,
            name: name.into().trim().to_string(),
            email: email.into().trim().to_ascii_lowercase(),
            role,
            is_active: true,
        }
    }

    /// # Invariants
    /// - Super admins have no company; every other role has one.
    /// - Email contains exactly one `@` with text on both sides.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("employee.name", &self.name)?;
        require_text("employee.email", &self.email)?;
        if !looks_like_email(&self.email) {
            return Err(ValidationError::Malformed {
                field: "employee.email",
                value: self.email.clone(),
            });
        }
        if (self.role == Role::SuperAdmin) != self.company_id.is_none() {
            return Err(ValidationError::Malformed {
                field: "employee.company_id",
                value: format!("{:?} for role {}", self.company_id, self.role.as_str()),
            });
        }
        Ok(())
    }
}

pub(crate) fn looks_like_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

#[cfg(test)]
mod tests {
    use super::{looks_like_email, Employee, Plan, Role};
    use uuid::Uuid;

    #[test]
    fn role_parse_accepts_aliases() {
        assert_eq!(Role::parse("Cashier"), Some(Role::Kasir));
        assert_eq!(Role::parse("superadmin"), Some(Role::SuperAdmin));
        assert_eq!(Role::parse("manager"), None);
        assert_eq!(Plan::parse(" PRO "), Some(Plan::Pro));
    }

    #[test]
    fn super_admin_must_not_belong_to_company() {
        let admin = Employee::new(Some(Uuid::new_v4()), "Ops", "ops@lapak.id", Role::SuperAdmin);
        assert!(admin.validate().is_err());

        let owner = Employee::new(None, "Sari", "sari@toko.id", Role::Owner);
        assert!(owner.validate().is_err());

        let root = Employee::new(None, "Ops", "OPS@lapak.id", Role::SuperAdmin);
        assert_eq!(root.email, "ops@lapak.id");
        root.validate().unwrap();
    }

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("kasir toko@b.co"));
    }
}
