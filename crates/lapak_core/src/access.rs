//! Role-based authorization checks for tenant-scoped use-cases.
//!
//! # Responsibility
//! - Map staff roles to the permissions each use-case requires.
//! - Resolve which tenant an actor may operate on.
//!
//! # Invariants
//! - Non-super-admin actors only ever reach their own `company_id`.
//! - Super admins may read any tenant but hold no write permission inside it.

use crate::model::org::{CompanyId, Employee, EmployeeId, Role};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Use-case level permission checked by services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ManageCompanies,
    ManageStaff,
    ManageStores,
    ManageCatalog,
    ManageCustomers,
    DeleteCustomers,
    ImportData,
    Checkout,
    ViewTransactions,
    ViewReports,
    UseAssistant,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManageCompanies => "manage_companies",
            Self::ManageStaff => "manage_staff",
            Self::ManageStores => "manage_stores",
            Self::ManageCatalog => "manage_catalog",
            Self::ManageCustomers => "manage_customers",
            Self::DeleteCustomers => "delete_customers",
            Self::ImportData => "import_data",
            Self::Checkout => "checkout",
            Self::ViewTransactions => "view_transactions",
            Self::ViewReports => "view_reports",
            Self::UseAssistant => "use_assistant",
        }
    }
}

/// Returns whether `role` grants `permission` inside a tenant.
pub fn role_allows(role: Role, permission: Permission) -> bool {
    use Permission::*;
    match role {
        Role::SuperAdmin => matches!(permission, ManageCompanies | ViewReports),
        Role::Owner => !matches!(permission, ManageCompanies),
        Role::Admin => matches!(
            permission,
            ManageCatalog
                | ManageCustomers
                | DeleteCustomers
                | ImportData
                | Checkout
                | ViewTransactions
                | ViewReports
                | UseAssistant
        ),
        Role::Kasir => matches!(permission, Checkout | ManageCustomers),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Actor role lacks the permission.
    Forbidden { role: Role, permission: Permission },
    /// Actor tried to reach a company other than its own.
    TenantMismatch {
        actor_company: Option<CompanyId>,
        requested: CompanyId,
    },
    /// Actor account has been deactivated.
    Inactive(EmployeeId),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forbidden { role, permission } => write!(
                f,
                "role {} is not allowed to {}",
                role.as_str(),
                permission.as_str()
            ),
            Self::TenantMismatch { requested, .. } => {
                write!(f, "actor does not belong to company {requested}")
            }
            Self::Inactive(id) => write!(f, "employee account is inactive: {id}"),
        }
    }
}

impl Error for AccessError {}

/// Authenticated staff member performing a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub employee_id: EmployeeId,
    pub company_id: Option<CompanyId>,
    pub role: Role,
    pub is_active: bool,
}

impl From<&Employee> for Actor {
    fn from(value: &Employee) -> Self {
        Self {
            employee_id: value.id,
            company_id: value.company_id,
            role: value.role,
            is_active: value.is_active,
        }
    }
}

impl Actor {
    /// Checks `permission` and returns the actor's own tenant.
    ///
    /// Super admins have no tenant of their own; use [`Actor::tenant_for`].
    pub fn require(&self, permission: Permission) -> Result<CompanyId, AccessError> {
        let company_id = self.company_id.ok_or(AccessError::Forbidden {
            role: self.role,
            permission,
        })?;
        self.tenant_for(company_id, permission)
    }

    /// Checks `permission` against an explicitly requested tenant.
    pub fn tenant_for(
        &self,
        company_id: CompanyId,
        permission: Permission,
    ) -> Result<CompanyId, AccessError> {
        if !self.is_active {
            return Err(AccessError::Inactive(self.employee_id));
        }
        if !role_allows(self.role, permission) {
            return Err(AccessError::Forbidden {
                role: self.role,
                permission,
            });
        }
        match self.company_id {
            None if self.role == Role::SuperAdmin => Ok(company_id),
            Some(own) if own == company_id => Ok(company_id),
            other => Err(AccessError::TenantMismatch {
                actor_company: other,
                requested: company_id,
            }),
        }
    }

    /// Checks a permission that is not tied to one tenant.
    pub fn require_global(&self, permission: Permission) -> Result<(), AccessError> {
        if !self.is_active {
            return Err(AccessError::Inactive(self.employee_id));
        }
        if !role_allows(self.role, permission) {
            return Err(AccessError::Forbidden {
                role: self.role,
                permission,
            });
        }
        Ok(())
    }
}
