//! Tenant onboarding and staff management.
//!
//! # Invariants
//! - A company is always created together with its first owner.
//! - Only owners add stores and staff; staff never get `super_admin`.

use super::{ServiceError, ServiceResult};
use crate::access::{Actor, Permission};
use crate::model::org::{Company, CompanyId, Employee, EmployeeId, Plan, Role, Store, StoreId};
use crate::model::ValidationError;
use crate::repo::org_repo::OrgRepository;
use crate::repo::RepoError;
use log::info;

/// Result of onboarding a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Onboarded {
    pub company: Company,
    pub owner: Employee,
}

pub struct OrgService<R: OrgRepository> {
    repo: R,
}

impl<R: OrgRepository> OrgService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a company and its owner account. Super admin only.
    pub fn onboard_company(
        &self,
        actor: &Actor,
        company_name: &str,
        plan: Plan,
        owner_name: &str,
        owner_email: &str,
    ) -> ServiceResult<Onboarded> {
        actor.require_global(Permission::ManageCompanies)?;
        Ok(self.bootstrap_company(company_name, plan, owner_name, owner_email)?)
    }

    /// Unchecked onboarding used by first-run setup where no actor exists yet.
    pub fn bootstrap_company(
        &self,
        company_name: &str,
        plan: Plan,
        owner_name: &str,
        owner_email: &str,
    ) -> Result<Onboarded, RepoError> {
        let company = Company::new(company_name, plan);
        let owner = Employee::new(Some(company.id), owner_name, owner_email, Role::Owner);
        company.validate()?;
        owner.validate()?;
        if self.repo.find_employee_by_email(&owner.email)?.is_some() {
            return Err(RepoError::Conflict(
                "employee email is already registered".to_string(),
            ));
        }

        self.repo.create_company(&company)?;
        self.repo.create_employee(&owner)?;
        info!(
            "event=company_onboard module=org status=ok company_id={} plan={}",
            company.id,
            plan.as_str()
        );
        Ok(Onboarded { company, owner })
    }

    /// Creates a platform operator account. First-run setup only.
    pub fn bootstrap_super_admin(&self, name: &str, email: &str) -> Result<Employee, RepoError> {
        let admin = Employee::new(None, name, email, Role::SuperAdmin);
        admin.validate()?;
        self.repo.create_employee(&admin)?;
        info!("event=super_admin_create module=org status=ok");
        Ok(admin)
    }

    pub fn change_plan(
        &self,
        actor: &Actor,
        company_id: CompanyId,
        plan: Plan,
    ) -> ServiceResult<()> {
        actor.require_global(Permission::ManageCompanies)?;
        self.repo.set_company_plan(company_id, plan)?;
        info!(
            "event=plan_change module=org status=ok company_id={company_id} plan={}",
            plan.as_str()
        );
        Ok(())
    }

    pub fn add_store(
        &self,
        actor: &Actor,
        name: &str,
        address: Option<String>,
    ) -> ServiceResult<Store> {
        let company_id = actor.require(Permission::ManageStores)?;
        let store = Store::new(company_id, name, address);
        self.repo.create_store(&store)?;
        Ok(store)
    }

    pub fn list_stores(&self, actor: &Actor) -> ServiceResult<Vec<Store>> {
        let company_id = actor.require(Permission::Checkout)?;
        Ok(self.repo.list_stores(company_id)?)
    }

    pub fn add_staff(
        &self,
        actor: &Actor,
        name: &str,
        email: &str,
        role: Role,
        store_id: Option<StoreId>,
    ) -> ServiceResult<Employee> {
        let company_id = actor.require(Permission::ManageStaff)?;
        if role == Role::SuperAdmin {
            return Err(ServiceError::Repo(RepoError::Validation(
                ValidationError::Malformed {
                    field: "employee.role",
                    value: role.as_str().to_string(),
                },
            )));
        }
        if let Some(store_id) = store_id {
            if self.repo.get_store(company_id, store_id)?.is_none() {
                return Err(RepoError::not_found("store", store_id).into());
            }
        }
        let mut employee = Employee::new(Some(company_id), name, email, role);
        employee.store_id = store_id;
        self.repo.create_employee(&employee)?;
        info!(
            "event=staff_add module=org status=ok company_id={company_id} role={}",
            role.as_str()
        );
        Ok(employee)
    }

    pub fn list_staff(&self, actor: &Actor) -> ServiceResult<Vec<Employee>> {
        let company_id = actor.require(Permission::ManageStaff)?;
        Ok(self.repo.list_employees(company_id)?)
    }

    /// Owners cannot be deactivated; a company always keeps one.
    pub fn deactivate_staff(&self, actor: &Actor, id: EmployeeId) -> ServiceResult<()> {
        let company_id = actor.require(Permission::ManageStaff)?;
        let employee = self
            .repo
            .get_employee(company_id, id)?
            .ok_or_else(|| RepoError::not_found("employee", id))?;
        if employee.role == Role::Owner {
            let reason = "owner accounts cannot be deactivated".to_string();
            return Err(RepoError::Conflict(reason).into());
        }
        self.repo.deactivate_employee(company_id, id)?;
        info!("event=staff_deactivate module=org status=ok company_id={company_id}");
        Ok(())
    }

    /// Resolves an employee into an [`Actor`] for subsequent calls.
    pub fn actor_for_email(&self, email: &str) -> ServiceResult<Actor> {
        let employee = self
            .repo
            .find_employee_by_email(email)?
            .ok_or_else(|| RepoError::not_found("employee", email.trim()))?;
        Ok(Actor::from(&employee))
    }

    pub fn company(&self, actor: &Actor) -> ServiceResult<Company> {
        let company_id = actor.require(Permission::Checkout)?;
        self.repo
            .get_company(company_id)?
            .ok_or_else(|| RepoError::not_found("company", company_id).into())
    }

    pub fn list_companies(&self, actor: &Actor) -> ServiceResult<Vec<Company>> {
        actor.require_global(Permission::ManageCompanies)?;
        Ok(self.repo.list_companies()?)
    }
}
