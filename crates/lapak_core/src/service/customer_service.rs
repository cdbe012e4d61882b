//! Customer (CRM) use-case service.
//!
//! Cashiers hold `ManageCustomers` so they can register a buyer at the till.

use super::{ServiceError, ServiceResult};
use crate::access::{Actor, Permission};
use crate::model::customer::{Customer, CustomerId};
use crate::repo::customer_repo::{CustomerListQuery, CustomerRepository};
use crate::repo::RepoError;
use log::info;

/// Input for registering or editing a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomerDraft {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub address: Option<String>,
}

pub struct CustomerService<R: CustomerRepository> {
    repo: R,
}

impl<R: CustomerRepository> CustomerService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn register(&self, actor: &Actor, draft: &CustomerDraft) -> ServiceResult<Customer> {
        let company_id = actor.require(Permission::ManageCustomers)?;
        let customer = Customer::new(company_id, draft.name.as_str(), draft.phone.as_str())
            .with_contact(draft.email.clone(), draft.address.clone());
        let id = self.repo.create_customer(&customer)?;
        info!("event=customer_register module=crm status=ok company_id={company_id}");
        self.repo
            .get_customer(company_id, id)?
            .ok_or(ServiceError::InconsistentState(
                "registered customer not found in read-back",
            ))
    }

    pub fn update(
        &self,
        actor: &Actor,
        id: CustomerId,
        draft: &CustomerDraft,
    ) -> ServiceResult<Customer> {
        let company_id = actor.require(Permission::ManageCustomers)?;
        let existing = self
            .repo
            .get_customer(company_id, id)?
            .ok_or_else(|| RepoError::not_found("customer", id))?;
        let mut customer = Customer::new(company_id, draft.name.as_str(), draft.phone.as_str())
            .with_contact(draft.email.clone(), draft.address.clone());
        customer.id = existing.id;
        customer.created_at = existing.created_at;
        self.repo.update_customer(&customer)?;
        info!("event=customer_update module=crm status=ok company_id={company_id}");
        Ok(customer)
    }

    pub fn get(&self, actor: &Actor, id: CustomerId) -> ServiceResult<Option<Customer>> {
        let company_id = actor.require(Permission::ManageCustomers)?;
        Ok(self.repo.get_customer(company_id, id)?)
    }

    /// Phone lookup used by the cashier screen before checkout.
    pub fn find_by_phone(&self, actor: &Actor, phone: &str) -> ServiceResult<Option<Customer>> {
        let company_id = actor.require(Permission::ManageCustomers)?;
        Ok(self.repo.get_customer_by_phone(company_id, phone)?)
    }

    pub fn list(&self, actor: &Actor, query: &CustomerListQuery) -> ServiceResult<Vec<Customer>> {
        let company_id = actor.require(Permission::ManageCustomers)?;
        Ok(self.repo.list_customers(company_id, query)?)
    }

    /// Cashiers register and edit customers but cannot delete them.
    pub fn delete(&self, actor: &Actor, id: CustomerId) -> ServiceResult<()> {
        let company_id = actor.require(Permission::DeleteCustomers)?;
        self.repo.delete_customer(company_id, id)?;
        info!("event=customer_delete module=crm status=ok company_id={company_id}");
        Ok(())
    }
}
