//! Customer (CRM) repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Every statement binds `company_id`.
//! - Phone numbers are unique per company and stored normalized.
//! - Customers referenced by a transaction cannot be deleted.

use super::product_repo::UpsertOutcome;
use super::{
    like_pattern, map_unique_violation, normalize_list_limit, parse_uuid, RepoError, RepoResult,
};
use crate::model::customer::{normalize_phone, Customer, CustomerId};
use crate::model::org::CompanyId;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const CUSTOMER_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    name,
    phone,
    email,
    address,
    created_at
FROM customers";

/// Query options for listing customers.
#[derive(Debug, Clone, Default)]
pub struct CustomerListQuery {
    /// Substring match on name, phone or email.
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for customer operations.
pub trait CustomerRepository {
    fn create_customer(&self, customer: &Customer) -> RepoResult<CustomerId>;
    fn update_customer(&self, customer: &Customer) -> RepoResult<()>;
    fn get_customer(&self, company_id: CompanyId, id: CustomerId)
        -> RepoResult<Option<Customer>>;
    fn get_customer_by_phone(
        &self,
        company_id: CompanyId,
        phone: &str,
    ) -> RepoResult<Option<Customer>>;
    fn list_customers(
        &self,
        company_id: CompanyId,
        query: &CustomerListQuery,
    ) -> RepoResult<Vec<Customer>>;
    fn count_customers(&self, company_id: CompanyId) -> RepoResult<u64>;
    /// Hard delete; refused with `Conflict` once the customer has sales.
    fn delete_customer(&self, company_id: CompanyId, id: CustomerId) -> RepoResult<()>;
    /// Inserts by phone or refreshes name/email/address of the existing row.
    fn upsert_customer_by_phone(&self, customer: &Customer) -> RepoResult<UpsertOutcome>;
}

/// SQLite-backed customer repository.
pub struct SqliteCustomerRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCustomerRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CustomerRepository for SqliteCustomerRepository<'_> {
    fn create_customer(&self, customer: &Customer) -> RepoResult<CustomerId> {
        customer.validate()?;

        self.conn
            .execute(
                "INSERT INTO customers (
                    id,
                    company_id,
                    name,
                    phone,
                    email,
                    address,
                    created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    customer.id.to_string(),
                    customer.company_id.to_string(),
                    customer.name.as_str(),
                    customer.phone.as_str(),
                    customer.email.as_deref(),
                    customer.address.as_deref(),
                    customer.created_at,
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || "customer phone is already registered".to_string())
            })?;

        Ok(customer.id)
    }

    fn update_customer(&self, customer: &Customer) -> RepoResult<()> {
        customer.validate()?;

        let changed = self
            .conn
            .execute(
                "UPDATE customers
                 SET
                    name = ?1,
                    phone = ?2,
                    email = ?3,
                    address = ?4,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?5 AND company_id = ?6;",
                params![
                    customer.name.as_str(),
                    customer.phone.as_str(),
                    customer.email.as_deref(),
                    customer.address.as_deref(),
                    customer.id.to_string(),
                    customer.company_id.to_string(),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || "customer phone is already registered".to_string())
            })?;

        if changed == 0 {
            return Err(RepoError::not_found("customer", customer.id));
        }
        Ok(())
    }

    fn get_customer(
        &self,
        company_id: CompanyId,
        id: CustomerId,
    ) -> RepoResult<Option<Customer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CUSTOMER_SELECT_SQL} WHERE id = ?1 AND company_id = ?2;"
        ))?;
        let mut rows = stmt.query(params![id.to_string(), company_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_customer_row(row)?));
        }
        Ok(None)
    }

    fn get_customer_by_phone(
        &self,
        company_id: CompanyId,
        phone: &str,
    ) -> RepoResult<Option<Customer>> {
        let mut stmt = self.conn.prepare(&format!(
            "{CUSTOMER_SELECT_SQL} WHERE company_id = ?1 AND phone = ?2;"
        ))?;
        let mut rows = stmt.query(params![company_id.to_string(), normalize_phone(phone)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_customer_row(row)?));
        }
        Ok(None)
    }

    fn list_customers(
        &self,
        company_id: CompanyId,
        query: &CustomerListQuery,
    ) -> RepoResult<Vec<Customer>> {
        let mut sql = format!("{CUSTOMER_SELECT_SQL} WHERE company_id = ?");
        let mut bind_values: Vec<Value> = vec![Value::Text(company_id.to_string())];

        if let Some(search) = query.search.as_deref() {
            if !search.trim().is_empty() {
                sql.push_str(
                    " AND (name LIKE ? ESCAPE '\\'
                      OR phone LIKE ? ESCAPE '\\'
                      OR email LIKE ? ESCAPE '\\')",
                );
                let pattern = like_pattern(search);
                for _ in 0..3 {
                    bind_values.push(Value::Text(pattern.clone()));
                }
            }
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut customers = Vec::new();
        while let Some(row) = rows.next()? {
            customers.push(parse_customer_row(row)?);
        }
        Ok(customers)
    }

    fn count_customers(&self, company_id: CompanyId) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM customers WHERE company_id = ?1;",
            [company_id.to_string()],
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative customer count {count}")))
    }

    fn delete_customer(&self, company_id: CompanyId, id: CustomerId) -> RepoResult<()> {
        let has_sales: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM transactions
                WHERE company_id = ?1 AND customer_id = ?2
            );",
            params![company_id.to_string(), id.to_string()],
            |row| row.get(0),
        )?;
        if has_sales == 1 {
            return Err(RepoError::Conflict(format!(
                "customer {id} has recorded transactions"
            )));
        }

        let changed = self.conn.execute(
            "DELETE FROM customers WHERE id = ?1 AND company_id = ?2;",
            params![id.to_string(), company_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("customer", id));
        }
        Ok(())
    }

    fn upsert_customer_by_phone(&self, customer: &Customer) -> RepoResult<UpsertOutcome> {
        customer.validate()?;

        let changed = self.conn.execute(
            "UPDATE customers
             SET
                name = ?1,
                email = COALESCE(?2, email),
                address = COALESCE(?3, address),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE company_id = ?4 AND phone = ?5;",
            params![
                customer.name.as_str(),
                customer.email.as_deref(),
                customer.address.as_deref(),
                customer.company_id.to_string(),
                customer.phone.as_str(),
            ],
        )?;
        if changed > 0 {
            return Ok(UpsertOutcome::Updated);
        }

        self.create_customer(customer)?;
        Ok(UpsertOutcome::Inserted)
    }
}

fn parse_customer_row(row: &Row<'_>) -> RepoResult<Customer> {
    let id: String = row.get("id")?;
    let company_id: String = row.get("company_id")?;
    Ok(Customer {
        id: parse_uuid(&id, "customers.id")?,
        company_id: parse_uuid(&company_id, "customers.company_id")?,
        name: row.get("name")?,
        phone: row.get("phone")?,
        email: row.get("email")?,
        address: row.get("address")?,
        created_at: row.get("created_at")?,
    })
}
