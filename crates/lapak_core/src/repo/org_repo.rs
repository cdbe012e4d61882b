//! Company, store and employee persistence.
//!
//! # Invariants
//! - Stores and employees are always read through their `company_id`.
//! - Employee emails are unique across the platform.

use super::{
    bool_to_int, map_unique_violation, parse_flag, parse_optional_uuid, parse_uuid, RepoError,
    RepoResult,
};
use crate::model::org::{Company, CompanyId, Employee, EmployeeId, Plan, Role, Store, StoreId};
use rusqlite::{params, Connection, Row};

const EMPLOYEE_SELECT_SQL: &str = "SELECT
    id,
    company_id,
    store_id,
    name,
    email,
    role,
    is_active
FROM employees";

/// Repository interface for tenant organisation records.
pub trait OrgRepository {
    fn create_company(&self, company: &Company) -> RepoResult<CompanyId>;
    fn get_company(&self, id: CompanyId) -> RepoResult<Option<Company>>;
    fn list_companies(&self) -> RepoResult<Vec<Company>>;
    fn set_company_plan(&self, id: CompanyId, plan: Plan) -> RepoResult<()>;
    fn create_store(&self, store: &Store) -> RepoResult<StoreId>;
    fn get_store(&self, company_id: CompanyId, id: StoreId) -> RepoResult<Option<Store>>;
    fn list_stores(&self, company_id: CompanyId) -> RepoResult<Vec<Store>>;
    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId>;
    fn get_employee(&self, company_id: CompanyId, id: EmployeeId) -> RepoResult<Option<Employee>>;
    fn find_employee_by_email(&self, email: &str) -> RepoResult<Option<Employee>>;
    fn list_employees(&self, company_id: CompanyId) -> RepoResult<Vec<Employee>>;
    fn deactivate_employee(&self, company_id: CompanyId, id: EmployeeId) -> RepoResult<()>;
}

/// SQLite-backed organisation repository.
pub struct SqliteOrgRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteOrgRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl OrgRepository for SqliteOrgRepository<'_> {
    fn create_company(&self, company: &Company) -> RepoResult<CompanyId> {
        company.validate()?;
        self.conn.execute(
            "INSERT INTO companies (id, name, plan, created_at) VALUES (?1, ?2, ?3, ?4);",
            params![
                company.id.to_string(),
                company.name.as_str(),
                company.plan.as_str(),
                company.created_at,
            ],
        )?;
        Ok(company.id)
    }

    fn get_company(&self, id: CompanyId) -> RepoResult<Option<Company>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, plan, created_at FROM companies WHERE id = ?1;")?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(CompanyRow::read(row)?.into_company()?));
        }
        Ok(None)
    }

    fn list_companies(&self) -> RepoResult<Vec<Company>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, plan, created_at
             FROM companies
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut companies = Vec::new();
        while let Some(row) = rows.next()? {
            companies.push(CompanyRow::read(row)?.into_company()?);
        }
        Ok(companies)
    }

    fn set_company_plan(&self, id: CompanyId, plan: Plan) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE companies SET plan = ?1 WHERE id = ?2;",
            params![plan.as_str(), id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("company", id));
        }
        Ok(())
    }

    fn create_store(&self, store: &Store) -> RepoResult<StoreId> {
        store.validate()?;
        self.conn.execute(
            "INSERT INTO stores (id, company_id, name, address) VALUES (?1, ?2, ?3, ?4);",
            params![
                store.id.to_string(),
                store.company_id.to_string(),
                store.name.as_str(),
                store.address.as_deref(),
            ],
        )?;
        Ok(store.id)
    }

    fn get_store(&self, company_id: CompanyId, id: StoreId) -> RepoResult<Option<Store>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, name, address
             FROM stores
             WHERE id = ?1 AND company_id = ?2;",
        )?;
        let mut rows = stmt.query(params![id.to_string(), company_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_store_row(row)?));
        }
        Ok(None)
    }

    fn list_stores(&self, company_id: CompanyId) -> RepoResult<Vec<Store>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, company_id, name, address
             FROM stores
             WHERE company_id = ?1
             ORDER BY name COLLATE NOCASE ASC, id ASC;",
        )?;
        let mut rows = stmt.query([company_id.to_string()])?;
        let mut stores = Vec::new();
        while let Some(row) = rows.next()? {
            stores.push(parse_store_row(row)?);
        }
        Ok(stores)
    }

    fn create_employee(&self, employee: &Employee) -> RepoResult<EmployeeId> {
        employee.validate()?;
        self.conn
            .execute(
                "INSERT INTO employees (
                    id,
                    company_id,
                    store_id,
                    name,
                    email,
                    role,
                    is_active
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    employee.id.to_string(),
                    employee.company_id.map(|id| id.to_string()),
                    employee.store_id.map(|id| id.to_string()),
                    employee.name.as_str(),
                    employee.email.as_str(),
                    employee.role.as_str(),
                    bool_to_int(employee.is_active),
                ],
            )
            .map_err(|err| {
                map_unique_violation(err, || {
                    "employee email is already registered".to_string()
                })
            })?;
        Ok(employee.id)
    }

    fn get_employee(
        &self,
        company_id: CompanyId,
        id: EmployeeId,
    ) -> RepoResult<Option<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL} WHERE id = ?1 AND company_id = ?2;"
        ))?;
        let mut rows = stmt.query([id.to_string(), company_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_employee_row(row)?));
        }
        Ok(None)
    }

    fn find_employee_by_email(&self, email: &str) -> RepoResult<Option<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL} WHERE email = ?1 COLLATE NOCASE;"
        ))?;
        let mut rows = stmt.query([email.trim()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_employee_row(row)?));
        }
        Ok(None)
    }

    fn list_employees(&self, company_id: CompanyId) -> RepoResult<Vec<Employee>> {
        let mut stmt = self.conn.prepare(&format!(
            "{EMPLOYEE_SELECT_SQL}
             WHERE company_id = ?1
             ORDER BY name COLLATE NOCASE ASC, id ASC;"
        ))?;
        let mut rows = stmt.query([company_id.to_string()])?;
        let mut employees = Vec::new();
        while let Some(row) = rows.next()? {
            employees.push(parse_employee_row(row)?);
        }
        Ok(employees)
    }

    fn deactivate_employee(&self, company_id: CompanyId, id: EmployeeId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE employees SET is_active = 0 WHERE id = ?1 AND company_id = ?2;",
            params![id.to_string(), company_id.to_string()],
        )?;
        if changed == 0 {
            return Err(RepoError::not_found("employee", id));
        }
        Ok(())
    }
}

struct CompanyRow {
    id: String,
    name: String,
    plan: String,
    created_at: i64,
}

impl CompanyRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            plan: row.get("plan")?,
            created_at: row.get("created_at")?,
        })
    }

    fn into_company(self) -> RepoResult<Company> {
        let plan = Plan::parse(&self.plan).ok_or_else(|| {
            RepoError::InvalidData(format!("invalid plan `{}` in companies.plan", self.plan))
        })?;
        Ok(Company {
            id: parse_uuid(&self.id, "companies.id")?,
            name: self.name,
            plan,
            created_at: self.created_at,
        })
    }
}

fn parse_store_row(row: &Row<'_>) -> RepoResult<Store> {
    let id: String = row.get("id")?;
    let company_id: String = row.get("company_id")?;
    Ok(Store {
        id: parse_uuid(&id, "stores.id")?,
        company_id: parse_uuid(&company_id, "stores.company_id")?,
        name: row.get("name")?,
        address: row.get("address")?,
    })
}

fn parse_employee_row(row: &Row<'_>) -> RepoResult<Employee> {
    let id: String = row.get("id")?;
    let role_text: String = row.get("role")?;
    let role = Role::parse(&role_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid role `{role_text}` in employees.role"))
    })?;
    Ok(Employee {
        id: parse_uuid(&id, "employees.id")?,
        company_id: parse_optional_uuid(row.get("company_id")?, "employees.company_id")?,
        store_id: parse_optional_uuid(row.get("store_id")?, "employees.store_id")?,
        name: row.get("name")?,
        email: row.get("email")?,
        role,
        is_active: parse_flag(row.get("is_active")?, "employees.is_active")?,
    })
}
