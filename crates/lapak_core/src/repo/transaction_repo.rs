//! Sales transaction repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Record a sale atomically: price lookup, stock check, stock decrement,
//!   header and item inserts.
//! - Read sales back with their line items.
//!
//! # Invariants
//! - `record_sale` runs in one immediate transaction; any rejection leaves
//!   stock and sales untouched.
//! - Store, customer, cashier and products must all belong to the sale's
//!   company.
//! - Unit price and product name are captured at sale time.

use super::{normalize_list_limit, parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use crate::db::DbError;
use crate::model::customer::CustomerId;
use crate::model::org::{CompanyId, EmployeeId, StoreId};
use crate::model::product::ProductId;
use crate::model::transaction::{
    items_total, PaymentError, PaymentMethod, Transaction, TransactionId, TransactionItem,
};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, OptionalExtension, Row, Transaction as SqlTransaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// One requested cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Sale request resolved against current catalog prices inside the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSale {
    pub company_id: CompanyId,
    pub store_id: StoreId,
    pub customer_id: Option<CustomerId>,
    pub cashier_id: EmployeeId,
    pub payment_method: PaymentMethod,
    pub paid: i64,
    pub created_at: i64,
    pub lines: Vec<SaleLine>,
}

/// Reasons a sale is refused, plus storage failures.
#[derive(Debug)]
pub enum SaleError {
    StoreNotFound(StoreId),
    CustomerNotFound(CustomerId),
    CashierNotFound(EmployeeId),
    ProductNotFound(ProductId),
    ProductInactive(ProductId),
    InsufficientStock {
        product_id: ProductId,
        requested: i64,
        available: i64,
    },
    Payment(PaymentError),
    Repo(RepoError),
}

impl Display for SaleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreNotFound(id) => write!(f, "store not found: {id}"),
            Self::CustomerNotFound(id) => write!(f, "customer not found: {id}"),
            Self::CashierNotFound(id) => write!(f, "cashier not found: {id}"),
            Self::ProductNotFound(id) => write!(f, "product not found: {id}"),
            Self::ProductInactive(id) => write!(f, "product is inactive: {id}"),
            Self::InsufficientStock {
                product_id,
                requested,
                available,
            } => write!(
                f,
                "insufficient stock for {product_id}: requested {requested}, available {available}"
            ),
            Self::Payment(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SaleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Payment(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for SaleError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for SaleError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(RepoError::Db(DbError::Sqlite(value)))
    }
}

/// Query options for listing sales.
#[derive(Debug, Clone, Default)]
pub struct TransactionListQuery {
    /// Inclusive lower bound, epoch ms.
    pub from_ms: Option<i64>,
    /// Exclusive upper bound, epoch ms.
    pub until_ms: Option<i64>,
    pub store_id: Option<StoreId>,
    pub customer_id: Option<CustomerId>,
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for sales.
pub trait TransactionRepository {
    fn record_sale(&mut self, sale: &NewSale) -> Result<Transaction, SaleError>;
    fn get_transaction(
        &self,
        company_id: CompanyId,
        id: TransactionId,
    ) -> RepoResult<Option<Transaction>>;
    /// Newest first, ties broken by id.
    fn list_transactions(
        &self,
        company_id: CompanyId,
        query: &TransactionListQuery,
    ) -> RepoResult<Vec<Transaction>>;
}

/// SQLite-backed sales repository.
pub struct SqliteTransactionRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTransactionRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl TransactionRepository for SqliteTransactionRepository<'_> {
    fn record_sale(&mut self, sale: &NewSale) -> Result<Transaction, SaleError> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let company_text = sale.company_id.to_string();
        if !row_exists_in_tenant(&tx, "stores", &sale.store_id, &company_text)? {
            return Err(SaleError::StoreNotFound(sale.store_id));
        }
        if let Some(customer_id) = sale.customer_id {
            if !row_exists_in_tenant(&tx, "customers", &customer_id, &company_text)? {
                return Err(SaleError::CustomerNotFound(customer_id));
            }
        }
        if !row_exists_in_tenant(&tx, "employees", &sale.cashier_id, &company_text)? {
            return Err(SaleError::CashierNotFound(sale.cashier_id));
        }

        let mut items = Vec::with_capacity(sale.lines.len());
        for line in &sale.lines {
            let product = tx
                .query_row(
                    "SELECT name, price, stock, is_active
                     FROM products
                     WHERE id = ?1 AND company_id = ?2;",
                    params![line.product_id.to_string(), company_text.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                            row.get::<_, i64>(3)?,
                        ))
                    },
                )
                .optional()?;
            let Some((name, price, stock, is_active)) = product else {
                return Err(SaleError::ProductNotFound(line.product_id));
            };
            if is_active != 1 {
                return Err(SaleError::ProductInactive(line.product_id));
            }
            if stock < line.quantity {
                return Err(SaleError::InsufficientStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available: stock,
                });
            }

            tx.execute(
                "UPDATE products
                 SET
                    stock = stock - ?1,
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?2 AND company_id = ?3;",
                params![line.quantity, line.product_id.to_string(), company_text.as_str()],
            )?;
            items.push(TransactionItem::new(line.product_id, name, line.quantity, price));
        }

        let total = items_total(&items);
        let change = sale
            .payment_method
            .settle(total, sale.paid)
            .map_err(SaleError::Payment)?;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            company_id: sale.company_id,
            store_id: sale.store_id,
            customer_id: sale.customer_id,
            cashier_id: sale.cashier_id,
            payment_method: sale.payment_method,
            total,
            paid: sale.paid,
            change,
            created_at: sale.created_at,
            items,
        };
        insert_transaction(&tx, &transaction)?;
        tx.commit()?;

        Ok(transaction)
    }

    fn get_transaction(
        &self,
        company_id: CompanyId,
        id: TransactionId,
    ) -> RepoResult<Option<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                id,
                company_id,
                store_id,
                customer_id,
                cashier_id,
                payment_method,
                total,
                paid,
                change_due,
                created_at
             FROM transactions
             WHERE id = ?1 AND company_id = ?2;",
        )?;
        let mut rows = stmt.query(params![id.to_string(), company_id.to_string()])?;
        if let Some(row) = rows.next()? {
            let mut transaction = parse_transaction_row(row)?;
            transaction.items = load_items(self.conn, &transaction.id)?;
            return Ok(Some(transaction));
        }
        Ok(None)
    }

    fn list_transactions(
        &self,
        company_id: CompanyId,
        query: &TransactionListQuery,
    ) -> RepoResult<Vec<Transaction>> {
        let mut sql = String::from(
            "SELECT
                id,
                company_id,
                store_id,
                customer_id,
                cashier_id,
                payment_method,
                total,
                paid,
                change_due,
                created_at
             FROM transactions
             WHERE company_id = ?",
        );
        let mut bind_values: Vec<Value> = vec![Value::Text(company_id.to_string())];

        if let Some(from_ms) = query.from_ms {
            sql.push_str(" AND created_at >= ?");
            bind_values.push(Value::Integer(from_ms));
        }
        if let Some(until_ms) = query.until_ms {
            sql.push_str(" AND created_at < ?");
            bind_values.push(Value::Integer(until_ms));
        }
        if let Some(store_id) = query.store_id {
            sql.push_str(" AND store_id = ?");
            bind_values.push(Value::Text(store_id.to_string()));
        }
        if let Some(customer_id) = query.customer_id {
            sql.push_str(" AND customer_id = ?");
            bind_values.push(Value::Text(customer_id.to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id ASC LIMIT ?");
        bind_values.push(Value::Integer(i64::from(normalize_list_limit(query.limit))));
        if query.offset > 0 {
            sql.push_str(" OFFSET ?");
            bind_values.push(Value::Integer(i64::from(query.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut transactions = Vec::new();
        while let Some(row) = rows.next()? {
            transactions.push(parse_transaction_row(row)?);
        }
        for transaction in &mut transactions {
            transaction.items = load_items(self.conn, &transaction.id)?;
        }
        Ok(transactions)
    }
}

fn row_exists_in_tenant(
    tx: &SqlTransaction<'_>,
    table: &'static str,
    id: &Uuid,
    company_id: &str,
) -> RepoResult<bool> {
    let exists: i64 = tx.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE id = ?1 AND company_id = ?2);"),
        params![id.to_string(), company_id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn insert_transaction(tx: &SqlTransaction<'_>, transaction: &Transaction) -> RepoResult<()> {
    let id_text = transaction.id.to_string();
    tx.execute(
        "INSERT INTO transactions (
            id,
            company_id,
            store_id,
            customer_id,
            cashier_id,
            payment_method,
            total,
            paid,
            change_due,
            created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            id_text.as_str(),
            transaction.company_id.to_string(),
            transaction.store_id.to_string(),
            transaction.customer_id.map(|id| id.to_string()),
            transaction.cashier_id.to_string(),
            transaction.payment_method.as_str(),
            transaction.total,
            transaction.paid,
            transaction.change,
            transaction.created_at,
        ],
    )?;

    for (index, item) in transaction.items.iter().enumerate() {
        tx.execute(
            "INSERT INTO transaction_items (
                transaction_id,
                line_no,
                product_id,
                product_name,
                quantity,
                unit_price,
                line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                id_text.as_str(),
                (index + 1) as i64,
                item.product_id.to_string(),
                item.product_name.as_str(),
                item.quantity,
                item.unit_price,
                item.line_total,
            ],
        )?;
    }
    Ok(())
}

fn parse_transaction_row(row: &Row<'_>) -> RepoResult<Transaction> {
    let id: String = row.get("id")?;
    let company_id: String = row.get("company_id")?;
    let store_id: String = row.get("store_id")?;
    let cashier_id: String = row.get("cashier_id")?;
    let method_text: String = row.get("payment_method")?;
    let payment_method = PaymentMethod::parse(&method_text).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid payment method `{method_text}` in transactions.payment_method"
        ))
    })?;

    Ok(Transaction {
        id: parse_uuid(&id, "transactions.id")?,
        company_id: parse_uuid(&company_id, "transactions.company_id")?,
        store_id: parse_uuid(&store_id, "transactions.store_id")?,
        customer_id: parse_optional_uuid(row.get("customer_id")?, "transactions.customer_id")?,
        cashier_id: parse_uuid(&cashier_id, "transactions.cashier_id")?,
        payment_method,
        total: row.get("total")?,
        paid: row.get("paid")?,
        change: row.get("change_due")?,
        created_at: row.get("created_at")?,
        items: Vec::new(),
    })
}

fn load_items(
    conn: &Connection,
    transaction_id: &TransactionId,
) -> RepoResult<Vec<TransactionItem>> {
    let mut stmt = conn.prepare(
        "SELECT product_id, product_name, quantity, unit_price, line_total
         FROM transaction_items
         WHERE transaction_id = ?1
         ORDER BY line_no ASC;",
    )?;
    let mut rows = stmt.query([transaction_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let product_id: String = row.get("product_id")?;
        items.push(TransactionItem {
            product_id: parse_uuid(&product_id, "transaction_items.product_id")?,
            product_name: row.get("product_name")?,
            quantity: row.get("quantity")?,
            unit_price: row.get("unit_price")?,
            line_total: row.get("line_total")?,
        });
    }
    Ok(items)
}
