//! Bulk CSV import of products and customers.
//!
//! # Responsibility
//! - Map spreadsheet columns onto catalog and CRM records.
//! - Upsert every valid row of one file inside a single storage transaction.
//!
//! # Invariants
//! - Products are matched by normalized sku, customers by normalized phone,
//!   always inside the importing actor's company.
//! - Invalid rows are skipped and reported by line; they never abort the file.
//! - A storage failure rolls back every row of the file.
//! - Log lines carry counts only, never cell values.

pub mod csv;

use crate::access::{AccessError, Actor, Permission};
use crate::model::customer::Customer;
use crate::model::org::CompanyId;
use crate::model::product::Product;
use crate::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use crate::repo::product_repo::{ProductRepository, SqliteProductRepository, UpsertOutcome};
use crate::repo::{RepoError, RepoResult};
use log::{info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

pub use self::csv::{parse_csv, CsvError, CsvRecord};

const PRODUCT_COLUMNS: &[&str] = &["sku", "name", "price", "stock"];
const CUSTOMER_COLUMNS: &[&str] = &["name", "phone"];

/// Import knobs chosen by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Validate and count rows, then roll back instead of committing.
    pub dry_run: bool,
}

/// One skipped row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: Vec<RowError>,
    pub dry_run: bool,
}

impl ImportReport {
    pub fn processed(&self) -> u64 {
        self.inserted + self.updated + self.skipped.len() as u64
    }

    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    fn skip(&mut self, line: usize, message: impl Into<String>) {
        self.skipped.push(RowError {
            line,
            message: message.into(),
        });
    }
}

#[derive(Debug)]
pub enum ImportError {
    Access(AccessError),
    Csv(CsvError),
    /// File has no header row.
    EmptyFile,
    /// Required header columns are absent.
    MissingColumns(Vec<String>),
    Repo(RepoError),
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access(err) => write!(f, "{err}"),
            Self::Csv(err) => write!(f, "{err}"),
            Self::EmptyFile => write!(f, "csv file has no header row"),
            Self::MissingColumns(columns) => {
                write!(f, "missing required columns: {}", columns.join(", "))
            }
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Access(err) => Some(err),
            Self::Csv(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::EmptyFile | Self::MissingColumns(_) => None,
        }
    }
}

impl From<AccessError> for ImportError {
    fn from(value: AccessError) -> Self {
        Self::Access(value)
    }
}

impl From<CsvError> for ImportError {
    fn from(value: CsvError) -> Self {
        Self::Csv(value)
    }
}

impl From<RepoError> for ImportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for ImportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Header name to column index, case-insensitive.
#[derive(Debug, Clone)]
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    /// Builds the map and checks that every `required` column is present.
    pub fn new(header: &CsvRecord, required: &[&str]) -> Result<Self, ImportError> {
        let mut columns = HashMap::new();
        for (index, name) in header.fields.iter().enumerate() {
            let key = normalize_header(name);
            if !key.is_empty() {
                columns.entry(key).or_insert(index);
            }
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|name| !columns.contains_key(**name))
            .map(|name| (*name).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ImportError::MissingColumns(missing));
        }
        Ok(Self { columns })
    }

    /// Trimmed cell value; `None` when the column or cell is empty.
    pub fn get<'r>(&self, record: &'r CsvRecord, name: &str) -> Option<&'r str> {
        let index = *self.columns.get(name)?;
        record
            .fields
            .get(index)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    fn require<'r>(&self, record: &'r CsvRecord, name: &str) -> Result<&'r str, String> {
        self.get(record, name)
            .ok_or_else(|| format!("missing value for `{name}`"))
    }
}

fn normalize_header(name: &str) -> String {
    name.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

/// Parses a money or quantity cell such as `15000`, `Rp 15.000` or `1,250,000`.
///
/// `.` and `,` are accepted only as thousands separators; every group after
/// the first must have exactly three digits, so decimal fractions are rejected.
pub fn parse_amount(cell: &str) -> Result<i64, String> {
    let mut text = cell.trim();
    for prefix in ["Rp", "rp", "RP", "IDR"] {
        if let Some(rest) = text.strip_prefix(prefix) {
            text = rest.trim_start().trim_start_matches('.').trim_start();
            break;
        }
    }
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };

    let groups: Vec<&str> = digits.split(['.', ',']).collect();
    let well_formed = !groups[0].is_empty()
        && groups.iter().all(|g| g.chars().all(|c| c.is_ascii_digit()))
        && groups[1..].iter().all(|g| g.len() == 3);
    if !well_formed {
        return Err(format!("`{}` is not a whole amount", cell.trim()));
    }

    let value: i64 = groups
        .concat()
        .parse()
        .map_err(|_| format!("`{}` is out of range", cell.trim()))?;
    Ok(if negative { -value } else { value })
}

fn read_table(input: &str, required: &[&str]) -> Result<(HeaderMap, Vec<CsvRecord>), ImportError> {
    let mut records = parse_csv(input)?.into_iter();
    let header = records.next().ok_or(ImportError::EmptyFile)?;
    let columns = HeaderMap::new(&header, required)?;
    Ok((columns, records.collect()))
}

/// Imports products from CSV text into the actor's company.
///
/// Required columns: `sku`, `name`, `price`, `stock`; optional `category`.
pub fn import_products(
    conn: &mut Connection,
    actor: &Actor,
    input: &str,
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let company_id = actor.require(Permission::ImportData)?;
    let started_at = Instant::now();
    let (columns, rows) = read_table(input, PRODUCT_COLUMNS)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut report = ImportReport {
        dry_run: options.dry_run,
        ..ImportReport::default()
    };
    {
        let repo = SqliteProductRepository::new(&tx);
        let mut seen: HashMap<String, usize> = HashMap::new();
        for row in &rows {
            let product = match product_from_row(company_id, &columns, row) {
                Ok(product) => product,
                Err(message) => {
                    report.skip(row.line, message);
                    continue;
                }
            };
            if let Some(first) = seen.get(&product.sku) {
                report.skip(
                    row.line,
                    format!("duplicate sku {} (first seen on line {first})", product.sku),
                );
                continue;
            }
            match upsert_row(|| repo.upsert_product_by_sku(&product))? {
                Ok(outcome) => {
                    seen.insert(product.sku.clone(), row.line);
                    report.record(outcome);
                }
                Err(message) => report.skip(row.line, message),
            }
        }
    }
    finish(tx, "import_products", company_id, &report, started_at)?;
    Ok(report)
}

/// Imports customers from CSV text into the actor's company.
///
/// Required columns: `name`, `phone`; optional `email`, `address`. Empty
/// optional cells keep the stored value of an existing customer.
pub fn import_customers(
    conn: &mut Connection,
    actor: &Actor,
    input: &str,
    options: ImportOptions,
) -> Result<ImportReport, ImportError> {
    let company_id = actor.require(Permission::ImportData)?;
    let started_at = Instant::now();
    let (columns, rows) = read_table(input, CUSTOMER_COLUMNS)?;

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut report = ImportReport {
        dry_run: options.dry_run,
        ..ImportReport::default()
    };
    {
        let repo = SqliteCustomerRepository::new(&tx);
        let mut seen: HashMap<String, usize> = HashMap::new();
        for row in &rows {
            let customer = match customer_from_row(company_id, &columns, row) {
                Ok(customer) => customer,
                Err(message) => {
                    report.skip(row.line, message);
                    continue;
                }
            };
            if let Some(first) = seen.get(&customer.phone) {
                report.skip(
                    row.line,
                    format!("duplicate phone (first seen on line {first})"),
                );
                continue;
            }
            match upsert_row(|| repo.upsert_customer_by_phone(&customer))? {
                Ok(outcome) => {
                    seen.insert(customer.phone.clone(), row.line);
                    report.record(outcome);
                }
                Err(message) => report.skip(row.line, message),
            }
        }
    }
    finish(tx, "import_customers", company_id, &report, started_at)?;
    Ok(report)
}

fn product_from_row(
    company_id: CompanyId,
    columns: &HeaderMap,
    row: &CsvRecord,
) -> Result<Product, String> {
    let sku = columns.require(row, "sku")?;
    let name = columns.require(row, "name")?;
    let price =
        parse_amount(columns.require(row, "price")?).map_err(|err| format!("price {err}"))?;
    let stock =
        parse_amount(columns.require(row, "stock")?).map_err(|err| format!("stock {err}"))?;

    let mut product = Product::new(company_id, sku, name, price, stock);
    if let Some(category) = columns.get(row, "category") {
        product = product.with_category(category);
    }
    product.validate().map_err(|err| err.to_string())?;
    Ok(product)
}

fn customer_from_row(
    company_id: CompanyId,
    columns: &HeaderMap,
    row: &CsvRecord,
) -> Result<Customer, String> {
    let name = columns.require(row, "name")?;
    let phone = columns.require(row, "phone")?;
    let customer = Customer::new(company_id, name, phone).with_contact(
        columns.get(row, "email").map(str::to_string),
        columns.get(row, "address").map(str::to_string),
    );
    customer.validate().map_err(|err| err.to_string())?;
    Ok(customer)
}

/// Splits row-level failures (skip the row) from storage failures (abort).
fn upsert_row(
    upsert: impl FnOnce() -> RepoResult<UpsertOutcome>,
) -> Result<Result<UpsertOutcome, String>, ImportError> {
    match upsert() {
        Ok(outcome) => Ok(Ok(outcome)),
        Err(RepoError::Validation(err)) => Ok(Err(err.to_string())),
        Err(RepoError::Conflict(message)) => Ok(Err(message)),
        Err(err) => Err(err.into()),
    }
}

fn finish(
    tx: rusqlite::Transaction<'_>,
    event: &str,
    company_id: CompanyId,
    report: &ImportReport,
    started_at: Instant,
) -> Result<(), ImportError> {
    if report.dry_run {
        tx.rollback()?;
    } else {
        tx.commit()?;
    }

    let status = if report.skipped.is_empty() { "ok" } else { "partial" };
    let message = format!(
        "event={event} module=import status={status} company_id={company_id} inserted={} updated={} skipped={} dry_run={} duration_ms={}",
        report.inserted,
        report.updated,
        report.skipped.len(),
        report.dry_run,
        started_at.elapsed().as_millis()
    );
    if report.skipped.is_empty() {
        info!("{message}");
    } else {
        warn!("{message}");
    }
    Ok(())
}
