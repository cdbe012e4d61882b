#![allow(dead_code)]

use lapak_core::model::customer::{Customer, CustomerId};
use lapak_core::model::product::{Product, ProductId};
use lapak_core::model::transaction::{PaymentMethod, Transaction};
use lapak_core::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use lapak_core::repo::org_repo::SqliteOrgRepository;
use lapak_core::repo::product_repo::{ProductRepository, SqliteProductRepository};
use lapak_core::repo::transaction_repo::{
    NewSale, SaleLine, SqliteTransactionRepository, TransactionRepository,
};
use lapak_core::report::DAY_MS;
use lapak_core::service::org_service::OrgService;
use lapak_core::{Actor, Company, Plan, Role, Store};
use rusqlite::Connection;
use uuid::Uuid;

/// 2024-03-15T00:00:00Z
pub const BASE_MS: i64 = 1_710_460_800_000;

pub struct Tenant {
    pub company: Company,
    pub owner: Actor,
    pub admin: Actor,
    pub kasir: Actor,
    pub store: Store,
}

pub fn seed_tenant(conn: &Connection, name: &str, plan: Plan) -> Tenant {
    let org = OrgService::new(SqliteOrgRepository::new(conn));
    let onboarded = org
        .bootstrap_company(name, plan, "Owner", &unique_email("owner"))
        .unwrap();
    let owner = Actor::from(&onboarded.owner);
    let store = org.add_store(&owner, "Toko Pusat", None).unwrap();
    let admin = org
        .add_staff(&owner, "Admin", &unique_email("admin"), Role::Admin, None)
        .unwrap();
    let kasir = org
        .add_staff(
            &owner,
            "Kasir",
            &unique_email("kasir"),
            Role::Kasir,
            Some(store.id),
        )
        .unwrap();

    Tenant {
        company: onboarded.company,
        owner,
        admin: Actor::from(&admin),
        kasir: Actor::from(&kasir),
        store,
    }
}

pub fn unique_email(prefix: &str) -> String {
    format!("{prefix}-{}@example.com", Uuid::new_v4().simple())
}

pub fn add_product(
    conn: &Connection,
    tenant: &Tenant,
    sku: &str,
    price: i64,
    stock: i64,
) -> Product {
    let product = Product::new(tenant.company.id, sku, format!("Produk {sku}"), price, stock);
    SqliteProductRepository::new(conn)
        .create_product(&product)
        .unwrap();
    product
}

pub fn add_customer(conn: &Connection, tenant: &Tenant, name: &str, phone: &str) -> Customer {
    let customer = Customer::new(tenant.company.id, name, phone);
    SqliteCustomerRepository::new(conn)
        .create_customer(&customer)
        .unwrap();
    customer
}

/// Records a cash sale at `created_at`, rung up by the owner.
pub fn sell(
    conn: &mut Connection,
    tenant: &Tenant,
    customer_id: Option<CustomerId>,
    lines: &[(ProductId, i64)],
    created_at: i64,
) -> Transaction {
    let sale = NewSale {
        company_id: tenant.company.id,
        store_id: tenant.store.id,
        customer_id,
        cashier_id: tenant.owner.employee_id,
        payment_method: PaymentMethod::Cash,
        paid: i64::MAX / 4,
        created_at,
        lines: lines
            .iter()
            .map(|(product_id, quantity)| SaleLine {
                product_id: *product_id,
                quantity: *quantity,
            })
            .collect(),
    };
    SqliteTransactionRepository::new(conn)
        .record_sale(&sale)
        .unwrap()
}

pub fn days(n: i64) -> i64 {
    n * DAY_MS
}
