mod common;

use common::seed_tenant;
use lapak_core::access::AccessError;
use lapak_core::import::{
    import_customers, import_products, CsvError, ImportError, ImportOptions,
};
use lapak_core::model::customer::Customer;
use lapak_core::repo::customer_repo::{CustomerRepository, SqliteCustomerRepository};
use lapak_core::repo::product_repo::{
    ProductListQuery, ProductRepository, SqliteProductRepository,
};
use lapak_core::{open_db_in_memory, Plan};

const COMMIT: ImportOptions = ImportOptions { dry_run: false };

#[test]
fn product_import_inserts_updates_and_reports_bad_rows_by_line() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);

    let first = "SKU,Name,Price,Stock,Category\n\
                 kopi-01,Kopi Bubuk,Rp 15.000,10,Minuman\n\
                 TEH-01,Teh Celup,5000,20,\n";
    let report = import_products(&mut conn, &tenant.owner, first, COMMIT).unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.updated, 0);
    assert!(report.skipped.is_empty());

    let second = "sku,name,price,stock\n\
                  KOPI-01,Kopi Bubuk Premium,\"18,500\",12\n\
                  GULA,Gula Pasir,12.5,3\n\
                  ,Tanpa SKU,1000,1\n\
                  ROTI,Roti Tawar,8000,-2\n\
                  kopi-01,Kopi Lagi,1,1\n\
                  \"BERAS\",\"Beras, 5kg\",65000,7\n";
    let report = import_products(&mut conn, &tenant.admin, second, COMMIT).unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.processed(), 6);
    let lines: Vec<usize> = report.skipped.iter().map(|row| row.line).collect();
    assert_eq!(lines, vec![3, 4, 5, 6]);
    assert!(report.skipped[0].message.contains("price"));
    assert!(report.skipped[1].message.contains("sku"));
    assert!(report.skipped[2].message.contains("negative"));
    assert!(report.skipped[3].message.contains("line 2"));

    let repo = SqliteProductRepository::new(&conn);
    let kopi = repo
        .get_product_by_sku(tenant.company.id, "KOPI-01")
        .unwrap()
        .unwrap();
    assert_eq!(kopi.name, "Kopi Bubuk Premium");
    assert_eq!(kopi.price, 18_500);
    assert_eq!(kopi.stock, 12);
    assert_eq!(kopi.category, None);

    let beras = repo
        .get_product_by_sku(tenant.company.id, "BERAS")
        .unwrap()
        .unwrap();
    assert_eq!(beras.name, "Beras, 5kg");
    assert!(repo
        .get_product_by_sku(tenant.company.id, "GULA")
        .unwrap()
        .is_none());
}

#[test]
fn dry_run_counts_rows_without_saving() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);

    let input = "sku,name,price,stock\r\nKOPI,Kopi,15000,10\r\nTEH,Teh,5000,5\r\n";
    let report =
        import_products(&mut conn, &tenant.owner, input, ImportOptions { dry_run: true }).unwrap();
    assert!(report.dry_run);
    assert_eq!(report.inserted, 2);

    let products = SqliteProductRepository::new(&conn)
        .list_products(tenant.company.id, &ProductListQuery::default())
        .unwrap();
    assert!(products.is_empty());
}

#[test]
fn header_problems_abort_before_any_row() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);

    match import_products(&mut conn, &tenant.owner, "sku,name\nKOPI,Kopi\n", COMMIT) {
        Err(ImportError::MissingColumns(columns)) => {
            assert_eq!(columns, vec!["price".to_string(), "stock".to_string()]);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(matches!(
        import_customers(&mut conn, &tenant.owner, "\n\n", COMMIT),
        Err(ImportError::EmptyFile)
    ));
    assert!(matches!(
        import_products(
            &mut conn,
            &tenant.owner,
            "sku,name,price,stock\n\"KOPI,Kopi,1,1\n",
            COMMIT
        ),
        Err(ImportError::Csv(CsvError::UnterminatedQuote { line: 2 }))
    ));
}

#[test]
fn kasir_cannot_import() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);

    let err = import_customers(
        &mut conn,
        &tenant.kasir,
        "name,phone\nBudi,081234567\n",
        COMMIT,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Access(AccessError::Forbidden { .. })
    ));
}

#[test]
fn customer_import_matches_phone_and_keeps_contact_when_cell_is_empty() {
    let mut conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let other = seed_tenant(&conn, "Toko Lain", Plan::Free);
    let existing = Customer::new(tenant.company.id, "Budi", "081234567890").with_contact(
        Some("budi@example.com".to_string()),
        Some("Jl. Mawar 1".to_string()),
    );
    SqliteCustomerRepository::new(&conn)
        .create_customer(&existing)
        .unwrap();

    let input = "Name,Phone,Email,Address\n\
                 Budi Santoso,0812-3456-7890,,\n\
                 Sari,0813 1111 2222,SARI@Example.com,Jl. Melati\n\
                 Rudi,abc,,\n\
                 Sari Dua,081311112222,,\n";
    let report = import_customers(&mut conn, &tenant.owner, input, COMMIT).unwrap();
    assert_eq!(report.updated, 1);
    assert_eq!(report.inserted, 1);
    let lines: Vec<usize> = report.skipped.iter().map(|row| row.line).collect();
    assert_eq!(lines, vec![4, 5]);

    let repo = SqliteCustomerRepository::new(&conn);
    let budi = repo
        .get_customer(tenant.company.id, existing.id)
        .unwrap()
        .unwrap();
    assert_eq!(budi.name, "Budi Santoso");
    assert_eq!(budi.email.as_deref(), Some("budi@example.com"));
    assert_eq!(budi.address.as_deref(), Some("Jl. Mawar 1"));

    let sari = repo
        .get_customer_by_phone(tenant.company.id, "081311112222")
        .unwrap()
        .unwrap();
    assert_eq!(sari.email.as_deref(), Some("sari@example.com"));
    assert!(repo
        .get_customer_by_phone(other.company.id, "081311112222")
        .unwrap()
        .is_none());
}
