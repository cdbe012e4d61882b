mod common;

use common::{seed_tenant, unique_email};
use lapak_core::access::AccessError;
use lapak_core::repo::org_repo::SqliteOrgRepository;
use lapak_core::service::org_service::OrgService;
use lapak_core::service::ServiceError;
use lapak_core::{open_db_in_memory, Actor, Plan, RepoError, Role};
use uuid::Uuid;

#[test]
fn super_admin_onboards_tenants_and_changes_plan() {
    let conn = open_db_in_memory().unwrap();
    let org = OrgService::new(SqliteOrgRepository::new(&conn));
    let root = org
        .bootstrap_super_admin("Operator", "ops@lapak.id")
        .unwrap();
    assert_eq!(root.company_id, None);
    let root = org.actor_for_email("OPS@lapak.id").unwrap();
    assert_eq!(root.role, Role::SuperAdmin);

    let onboarded = org
        .onboard_company(&root, "Warung Sari", Plan::Free, "Sari", "sari@example.com")
        .unwrap();
    assert_eq!(onboarded.owner.role, Role::Owner);
    assert_eq!(onboarded.owner.company_id, Some(onboarded.company.id));
    org.onboard_company(&root, "Toko Abadi", Plan::Pro, "Adi", "adi@example.com")
        .unwrap();

    org.change_plan(&root, onboarded.company.id, Plan::Pro)
        .unwrap();
    let names: Vec<(String, Plan)> = org
        .list_companies(&root)
        .unwrap()
        .into_iter()
        .map(|company| (company.name, company.plan))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Toko Abadi".to_string(), Plan::Pro),
            ("Warung Sari".to_string(), Plan::Pro),
        ]
    );

    assert!(matches!(
        org.change_plan(&root, Uuid::new_v4(), Plan::Free)
            .unwrap_err(),
        ServiceError::Repo(RepoError::NotFound { .. })
    ));
}

#[test]
fn owners_cannot_onboard_or_list_other_tenants() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let org = OrgService::new(SqliteOrgRepository::new(&conn));

    assert!(matches!(
        org.onboard_company(&tenant.owner, "Toko Baru", Plan::Free, "X", "x@example.com")
            .unwrap_err(),
        ServiceError::Access(AccessError::Forbidden { .. })
    ));
    assert!(matches!(
        org.list_companies(&tenant.owner).unwrap_err(),
        ServiceError::Access(AccessError::Forbidden { .. })
    ));
    assert!(matches!(
        org.change_plan(&tenant.owner, tenant.company.id, Plan::Pro)
            .unwrap_err(),
        ServiceError::Access(AccessError::Forbidden { .. })
    ));
}

#[test]
fn email_is_unique_across_the_platform() {
    let conn = open_db_in_memory().unwrap();
    let org = OrgService::new(SqliteOrgRepository::new(&conn));
    let first = org
        .bootstrap_company("Toko A", Plan::Free, "Ani", "ani@example.com")
        .unwrap();
    let owner = Actor::from(&first.owner);

    assert!(matches!(
        org.bootstrap_company("Toko B", Plan::Free, "Ani", " ANI@example.com ")
            .unwrap_err(),
        RepoError::Conflict(_)
    ));
    assert!(matches!(
        org.add_staff(&owner, "Ani Kedua", "ani@example.com", Role::Kasir, None)
            .unwrap_err(),
        ServiceError::Repo(RepoError::Conflict(_))
    ));
}

#[test]
fn owner_manages_staff_within_own_company() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let other = seed_tenant(&conn, "Toko Lain", Plan::Free);
    let org = OrgService::new(SqliteOrgRepository::new(&conn));

    assert!(matches!(
        org.add_staff(&tenant.owner, "Root", &unique_email("root"), Role::SuperAdmin, None)
            .unwrap_err(),
        ServiceError::Repo(RepoError::Validation(_))
    ));
    assert!(matches!(
        org.add_staff(&tenant.kasir, "Dedi", &unique_email("dedi"), Role::Kasir, None)
            .unwrap_err(),
        ServiceError::Access(AccessError::Forbidden { .. })
    ));
    assert!(matches!(
        org.add_staff(
            &tenant.owner,
            "Dedi",
            &unique_email("dedi"),
            Role::Kasir,
            Some(other.store.id),
        )
        .unwrap_err(),
        ServiceError::Repo(RepoError::NotFound { .. })
    ));

    let staff = org.list_staff(&tenant.owner).unwrap();
    assert_eq!(staff.len(), 3);
    assert!(staff
        .iter()
        .all(|employee| employee.company_id == Some(tenant.company.id)));
    assert!(matches!(
        org.list_staff(&tenant.admin).unwrap_err(),
        ServiceError::Access(AccessError::Forbidden { .. })
    ));

    let stores = org.list_stores(&tenant.kasir).unwrap();
    assert_eq!(stores, vec![tenant.store.clone()]);
    assert_eq!(org.company(&tenant.kasir).unwrap(), tenant.company);
}

#[test]
fn deactivated_staff_lose_access_but_owners_stay() {
    let conn = open_db_in_memory().unwrap();
    let tenant = seed_tenant(&conn, "Toko Maju", Plan::Free);
    let other = seed_tenant(&conn, "Toko Lain", Plan::Free);
    let org = OrgService::new(SqliteOrgRepository::new(&conn));

    assert!(matches!(
        org.deactivate_staff(&other.owner, tenant.kasir.employee_id)
            .unwrap_err(),
        ServiceError::Repo(RepoError::NotFound { .. })
    ));
    assert!(matches!(
        org.deactivate_staff(&tenant.owner, tenant.owner.employee_id)
            .unwrap_err(),
        ServiceError::Repo(RepoError::Conflict(_))
    ));

    org.deactivate_staff(&tenant.owner, tenant.kasir.employee_id)
        .unwrap();
    let staff = org.list_staff(&tenant.owner).unwrap();
    let kasir = staff
        .iter()
        .find(|employee| employee.id == tenant.kasir.employee_id)
        .unwrap();
    assert!(!kasir.is_active);

    let kasir = org.actor_for_email(&kasir.email).unwrap();
    assert!(matches!(
        org.list_stores(&kasir).unwrap_err(),
        ServiceError::Access(AccessError::Inactive(id)) if id == tenant.kasir.employee_id
    ));
    assert!(matches!(
        org.actor_for_email("nobody@example.com").unwrap_err(),
        ServiceError::Repo(RepoError::NotFound { .. })
    ));
}
