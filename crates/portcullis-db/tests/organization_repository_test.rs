//! Integration tests for the tenant aggregate repository using in-memory SurrealDB.

use portcullis_core::error::PortcullisError;
use portcullis_core::id::EntityId;
use portcullis_core::models::attribute::AttributeMap;
use portcullis_core::models::organization::{CreateOrganization, EntityKind};
use portcullis_core::models::role::{Permission, Role};
use portcullis_core::models::user::User;
use portcullis_core::mutation::Mutation;
use portcullis_core::repository::{OrganizationRepository, Pagination};
use portcullis_db::repository::SurrealOrganizationRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> SurrealOrganizationRepository<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portcullis_db::run_migrations(&db).await.unwrap();
    SurrealOrganizationRepository::new(db)
}

fn org_input(identifier: &str) -> CreateOrganization {
    CreateOrganization {
        identifier: identifier.into(),
        display_name: format!("{identifier} display"),
    }
}

fn alice() -> User {
    let mut user_properties = AttributeMap::new();
    user_properties.insert("department".into(), "finance".into());
    user_properties.insert("level".into(), 3_i64.into());
    User {
        id: EntityId::new(),
        username: "alice".into(),
        first_name: "Alice".into(),
        last_name: "Liddell".into(),
        user_properties,
        roles: vec![],
        groups: vec![],
        policies: vec![],
    }
}

#[tokio::test]
async fn create_and_get_organization() {
    let repo = setup().await;

    let org = repo.create(org_input("org1")).await.unwrap();
    assert_eq!(org.identifier, "org1");
    assert_eq!(org.revision, 0);
    assert!(org.users.is_empty());

    let by_id = repo.get_by_id(org.id).await.unwrap();
    assert_eq!(by_id.identifier, "org1");

    let by_identifier = repo.get_by_identifier("org1").await.unwrap();
    assert_eq!(by_identifier.id, org.id);
}

#[tokio::test]
async fn duplicate_identifier_is_rejected() {
    let repo = setup().await;
    repo.create(org_input("org1")).await.unwrap();

    let err = repo.create(org_input("org1")).await.unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { .. }));
}

#[tokio::test]
async fn missing_organization_is_not_found() {
    let repo = setup().await;

    let err = repo.get_by_identifier("nope").await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));

    let err = repo.get_by_id(EntityId::new()).await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

#[tokio::test]
async fn apply_persists_embedded_entities_and_bumps_revision() {
    let repo = setup().await;
    let org = repo.create(org_input("org1")).await.unwrap();

    let user = alice();
    let user_id = user.id;
    let role = Role {
        id: EntityId::new(),
        identifier: "viewer".into(),
        display_name: "Viewer".into(),
        users: vec![],
        permissions: vec![Permission::new("invoices", "read")],
        policies: vec![],
    };
    let role_id = role.id;

    repo.apply(org.id, &Mutation::InsertUser { user })
        .await
        .unwrap();
    repo.apply(org.id, &Mutation::InsertRole { role })
        .await
        .unwrap();
    let saved = repo
        .apply(org.id, &Mutation::LinkUserRole { user_id, role_id })
        .await
        .unwrap();
    assert_eq!(saved.revision, 3);

    let reloaded = repo.get_by_identifier("org1").await.unwrap();
    let stored = reloaded.user(user_id).unwrap();
    assert_eq!(stored.roles, vec![role_id]);
    assert_eq!(
        stored.user_properties.get("level"),
        Some(&3_i64.into())
    );
    assert_eq!(
        reloaded.role(role_id).unwrap().permissions,
        vec![Permission::new("invoices", "read")]
    );

    assert!(
        repo.exists_by_id(org.id, EntityKind::Role, role_id)
            .await
            .unwrap()
    );
    assert!(
        repo.exists_by_identifier(org.id, EntityKind::User, "alice")
            .await
            .unwrap()
    );
    assert!(
        !repo
            .exists_by_identifier(org.id, EntityKind::Group, "admins")
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn apply_surfaces_domain_errors_without_writing() {
    let repo = setup().await;
    let org = repo.create(org_input("org1")).await.unwrap();

    let err = repo
        .apply(
            org.id,
            &Mutation::LinkRoleUser {
                role_id: EntityId::new(),
                user_id: EntityId::new(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));

    let reloaded = repo.get_by_id(org.id).await.unwrap();
    assert_eq!(reloaded.revision, 0);
}

#[tokio::test]
async fn list_returns_summaries_with_total() {
    let repo = setup().await;
    for identifier in ["org1", "org2", "org3"] {
        repo.create(org_input(identifier)).await.unwrap();
    }

    let page = repo
        .list(Pagination {
            offset: 0,
            limit: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn repairs_are_recorded_listed_and_cleared() {
    let repo = setup().await;
    let org = repo.create(org_input("org1")).await.unwrap();
    let steps = vec![Mutation::LinkRoleUser {
        role_id: EntityId::new(),
        user_id: EntityId::new(),
    }];

    let repair = repo
        .record_repair(org.id, &steps, "back-link write failed")
        .await
        .unwrap();
    assert_eq!(repair.mutations, steps);

    let pending = repo.list_repairs(org.id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, repair.id);
    assert_eq!(pending[0].reason, "back-link write failed");

    repo.clear_repair(org.id, &repair.id).await.unwrap();
    assert!(repo.list_repairs(org.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_removes_the_tenant() {
    let repo = setup().await;
    let org = repo.create(org_input("org1")).await.unwrap();

    repo.delete(org.id).await.unwrap();

    let err = repo.get_by_id(org.id).await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

fn role(identifier: &str) -> Role {
    Role {
        id: EntityId::new(),
        identifier: identifier.into(),
        display_name: identifier.into(),
        users: vec![],
        permissions: vec![],
        policies: vec![],
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writes_to_one_tenant_all_land() {
    let repo = setup().await.with_write_retries(64);
    let org_id = repo.create(org_input("org1")).await.unwrap().id;

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let repo = repo.clone();
            let mutation = Mutation::InsertRole {
                role: role(&format!("role-{i}")),
            };
            tokio::spawn(async move { repo.apply(org_id, &mutation).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let reloaded = repo.get_by_id(org_id).await.unwrap();
    assert_eq!(reloaded.roles.len(), 16);
    assert_eq!(reloaded.revision, 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_one_identifier_yield_one_tenant() {
    let repo = setup().await.with_write_retries(64);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let repo = repo.clone();
            tokio::spawn(async move { repo.create(org_input("dup")).await })
        })
        .collect();

    let mut created = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(PortcullisError::AlreadyExists { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(repo.list(Pagination::default()).await.unwrap().total, 1);
}
