//! Integration tests for TenantStore using in-memory SurrealDB.

use std::sync::Mutex;

use portcullis_authz::TenantStore;
use portcullis_core::error::{PortcullisError, PortcullisResult};
use portcullis_core::id::EntityId;
use portcullis_core::models::api_key::CreateApiKey;
use portcullis_core::models::group::{CreateGroup, PatchGroup};
use portcullis_core::models::organization::{
    CreateOrganization, EntityKind, Organization, OrganizationSummary, UpdateOrganization,
};
use portcullis_core::models::policy::{CreatePolicy, NewPolicyVersion, VersionStatus};
use portcullis_core::models::resource::{CreateResource, NewAction, PatchResource};
use portcullis_core::models::role::{CreateRole, PatchRole, Permission};
use portcullis_core::models::user::{CreateUser, PatchUser, UpdateUser};
use portcullis_core::mutation::Mutation;
use portcullis_core::repository::{
    OrganizationRepository, PaginatedResult, Pagination, PendingRepair,
};
use portcullis_db::repository::SurrealOrganizationRepository;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

/// Repository that fails one chosen sub-operation once, then behaves.
struct FlakyRepo {
    inner: SurrealOrganizationRepository<Db>,
    fail_on: Mutex<Option<Mutation>>,
}

impl FlakyRepo {
    fn arm(&self, mutation: Mutation) {
        *self.fail_on.lock().unwrap() = Some(mutation);
    }
}

impl OrganizationRepository for FlakyRepo {
    async fn create(&self, input: CreateOrganization) -> PortcullisResult<Organization> {
        self.inner.create(input).await
    }

    async fn get_by_id(&self, id: EntityId) -> PortcullisResult<Organization> {
        self.inner.get_by_id(id).await
    }

    async fn get_by_identifier(&self, identifier: &str) -> PortcullisResult<Organization> {
        self.inner.get_by_identifier(identifier).await
    }

    async fn exists_by_id(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        id: EntityId,
    ) -> PortcullisResult<bool> {
        self.inner.exists_by_id(org_id, kind, id).await
    }

    async fn exists_by_identifier(
        &self,
        org_id: EntityId,
        kind: EntityKind,
        identifier: &str,
    ) -> PortcullisResult<bool> {
        self.inner
            .exists_by_identifier(org_id, kind, identifier)
            .await
    }

    async fn delete(&self, id: EntityId) -> PortcullisResult<()> {
        self.inner.delete(id).await
    }

    async fn list(
        &self,
        pagination: Pagination,
    ) -> PortcullisResult<PaginatedResult<OrganizationSummary>> {
        self.inner.list(pagination).await
    }

    async fn apply(&self, org_id: EntityId, mutation: &Mutation) -> PortcullisResult<Organization> {
        let should_fail = {
            let mut armed = self.fail_on.lock().unwrap();
            if armed.as_ref() == Some(mutation) {
                armed.take();
                true
            } else {
                false
            }
        };
        if should_fail {
            return Err(PortcullisError::Infrastructure("injected write failure".into()));
        }
        self.inner.apply(org_id, mutation).await
    }

    async fn record_repair(
        &self,
        org_id: EntityId,
        mutations: &[Mutation],
        reason: &str,
    ) -> PortcullisResult<PendingRepair> {
        self.inner.record_repair(org_id, mutations, reason).await
    }

    async fn list_repairs(&self, org_id: EntityId) -> PortcullisResult<Vec<PendingRepair>> {
        self.inner.list_repairs(org_id).await
    }

    async fn clear_repair(&self, org_id: EntityId, repair_id: &str) -> PortcullisResult<()> {
        self.inner.clear_repair(org_id, repair_id).await
    }
}

async fn setup() -> (TenantStore<FlakyRepo>, EntityId) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portcullis_db::run_migrations(&db).await.unwrap();

    let store = TenantStore::new(FlakyRepo {
        inner: SurrealOrganizationRepository::new(db),
        fail_on: Mutex::new(None),
    });
    let org = store
        .create_organization(CreateOrganization {
            identifier: "org1".into(),
            display_name: "Org One".into(),
        })
        .await
        .unwrap();
    (store, org.id)
}

fn user_input(username: &str) -> CreateUser {
    CreateUser {
        username: username.into(),
        first_name: "First".into(),
        last_name: "Last".into(),
        ..Default::default()
    }
}

fn role_input(identifier: &str) -> CreateRole {
    CreateRole {
        identifier: identifier.into(),
        display_name: identifier.into(),
        ..Default::default()
    }
}

fn group_input(identifier: &str) -> CreateGroup {
    CreateGroup {
        identifier: identifier.into(),
        display_name: identifier.into(),
        ..Default::default()
    }
}

#[tokio::test]
async fn organization_identifier_rules() {
    let (store, _) = setup().await;

    let err = store
        .create_organization(CreateOrganization {
            identifier: "org1".into(),
            display_name: "Again".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { .. }));

    let err = store
        .create_organization(CreateOrganization {
            identifier: "has space".into(),
            display_name: "Bad".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::InvalidInput { .. }));
}

#[tokio::test]
async fn organization_update_list_and_delete() {
    let (store, org_id) = setup().await;

    let org = store
        .update_organization(
            org_id,
            UpdateOrganization {
                display_name: Some("Renamed".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(org.display_name, "Renamed");

    let page = store
        .list_organizations(Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].identifier, "org1");

    store.delete_organization(org_id).await.unwrap();
    let err = store.get_organization(org_id).await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));

    let err = store.delete_organization(org_id).await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

#[tokio::test]
async fn create_user_links_both_sides() {
    let (store, org_id) = setup().await;
    let role = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let group = store
        .create_group(org_id, group_input("finance"))
        .await
        .unwrap();

    let user = store
        .create_user(
            org_id,
            CreateUser {
                roles: vec![role.id],
                groups: vec![group.id],
                ..user_input("alice")
            },
        )
        .await
        .unwrap();

    assert_eq!(user.roles, vec![role.id]);
    assert_eq!(store.get_role(org_id, role.id).await.unwrap().users, vec![user.id]);
    assert_eq!(
        store.get_group(org_id, group.id).await.unwrap().users,
        vec![user.id]
    );
}

#[tokio::test]
async fn create_user_rejects_duplicates_and_missing_references() {
    let (store, org_id) = setup().await;
    store.create_user(org_id, user_input("alice")).await.unwrap();

    let err = store
        .create_user(org_id, user_input("alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { .. }));

    let err = store
        .create_user(
            org_id,
            CreateUser {
                roles: vec![EntityId::new()],
                ..user_input("bob")
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { ref entity, .. } if entity == "role"));
    assert!(
        !store
            .exists_by_identifier(org_id, EntityKind::User, "bob")
            .await
            .unwrap()
    );

    let err = store.create_user(org_id, user_input("")).await.unwrap_err();
    assert!(matches!(err, PortcullisError::InvalidInput { .. }));
}

#[tokio::test]
async fn patch_user_adds_and_removes_bidirectionally() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let editor = store.create_role(org_id, role_input("editor")).await.unwrap();
    let user = store.create_user(org_id, user_input("alice")).await.unwrap();

    let user = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                added_roles: vec![viewer.id, editor.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(user.roles, vec![viewer.id, editor.id]);
    assert_eq!(store.get_role(org_id, editor.id).await.unwrap().users, vec![user.id]);

    let user = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                removed_roles: vec![viewer.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(user.roles, vec![editor.id]);
    assert!(store.get_role(org_id, viewer.id).await.unwrap().users.is_empty());
}

#[tokio::test]
async fn patch_user_validates_all_or_nothing() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let user = store.create_user(org_id, user_input("alice")).await.unwrap();
    let before = store.get_organization(org_id).await.unwrap();

    // One good role and one unknown role: nothing is written.
    let missing = EntityId::new();
    let err = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                added_roles: vec![viewer.id, missing],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { ref id, .. } if *id == missing.to_string()));

    let after = store.get_organization(org_id).await.unwrap();
    assert_eq!(after.revision, before.revision);
    assert!(after.user(user.id).unwrap().roles.is_empty());

    // Removing a relation that does not exist names it.
    let err = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                removed_roles: vec![viewer.id],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { ref entity, .. } if entity == "role membership"));
}

#[tokio::test]
async fn adding_an_existing_membership_is_already_exists() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let user = store
        .create_user(
            org_id,
            CreateUser {
                roles: vec![viewer.id],
                ..user_input("alice")
            },
        )
        .await
        .unwrap();

    let err = store
        .patch_role(
            org_id,
            viewer.id,
            PatchRole {
                added_users: vec![user.id],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { ref id, .. } if *id == user.id.to_string()));
}

#[tokio::test]
async fn delete_user_cascades_to_roles_and_groups() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let group = store
        .create_group(org_id, group_input("finance"))
        .await
        .unwrap();
    let alice = store
        .create_user(
            org_id,
            CreateUser {
                roles: vec![viewer.id],
                groups: vec![group.id],
                ..user_input("alice")
            },
        )
        .await
        .unwrap();

    store.delete_user(org_id, alice.id).await.unwrap();

    let org = store.get_organization(org_id).await.unwrap();
    assert!(org.user(alice.id).is_none());
    assert!(org.role(viewer.id).unwrap().users.is_empty());
    assert!(org.group(group.id).unwrap().users.is_empty());

    let err = store.delete_user(org_id, alice.id).await.unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

#[tokio::test]
async fn delete_role_and_group_cascade_to_users() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let alice = store.create_user(org_id, user_input("alice")).await.unwrap();
    let group = store
        .create_group(
            org_id,
            CreateGroup {
                users: vec![alice.id],
                ..group_input("finance")
            },
        )
        .await
        .unwrap();
    store
        .patch_role(
            org_id,
            viewer.id,
            PatchRole {
                added_users: vec![alice.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        store.get_user(org_id, alice.id).await.unwrap().groups,
        vec![group.id]
    );

    store.delete_role(org_id, viewer.id).await.unwrap();
    store.delete_group(org_id, group.id).await.unwrap();

    let alice = store.get_user(org_id, alice.id).await.unwrap();
    assert!(alice.roles.is_empty());
    assert!(alice.groups.is_empty());
}

#[tokio::test]
async fn patch_group_membership() {
    let (store, org_id) = setup().await;
    let group = store
        .create_group(org_id, group_input("finance"))
        .await
        .unwrap();
    let alice = store.create_user(org_id, user_input("alice")).await.unwrap();

    store
        .patch_group(
            org_id,
            group.id,
            PatchGroup {
                added_users: vec![alice.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(
        store.get_user(org_id, alice.id).await.unwrap().groups,
        vec![group.id]
    );

    let group = store
        .patch_group(
            org_id,
            group.id,
            PatchGroup {
                removed_users: vec![alice.id],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(group.users.is_empty());
    assert!(store.get_user(org_id, alice.id).await.unwrap().groups.is_empty());
}

#[tokio::test]
async fn resource_actions_stay_unique() {
    let (store, org_id) = setup().await;

    let err = store
        .create_resource(
            org_id,
            CreateResource {
                identifier: "invoices".into(),
                display_name: "Invoices".into(),
                actions: vec![
                    NewAction {
                        identifier: "read".into(),
                        display_name: "Read".into(),
                    },
                    NewAction {
                        identifier: "read".into(),
                        display_name: "Read again".into(),
                    },
                ],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { ref entity, .. } if entity == "action"));

    let resource = store
        .create_resource(
            org_id,
            CreateResource {
                identifier: "invoices".into(),
                display_name: "Invoices".into(),
                actions: vec![NewAction {
                    identifier: "read".into(),
                    display_name: "Read".into(),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = store
        .patch_resource(
            org_id,
            resource.id,
            PatchResource {
                added_actions: vec![NewAction {
                    identifier: "read".into(),
                    display_name: String::new(),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { ref id, .. } if id == "read"));
    let unchanged = store.get_resource(org_id, resource.id).await.unwrap();
    let identifiers: Vec<_> = unchanged.actions.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["read"]);

    let err = store
        .patch_resource(
            org_id,
            resource.id,
            PatchResource {
                removed_actions: vec!["delete".into()],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { ref id, .. } if id == "delete"));

    let resource = store
        .patch_resource(
            org_id,
            resource.id,
            PatchResource {
                added_actions: vec![NewAction {
                    identifier: "write".into(),
                    display_name: String::new(),
                }],
                removed_actions: vec!["read".into()],
            },
        )
        .await
        .unwrap();
    let identifiers: Vec<_> = resource.actions.iter().map(|a| a.identifier.as_str()).collect();
    assert_eq!(identifiers, vec!["write"]);
    assert!(store.action_exists(org_id, "invoices", "write").await.unwrap());
    assert!(!store.action_exists(org_id, "invoices", "read").await.unwrap());
}

#[tokio::test]
async fn role_permissions_must_reference_existing_actions() {
    let (store, org_id) = setup().await;
    store
        .create_resource(
            org_id,
            CreateResource {
                identifier: "invoices".into(),
                display_name: "Invoices".into(),
                actions: vec![NewAction {
                    identifier: "read".into(),
                    display_name: "Read".into(),
                }],
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = store
        .create_role(
            org_id,
            CreateRole {
                permissions: vec![Permission::new("invoices", "delete")],
                ..role_input("viewer")
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { ref id, .. } if id == "invoices:delete"));

    let role = store
        .create_role(
            org_id,
            CreateRole {
                permissions: vec![Permission::new("invoices", "read")],
                ..role_input("viewer")
            },
        )
        .await
        .unwrap();

    let role = store
        .patch_role(
            org_id,
            role.id,
            PatchRole {
                removed_permissions: vec![Permission::new("invoices", "read")],
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert!(role.permissions.is_empty());
}

#[tokio::test]
async fn policy_versions_have_a_single_active_revision() {
    let (store, org_id) = setup().await;
    let policy = store
        .create_policy(
            org_id,
            CreatePolicy {
                identifier: "finance-only".into(),
                display_name: "Finance only".into(),
                content: Some("package portcullis".into()),
            },
        )
        .await
        .unwrap();
    assert_eq!(policy.active_version().unwrap().revision, 1);

    let policy = store
        .add_policy_version(
            org_id,
            policy.id,
            NewPolicyVersion {
                content: "package portcullis\n# v2".into(),
                activate: true,
            },
        )
        .await
        .unwrap();
    let active: Vec<_> = policy
        .versions
        .iter()
        .filter(|v| v.status == VersionStatus::Active)
        .map(|v| v.revision)
        .collect();
    assert_eq!(active, vec![2]);

    let policy = store
        .activate_policy_version(org_id, policy.id, 1)
        .await
        .unwrap();
    assert_eq!(policy.active_version().unwrap().revision, 1);

    let err = store
        .activate_policy_version(org_id, policy.id, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

#[tokio::test]
async fn delete_policy_detaches_it_everywhere() {
    let (store, org_id) = setup().await;
    let policy = store
        .create_policy(
            org_id,
            CreatePolicy {
                identifier: "p".into(),
                display_name: "P".into(),
                content: None,
            },
        )
        .await
        .unwrap();
    let role = store
        .create_role(
            org_id,
            CreateRole {
                policies: vec![policy.id],
                ..role_input("viewer")
            },
        )
        .await
        .unwrap();
    let user = store
        .create_user(
            org_id,
            CreateUser {
                policies: vec![policy.id],
                ..user_input("alice")
            },
        )
        .await
        .unwrap();

    store.delete_policy(org_id, policy.id).await.unwrap();

    let org = store.get_organization(org_id).await.unwrap();
    assert!(org.policy(policy.id).is_none());
    assert!(org.role(role.id).unwrap().policies.is_empty());
    assert!(org.user(user.id).unwrap().policies.is_empty());
}

#[tokio::test]
async fn update_user_replaces_fields() {
    let (store, org_id) = setup().await;
    let user = store.create_user(org_id, user_input("alice")).await.unwrap();

    let mut properties = portcullis_core::models::attribute::AttributeMap::new();
    properties.insert("department".into(), "finance".into());
    let user = store
        .update_user(
            org_id,
            user.id,
            UpdateUser {
                first_name: Some("Alicia".into()),
                user_properties: Some(properties.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(user.first_name, "Alicia");
    assert_eq!(user.last_name, "Last");
    assert_eq!(user.user_properties, properties);

    let err = store
        .update_user(org_id, EntityId::new(), UpdateUser::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::NotFound { .. }));
}

#[tokio::test]
async fn api_keys_store_only_hashes() {
    let (store, org_id) = setup().await;

    let issued = store
        .issue_api_key(org_id, CreateApiKey { name: "ci".into() })
        .await
        .unwrap();
    let keys = store.list_api_keys(org_id).await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_ne!(keys[0].key_hash, issued.raw_key);
    assert!(issued.raw_key.starts_with(&keys[0].prefix));

    let err = store
        .issue_api_key(org_id, CreateApiKey { name: "ci".into() })
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::AlreadyExists { .. }));

    store.revoke_api_key(org_id, issued.api_key.id).await.unwrap();
    assert!(store.list_api_keys(org_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_back_link_is_queued_and_reconciled() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let user = store.create_user(org_id, user_input("alice")).await.unwrap();

    store.repository().arm(Mutation::LinkRoleUser {
        role_id: viewer.id,
        user_id: user.id,
    });
    let err = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                added_roles: vec![viewer.id],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::Infrastructure(_)));

    // Forward half landed, back half did not.
    let org = store.get_organization(org_id).await.unwrap();
    assert_eq!(org.user(user.id).unwrap().roles, vec![viewer.id]);
    assert!(org.role(viewer.id).unwrap().users.is_empty());

    let pending = store.repository().list_repairs(org_id).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].mutations,
        vec![Mutation::LinkRoleUser {
            role_id: viewer.id,
            user_id: user.id,
        }]
    );

    assert_eq!(store.reconcile(org_id).await.unwrap(), 1);
    let org = store.get_organization(org_id).await.unwrap();
    assert_eq!(org.role(viewer.id).unwrap().users, vec![user.id]);
    assert!(store.repository().list_repairs(org_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn first_step_failure_is_returned_without_queueing() {
    let (store, org_id) = setup().await;
    let viewer = store.create_role(org_id, role_input("viewer")).await.unwrap();
    let user = store.create_user(org_id, user_input("alice")).await.unwrap();

    store.repository().arm(Mutation::LinkUserRole {
        user_id: user.id,
        role_id: viewer.id,
    });
    let err = store
        .patch_user(
            org_id,
            user.id,
            PatchUser {
                added_roles: vec![viewer.id],
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PortcullisError::Infrastructure(_)));
    assert!(store.repository().list_repairs(org_id).await.unwrap().is_empty());
    assert!(store.get_user(org_id, user.id).await.unwrap().roles.is_empty());
}

#[tokio::test]
async fn listing_is_paginated() {
    let (store, org_id) = setup().await;
    for name in ["a", "b", "c"] {
        store.create_user(org_id, user_input(name)).await.unwrap();
    }

    let page = store
        .list_users(
            org_id,
            Pagination {
                offset: 1,
                limit: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items[0].username, "b");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_patches_on_one_resource_all_land() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    portcullis_db::run_migrations(&db).await.unwrap();
    let store = TenantStore::new(SurrealOrganizationRepository::new(db).with_write_retries(64));

    let org = store
        .create_organization(CreateOrganization {
            identifier: "org1".into(),
            display_name: "Org One".into(),
        })
        .await
        .unwrap();
    let resource = store
        .create_resource(
            org.id,
            CreateResource {
                identifier: "invoices".into(),
                display_name: "Invoices".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let (org_id, resource_id) = (org.id, resource.id);
    let tasks: Vec<_> = (0..24)
        .map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .patch_resource(
                        org_id,
                        resource_id,
                        PatchResource {
                            added_actions: vec![NewAction {
                                identifier: format!("action-{i}"),
                                display_name: String::new(),
                            }],
                            ..Default::default()
                        },
                    )
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let resource = store.get_resource(org_id, resource_id).await.unwrap();
    assert_eq!(resource.actions.len(), 24);
}
