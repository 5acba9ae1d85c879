//! Router and shared state.
//!
//! Two surfaces share one listener:
//! - `/api/v1/{org}/...`: decision entry points gated by the tenant API key
//! - `/admin/v1/...`: tenant administration gated by the admin token, and
//!   answered with 404 when no admin token is configured

use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router, middleware};
use portcullis_authz::{DecisionEngine, RegoEvaluator, TenantStore};
use portcullis_db::repository::SurrealOrganizationRepository;
use serde_json::{Value, json};
use surrealdb::Connection;
use tower_http::trace::TraceLayer;

use crate::api::{admin, check, groups, policies, relationships, resources, roles, users};

pub use crate::api::API_KEY_HEADER;
pub use crate::api::admin::ADMIN_TOKEN_HEADER;

pub type Repo<C> = SurrealOrganizationRepository<C>;
pub type Engine<C> = DecisionEngine<Repo<C>, RegoEvaluator>;

pub struct AppState<C: Connection> {
    pub engine: Arc<Engine<C>>,
    pub store: TenantStore<Repo<C>>,
    pub admin_token: Option<Arc<str>>,
}

impl<C: Connection> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            store: self.store.clone(),
            admin_token: self.admin_token.clone(),
        }
    }
}

impl<C: Connection> AppState<C> {
    pub fn new(engine: Engine<C>, store: TenantStore<Repo<C>>) -> Self {
        Self {
            engine: Arc::new(engine),
            store,
            admin_token: None,
        }
    }

    /// Enable the administration routes behind `token`.
    pub fn with_admin_token(mut self, token: impl Into<Arc<str>>) -> Self {
        self.admin_token = Some(token.into());
        self
    }
}

pub fn build_router<C: Connection>(state: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/{org}/permission/check",
            post(check::check_permission::<C>),
        )
        .route(
            "/api/v1/{org}/relationships/check",
            post(relationships::check_relationship::<C>),
        )
        .route(
            "/api/v1/{org}/relationships/write",
            post(relationships::write_relationship::<C>),
        )
        .route(
            "/api/v1/{org}/relationships/read",
            post(relationships::read_relationships::<C>),
        )
        .merge(build_admin_router(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_admin_router<C: Connection>(state: AppState<C>) -> Router<AppState<C>> {
    Router::new()
        .route(
            "/admin/v1/organizations",
            get(admin::list_organizations::<C>).post(admin::create_organization::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}",
            get(admin::get_organization::<C>)
                .put(admin::update_organization::<C>)
                .delete(admin::delete_organization::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/api-keys",
            get(admin::list_api_keys::<C>).post(admin::issue_api_key::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/api-keys/{api_key_id}",
            axum::routing::delete(admin::revoke_api_key::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/reconcile",
            post(admin::reconcile::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/users",
            get(users::list_users::<C>).post(users::create_user::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/users/{user_id}",
            get(users::get_user::<C>)
                .put(users::update_user::<C>)
                .patch(users::patch_user::<C>)
                .delete(users::delete_user::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/groups",
            get(groups::list_groups::<C>).post(groups::create_group::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/groups/{group_id}",
            get(groups::get_group::<C>)
                .put(groups::update_group::<C>)
                .patch(groups::patch_group::<C>)
                .delete(groups::delete_group::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/roles",
            get(roles::list_roles::<C>).post(roles::create_role::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/roles/{role_id}",
            get(roles::get_role::<C>)
                .put(roles::update_role::<C>)
                .patch(roles::patch_role::<C>)
                .delete(roles::delete_role::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/resources",
            get(resources::list_resources::<C>).post(resources::create_resource::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/resources/{resource_id}",
            get(resources::get_resource::<C>)
                .put(resources::update_resource::<C>)
                .patch(resources::patch_resource::<C>)
                .delete(resources::delete_resource::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/policies",
            get(policies::list_policies::<C>).post(policies::create_policy::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/policies/{policy_id}",
            get(policies::get_policy::<C>).delete(policies::delete_policy::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/policies/{policy_id}/versions",
            post(policies::add_policy_version::<C>),
        )
        .route(
            "/admin/v1/organizations/{org_id}/policies/{policy_id}/versions/{revision}/activate",
            post(policies::activate_policy_version::<C>),
        )
        .route_layer(middleware::from_fn_with_state(
            state,
            admin::require_admin_token::<C>,
        ))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
