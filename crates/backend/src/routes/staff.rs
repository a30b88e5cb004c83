//! Staff authentication, role management and audit endpoints.
//!
//! Everything below `/api/staff` except the auth routes is admin-only.

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use nefol_core::{PermissionId, RoleId, StaffUserId};

use crate::db::activity::ActivityFilter;
use crate::db::roles::SeedSummary;
use crate::db::{ActivityRepository, RoleRepository, StaffRepository};
use crate::error::AppError;
use crate::extract::{Json, Path, Query};
use crate::middleware::{Client, RequireAdmin, RequireStaff};
use crate::models::{
    ActivityEntry, PagePermission, PermissionRecord, Role, RolePermissions, StaffContext,
    StaffUser, StaffWithRoles,
};
use crate::services::auth::{BulkStaffEntry, BulkStaffReport, LoginOutcome, StaffAuthService};
use crate::state::AppState;

use super::{end_of_day, parse_date_bound};

/// An admin panel page that can be granted to staff.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AdminPage {
    pub path: &'static str,
    pub name: &'static str,
    pub section: &'static str,
}

const fn page(path: &'static str, name: &'static str, section: &'static str) -> AdminPage {
    AdminPage { path, name, section }
}

/// Catalogue of admin panel pages for page-level permissions.
pub const ADMIN_PAGES: &[AdminPage] = &[
    page("/admin/dashboard", "Dashboard", "Dashboard"),
    page("/admin/store", "Online Store", "Dashboard"),
    page("/admin/homepage-layout", "Homepage Layout", "Dashboard"),
    page("/admin/product-collections", "Product Collections", "Dashboard"),
    page("/admin/products", "Products", "Products & Catalog"),
    page("/admin/categories", "Categories", "Products & Catalog"),
    page("/admin/product-variants", "Product Variants", "Products & Catalog"),
    page("/admin/inventory", "Inventory", "Products & Catalog"),
    page("/admin/warehouses", "Warehouses", "Products & Catalog"),
    page("/admin/orders", "Orders", "Sales & Orders"),
    page("/admin/shipments", "Shipments", "Sales & Orders"),
    page("/admin/returns", "Returns", "Sales & Orders"),
    page("/admin/pos", "POS System", "Sales & Orders"),
    page("/admin/cms", "CMS", "Content & CMS"),
    page("/admin/static-pages", "Static Pages", "Content & CMS"),
    page("/admin/customers", "Customers", "Customer & CRM"),
    page("/admin/users", "Users", "Customer & CRM"),
    page("/admin/whatsapp-notifications", "WhatsApp Notifications", "Customer & CRM"),
    page("/admin/invoices", "Invoices", "Finance & Payments"),
    page("/admin/invoice-settings", "Invoice Settings", "Finance & Payments"),
    page("/admin/payment", "Payment", "Finance & Payments"),
    page("/admin/tax", "Tax", "Finance & Payments"),
    page("/admin/marketing", "Marketing", "Marketing"),
    page("/admin/discounts", "Discounts", "Marketing"),
    page("/admin/analytics", "Analytics", "Analytics & Insights"),
    page("/admin/system/audit-logs", "Audit Logs", "Analytics & Insights"),
    page("/admin/system/alerts", "Alert Settings", "Forms & Communication"),
    page("/admin/system/staff", "Staff Accounts", "Team & Access"),
    page("/admin/system/roles", "Roles & Permissions", "Team & Access"),
    page("/admin/account-security", "Account Security", "Team & Access"),
];

/// Build the staff router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/staff/auth/login", post(login))
        .route("/api/staff/auth/logout", post(logout))
        .route("/api/staff/auth/me", get(me))
        .route("/api/staff/auth/change-password", post(change_password))
        .route("/api/staff/roles", get(list_roles).post(create_role))
        .route("/api/staff/permissions", get(list_permissions).post(create_permission))
        .route(
            "/api/staff/role-permissions",
            get(role_permissions).post(assign_permission),
        )
        .route("/api/staff/role-permissions/set", post(set_role_permissions))
        .route("/api/staff/users", get(list_staff).post(create_staff))
        .route("/api/staff/user-roles", post(assign_role))
        .route("/api/staff/users/reset-password", post(reset_password))
        .route("/api/staff/users/disable", post(disable_staff))
        .route("/api/staff/users/bulk-create", post(bulk_create))
        .route("/api/staff/seed-standard", post(seed_standard))
        .route("/api/staff/admin-pages", get(admin_pages))
        .route("/api/staff/page-permissions", post(assign_page_permissions))
        .route("/api/staff/{staff_id}/page-permissions", get(page_permissions))
        .route("/api/staff/activity", get(activity))
}

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedRequest {
    #[serde(default, alias = "code")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPermissionRequest {
    pub role_id: RoleId,
    pub permission_id: PermissionId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePermissionsRequest {
    pub role_id: RoleId,
    #[serde(default)]
    pub permission_codes: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRoleRequest {
    pub staff_id: StaffUserId,
    pub role_id: RoleId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub staff_id: StaffUserId,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffIdRequest {
    pub staff_id: StaffUserId,
}

#[derive(Debug, Deserialize)]
pub struct BulkCreateRequest {
    #[serde(default)]
    pub users: Vec<BulkStaffEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePermissionsRequest {
    pub staff_id: StaffUserId,
    #[serde(default)]
    pub page_paths: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub staff_id: Option<StaffUserId>,
    pub action: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ActivityQuery {
    fn filter(&self) -> Result<ActivityFilter, AppError> {
        let text = |v: Option<&String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Ok(ActivityFilter {
            staff_id: self.staff_id,
            action: text(self.action.as_ref()),
            from: text(self.from.as_ref())
                .map(|v| parse_date_bound(&v, NaiveTime::MIN))
                .transpose()?,
            to: text(self.to.as_ref())
                .map(|v| parse_date_bound(&v, end_of_day()))
                .transpose()?,
        })
    }
}

/// Page paths granted as accessible pages, blanks and duplicates dropped.
fn granted_pages(paths: &[String]) -> Vec<PagePermission> {
    let mut pages: Vec<PagePermission> = Vec::with_capacity(paths.len());
    for path in paths.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
        if !pages.iter().any(|p| p.page_path == path) {
            pages.push(PagePermission {
                page_path: path.to_string(),
                can_access: true,
            });
        }
    }
    pages
}

// =============================================================================
// Auth
// =============================================================================

#[instrument(skip(state, request, client), fields(email = %request.email))]
async fn login(
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginOutcome>, AppError> {
    let outcome = StaffAuthService::new(state.pool())
        .login(
            &request.email,
            &request.password,
            state.config().staff_session_ttl(),
            &client,
        )
        .await?;
    Ok(Json(outcome))
}

#[instrument(skip_all)]
async fn logout(
    RequireStaff { staff, token }: RequireStaff,
    State(state): State<AppState>,
    Client(client): Client,
) -> Result<Json<Value>, AppError> {
    StaffAuthService::new(state.pool())
        .logout(&staff, &token, &client)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

async fn me(RequireStaff { staff, .. }: RequireStaff) -> Json<StaffContext> {
    Json(staff)
}

#[instrument(skip_all)]
async fn change_password(
    RequireStaff { staff, token }: RequireStaff,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    StaffAuthService::new(state.pool())
        .change_password(
            &staff,
            &token,
            &request.current_password,
            &request.new_password,
            &request.confirm_password,
            &client,
        )
        .await?;
    Ok(Json(json!({ "ok": true })))
}

// =============================================================================
// Roles and permissions
// =============================================================================

async fn list_roles(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Role>>, AppError> {
    Ok(Json(RoleRepository::new(state.pool()).list_roles().await?))
}

#[instrument(skip(state, _admin, request), fields(role = %request.name))]
async fn create_role(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<NamedRequest>,
) -> Result<(StatusCode, Json<Role>), AppError> {
    let name = request.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".to_string()));
    }
    let role = RoleRepository::new(state.pool())
        .create_role(name, request.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

async fn list_permissions(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<PermissionRecord>>, AppError> {
    Ok(Json(RoleRepository::new(state.pool()).list_permissions().await?))
}

#[instrument(skip(state, _admin, request), fields(code = %request.name))]
async fn create_permission(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<NamedRequest>,
) -> Result<(StatusCode, Json<PermissionRecord>), AppError> {
    let code = request.name.trim();
    if code.is_empty() {
        return Err(AppError::BadRequest("code is required".to_string()));
    }
    let permission = RoleRepository::new(state.pool())
        .create_permission(code, request.description.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

async fn role_permissions(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<RolePermissions>>, AppError> {
    Ok(Json(RoleRepository::new(state.pool()).matrix().await?))
}

#[instrument(skip(state, _admin))]
async fn assign_permission(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<AssignPermissionRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    RoleRepository::new(state.pool())
        .assign_permission(request.role_id, request.permission_id)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

#[instrument(skip(state, _admin))]
async fn set_role_permissions(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(request): Json<SetRolePermissionsRequest>,
) -> Result<Json<Value>, AppError> {
    let assigned = RoleRepository::new(state.pool())
        .set_role_permissions(request.role_id, &request.permission_codes)
        .await?;
    Ok(Json(json!({ "roleId": request.role_id, "assigned": assigned })))
}

#[instrument(skip_all)]
async fn seed_standard(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<SeedSummary>, AppError> {
    Ok(Json(RoleRepository::new(state.pool()).seed_standard().await?))
}

// =============================================================================
// Staff accounts
// =============================================================================

async fn list_staff(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<StaffWithRoles>>, AppError> {
    Ok(Json(StaffRepository::new(state.pool()).list_with_roles().await?))
}

#[instrument(skip(state, admin, client, request), fields(email = %request.email))]
async fn create_staff(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<StaffUser>), AppError> {
    let user = StaffAuthService::new(state.pool())
        .create_staff(
            &request.name,
            &request.email,
            &request.password,
            request.role.as_deref(),
            Some(admin.id),
            &client,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, admin, client))]
async fn assign_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<AssignRoleRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    StaffAuthService::new(state.pool())
        .assign_role(request.staff_id, request.role_id, Some(admin.id), &client)
        .await?;
    Ok((StatusCode::CREATED, Json(json!({ "ok": true }))))
}

#[instrument(skip(state, admin, client, request), fields(staff_id = %request.staff_id))]
async fn reset_password(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    StaffAuthService::new(state.pool())
        .reset_password(request.staff_id, &request.new_password, Some(admin.id), &client)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[instrument(skip(state, admin, client))]
async fn disable_staff(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<StaffIdRequest>,
) -> Result<Json<Value>, AppError> {
    StaffAuthService::new(state.pool())
        .disable(request.staff_id, Some(admin.id), &client)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

#[instrument(skip(state, admin, client, request), fields(count = request.users.len()))]
async fn bulk_create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<BulkCreateRequest>,
) -> Result<Json<BulkStaffReport>, AppError> {
    if request.users.is_empty() {
        return Err(AppError::BadRequest("users must be a non-empty array".to_string()));
    }
    let report = StaffAuthService::new(state.pool())
        .bulk_create(&request.users, Some(admin.id), &client)
        .await;
    Ok(Json(report))
}

// =============================================================================
// Page permissions and audit trail
// =============================================================================

async fn admin_pages(RequireAdmin(_): RequireAdmin) -> Json<&'static [AdminPage]> {
    Json(ADMIN_PAGES)
}

#[instrument(skip(state, admin, client, request), fields(staff_id = %request.staff_id))]
async fn assign_page_permissions(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Client(client): Client,
    Json(request): Json<PagePermissionsRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let pages = granted_pages(&request.page_paths);
    StaffAuthService::new(state.pool())
        .set_page_permissions(request.staff_id, &pages, Some(admin.id), &client)
        .await?;
    let paths: Vec<&str> = pages.iter().map(|p| p.page_path.as_str()).collect();
    Ok((
        StatusCode::CREATED,
        Json(json!({ "staffId": request.staff_id, "pagePaths": paths })),
    ))
}

async fn page_permissions(
    RequireAdmin(_): RequireAdmin,
    State(state): State<AppState>,
    Path(staff_id): Path<StaffUserId>,
) -> Result<Json<Vec<PagePermission>>, AppError> {
    Ok(Json(StaffRepository::new(state.pool()).page_permissions(staff_id).await?))
}

#[instrument(skip(state, _admin))]
async fn activity(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityEntry>>, AppError> {
    let filter = query.filter()?;
    Ok(Json(ActivityRepository::new(state.pool()).list(&filter).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_pages_drops_blanks_and_duplicates() {
        let paths = vec![
            "/admin/orders".to_string(),
            " ".to_string(),
            "/admin/orders".to_string(),
            " /admin/shipments ".to_string(),
        ];
        let pages = granted_pages(&paths);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].page_path, "/admin/shipments");
        assert!(pages.iter().all(|p| p.can_access));
    }

    #[test]
    fn test_admin_pages_are_unique() {
        let mut paths: Vec<&str> = ADMIN_PAGES.iter().map(|p| p.path).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), ADMIN_PAGES.len());
        assert!(paths.iter().all(|p| p.starts_with("/admin/")));
    }

    #[test]
    fn test_change_password_request_is_camel_case() {
        let request: ChangePasswordRequest = serde_json::from_str(
            r#"{"currentPassword":"old","newPassword":"new-password","confirmPassword":"new-password"}"#,
        )
        .unwrap();
        assert_eq!(request.current_password, "old");
        assert_eq!(request.new_password, request.confirm_password);
    }

    #[test]
    fn test_activity_filter() {
        let query = ActivityQuery {
            staff_id: Some(StaffUserId::new(4)),
            action: Some(" login ".to_string()),
            from: Some("2025-03-01".to_string()),
            to: None,
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.action.as_deref(), Some("login"));
        assert!(filter.from.is_some());
        assert!(filter.to.is_none());
    }
}
