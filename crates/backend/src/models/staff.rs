//! Staff, role and permission domain types.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use nefol_core::{Email, Permission, PermissionId, RoleId, StaffUserId, StandardRole};

/// A staff account (domain type). The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: StaffUserId,
    pub name: String,
    pub email: Email,
    pub is_active: bool,
    pub failed_login_attempts: i32,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_logout_at: Option<DateTime<Utc>>,
    pub last_failed_login_at: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A staff account together with its role names, for the admin list.
#[derive(Debug, Clone, Serialize)]
pub struct StaffWithRoles {
    #[serde(flatten)]
    pub staff: StaffUser,
    pub roles: Vec<String>,
}

/// A staff role.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A permission record.
#[derive(Debug, Clone, Serialize)]
pub struct PermissionRecord {
    pub id: PermissionId,
    pub code: String,
    pub description: Option<String>,
}

/// One role with the permission codes it grants.
#[derive(Debug, Clone, Serialize)]
pub struct RolePermissions {
    pub role_id: RoleId,
    pub role_name: String,
    pub permissions: Vec<String>,
}

/// Access to a single admin page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct PagePermission {
    pub page_path: String,
    pub can_access: bool,
}

/// A row of the staff audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: i32,
    pub staff_id: Option<StaffUserId>,
    pub staff_name: Option<String>,
    pub staff_email: Option<String>,
    pub action: String,
    pub details: serde_json::Value,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The authenticated staff member behind a request.
#[derive(Debug, Clone, Serialize)]
pub struct StaffContext {
    pub id: StaffUserId,
    pub name: String,
    pub email: Email,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
    pub page_permissions: Vec<PagePermission>,
}

impl StaffContext {
    /// Whether the staff member holds the `admin` role.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles
            .iter()
            .any(|r| r.eq_ignore_ascii_case(StandardRole::Admin.name()))
    }

    /// Whether the staff member may perform `permission`. Admins may do anything.
    #[must_use]
    pub fn has(&self, permission: Permission) -> bool {
        self.is_admin() || self.permissions.contains(permission.code())
    }

    /// Whether the staff member holds any of `permissions`.
    #[must_use]
    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has(*p))
    }
}

/// Request metadata recorded with sessions and activity logs.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn context(roles: &[&str], permissions: &[&str]) -> StaffContext {
        StaffContext {
            id: StaffUserId::new(1),
            name: "Asha".to_string(),
            email: Email::parse("asha@thenefol.com").unwrap(),
            roles: roles.iter().map(ToString::to_string).collect(),
            permissions: permissions.iter().map(ToString::to_string).collect(),
            page_permissions: vec![],
        }
    }

    #[test]
    fn test_admin_implies_every_permission() {
        let admin = context(&["Admin"], &[]);
        assert!(admin.is_admin());
        assert!(Permission::ALL.iter().all(|p| admin.has(*p)));
    }

    #[test]
    fn test_permission_lookup() {
        let staff = context(&["staff"], &["orders:read", "shipping:update"]);
        assert!(!staff.is_admin());
        assert!(staff.has(Permission::OrdersRead));
        assert!(!staff.has(Permission::OrdersUpdate));
        assert!(staff.has_any(&[Permission::OrdersUpdate, Permission::ShippingUpdate]));
    }

    #[test]
    fn test_staff_with_roles_flattens() {
        let row = StaffWithRoles {
            staff: StaffUser {
                id: StaffUserId::new(4),
                name: "Ravi".to_string(),
                email: Email::parse("ravi@thenefol.com").unwrap(),
                is_active: true,
                failed_login_attempts: 0,
                last_login_at: None,
                last_logout_at: None,
                last_failed_login_at: None,
                password_changed_at: None,
                created_at: Utc::now(),
            },
            roles: vec!["manager".to_string()],
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["email"], "ravi@thenefol.com");
        assert_eq!(json["roles"][0], "manager");
    }
}
