//! Staff permission codes and the standard role matrix.
//!
//! Permissions are `resource:action` strings stored in `staff_permissions.code`.
//! Staff may also hold codes created at runtime through the admin API, so the
//! database keeps plain strings; [`Permission`] covers the codes the backend
//! itself checks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A permission code checked by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "products:read")]
    ProductsRead,
    #[serde(rename = "products:update")]
    ProductsUpdate,
    #[serde(rename = "orders:read")]
    OrdersRead,
    #[serde(rename = "orders:update")]
    OrdersUpdate,
    #[serde(rename = "shipping:read")]
    ShippingRead,
    #[serde(rename = "shipping:update")]
    ShippingUpdate,
    #[serde(rename = "invoices:read")]
    InvoicesRead,
    #[serde(rename = "returns:read")]
    ReturnsRead,
    #[serde(rename = "returns:update")]
    ReturnsUpdate,
    #[serde(rename = "returns:create")]
    ReturnsCreate,
    #[serde(rename = "analytics:read")]
    AnalyticsRead,
    #[serde(rename = "marketing:read")]
    MarketingRead,
    #[serde(rename = "users:read")]
    UsersRead,
    #[serde(rename = "users:update")]
    UsersUpdate,
    #[serde(rename = "cms:read")]
    CmsRead,
    #[serde(rename = "payments:read")]
    PaymentsRead,
    #[serde(rename = "pos:read")]
    PosRead,
    #[serde(rename = "pos:update")]
    PosUpdate,
}

impl Permission {
    /// Every standard permission, in seed order.
    pub const ALL: &'static [Self] = &[
        Self::ProductsRead,
        Self::ProductsUpdate,
        Self::OrdersRead,
        Self::OrdersUpdate,
        Self::ShippingRead,
        Self::ShippingUpdate,
        Self::InvoicesRead,
        Self::ReturnsRead,
        Self::ReturnsUpdate,
        Self::ReturnsCreate,
        Self::AnalyticsRead,
        Self::MarketingRead,
        Self::UsersRead,
        Self::UsersUpdate,
        Self::CmsRead,
        Self::PaymentsRead,
        Self::PosRead,
        Self::PosUpdate,
    ];

    /// The stored code, e.g. `orders:read`.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::ProductsRead => "products:read",
            Self::ProductsUpdate => "products:update",
            Self::OrdersRead => "orders:read",
            Self::OrdersUpdate => "orders:update",
            Self::ShippingRead => "shipping:read",
            Self::ShippingUpdate => "shipping:update",
            Self::InvoicesRead => "invoices:read",
            Self::ReturnsRead => "returns:read",
            Self::ReturnsUpdate => "returns:update",
            Self::ReturnsCreate => "returns:create",
            Self::AnalyticsRead => "analytics:read",
            Self::MarketingRead => "marketing:read",
            Self::UsersRead => "users:read",
            Self::UsersUpdate => "users:update",
            Self::CmsRead => "cms:read",
            Self::PaymentsRead => "payments:read",
            Self::PosRead => "pos:read",
            Self::PosUpdate => "pos:update",
        }
    }

    /// Human readable description used when seeding.
    #[must_use]
    pub fn description(&self) -> String {
        let (resource, action) = self.code().split_once(':').unwrap_or((self.code(), ""));
        let verb = match action {
            "read" => "View",
            "update" => "Update",
            "create" => "Create",
            other => other,
        };
        format!("{verb} {resource}")
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error returned when a string is not a known permission code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission code: {0}")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.code() == s)
            .ok_or_else(|| UnknownPermission(s.to_owned()))
    }
}

/// The built-in staff roles created by the seed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StandardRole {
    /// Holds every permission, and may manage staff and integrations.
    Admin,
    Manager,
    Staff,
    Viewer,
}

impl StandardRole {
    /// All standard roles, most privileged first.
    pub const ALL: &'static [Self] = &[Self::Admin, Self::Manager, Self::Staff, Self::Viewer];

    /// Role name as stored in `staff_roles.name`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Staff => "staff",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Admin => "Full access to every admin feature",
            Self::Manager => "Runs day-to-day store operations",
            Self::Staff => "Fulfils orders, shipping and returns",
            Self::Viewer => "Read-only access to catalogue, orders and analytics",
        }
    }

    /// Permissions granted to this role on seed.
    #[must_use]
    pub fn permissions(&self) -> Vec<Permission> {
        use Permission as P;
        match self {
            Self::Admin => P::ALL.to_vec(),
            Self::Manager => vec![
                P::ProductsRead,
                P::ProductsUpdate,
                P::OrdersRead,
                P::OrdersUpdate,
                P::ShippingRead,
                P::ShippingUpdate,
                P::InvoicesRead,
                P::ReturnsRead,
                P::ReturnsUpdate,
                P::AnalyticsRead,
                P::MarketingRead,
                P::UsersRead,
            ],
            Self::Staff => vec![
                P::OrdersRead,
                P::OrdersUpdate,
                P::ShippingRead,
                P::ShippingUpdate,
                P::InvoicesRead,
                P::ReturnsRead,
                P::ReturnsUpdate,
            ],
            Self::Viewer => vec![P::ProductsRead, P::OrdersRead, P::AnalyticsRead],
        }
    }
}

impl fmt::Display for StandardRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StandardRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid role: {s}"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_parse_back() {
        for p in Permission::ALL {
            assert_eq!(p.code().parse::<Permission>().unwrap(), *p);
        }
        assert!("orders:delete".parse::<Permission>().is_err());
    }

    #[test]
    fn test_serde_uses_code() {
        assert_eq!(
            serde_json::to_string(&Permission::ShippingUpdate).unwrap(),
            "\"shipping:update\""
        );
    }

    #[test]
    fn test_admin_has_everything() {
        assert_eq!(StandardRole::Admin.permissions().len(), Permission::ALL.len());
    }

    #[test]
    fn test_role_matrix() {
        let staff = StandardRole::Staff.permissions();
        assert!(staff.contains(&Permission::OrdersUpdate));
        assert!(!staff.contains(&Permission::ProductsRead));

        let viewer = StandardRole::Viewer.permissions();
        assert_eq!(viewer.len(), 3);
        assert!(!viewer.contains(&Permission::OrdersUpdate));

        let manager = StandardRole::Manager.permissions();
        assert!(manager.contains(&Permission::UsersRead));
        assert!(!manager.contains(&Permission::UsersUpdate));
        assert!(!manager.contains(&Permission::ReturnsCreate));
    }

    #[test]
    fn test_description() {
        assert_eq!(Permission::OrdersRead.description(), "View orders");
        assert_eq!(Permission::ReturnsCreate.description(), "Create returns");
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Manager".parse::<StandardRole>().unwrap(), StandardRole::Manager);
        assert!("owner".parse::<StandardRole>().is_err());
    }
}
