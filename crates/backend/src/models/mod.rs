//! Domain models for the backend.
//!
//! Repositories convert database rows into these types; handlers serialize
//! them straight into JSON responses.

pub mod notification;
pub mod order;
pub mod shipment;
pub mod staff;

pub use notification::{AdminNotification, NewNotification};
pub use order::{
    Address, Cancellation, NewOrder, Order, OrderChanges, OrderFilter, OrderItem,
    StatusHistoryEntry,
};
pub use shipment::{Shipment, ShipmentSummary, ShipmentUpsert};
pub use staff::{
    ActivityEntry, ClientInfo, PagePermission, PermissionRecord, Role, RolePermissions,
    StaffContext, StaffUser, StaffWithRoles,
};
