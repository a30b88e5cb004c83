//! Integer primary keys wrapped per table so they cannot be mixed up.

/// Declare an `i32` key newtype.
///
/// The generated type serializes as a bare number, parses from a URL path
/// segment, and (with the `postgres` feature) binds as `INTEGER`.
///
/// ```rust
/// # use nefol_core::entity_id;
/// entity_id!(InvoiceRowId);
///
/// let id: InvoiceRowId = "17".parse().unwrap();
/// assert_eq!(id.as_i32(), 17);
/// ```
#[macro_export]
macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(::sqlx::Type), sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn as_i32(self) -> i32 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

entity_id!(OrderId);
entity_id!(StaffUserId);
entity_id!(RoleId);
entity_id!(PermissionId);
entity_id!(ShipmentRecordId);
entity_id!(NotificationId);
