//! Identity types for Vendora
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Convert to prefixed string
            pub fn to_prefixed_string(&self) -> String {
                format!("{}_{}", $prefix, self.0)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl AsRef<Uuid> for $name {
            fn as_ref(&self) -> &Uuid {
                &self.0
            }
        }
    };
}

// Tenancy identity types
define_id_type!(TenantId, "tenant", "Unique identifier for a marketplace tenant");
define_id_type!(StoreId, "store", "Unique identifier for a store within a tenant");
define_id_type!(VendorId, "vendor", "Unique identifier for a vendor");

// Catalog identity types
define_id_type!(ProductId, "product", "Unique identifier for a product");
define_id_type!(CategoryId, "category", "Unique identifier for a product category");

// Order identity types
define_id_type!(OrderId, "order", "Unique identifier for an order");
define_id_type!(LineItemId, "line", "Unique identifier for an order line item");

// Commission identity types
define_id_type!(RuleId, "rule", "Unique identifier for a commission rule");
define_id_type!(TransactionId, "tx", "Unique identifier for a commission transaction");
define_id_type!(PayoutId, "payout", "Unique identifier for a vendor payout");
define_id_type!(ApproverId, "approver", "Unique identifier for a payout approver");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_id_creation() {
        let id = VendorId::new();
        let s = id.to_string();
        assert!(s.starts_with("vendor_"));
    }

    #[test]
    fn test_id_parsing() {
        let id = PayoutId::new();
        let s = id.to_string();
        let parsed = PayoutId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_parsing_without_prefix() {
        let id = RuleId::new();
        let parsed = RuleId::parse(&id.0.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_id_equality() {
        let uuid = Uuid::new_v4();
        let id1 = TransactionId::from_uuid(uuid);
        let id2 = TransactionId::from_uuid(uuid);
        assert_eq!(id1, id2);
    }
}
