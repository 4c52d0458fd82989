//! Typed row identifiers.
//!
//! Every table key and every cross-entity reference gets its own newtype so a
//! `WorkshopId` can never be passed where a `FabricStoreId` is expected.
//! Party references (`ClientId`, `WorkshopId`, `FabricStoreId`) all point into
//! the party registry; the role is checked when an operation consumes them.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

row_id!(
    /// Any registry row, regardless of role.
    PartyId,
    "party"
);
row_id!(ClientId, "client");
row_id!(WorkshopId, "workshop");
row_id!(FabricStoreId, "fabric_store");
row_id!(OrderId, "order");
row_id!(
    /// Opaque catalog reference. The catalog itself lives elsewhere.
    ProductId,
    "product"
);
row_id!(RequestId, "request");
row_id!(SubOrderId, "sub_order");
row_id!(BidId, "bid");

impl From<ClientId> for PartyId {
    fn from(id: ClientId) -> Self {
        PartyId(id.0)
    }
}

impl From<WorkshopId> for PartyId {
    fn from(id: WorkshopId) -> Self {
        PartyId(id.0)
    }
}

impl From<FabricStoreId> for PartyId {
    fn from(id: FabricStoreId) -> Self {
        PartyId(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_the_kind() {
        assert_eq!(OrderId::new(12).to_string(), "order#12");
        assert_eq!(FabricStoreId::new(3).to_string(), "fabric_store#3");
    }

    #[test]
    fn ids_serialize_as_bare_integers() {
        let json = serde_json::to_string(&BidId::new(41)).unwrap();
        assert_eq!(json, "41");
        let back: BidId = serde_json::from_str("41").unwrap();
        assert_eq!(back, BidId::new(41));
    }

    #[test]
    fn party_refs_widen_to_party_id() {
        let p: PartyId = WorkshopId::new(9).into();
        assert_eq!(p.get(), 9);
    }
}
