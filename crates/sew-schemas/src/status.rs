//! Closed enums stored as text columns.
//!
//! `as_str` is the canonical persisted spelling; `FromStr` accepts exactly the
//! same spelling and nothing else.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returned when a persisted or user-supplied string is not a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} value: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

macro_rules! text_enum {
    ($name:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a client order.
///
/// A workshop is attached exactly while the order is `Validated` or
/// `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    InProgress,
    Pending,
    Validated,
    Completed,
    Refused,
}

text_enum!(OrderStatus, "order status", {
    InProgress => "in_progress",
    Pending => "pending",
    Validated => "validated",
    Completed => "completed",
    Refused => "refused",
});

impl OrderStatus {
    /// Statuses in which the order must carry a workshop reference.
    pub fn requires_workshop(&self) -> bool {
        matches!(self, OrderStatus::Validated | OrderStatus::Completed)
    }
}

// ---------------------------------------------------------------------------
// ProposalStatus
// ---------------------------------------------------------------------------

/// Shared status of workshop requests, fabric sub-orders and fabric bids.
///
/// `Pending` is the only live state; `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Pending,
    Accepted,
    Rejected,
}

text_enum!(ProposalStatus, "proposal status", {
    Pending => "pending",
    Accepted => "accepted",
    Rejected => "rejected",
});

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProposalStatus::Pending)
    }
}

// ---------------------------------------------------------------------------
// MaterialKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Cotton,
    Silk,
    Denim,
    Polyester,
    Wool,
    #[default]
    Custom,
}

text_enum!(MaterialKind, "material kind", {
    Cotton => "cotton",
    Silk => "silk",
    Denim => "denim",
    Polyester => "polyester",
    Wool => "wool",
    Custom => "custom",
});

// ---------------------------------------------------------------------------
// PartyRole
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Client,
    Workshop,
    FabricStore,
}

text_enum!(PartyRole, "party role", {
    Client => "client",
    Workshop => "workshop",
    FabricStore => "fabric_store",
});
