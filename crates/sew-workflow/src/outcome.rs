use serde::{Deserialize, Serialize};
use sew_schemas::{
    BidId, FabricBid, FabricSubOrder, Order, OrderStatus, ProposalStatus, RequestId,
    WorkshopId, WorkshopRequest,
};
use std::fmt;

/// Why a transition left every row untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Refusal {
    /// The order has no request in `pending`.
    NoPendingRequest,
    /// The order already carries a workshop.
    OrderAlreadyAssigned {
        workshop: WorkshopId,
        status: OrderStatus,
    },
    /// The order still holds an accepted request.
    RequestAlreadyAccepted { existing: RequestId },
    /// Completion needs a `validated` order.
    OrderNotValidated { status: OrderStatus },
    /// The workshop already holds a pending request for this order.
    DuplicateRequest { existing: RequestId },
    SubOrderNotPending { status: ProposalStatus },
    BidNotPending { status: ProposalStatus },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::NoPendingRequest => write!(f, "no pending workshop request"),
            Refusal::OrderAlreadyAssigned { workshop, status } => {
                write!(f, "order already {status} with {workshop}")
            }
            Refusal::RequestAlreadyAccepted { existing } => {
                write!(f, "{existing} is already accepted")
            }
            Refusal::OrderNotValidated { status } => {
                write!(f, "order is {status}, not validated")
            }
            Refusal::DuplicateRequest { existing } => {
                write!(f, "workshop already has pending {existing}")
            }
            Refusal::SubOrderNotPending { status } => write!(f, "sub-order is {status}"),
            Refusal::BidNotPending { status } => write!(f, "bid is {status}"),
        }
    }
}

/// Result of a state transition: either it was applied, or it was refused
/// because of the current state and nothing changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "value", rename_all = "snake_case")]
pub enum Outcome<T> {
    Applied(T),
    Refused(Refusal),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(&self) -> Option<&T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Refused(_) => None,
        }
    }

    pub fn into_applied(self) -> Option<T> {
        match self {
            Outcome::Applied(v) => Some(v),
            Outcome::Refused(_) => None,
        }
    }

    pub fn refusal(&self) -> Option<&Refusal> {
        match self {
            Outcome::Applied(_) => None,
            Outcome::Refused(r) => Some(r),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Applied(v) => Outcome::Applied(f(v)),
            Outcome::Refused(r) => Outcome::Refused(r),
        }
    }
}

/// First-come workshop assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub order: Order,
    pub request: WorkshopRequest,
    /// Other requests that were pending and are now rejected.
    pub rejected_siblings: Vec<RequestId>,
}

/// Bid acceptance propagated into the owning sub-order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidAcceptance {
    pub bid: FabricBid,
    pub sub_order: FabricSubOrder,
    pub rejected_siblings: Vec<BidId>,
}

/// Order returned to the pool after a workshop refused it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reset {
    pub order: Order,
    pub deleted_requests: Vec<RequestId>,
}

/// Sub-order resolved without going through a bid, plus the bids that lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubOrderResolution {
    pub sub_order: FabricSubOrder,
    pub rejected_bids: Vec<BidId>,
}
