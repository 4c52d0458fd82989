use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Which kind of row an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Party,
    Client,
    Workshop,
    FabricStore,
    Order,
    WorkshopRequest,
    FabricSubOrder,
    FabricBid,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Party => "party",
            EntityKind::Client => "client",
            EntityKind::Workshop => "workshop",
            EntityKind::FabricStore => "fabric_store",
            EntityKind::Order => "order",
            EntityKind::WorkshopRequest => "workshop_request",
            EntityKind::FabricSubOrder => "fabric_sub_order",
            EntityKind::FabricBid => "fabric_bid",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable classification of a [`WorkflowError`], surfaced to callers
/// alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Validation,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidState => "invalid_state",
            ErrorKind::Validation => "validation",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Failure of a workflow or ledger operation.
///
/// State-precondition misses on the documented transitions are NOT errors;
/// they come back as [`crate::Outcome::Refused`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    #[error("{entity} {id}: {message}")]
    InvalidState {
        entity: EntityKind,
        id: i64,
        message: String,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl WorkflowError {
    pub fn not_found(entity: EntityKind, id: i64) -> Self {
        WorkflowError::NotFound { entity, id }
    }

    pub fn invalid_state(entity: EntityKind, id: i64, message: impl Into<String>) -> Self {
        WorkflowError::InvalidState {
            entity,
            id,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        WorkflowError::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::NotFound { .. } => ErrorKind::NotFound,
            WorkflowError::InvalidState { .. } => ErrorKind::InvalidState,
            WorkflowError::Validation(_) => ErrorKind::Validation,
            WorkflowError::Storage(_) => ErrorKind::Storage,
        }
    }
}
