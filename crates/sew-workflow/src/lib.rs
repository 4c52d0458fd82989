//! Order, workshop-request, fabric sub-order and bid workflow.
//!
//! Layout:
//! - [`transitions`]: pure decisions over a locked snapshot
//! - [`ledger`]: the storage seam ([`Ledger`]) and its command vocabulary
//! - [`MemoryLedger`]: in-process ledger
//! - [`Orchestrator`]: the public operations
//!
//! Refusals caused by the current state are returned as
//! [`Outcome::Refused`], never as errors.

mod error;
pub mod ledger;
mod memory;
mod orchestrator;
mod outcome;
pub mod transitions;
pub mod validate;

pub use error::{EntityKind, ErrorKind, WorkflowError};
pub use ledger::{Command, Committed, Ledger, Plan, Scope, Snapshot, Verdict};
pub use memory::MemoryLedger;
pub use orchestrator::Orchestrator;
pub use outcome::{Assignment, BidAcceptance, Outcome, Refusal, Reset, SubOrderResolution};
