//! Core domain entities
//!
//! Pure data structures with validation logic - no I/O.

mod requisition;
mod transaction;
pub mod result;

pub use requisition::{ConsentState, NewRequisition, Requisition, RequisitionStatus};
pub use transaction::{Amount, Transaction};
