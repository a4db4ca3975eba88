//! Admission constraints and their composition.

mod composite;
mod constraint;
mod pool;

pub use composite::{AdmissionTicket, CompositeLimiter};
pub use constraint::IntervalConstraint;
