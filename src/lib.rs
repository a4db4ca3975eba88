//! Turnstile - Composable Asynchronous Admission Control
//!
//! This crate implements an in-process admission-control primitive for the
//! tokio runtime: a caller may perform an operation at most `capacity` times
//! per `interval`, several such constraints can be conjoined so one
//! admission must satisfy all of them, and an interface can be wrapped so
//! every call is throttled without modifying its call sites.
//!
//! Permits regenerate on rolling per-acquisition timers owned by the pools
//! themselves, so a canceled or failed caller can never strand a permit.

pub mod error;
pub mod limit;
pub mod proxy;

pub use error::{Result, TurnstileError};
pub use limit::{AdmissionTicket, CompositeLimiter, IntervalConstraint};
pub use proxy::Throttled;
