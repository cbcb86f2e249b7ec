//! Request middleware.
//!
//! Purpose: Define middleware components for request lifecycle concerns such
//! as trace correlation and the audit trail.

pub mod audit;
pub mod trace;

pub use audit::Audit;
pub use trace::Trace;
