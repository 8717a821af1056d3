//! Access Gate
//!
//! Decides whether a credential belongs to an administrative principal.
//! Every read and retraction of the audit log passes through here first.

pub mod extractor;
pub mod gate;

pub use gate::{AccessGate, AdminPrincipal, Claims, Denied};
