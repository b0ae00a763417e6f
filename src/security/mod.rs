//! Security subsystem.
//!
//! Region and IP deny lists, evaluated before any upstream call. Denials
//! are expected traffic shaping: they produce a fixed 403 and are logged at
//! debug level only.

pub mod access_control;

pub use access_control::{AccessPolicy, DenyReason};
