//! Upstream addressing.
//!
//! # Data Flow
//! ```text
//! user agent → device.rs (DeviceClass) → UpstreamSelector → upstream host
//! inbound URI → rewrite.rs (scheme, host, base path + path) → outbound URI
//! ```

pub mod device;
pub mod rewrite;

pub use device::{DeviceClass, UpstreamSelector};
pub use rewrite::PathRewrite;
