//! Wrappers that add behavior to any `JobSource`.
//!
//! Concrete source integrations live in the applications that use this
//! crate; only source-agnostic decorators live here.

pub mod rate_limited;

pub use rate_limited::{apply_configured_limit, JobSourceExt, RateLimitedSource};
