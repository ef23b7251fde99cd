//! Core trait abstractions.
//!
//! Applications implement `JobSource` per external source and pick (or
//! provide) a store.

pub mod source;
pub mod store;
