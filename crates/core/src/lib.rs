//! Domain types for the DataGen analysis backend.
//!
//! Holds the typed job record, its status machine and merge rules, and the
//! shared error type. No I/O lives here.

pub mod error;
pub mod job;
pub mod result;
pub mod types;
pub mod validation;
