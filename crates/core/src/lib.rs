//! Domain layer shared by the storage, mail and HTTP crates.
//!
//! Everything here is free of I/O: record types, form validation, the
//! presenters that shape records for page components, and the flash
//! message catalogue.

pub mod locale;
pub mod presenter;
pub mod types;
pub mod validation;
