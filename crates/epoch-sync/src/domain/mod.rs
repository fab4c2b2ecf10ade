//! # Domain Module
//!
//! Core domain types for the epoch synchronizer.

pub mod entities;
pub mod errors;
pub mod invariants;
pub mod records;
pub mod value_objects;

pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use records::*;
pub use value_objects::*;
