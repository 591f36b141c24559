//! RateDesk Common Types
//!
//! Shared types used across the RateDesk workspace: currency codes, currency
//! pairs, monetary amounts, opaque identifiers and time helpers.

pub mod identifiers;
pub mod monetary;
pub mod error;
pub mod time;

pub use identifiers::*;
pub use monetary::*;
pub use error::*;
pub use time::*;
