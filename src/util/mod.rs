//! Utility types shared by the decoder.
//!
//! - [`ValueType`] - type ids of values
//! - [`Error`] / [`Result`] / [`Diagnostics`] - error handling
//! - [`DecodeConfig`] / [`MemoryBudget`] - limits against hostile input
//! - Math type re-exports from glam and half

mod value_type;
mod error;
mod math;
mod config;
mod budget;

pub use value_type::*;
pub use error::*;
pub use math::*;
pub use config::*;
pub use budget::*;
