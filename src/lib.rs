//! # usdcrate
//!
//! Rust reader for the USD Crate (`.usdc`) binary layer format.
//!
//! The Crate format stores a scene description as interned tokens, a
//! compactly encoded path tree and typed field values behind 64-bit value
//! reps. This crate decodes the whole container into owned tables with every
//! count and allocation checked against [`DecodeConfig`] limits, so hostile
//! files fail with an [`Error`] instead of exhausting memory or the stack.
//!
//! ## Modules
//!
//! - [`util`] - Value type ids, errors, limits and math types
//! - [`core`] - LZ4 block codec, integer coding, scene paths
//! - [`crate_file`] - Bootstrap, TOC, tables, path tree and value unpacking
//!
//! ## Example
//!
//! ```ignore
//! use usdcrate::prelude::*;
//!
//! let data = CrateData::open("scene.usdc")?;
//! for spec in data.specs() {
//!     let path = data.path(spec.path_index).unwrap();
//!     println!("{path} ({})", spec.spec_type);
//!     for (name, value) in data.fields_for_spec(spec).unwrap_or_default() {
//!         println!("  {name} = {value}");
//!     }
//! }
//! ```

pub mod util;
pub mod core;
pub mod crate_file;

// Re-export commonly used types
pub use util::{DecodeConfig, Error, Result};
pub use crate_file::{CrateData, CrateReader, CrateValue};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DecodeConfig, Diagnostics, Error, MemoryBudget, Result, ValueType};
    pub use crate::core::Path;
    pub use crate::crate_file::{
        CrateData, CrateReader, CrateValue, CrateVersion, Dictionary, ListOp, Node, NodeParent,
        PathIndex, Spec, SpecType, TimeSamples,
    };
}
