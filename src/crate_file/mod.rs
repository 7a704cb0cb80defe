//! Crate binary layer format (`.usdc`).
//!
//! ## File Structure
//!
//! ```text
//! +----------------------+
//! | Magic: "PXR-USDC"    |  8 bytes
//! +----------------------+
//! | Version              |  8 bytes (major, minor, patch, 5 unused)
//! +----------------------+
//! | TOC offset           |  8 bytes (i64 LE)
//! +----------------------+
//! | Reserved             |  64 bytes
//! +----------------------+
//! | ... Sections ...     |  TOKENS, STRINGS, FIELDS, FIELDSETS, PATHS, SPECS
//! |     and value data   |
//! +----------------------+
//! | TOC                  |  u64 count + (name[16], start, size) records
//! +----------------------+
//! ```
//!
//! Decoding runs leaf first: bootstrap and TOC, then the tables in section
//! order, then the path tree and node hierarchy, and finally every field
//! value is unpacked into a [`CrateValue`].

pub mod format;
pub mod stream;
pub mod toc;
pub mod tables;
pub mod paths;
pub mod unpack;
mod value;
mod dictionary;
mod reader;

pub use format::{
    CrateVersion, Field, FieldIndex, FieldSetIndex, PathIndex, Permission, Section, Spec, SpecType,
    Specifier, StringIndex, TableOfContents, TokenIndex, ValueRep, Variability,
};
pub use stream::{CrateBuffer, Endianness, StreamReader};
pub use paths::{Node, NodeParent, PathArrays};
pub use unpack::{UnpackTables, ValueUnpacker};
pub use value::*;
pub use dictionary::Dictionary;
pub use reader::*;
