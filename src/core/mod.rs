//! Core layer - codecs and scene paths.
//!
//! This module provides:
//! - [`compression`] - chunked LZ4 block codec
//! - [`integer_coding`] - delta/width coding of integer arrays
//! - [`Path`] - prim and property paths

pub mod compression;
pub mod integer_coding;
mod path;

pub use path::Path;
