//! Error types for the Crate reader.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Crate decoding.
///
/// Every decode step returns this; the first error aborts the whole decode.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Bad magic, bad TOC offset or otherwise unusable bootstrap
    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    /// A read ran past the end of the buffer or section
    #[error("Truncated data: need {need} bytes at position {pos} (size {size})")]
    TruncatedData { pos: u64, need: u64, size: u64 },

    /// Version outside the supported range
    #[error("Unsupported Crate version: {major}.{minor}.{patch}")]
    UnsupportedVersion { major: u8, minor: u8, patch: u8 },

    /// Section record or section payload out of bounds
    #[error("Section bounds error: {0}")]
    SectionBounds(String),

    /// A declared count or the running allocation total exceeded the budget
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    /// Cycle, duplicate visit, visit-count mismatch or bad parent/child link
    #[error("Corrupt topology: {0}")]
    CorruptTopology(String),

    /// Value type id not known or not supported
    #[error("Unknown value type: {0}")]
    UnknownType(String),

    /// Nested value unpacking went too deep or revisited an offset
    #[error("Recursion limit exceeded: depth {depth} (limit {limit})")]
    RecursionLimitExceeded { depth: usize, limit: usize },

    /// Bad code byte, length mismatch, bad compressed stream
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Memory mapping failed
    #[error("Memory mapping failed: {0}")]
    MmapFailed(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a malformed header error.
    pub fn header(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    /// Create an invalid encoding error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidEncoding(msg.into())
    }

    /// Create a corrupt topology error.
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::CorruptTopology(msg.into())
    }

    /// Create a budget error.
    pub fn budget(msg: impl Into<String>) -> Self {
        Self::BudgetExceeded(msg.into())
    }

    /// Short stable name of the error kind, used by the CLI and in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "FileNotFound",
            Self::MalformedHeader(_) => "MalformedHeader",
            Self::TruncatedData { .. } => "TruncatedData",
            Self::UnsupportedVersion { .. } => "UnsupportedVersion",
            Self::SectionBounds(_) => "SectionBoundsError",
            Self::BudgetExceeded(_) => "BudgetExceeded",
            Self::CorruptTopology(_) => "CorruptTopology",
            Self::UnknownType(_) => "UnknownType",
            Self::RecursionLimitExceeded { .. } => "RecursionLimitExceeded",
            Self::InvalidEncoding(_) => "InvalidEncoding",
            Self::MmapFailed(_) => "MmapFailed",
            Self::Io(_) => "Io",
        }
    }
}

/// Result type alias for Crate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal conditions collected while decoding.
///
/// Threaded by `&mut` through the decoder; never global.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    /// Create an empty channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning. Also emitted through `tracing`.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!("{msg}");
        self.warnings.push(msg);
    }

    /// All warnings in the order they were raised.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Check if no warnings were raised.
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Consume the channel, returning the warnings.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }
}
