//! Decoder limits.
//!
//! Every count read from a file is attacker controlled, so each table has a
//! cap here and all allocations share one byte budget.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Limits applied while decoding a Crate buffer.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecodeConfig {
    /// Maximum number of TOC sections.
    pub max_toc_sections: usize,
    /// Maximum number of tokens in the TOKENS section.
    pub max_num_tokens: usize,
    /// Maximum number of entries in the STRINGS section.
    pub max_num_strings: usize,
    /// Maximum number of paths in the PATHS section.
    pub max_num_paths: usize,
    /// Maximum number of fields in the FIELDS section.
    pub max_num_fields: usize,
    /// Maximum number of entries in the FIELDSETS section.
    pub max_num_fieldsets: usize,
    /// Maximum number of specs in the SPECS section.
    pub max_num_specifiers: usize,
    /// Maximum length of any compressed index array.
    pub max_num_indices: usize,
    /// Maximum element count of an array value.
    pub max_array_elements: usize,
    /// Maximum entry count of a dictionary value.
    pub max_dict_elements: usize,
    /// Maximum entry count of a variant selection map.
    pub max_variants_map_elements: usize,
    /// Maximum nesting of values unpacked from inside other values.
    pub max_value_recursion: usize,
    /// Maximum number of steps of the path tree walk.
    pub max_path_indices_decode_iteration: usize,
    /// Byte budget shared by all allocations of one decode.
    pub max_memory_budget: usize,
    /// Maximum length of a single token in bytes.
    pub max_token_length: usize,
    /// Accepted for compatibility; decoding is sequential.
    pub num_threads: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_toc_sections: 32,
            max_num_tokens: 64 * 1024 * 1024,
            max_num_strings: 64 * 1024 * 1024,
            max_num_paths: 256 * 1024 * 1024,
            max_num_fields: 256 * 1024 * 1024,
            max_num_fieldsets: 256 * 1024 * 1024,
            max_num_specifiers: 256 * 1024 * 1024,
            max_num_indices: 256 * 1024 * 1024,
            max_array_elements: 1024 * 1024 * 1024,
            max_dict_elements: 256,
            max_variants_map_elements: 128,
            max_value_recursion: 16,
            max_path_indices_decode_iteration: 256 * 1024 * 1024,
            max_memory_budget: i32::MAX as usize,
            max_token_length: 4096,
            num_threads: 1,
        }
    }
}

impl DecodeConfig {
    /// Default limits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shared byte budget.
    pub fn with_memory_budget(mut self, bytes: usize) -> Self {
        self.max_memory_budget = bytes;
        self
    }

    /// Set the nested value recursion limit.
    pub fn with_value_recursion(mut self, depth: usize) -> Self {
        self.max_value_recursion = depth;
        self
    }

    /// Set the maximum array element count.
    pub fn with_array_elements(mut self, count: usize) -> Self {
        self.max_array_elements = count;
        self
    }

    /// Set the maximum dictionary entry count.
    pub fn with_dict_elements(mut self, count: usize) -> Self {
        self.max_dict_elements = count;
        self
    }

    /// Set the maximum path walk iterations.
    pub fn with_path_decode_iterations(mut self, count: usize) -> Self {
        self.max_path_indices_decode_iteration = count;
        self
    }

    /// Set the (unused) worker thread count.
    pub fn with_num_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Parse limits from JSON; missing keys keep their defaults.
    #[cfg(all(feature = "serde", feature = "cli"))]
    pub fn from_json(text: &str) -> crate::util::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::util::Error::invalid(format!("config: {e}")))
    }
}
