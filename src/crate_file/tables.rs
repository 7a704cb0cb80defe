//! Token, string, field, fieldset and spec tables.
//!
//! Every reader takes a [`StreamReader`] bounded to its own section, so a
//! read past the section end fails with `TruncatedData` instead of wandering
//! into the next one.

use std::ops::Range;

use super::format::*;
use super::stream::StreamReader;
use crate::core::compression::decompress_from_buffer;
use crate::core::integer_coding::{decompress_i32, decompress_u32, encoded_buffer_size_32};
use crate::util::{DecodeConfig, Error, MemoryBudget, Result};

/// Run an integer decode of `count` values with its scratch buffer charged
/// for the duration of the call.
fn with_scratch<T>(
    budget: &mut MemoryBudget,
    what: &str,
    count: usize,
    decode: impl FnOnce() -> Result<Vec<T>>,
) -> Result<Vec<T>> {
    let scratch = encoded_buffer_size_32(count);
    budget.reserve_bytes(what, scratch)?;
    let values = decode();
    budget.release(scratch);
    values
}

/// Read a `u64` compressed size followed by that many bytes of compressed
/// 32-bit integers, decoding `count` of them.
pub(crate) fn read_compressed_u32s(
    r: &mut StreamReader<'_>,
    what: &str,
    count: usize,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<u32>> {
    let count = budget.allocate::<u32>(what, count as u64, config.max_num_indices)?;
    let comp_size = r.read_u64()?;
    let src = r.read_bytes(comp_size)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    with_scratch(budget, what, count, || decompress_u32(src, count))
}

/// Signed variant of [`read_compressed_u32s`].
pub(crate) fn read_compressed_i32s(
    r: &mut StreamReader<'_>,
    what: &str,
    count: usize,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<i32>> {
    let count = budget.allocate::<i32>(what, count as u64, config.max_num_indices)?;
    let comp_size = r.read_u64()?;
    let src = r.read_bytes(comp_size)?;
    if count == 0 {
        return Ok(Vec::new());
    }
    with_scratch(budget, what, count, || decompress_i32(src, count))
}

/// Read the TOKENS section: a block compressed run of NUL terminated names.
pub fn read_tokens(
    r: &mut StreamReader<'_>,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<String>> {
    let count = r.read_u64()?;
    let count = budget.allocate::<String>("tokens", count, config.max_num_tokens)?;
    let uncompressed_size = r.read_u64()?;
    let compressed_size = r.read_u64()?;

    if uncompressed_size < count as u64 {
        return Err(Error::invalid(format!(
            "{count} tokens cannot fit in {uncompressed_size} bytes"
        )));
    }
    let uncompressed_size = usize::try_from(uncompressed_size)
        .map_err(|_| Error::budget(format!("token blob of {uncompressed_size} bytes")))?;
    let blob = r.read_bytes(compressed_size)?;
    // token text never exceeds the blob it is split from
    budget.reserve_bytes("token text", uncompressed_size)?;

    if count == 0 {
        return Ok(Vec::new());
    }
    budget.reserve_bytes("token blob", uncompressed_size)?;
    let chars = decompress_from_buffer(blob, uncompressed_size)?;

    let mut tokens = Vec::with_capacity(count);
    let mut rest = chars.as_slice();
    while tokens.len() < count {
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| Error::invalid(format!("found {} of {count} tokens", tokens.len())))?;
        if end > config.max_token_length {
            return Err(Error::invalid(format!(
                "token {} is {end} bytes long (limit {})",
                tokens.len(),
                config.max_token_length
            )));
        }
        let token = std::str::from_utf8(&rest[..end])
            .map_err(|e| Error::invalid(format!("token {} is not UTF-8: {e}", tokens.len())))?;
        tokens.push(token.to_string());
        rest = &rest[end + 1..];
    }
    if !rest.is_empty() {
        return Err(Error::invalid(format!(
            "{} bytes left after {count} tokens",
            rest.len()
        )));
    }

    drop(chars);
    budget.release(uncompressed_size);

    tracing::debug!(count, "read tokens");
    Ok(tokens)
}

/// Read the STRINGS section: token indices of string values.
pub fn read_strings(
    r: &mut StreamReader<'_>,
    num_tokens: usize,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<TokenIndex>> {
    let count = r.read_u64()?;
    let count = budget.allocate::<TokenIndex>("strings", count, config.max_num_strings)?;
    let raw = r.read_array::<u32>(count)?;

    let strings: Vec<TokenIndex> = raw.into_iter().map(TokenIndex).collect();
    if let Some((i, bad)) = strings.iter().enumerate().find(|(_, t)| t.get() >= num_tokens) {
        return Err(Error::invalid(format!(
            "string {i} references token {} of {num_tokens}",
            bad.0
        )));
    }

    tracing::debug!(count, "read strings");
    Ok(strings)
}

/// Read the FIELDS section: compressed token indices then compressed reps.
pub fn read_fields(
    r: &mut StreamReader<'_>,
    num_tokens: usize,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<Field>> {
    let count = r.read_u64()?;
    let count = budget.check_count("fields", count, config.max_num_fields)?;

    let token_indices = read_compressed_u32s(r, "field tokens", count, config, budget)?;

    let reps_size = r.read_u64()?;
    let reps_blob = r.read_bytes(reps_size)?;
    budget.reserve::<ValueRep>("field reps", count)?;
    let rep_bytes = if count == 0 {
        Vec::new()
    } else {
        decompress_from_buffer(reps_blob, count * 8)?
    };

    budget.reserve::<Field>("fields", count)?;
    let mut fields = Vec::with_capacity(count);
    for (i, (&token, rep)) in token_indices.iter().zip(rep_bytes.chunks_exact(8)).enumerate() {
        if token as usize >= num_tokens {
            return Err(Error::invalid(format!(
                "field {i} references token {token} of {num_tokens}"
            )));
        }
        let mut word = [0u8; 8];
        word.copy_from_slice(rep);
        fields.push(Field {
            token_index: TokenIndex(token),
            value_rep: ValueRep(u64::from_le_bytes(word)),
        });
    }

    tracing::debug!(count, "read fields");
    Ok(fields)
}

/// Read the FIELDSETS section: a flat, sentinel separated list of field
/// indices.
pub fn read_fieldsets(
    r: &mut StreamReader<'_>,
    num_fields: usize,
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<FieldIndex>> {
    let count = r.read_u64()?;
    let count = budget.check_count("fieldsets", count, config.max_num_fieldsets)?;
    let raw = read_compressed_u32s(r, "fieldsets", count, config, budget)?;

    let fieldsets: Vec<FieldIndex> = raw.into_iter().map(FieldIndex).collect();
    for (i, f) in fieldsets.iter().enumerate() {
        if f.is_valid() && f.get() >= num_fields {
            return Err(Error::invalid(format!(
                "fieldset entry {i} references field {} of {num_fields}",
                f.0
            )));
        }
    }

    tracing::debug!(count, "read fieldsets");
    Ok(fieldsets)
}

/// Split the flat fieldset table into groups.
///
/// Each group is keyed by the index of its first entry and covers the range
/// of field indices before its terminator.
pub fn split_fieldsets(fieldsets: &[FieldIndex]) -> Result<Vec<(FieldSetIndex, Range<usize>)>> {
    let mut groups = Vec::new();
    let mut start = 0usize;
    for (i, f) in fieldsets.iter().enumerate() {
        if !f.is_valid() {
            groups.push((FieldSetIndex(start as u32), start..i));
            start = i + 1;
        }
    }
    if start != fieldsets.len() {
        return Err(Error::invalid(format!(
            "{} fieldset entries after the last terminator",
            fieldsets.len() - start
        )));
    }
    Ok(groups)
}

/// Read the SPECS section: three parallel compressed arrays.
pub fn read_specs(
    r: &mut StreamReader<'_>,
    num_paths: usize,
    groups: &[(FieldSetIndex, Range<usize>)],
    config: &DecodeConfig,
    budget: &mut MemoryBudget,
) -> Result<Vec<Spec>> {
    let count = r.read_u64()?;
    let count = budget.check_count("specs", count, config.max_num_specifiers)?;
    if count == 0 {
        return Err(Error::invalid("SPECS section is empty"));
    }

    let paths = read_compressed_u32s(r, "spec paths", count, config, budget)?;
    let fieldsets = read_compressed_u32s(r, "spec fieldsets", count, config, budget)?;
    let types = read_compressed_u32s(r, "spec types", count, config, budget)?;

    budget.reserve::<Spec>("specs", count)?;
    let mut specs = Vec::with_capacity(count);
    for i in 0..count {
        let path_index = PathIndex(paths[i]);
        if path_index.get() >= num_paths {
            return Err(Error::invalid(format!(
                "spec {i} references path {} of {num_paths}",
                path_index.0
            )));
        }
        let fieldset_index = FieldSetIndex(fieldsets[i]);
        if groups.binary_search_by_key(&fieldset_index, |(start, _)| *start).is_err() {
            return Err(Error::invalid(format!(
                "spec {i} references {fieldset_index:?}, which is not a fieldset start"
            )));
        }
        let spec_type = SpecType::from_u32(types[i])
            .ok_or_else(|| Error::invalid(format!("spec {i} has unknown spec type {}", types[i])))?;
        specs.push(Spec { path_index, fieldset_index, spec_type });
    }

    tracing::debug!(count, "read specs");
    Ok(specs)
}
