//! Compressed integer arrays.
//!
//! Integers are delta coded against the previous value (starting at 0). The
//! most common delta is stored once up front; every element then gets a 2-bit
//! code saying whether its delta is the common one or is stored at one of
//! three widths:
//!
//! ```text
//! [common: W bytes][codes: ceil(n / 4) bytes][deltas: variable]
//!
//! code  32-bit ints   64-bit ints
//!  0    common        common
//!  1    i8            i16
//!  2    i16           i32
//!  3    i32           i64
//! ```
//!
//! The encoded buffer is then wrapped by the block compressor.

use std::collections::HashMap;

use super::compression::{compress_to_buffer, decompress_bounded, max_compressed_size};
use crate::util::{Error, Result};

const CODE_COMMON: u8 = 0;
const CODE_SMALL: u8 = 1;
const CODE_MEDIUM: u8 = 2;
const CODE_LARGE: u8 = 3;

#[inline]
fn num_code_bytes(count: usize) -> usize {
    (count * 2).div_ceil(8)
}

/// Size of the uncompressed encoding of `count` 32-bit integers, worst case.
pub fn encoded_buffer_size_32(count: usize) -> usize {
    if count == 0 {
        0
    } else {
        4 + num_code_bytes(count) + count * 4
    }
}

/// Size of the uncompressed encoding of `count` 64-bit integers, worst case.
pub fn encoded_buffer_size_64(count: usize) -> usize {
    if count == 0 {
        0
    } else {
        8 + num_code_bytes(count) + count * 8
    }
}

/// Worst case compressed size for `count` 32-bit integers.
pub fn compressed_buffer_size_32(count: usize) -> usize {
    max_compressed_size(encoded_buffer_size_32(count))
}

/// Worst case compressed size for `count` 64-bit integers.
pub fn compressed_buffer_size_64(count: usize) -> usize {
    max_compressed_size(encoded_buffer_size_64(count))
}

fn take<'a>(vints: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if vints.len() < n {
        return Err(Error::invalid("integer deltas truncated"));
    }
    let (head, tail) = vints.split_at(n);
    *vints = tail;
    Ok(head)
}

macro_rules! int_codec {
    ($encode:ident, $decode:ident, $int:ty, $small:ty, $medium:ty) => {
        /// Delta encode `values` (uncompressed form).
        pub fn $encode(values: &[$int]) -> Vec<u8> {
            if values.is_empty() {
                return Vec::new();
            }

            let mut deltas = Vec::with_capacity(values.len());
            let mut prev: $int = 0;
            for &v in values {
                deltas.push(v.wrapping_sub(prev));
                prev = v;
            }

            // Most frequent delta; ties go to the larger value.
            let mut counts: HashMap<$int, usize> = HashMap::new();
            for &d in &deltas {
                *counts.entry(d).or_default() += 1;
            }
            let mut common: $int = 0;
            let mut common_count = 0usize;
            for (&d, &n) in &counts {
                if n > common_count || (n == common_count && d > common) {
                    common = d;
                    common_count = n;
                }
            }

            let width = std::mem::size_of::<$int>();
            let codes_len = num_code_bytes(values.len());
            let mut out = Vec::with_capacity(width + codes_len + values.len() * width);
            out.extend_from_slice(&common.to_le_bytes());
            out.resize(width + codes_len, 0);

            for (i, &d) in deltas.iter().enumerate() {
                let code = if d == common {
                    CODE_COMMON
                } else if <$small>::try_from(d).is_ok() {
                    out.extend_from_slice(&(d as $small).to_le_bytes());
                    CODE_SMALL
                } else if <$medium>::try_from(d).is_ok() {
                    out.extend_from_slice(&(d as $medium).to_le_bytes());
                    CODE_MEDIUM
                } else {
                    out.extend_from_slice(&d.to_le_bytes());
                    CODE_LARGE
                };
                out[width + i / 4] |= code << ((i % 4) * 2);
            }
            out
        }

        /// Decode `count` integers from their uncompressed delta form.
        pub fn $decode(buf: &[u8], count: usize) -> Result<Vec<$int>> {
            if count == 0 {
                return Ok(Vec::new());
            }

            let width = std::mem::size_of::<$int>();
            let codes_len = num_code_bytes(count);
            if buf.len() < width + codes_len {
                return Err(Error::invalid(format!(
                    "integer block of {} bytes too small for {count} values",
                    buf.len()
                )));
            }

            let common = <$int>::from_le_bytes(
                buf[..width].try_into().map_err(|_| Error::invalid("integer header"))?,
            );
            let codes = &buf[width..width + codes_len];
            let mut vints = &buf[width + codes_len..];

            let mut out = Vec::with_capacity(count);
            let mut prev: $int = 0;
            for i in 0..count {
                let code = (codes[i / 4] >> ((i % 4) * 2)) & 0b11;
                let delta: $int = match code {
                    CODE_COMMON => common,
                    CODE_SMALL => {
                        const N: usize = std::mem::size_of::<$small>();
                        let b = take(&mut vints, N)?;
                        <$small>::from_le_bytes(b.try_into().map_err(|_| Error::invalid("delta"))?) as $int
                    }
                    CODE_MEDIUM => {
                        const N: usize = std::mem::size_of::<$medium>();
                        let b = take(&mut vints, N)?;
                        <$medium>::from_le_bytes(b.try_into().map_err(|_| Error::invalid("delta"))?) as $int
                    }
                    _ => {
                        let b = take(&mut vints, width)?;
                        <$int>::from_le_bytes(b.try_into().map_err(|_| Error::invalid("delta"))?)
                    }
                };
                prev = prev.wrapping_add(delta);
                out.push(prev);
            }
            Ok(out)
        }
    };
}

int_codec!(encode_i32, decode_i32, i32, i8, i16);
int_codec!(encode_i64, decode_i64, i64, i16, i32);

/// Encode and block-compress 32-bit signed integers.
pub fn compress_i32(values: &[i32]) -> Result<Vec<u8>> {
    compress_to_buffer(&encode_i32(values))
}

/// Encode and block-compress 32-bit unsigned integers.
pub fn compress_u32(values: &[u32]) -> Result<Vec<u8>> {
    let signed: Vec<i32> = values.iter().map(|&v| v as i32).collect();
    compress_i32(&signed)
}

/// Encode and block-compress 64-bit signed integers.
pub fn compress_i64(values: &[i64]) -> Result<Vec<u8>> {
    compress_to_buffer(&encode_i64(values))
}

/// Encode and block-compress 64-bit unsigned integers.
pub fn compress_u64(values: &[u64]) -> Result<Vec<u8>> {
    let signed: Vec<i64> = values.iter().map(|&v| v as i64).collect();
    compress_i64(&signed)
}

/// Decompress `count` 32-bit signed integers.
pub fn decompress_i32(src: &[u8], count: usize) -> Result<Vec<i32>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let encoded = decompress_bounded(src, encoded_buffer_size_32(count))?;
    decode_i32(&encoded, count)
}

/// Decompress `count` 32-bit unsigned integers.
pub fn decompress_u32(src: &[u8], count: usize) -> Result<Vec<u32>> {
    Ok(decompress_i32(src, count)?.into_iter().map(|v| v as u32).collect())
}

/// Decompress `count` 64-bit signed integers.
pub fn decompress_i64(src: &[u8], count: usize) -> Result<Vec<i64>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    let encoded = decompress_bounded(src, encoded_buffer_size_64(count))?;
    decode_i64(&encoded, count)
}

/// Decompress `count` 64-bit unsigned integers.
pub fn decompress_u64(src: &[u8], count: usize) -> Result<Vec<u64>> {
    Ok(decompress_i64(src, count)?.into_iter().map(|v| v as u64).collect())
}
