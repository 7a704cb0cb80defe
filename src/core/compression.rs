//! Block compression used by Crate sections.
//!
//! Blobs are LZ4 blocks with a one byte chunk header:
//!
//! ```text
//! [0u8][lz4 block]                                  single chunk
//! [n: u8]([size: i32 LE][lz4 block of size]) * n    n chunks
//! ```
//!
//! Each chunk decompresses to at most [`LZ4_MAX_INPUT_SIZE`] bytes.

use crate::util::{Error, Result};

/// Largest input a single LZ4 block can hold.
pub const LZ4_MAX_INPUT_SIZE: usize = 0x7E00_0000;

/// Upper bound of the compressed size for `input_size` bytes.
pub fn max_compressed_size(input_size: usize) -> usize {
    let chunks = input_size.div_ceil(LZ4_MAX_INPUT_SIZE).max(1);
    let per_chunk = lz4_flex::block::get_maximum_output_size(input_size.min(LZ4_MAX_INPUT_SIZE));
    let header = if chunks > 1 { 1 + 4 * chunks } else { 1 };
    header + per_chunk * chunks
}

/// Compress `data` into the chunked block format.
pub fn compress_to_buffer(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() <= LZ4_MAX_INPUT_SIZE {
        let block = lz4_flex::block::compress(data);
        let mut out = Vec::with_capacity(1 + block.len());
        out.push(0);
        out.extend_from_slice(&block);
        return Ok(out);
    }

    let chunks: Vec<&[u8]> = data.chunks(LZ4_MAX_INPUT_SIZE).collect();
    if chunks.len() > 127 {
        return Err(Error::invalid(format!("input of {} bytes needs too many chunks", data.len())));
    }
    let mut out = vec![chunks.len() as u8];
    for chunk in chunks {
        let block = lz4_flex::block::compress(chunk);
        out.extend_from_slice(&(block.len() as i32).to_le_bytes());
        out.extend_from_slice(&block);
    }
    Ok(out)
}

/// Decompress a chunked block buffer into exactly `dst_size` bytes.
///
/// The caller is responsible for having charged `dst_size` against the
/// memory budget; nothing larger than that is ever allocated.
pub fn decompress_from_buffer(src: &[u8], dst_size: usize) -> Result<Vec<u8>> {
    let mut dst = vec![0u8; dst_size];
    let written = decompress_into(src, &mut dst)?;
    if written != dst_size {
        return Err(Error::invalid(format!(
            "decompressed {written} bytes, expected {dst_size}"
        )));
    }
    Ok(dst)
}

/// Decompress into a buffer of at most `max_size` bytes, returning only the
/// bytes actually produced.
pub fn decompress_bounded(src: &[u8], max_size: usize) -> Result<Vec<u8>> {
    let mut dst = vec![0u8; max_size];
    let written = decompress_into(src, &mut dst)?;
    dst.truncate(written);
    Ok(dst)
}

fn decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    let (&num_chunks, mut rest) = src
        .split_first()
        .ok_or_else(|| Error::invalid("empty compressed buffer"))?;

    if num_chunks == 0 {
        return lz4_flex::block::decompress_into(rest, dst)
            .map_err(|e| Error::invalid(format!("lz4: {e}")));
    }

    let mut written = 0usize;
    for i in 0..num_chunks {
        if rest.len() < 4 {
            return Err(Error::invalid(format!("chunk {i} header truncated")));
        }
        let chunk_size = i32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        rest = &rest[4..];
        let chunk_size = usize::try_from(chunk_size)
            .ok()
            .filter(|&s| s <= rest.len())
            .ok_or_else(|| Error::invalid(format!("chunk {i} has bad size {chunk_size}")))?;

        let window = (dst.len() - written).min(LZ4_MAX_INPUT_SIZE);
        let n = lz4_flex::block::decompress_into(&rest[..chunk_size], &mut dst[written..written + window])
            .map_err(|e| Error::invalid(format!("lz4 chunk {i}: {e}")))?;
        written += n;
        rest = &rest[chunk_size..];
    }
    Ok(written)
}
