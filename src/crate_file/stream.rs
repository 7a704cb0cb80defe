//! Byte sources and the positioned reader over them.

use std::fs::File;
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use bytemuck::Pod;
#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::util::{f16, Error, Result};

/// Immutable bytes of one Crate file.
/// Supports both memory-mapped and owned buffers.
pub struct CrateBuffer {
    inner: BufferInner,
}

enum BufferInner {
    /// Memory-mapped file (preferred for large files)
    #[cfg(feature = "mmap")]
    Mmap(Mmap),
    /// Bytes held in memory
    Owned(Vec<u8>),
}

impl CrateBuffer {
    /// Open a file, memory mapping it when the `mmap` feature is enabled.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_opts(path, cfg!(feature = "mmap"))
    }

    /// Open a file with optional memory mapping.
    pub fn open_opts(path: impl AsRef<Path>, use_mmap: bool) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;
        let size = file.metadata()?.len();

        if use_mmap && size > 0 {
            if let Some(inner) = Self::map_file(&file)? {
                tracing::debug!(path = %path.display(), size, "mapped crate file");
                return Ok(Self { inner });
            }
        }

        let bytes = std::fs::read(path)?;
        tracing::debug!(path = %path.display(), size, "read crate file");
        Ok(Self::from_vec(bytes))
    }

    #[cfg(feature = "mmap")]
    fn map_file(file: &File) -> Result<Option<BufferInner>> {
        // Safety: the file is opened read-only and only ever read through
        // bounds-checked slices.
        let mmap = unsafe { Mmap::map(file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
        Ok(Some(BufferInner::Mmap(mmap)))
    }

    #[cfg(not(feature = "mmap"))]
    fn map_file(_file: &File) -> Result<Option<BufferInner>> {
        Ok(None)
    }

    /// Wrap bytes already in memory.
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self { inner: BufferInner::Owned(bytes) }
    }

    /// The file contents.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.inner {
            #[cfg(feature = "mmap")]
            BufferInner::Mmap(mmap) => &mmap[..],
            BufferInner::Owned(v) => v.as_slice(),
        }
    }

    /// Size in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check if the buffer is memory mapped.
    pub fn is_mapped(&self) -> bool {
        !matches!(self.inner, BufferInner::Owned(_))
    }
}

/// Byte order of multi-byte reads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Fixed-size values the reader can decode.
pub trait Scalar: Pod {
    /// Decode from exactly `size_of::<Self>()` bytes.
    fn from_bytes(bytes: &[u8], order: Endianness) -> Self;
}

macro_rules! scalar {
    ($t:ty, $read:ident) => {
        impl Scalar for $t {
            #[inline]
            fn from_bytes(bytes: &[u8], order: Endianness) -> Self {
                match order {
                    Endianness::Little => LittleEndian::$read(bytes),
                    Endianness::Big => BigEndian::$read(bytes),
                }
            }
        }
    };
}

scalar!(u16, read_u16);
scalar!(i16, read_i16);
scalar!(u32, read_u32);
scalar!(i32, read_i32);
scalar!(u64, read_u64);
scalar!(i64, read_i64);
scalar!(f32, read_f32);
scalar!(f64, read_f64);

impl Scalar for u8 {
    #[inline]
    fn from_bytes(bytes: &[u8], _order: Endianness) -> Self {
        bytes[0]
    }
}

impl Scalar for i8 {
    #[inline]
    fn from_bytes(bytes: &[u8], _order: Endianness) -> Self {
        bytes[0] as i8
    }
}

impl Scalar for f16 {
    #[inline]
    fn from_bytes(bytes: &[u8], order: Endianness) -> Self {
        f16::from_bits(u16::from_bytes(bytes, order))
    }
}

/// Positioned reader over an immutable byte buffer.
///
/// Every read is bounds checked; nothing is allocated before the bytes it
/// would be filled from are known to exist.
#[derive(Clone)]
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
    order: Endianness,
}

impl<'a> StreamReader<'a> {
    /// Create a little-endian reader at position 0.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, order: Endianness::Little }
    }

    /// Total buffer size.
    #[inline]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Current position.
    #[inline]
    pub fn tell(&self) -> u64 {
        self.pos as u64
    }

    /// Bytes left after the current position.
    #[inline]
    pub fn remaining(&self) -> u64 {
        (self.data.len() - self.pos) as u64
    }

    /// Toggle byte swapping of multi-byte reads.
    pub fn set_swap_endian(&mut self, swap: bool) {
        self.order = if swap { Endianness::Big } else { Endianness::Little };
    }

    /// Check if reads are byte swapped.
    pub fn swap_endian(&self) -> bool {
        self.order == Endianness::Big
    }

    /// Move to an absolute position. Seeking to the end is allowed.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.size() {
            return Err(Error::TruncatedData { pos, need: 0, size: self.size() });
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Move relative to the current position.
    pub fn seek_relative(&mut self, delta: i64) -> Result<()> {
        let target = self
            .tell()
            .checked_add_signed(delta)
            .ok_or_else(|| Error::TruncatedData { pos: self.tell(), need: 0, size: self.size() })?;
        self.seek(target)
    }

    fn ensure(&self, need: u64) -> Result<()> {
        if need > self.remaining() {
            return Err(Error::TruncatedData { pos: self.tell(), need, size: self.size() });
        }
        Ok(())
    }

    /// Read `n` bytes, borrowing from the buffer.
    pub fn read_bytes(&mut self, n: u64) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let start = self.pos;
        self.pos += n as usize;
        Ok(&self.data[start..self.pos])
    }

    /// Read one fixed-size value.
    pub fn read<T: Scalar>(&mut self) -> Result<T> {
        let bytes = self.read_bytes(std::mem::size_of::<T>() as u64)?;
        Ok(T::from_bytes(bytes, self.order))
    }

    /// Read `count` fixed-size values.
    ///
    /// Fails with `TruncatedData` before allocating if the buffer cannot
    /// hold them.
    pub fn read_array<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>> {
        let width = std::mem::size_of::<T>() as u64;
        let need = (count as u64)
            .checked_mul(width)
            .ok_or_else(|| Error::TruncatedData { pos: self.tell(), need: u64::MAX, size: self.size() })?;
        let bytes = self.read_bytes(need)?;

        if self.order == Endianness::Little && cfg!(target_endian = "little") {
            return Ok(bytemuck::pod_collect_to_vec(bytes));
        }
        Ok(bytes
            .chunks_exact(width as usize)
            .map(|b| T::from_bytes(b, self.order))
            .collect())
    }

    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read()
    }

    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read()
    }

    #[inline]
    pub fn read_i32(&mut self) -> Result<i32> {
        self.read()
    }

    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read()
    }

    #[inline]
    pub fn read_i64(&mut self) -> Result<i64> {
        self.read()
    }

    #[inline]
    pub fn read_f16(&mut self) -> Result<f16> {
        self.read()
    }

    #[inline]
    pub fn read_f32(&mut self) -> Result<f32> {
        self.read()
    }

    #[inline]
    pub fn read_f64(&mut self) -> Result<f64> {
        self.read()
    }
}
