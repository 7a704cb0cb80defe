//! `ValueRep` to [`CrateValue`] conversion.
//!
//! A rep is either inlined (the value sits in the 48-bit payload) or points
//! at out-of-line data by absolute file offset. Composite values (dictionaries,
//! time samples, generic values) hold further reps through relative offsets;
//! each of those nested unpacks is bounded by `max_value_recursion` and may
//! not revisit a rep location already on the current nesting chain.

use std::collections::BTreeMap;

use bytemuck::Zeroable;
use smallvec::SmallVec;

use super::dictionary::Dictionary;
use super::format::*;
use super::stream::{Scalar, StreamReader};
use super::value::*;
use crate::core::integer_coding::{
    decompress_i32, decompress_i64, decompress_u32, decompress_u64, encoded_buffer_size_32,
    encoded_buffer_size_64,
};
use crate::core::Path;
use crate::util::*;

// ListOp header bits.
const LIST_OP_IS_EXPLICIT: u8 = 1 << 0;
const LIST_OP_HAS_EXPLICIT: u8 = 1 << 1;
const LIST_OP_HAS_ADDED: u8 = 1 << 2;
const LIST_OP_HAS_DELETED: u8 = 1 << 3;
const LIST_OP_HAS_ORDERED: u8 = 1 << 4;
const LIST_OP_HAS_PREPENDED: u8 = 1 << 5;
const LIST_OP_HAS_APPENDED: u8 = 1 << 6;

/// Decoded tables values refer into.
#[derive(Clone, Copy, Debug)]
pub struct UnpackTables<'a> {
    pub version: CrateVersion,
    pub tokens: &'a [String],
    pub strings: &'a [TokenIndex],
    pub paths: &'a [Path],
}

/// Turns reps into values against one file buffer and its decoded tables.
pub struct ValueUnpacker<'a> {
    r: StreamReader<'a>,
    tables: UnpackTables<'a>,
    config: &'a DecodeConfig,
    budget: &'a mut MemoryBudget,
    diag: &'a mut Diagnostics,
    /// Rep locations of the nested unpacks in progress.
    chain: SmallVec<[u64; 16]>,
}

impl<'a> ValueUnpacker<'a> {
    /// Create an unpacker over the whole file `data`.
    pub fn new(
        data: &'a [u8],
        tables: UnpackTables<'a>,
        config: &'a DecodeConfig,
        budget: &'a mut MemoryBudget,
        diag: &'a mut Diagnostics,
    ) -> Self {
        Self {
            r: StreamReader::new(data),
            tables,
            config,
            budget,
            diag,
            chain: SmallVec::new(),
        }
    }

    /// Current stream position.
    pub fn tell(&self) -> u64 {
        self.r.tell()
    }

    /// Move the stream to `pos`.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        self.r.seek(pos)
    }

    /// Unpack a top-level rep. The stream position is unchanged afterwards.
    pub fn unpack(&mut self, rep: ValueRep) -> Result<CrateValue> {
        let saved = self.r.tell();
        let value = self.unpack_rep(rep)?;
        self.r.seek(saved)?;
        Ok(value)
    }

    /// Budget this unpacker charges.
    pub(super) fn budget(&mut self) -> &mut MemoryBudget {
        self.budget
    }

    // ------------------------------------------------------------------
    // Table lookups
    // ------------------------------------------------------------------

    /// Copy of a token, charged against the budget.
    pub(super) fn token(&mut self, index: TokenIndex) -> Result<String> {
        let tokens = self.tables.tokens;
        let token = tokens
            .get(index.get())
            .ok_or_else(|| Error::invalid(format!("{index:?} out of range ({} tokens)", tokens.len())))?;
        self.budget.reserve_bytes("token text", token.len())?;
        Ok(token.clone())
    }

    fn string(&mut self, index: StringIndex) -> Result<String> {
        let token = self
            .tables
            .strings
            .get(index.get())
            .copied()
            .ok_or_else(|| Error::invalid(format!("{index:?} out of range ({} strings)", self.tables.strings.len())))?;
        self.token(token)
    }

    fn path(&mut self, index: PathIndex) -> Result<Path> {
        if !index.is_valid() {
            return Ok(Path::default());
        }
        let paths = self.tables.paths;
        let path = paths
            .get(index.get())
            .ok_or_else(|| Error::invalid(format!("{index:?} out of range ({} paths)", paths.len())))?;
        self.budget.reserve_bytes("path text", path.text_len())?;
        Ok(path.clone())
    }

    fn read_token(&mut self) -> Result<String> {
        let i = self.r.read_u32()?;
        self.token(TokenIndex(i))
    }

    fn read_string(&mut self) -> Result<String> {
        let i = self.r.read_u32()?;
        self.string(StringIndex(i))
    }

    fn read_path(&mut self) -> Result<Path> {
        let i = self.r.read_u32()?;
        self.path(PathIndex(i))
    }

    fn read_fixed<T: Scalar, const N: usize>(&mut self) -> Result<[T; N]> {
        let mut out = [T::zeroed(); N];
        for x in &mut out {
            *x = self.r.read()?;
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    fn unpack_rep(&mut self, rep: ValueRep) -> Result<CrateValue> {
        let ty = rep
            .value_type()
            .filter(|t| *t != ValueType::Invalid)
            .ok_or_else(|| Error::UnknownType(format!("type id {}", rep.type_id())))?;

        if rep.is_inlined() {
            if rep.is_array() || rep.is_compressed() {
                return Err(Error::invalid(format!("{rep:?}: inlined values are never arrays or compressed")));
            }
            return self.unpack_inlined(ty, rep.payload());
        }

        self.r.seek(rep.payload())?;
        if rep.is_array() {
            if !ty.supports_array() {
                return Err(Error::invalid(format!("{ty} values cannot be arrays")));
            }
            return self.read_array_value(ty, rep.is_compressed());
        }
        self.read_scalar_value(ty)
    }

    /// Unpack a rep found at file offset `at` inside another value.
    fn unpack_nested(&mut self, rep: ValueRep, at: u64) -> Result<CrateValue> {
        let depth = self.chain.len() + 1;
        let limit = self.config.max_value_recursion;
        if depth > limit || self.chain.contains(&at) {
            return Err(Error::RecursionLimitExceeded { depth, limit });
        }
        self.chain.push(at);
        let saved = self.r.tell();
        let value = self.unpack_rep(rep);
        self.chain.pop();
        let value = value?;
        self.r.seek(saved)?;
        Ok(value)
    }

    /// Follow an `i64` offset, relative to its own first byte, to a rep.
    ///
    /// Leaves the stream just past the rep and returns it with its location.
    fn read_offset_rep(&mut self) -> Result<(ValueRep, u64)> {
        let target = self.follow_offset()?;
        let rep = ValueRep(self.r.read_u64()?);
        Ok((rep, target))
    }

    fn follow_offset(&mut self) -> Result<u64> {
        let start = self.r.tell();
        let offset = self.r.read_i64()?;
        let target = start
            .checked_add_signed(offset)
            .ok_or_else(|| Error::invalid(format!("relative offset {offset} at {start} underflows")))?;
        self.r.seek(target)?;
        Ok(target)
    }

    // ------------------------------------------------------------------
    // Inlined values
    // ------------------------------------------------------------------

    fn unpack_inlined(&mut self, ty: ValueType, payload: u64) -> Result<CrateValue> {
        use CrateValue as V;

        let bits = payload as u32;
        let b = payload.to_le_bytes().map(|x| x as i8);

        Ok(match ty {
            ValueType::Bool => V::Bool(payload != 0),
            ValueType::UChar => V::UChar(payload as u8),
            ValueType::Int => V::Int(bits as i32),
            ValueType::UInt => V::UInt(bits),
            ValueType::Int64 => V::Int64(bits as i32 as i64),
            ValueType::UInt64 => V::UInt64(bits as u64),
            ValueType::Half => V::Half(f16::from_bits(payload as u16)),
            ValueType::Float => V::Float(f32::from_bits(bits)),
            ValueType::Double => V::Double(f32::from_bits(bits) as f64),
            ValueType::TimeCode => V::TimeCode(f32::from_bits(bits) as f64),
            ValueType::Token => V::Token(self.token(TokenIndex(bits))?),
            ValueType::AssetPath => V::AssetPath(self.token(TokenIndex(bits))?),
            ValueType::String => V::String(self.string(StringIndex(bits))?),
            ValueType::Specifier => V::Specifier(
                Specifier::from_u32(bits).ok_or_else(|| Error::invalid(format!("specifier {bits}")))?,
            ),
            ValueType::Permission => V::Permission(
                Permission::from_u32(bits).ok_or_else(|| Error::invalid(format!("permission {bits}")))?,
            ),
            ValueType::Variability => V::Variability(
                Variability::from_u32(bits).ok_or_else(|| Error::invalid(format!("variability {bits}")))?,
            ),

            ValueType::Vec2h => V::Vec2h([half(b[0]), half(b[1])]),
            ValueType::Vec3h => V::Vec3h([half(b[0]), half(b[1]), half(b[2])]),
            ValueType::Vec4h => V::Vec4h([half(b[0]), half(b[1]), half(b[2]), half(b[3])]),
            ValueType::Vec2f => V::Vec2f(Vec2::new(b[0] as f32, b[1] as f32)),
            ValueType::Vec3f => V::Vec3f(Vec3::new(b[0] as f32, b[1] as f32, b[2] as f32)),
            ValueType::Vec4f => V::Vec4f(Vec4::new(b[0] as f32, b[1] as f32, b[2] as f32, b[3] as f32)),
            ValueType::Vec2d => V::Vec2d(DVec2::new(b[0] as f64, b[1] as f64)),
            ValueType::Vec3d => V::Vec3d(DVec3::new(b[0] as f64, b[1] as f64, b[2] as f64)),
            ValueType::Vec4d => V::Vec4d(DVec4::new(b[0] as f64, b[1] as f64, b[2] as f64, b[3] as f64)),
            ValueType::Vec2i => V::Vec2i(IVec2::new(b[0] as i32, b[1] as i32)),
            ValueType::Vec3i => V::Vec3i(IVec3::new(b[0] as i32, b[1] as i32, b[2] as i32)),
            ValueType::Vec4i => V::Vec4i(IVec4::new(b[0] as i32, b[1] as i32, b[2] as i32, b[3] as i32)),

            // Matrices inline only their diagonal.
            ValueType::Matrix2d => V::Matrix2d(DMat2::from_diagonal(DVec2::new(b[0] as f64, b[1] as f64))),
            ValueType::Matrix3d => {
                V::Matrix3d(DMat3::from_diagonal(DVec3::new(b[0] as f64, b[1] as f64, b[2] as f64)))
            }
            ValueType::Matrix4d => V::Matrix4d(DMat4::from_diagonal(DVec4::new(
                b[0] as f64,
                b[1] as f64,
                b[2] as f64,
                b[3] as f64,
            ))),

            other => return Err(Error::invalid(format!("{other} values cannot be inlined"))),
        })
    }

    // ------------------------------------------------------------------
    // Out-of-line scalars and composites
    // ------------------------------------------------------------------

    fn read_scalar_value(&mut self, ty: ValueType) -> Result<CrateValue> {
        use CrateValue as V;

        Ok(match ty {
            ValueType::Bool => V::Bool(self.r.read_u8()? != 0),
            ValueType::UChar => V::UChar(self.r.read_u8()?),
            ValueType::Int => V::Int(self.r.read_i32()?),
            ValueType::UInt => V::UInt(self.r.read_u32()?),
            ValueType::Int64 => V::Int64(self.r.read_i64()?),
            ValueType::UInt64 => V::UInt64(self.r.read_u64()?),
            ValueType::Half => V::Half(self.r.read_f16()?),
            ValueType::Float => V::Float(self.r.read_f32()?),
            ValueType::Double => V::Double(self.r.read_f64()?),
            ValueType::TimeCode => V::TimeCode(self.r.read_f64()?),
            ValueType::String => V::String(self.read_string()?),
            ValueType::Token => V::Token(self.read_token()?),
            ValueType::AssetPath => V::AssetPath(self.read_token()?),

            ValueType::Vec2h => V::Vec2h(self.read_fixed()?),
            ValueType::Vec3h => V::Vec3h(self.read_fixed()?),
            ValueType::Vec4h => V::Vec4h(self.read_fixed()?),
            ValueType::Vec2f => V::Vec2f(Vec2::from_array(self.read_fixed()?)),
            ValueType::Vec3f => V::Vec3f(Vec3::from_array(self.read_fixed()?)),
            ValueType::Vec4f => V::Vec4f(Vec4::from_array(self.read_fixed()?)),
            ValueType::Vec2d => V::Vec2d(DVec2::from_array(self.read_fixed()?)),
            ValueType::Vec3d => V::Vec3d(DVec3::from_array(self.read_fixed()?)),
            ValueType::Vec4d => V::Vec4d(DVec4::from_array(self.read_fixed()?)),
            ValueType::Vec2i => V::Vec2i(IVec2::from_array(self.read_fixed()?)),
            ValueType::Vec3i => V::Vec3i(IVec3::from_array(self.read_fixed()?)),
            ValueType::Vec4i => V::Vec4i(IVec4::from_array(self.read_fixed()?)),
            ValueType::Matrix2d => V::Matrix2d(dmat2_from_rows(&self.read_fixed()?)),
            ValueType::Matrix3d => V::Matrix3d(dmat3_from_rows(&self.read_fixed()?)),
            ValueType::Matrix4d => V::Matrix4d(dmat4_from_rows(&self.read_fixed()?)),
            ValueType::Quath => {
                let [x, y, z, w] = self.read_fixed::<f16, 4>()?;
                V::Quath(Quath::new([x, y, z], w))
            }
            ValueType::Quatf => V::Quatf(Quat::from_array(self.read_fixed()?)),
            ValueType::Quatd => V::Quatd(DQuat::from_array(self.read_fixed()?)),

            ValueType::Specifier => {
                let code = self.r.read_u32()?;
                V::Specifier(Specifier::from_u32(code).ok_or_else(|| Error::invalid(format!("specifier {code}")))?)
            }
            ValueType::Permission => {
                let code = self.r.read_u32()?;
                V::Permission(Permission::from_u32(code).ok_or_else(|| Error::invalid(format!("permission {code}")))?)
            }
            ValueType::Variability => {
                let code = self.r.read_u32()?;
                V::Variability(
                    Variability::from_u32(code).ok_or_else(|| Error::invalid(format!("variability {code}")))?,
                )
            }

            ValueType::Dictionary => V::Dictionary(self.read_dictionary()?),
            ValueType::TimeSamples => V::TimeSamples(self.read_time_samples()?),
            ValueType::VariantSelectionMap => V::VariantSelectionMap(self.read_variant_selection_map()?),
            ValueType::Payload => V::Payload(self.read_payload()?),

            ValueType::TokenListOp => V::TokenListOp(self.read_list_op(Self::read_token)?),
            ValueType::StringListOp => V::StringListOp(self.read_list_op(Self::read_string)?),
            ValueType::PathListOp => V::PathListOp(self.read_list_op(Self::read_path)?),
            ValueType::ReferenceListOp => V::ReferenceListOp(self.read_list_op(Self::read_reference)?),
            ValueType::PayloadListOp => V::PayloadListOp(self.read_list_op(Self::read_payload)?),
            ValueType::IntListOp => V::IntListOp(self.read_list_op(|u| u.r.read_i32())?),
            ValueType::UIntListOp => V::UIntListOp(self.read_list_op(|u| u.r.read_u32())?),
            ValueType::Int64ListOp => V::Int64ListOp(self.read_list_op(|u| u.r.read_i64())?),
            ValueType::UInt64ListOp => V::UInt64ListOp(self.read_list_op(|u| u.r.read_u64())?),

            ValueType::PathVector => V::PathVector(self.read_vector("path vector", Self::read_path)?),
            ValueType::TokenVector => V::TokenVector(self.read_vector("token vector", Self::read_token)?),
            ValueType::StringVector => V::StringVector(self.read_vector("string vector", Self::read_string)?),
            ValueType::DoubleVector => V::DoubleVector(self.read_vector("double vector", |u| u.r.read_f64())?),
            ValueType::LayerOffsetVector => {
                V::LayerOffsetVector(self.read_vector("layer offset vector", Self::read_layer_offset)?)
            }

            ValueType::ValueBlock => V::ValueBlock,
            ValueType::Value => {
                let (rep, at) = self.read_offset_rep()?;
                self.unpack_nested(rep, at)?
            }
            ValueType::UnregisteredValue => {
                let (rep, at) = self.read_offset_rep()?;
                V::Unregistered(Box::new(self.unpack_nested(rep, at)?))
            }

            ValueType::UnregisteredValueListOp | ValueType::Invalid => {
                return Err(Error::UnknownType(format!("{ty} is not supported")));
            }
        })
    }

    /// `u64` count, capped by `max_array_elements`, then `count` items.
    fn read_vector<T>(&mut self, what: &str, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        let count = self.r.read_u64()?;
        let count = self.budget.allocate::<T>(what, count, self.config.max_array_elements)?;
        let mut out = Vec::with_capacity(count.min(self.r.remaining() as usize));
        for _ in 0..count {
            out.push(item(self)?);
        }
        Ok(out)
    }

    fn read_layer_offset(&mut self) -> Result<LayerOffset> {
        let offset = self.r.read_f64()?;
        let scale = self.r.read_f64()?;
        Ok(LayerOffset { offset, scale })
    }

    fn read_dictionary(&mut self) -> Result<Dictionary> {
        let count = self.r.read_u64()?;
        let count = self
            .budget
            .allocate::<(String, CrateValue)>("dictionary", count, self.config.max_dict_elements)?;

        let mut dict = Dictionary::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let (rep, at) = self.read_offset_rep()?;
            let value = self.unpack_nested(rep, at)?;
            if dict.insert(key.clone(), value).is_some() {
                self.diag.warn(format!("duplicate dictionary key '{key}' overwritten"));
            }
        }
        Ok(dict)
    }

    fn read_variant_selection_map(&mut self) -> Result<BTreeMap<String, String>> {
        let count = self.r.read_u64()?;
        let count = self.budget.allocate::<(String, String)>(
            "variant selections",
            count,
            self.config.max_variants_map_elements,
        )?;

        let mut map = BTreeMap::new();
        for _ in 0..count {
            let set = self.read_string()?;
            let selection = self.read_string()?;
            if map.insert(set.clone(), selection).is_some() {
                self.diag.warn(format!("duplicate variant set '{set}' overwritten"));
            }
        }
        Ok(map)
    }

    fn read_time_samples(&mut self) -> Result<TimeSamples> {
        let (times_rep, times_at) = self.read_offset_rep()?;
        let times = match self.unpack_nested(times_rep, times_at)? {
            CrateValue::DoubleArray(t) | CrateValue::DoubleVector(t) => t,
            other => {
                return Err(Error::invalid(format!(
                    "time samples need double times, found {}",
                    other.type_name()
                )))
            }
        };

        self.follow_offset()?;
        let count = self.r.read_u64()?;
        let count = self
            .budget
            .allocate::<ValueRep>("time sample reps", count, self.config.max_array_elements)?;
        if count != times.len() {
            return Err(Error::invalid(format!(
                "{count} time sample values for {} times",
                times.len()
            )));
        }
        let reps_at = self.r.tell();
        let reps = self.r.read_array::<u64>(count)?;

        self.budget.reserve::<CrateValue>("time sample values", count)?;
        let mut values = Vec::with_capacity(count);
        for (i, rep) in reps.into_iter().enumerate() {
            values.push(self.unpack_nested(ValueRep(rep), reps_at + 8 * i as u64)?);
        }
        Ok(TimeSamples { times, values })
    }

    fn read_reference(&mut self) -> Result<Reference> {
        let asset_path = self.read_string()?;
        let prim_path = self.read_path()?;
        let layer_offset = self.read_layer_offset()?;
        let custom_data = self.read_dictionary()?;
        Ok(Reference { asset_path, prim_path, layer_offset, custom_data })
    }

    fn read_payload(&mut self) -> Result<Payload> {
        let asset_path = self.read_string()?;
        let prim_path = self.read_path()?;
        let layer_offset = if self.tables.version.has_payload_layer_offset() {
            Some(self.read_layer_offset()?)
        } else {
            None
        };
        Ok(Payload { asset_path, prim_path, layer_offset })
    }

    fn read_list_op<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<ListOp<T>> {
        let header = self.r.read_u8()?;
        let mut op = ListOp {
            is_explicit: header & LIST_OP_IS_EXPLICIT != 0,
            ..ListOp::default()
        };
        if header & LIST_OP_HAS_EXPLICIT != 0 {
            op.explicit_items = self.read_vector("list op items", &mut item)?;
        }
        if header & LIST_OP_HAS_ADDED != 0 {
            op.added_items = self.read_vector("list op items", &mut item)?;
        }
        if header & LIST_OP_HAS_PREPENDED != 0 {
            op.prepended_items = self.read_vector("list op items", &mut item)?;
        }
        if header & LIST_OP_HAS_APPENDED != 0 {
            op.appended_items = self.read_vector("list op items", &mut item)?;
        }
        if header & LIST_OP_HAS_DELETED != 0 {
            op.deleted_items = self.read_vector("list op items", &mut item)?;
        }
        if header & LIST_OP_HAS_ORDERED != 0 {
            op.ordered_items = self.read_vector("list op items", &mut item)?;
        }
        Ok(op)
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    fn read_array_count(&mut self) -> Result<usize> {
        if self.tables.version.has_legacy_array_rank() {
            // rank, always 1
            self.r.read_u32()?;
        }
        let count = if self.tables.version.has_u64_array_counts() {
            self.r.read_u64()?
        } else {
            self.r.read_u32()? as u64
        };
        self.budget.check_count("array", count, self.config.max_array_elements)
    }

    fn read_raw<T: Scalar>(&mut self, count: usize) -> Result<Vec<T>> {
        self.budget.reserve::<T>("array", count)?;
        self.r.read_array(count)
    }

    fn read_tuples<T: Scalar, const N: usize>(&mut self, count: usize) -> Result<Vec<[T; N]>> {
        self.budget.reserve::<[T; N]>("array", count)?;
        let total = count
            .checked_mul(N)
            .ok_or_else(|| Error::budget(format!("array of {count} x {N} overflows")))?;
        let flat = self.r.read_array::<T>(total)?;
        Ok(flat
            .chunks_exact(N)
            .map(|c| {
                let mut a = [T::zeroed(); N];
                a.copy_from_slice(c);
                a
            })
            .collect())
    }

    /// `u64` compressed size then integer-coded data of `count` values.
    fn read_compressed<T>(
        &mut self,
        count: usize,
        decode: fn(&[u8], usize) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        let scratch = if std::mem::size_of::<T>() == 8 {
            encoded_buffer_size_64(count)
        } else {
            encoded_buffer_size_32(count)
        };
        let comp_size = self.r.read_u64()?;
        let src = self.r.read_bytes(comp_size)?;
        self.budget.reserve_bytes("integer scratch", scratch)?;
        let values = decode(src, count);
        self.budget.release(scratch);
        values
    }

    fn read_int_array<T: Scalar>(
        &mut self,
        count: usize,
        compressed: bool,
        decode: fn(&[u8], usize) -> Result<Vec<T>>,
    ) -> Result<Vec<T>> {
        if compressed && count >= MIN_COMPRESSED_ARRAY_SIZE {
            self.budget.reserve::<T>("array", count)?;
            return self.read_compressed(count, decode);
        }
        self.read_raw(count)
    }

    fn read_float_array<T: Scalar>(
        &mut self,
        count: usize,
        compressed: bool,
        from_int: fn(i32) -> T,
    ) -> Result<Vec<T>> {
        if !(compressed && count >= MIN_COMPRESSED_ARRAY_SIZE) {
            return self.read_raw(count);
        }
        self.budget.reserve::<T>("array", count)?;

        match self.r.read_u8()? {
            b'i' => {
                let ints = self.read_compressed(count, decompress_i32)?;
                Ok(ints.into_iter().map(from_int).collect())
            }
            b't' => {
                let lut_size = self.r.read_u32()?;
                let lut_size = self.budget.allocate::<T>("float table", lut_size as u64, count)?;
                let lut = self.r.read_array::<T>(lut_size)?;
                let indexes = self.read_compressed(count, decompress_u32)?;
                indexes
                    .into_iter()
                    .map(|i| {
                        lut.get(i as usize).copied().ok_or_else(|| {
                            Error::invalid(format!("float table index {i} out of range ({lut_size})"))
                        })
                    })
                    .collect()
            }
            code => Err(Error::invalid(format!("unknown float array code {code:#04x}"))),
        }
    }

    fn read_array_value(&mut self, ty: ValueType, compressed: bool) -> Result<CrateValue> {
        use CrateValue as V;

        let compressed = compressed && !self.tables.version.has_legacy_array_rank();
        let count = self.read_array_count()?;

        Ok(match ty {
            ValueType::Bool => V::BoolArray(self.read_raw::<u8>(count)?.into_iter().map(|b| b != 0).collect()),
            ValueType::UChar => V::UCharArray(self.read_raw(count)?),
            ValueType::Int => V::IntArray(self.read_int_array(count, compressed, decompress_i32)?),
            ValueType::UInt => V::UIntArray(self.read_int_array(count, compressed, decompress_u32)?),
            ValueType::Int64 => V::Int64Array(self.read_int_array(count, compressed, decompress_i64)?),
            ValueType::UInt64 => V::UInt64Array(self.read_int_array(count, compressed, decompress_u64)?),
            ValueType::Half => V::HalfArray(self.read_float_array(count, compressed, |i| f16::from_f32(i as f32))?),
            ValueType::Float => V::FloatArray(self.read_float_array(count, compressed, |i| i as f32)?),
            ValueType::Double => V::DoubleArray(self.read_float_array(count, compressed, |i| i as f64)?),
            ValueType::TimeCode => V::TimeCodeArray(self.read_raw(count)?),

            ValueType::String | ValueType::Token | ValueType::AssetPath => {
                self.budget.reserve::<String>("array", count)?;
                let indices = self.r.read_array::<u32>(count)?;
                let mut out = Vec::with_capacity(count);
                for i in indices {
                    out.push(match ty {
                        ValueType::String => self.string(StringIndex(i))?,
                        _ => self.token(TokenIndex(i))?,
                    });
                }
                match ty {
                    ValueType::String => V::StringArray(out),
                    ValueType::Token => V::TokenArray(out),
                    _ => V::AssetPathArray(out),
                }
            }

            ValueType::Vec2h => V::Vec2hArray(self.read_tuples(count)?),
            ValueType::Vec3h => V::Vec3hArray(self.read_tuples(count)?),
            ValueType::Vec4h => V::Vec4hArray(self.read_tuples(count)?),
            ValueType::Vec2f => V::Vec2fArray(self.read_tuples::<f32, 2>(count)?.into_iter().map(Vec2::from_array).collect()),
            ValueType::Vec3f => V::Vec3fArray(self.read_tuples::<f32, 3>(count)?.into_iter().map(Vec3::from_array).collect()),
            ValueType::Vec4f => V::Vec4fArray(self.read_tuples::<f32, 4>(count)?.into_iter().map(Vec4::from_array).collect()),
            ValueType::Vec2d => V::Vec2dArray(self.read_tuples::<f64, 2>(count)?.into_iter().map(DVec2::from_array).collect()),
            ValueType::Vec3d => V::Vec3dArray(self.read_tuples::<f64, 3>(count)?.into_iter().map(DVec3::from_array).collect()),
            ValueType::Vec4d => V::Vec4dArray(self.read_tuples::<f64, 4>(count)?.into_iter().map(DVec4::from_array).collect()),
            ValueType::Vec2i => V::Vec2iArray(self.read_tuples::<i32, 2>(count)?.into_iter().map(IVec2::from_array).collect()),
            ValueType::Vec3i => V::Vec3iArray(self.read_tuples::<i32, 3>(count)?.into_iter().map(IVec3::from_array).collect()),
            ValueType::Vec4i => V::Vec4iArray(self.read_tuples::<i32, 4>(count)?.into_iter().map(IVec4::from_array).collect()),
            ValueType::Matrix2d => {
                V::Matrix2dArray(self.read_tuples::<f64, 4>(count)?.iter().map(dmat2_from_rows).collect())
            }
            ValueType::Matrix3d => {
                V::Matrix3dArray(self.read_tuples::<f64, 9>(count)?.iter().map(dmat3_from_rows).collect())
            }
            ValueType::Matrix4d => {
                V::Matrix4dArray(self.read_tuples::<f64, 16>(count)?.iter().map(dmat4_from_rows).collect())
            }
            ValueType::Quath => V::QuathArray(
                self.read_tuples::<f16, 4>(count)?
                    .into_iter()
                    .map(|[x, y, z, w]| Quath::new([x, y, z], w))
                    .collect(),
            ),
            ValueType::Quatf => V::QuatfArray(self.read_tuples::<f32, 4>(count)?.into_iter().map(Quat::from_array).collect()),
            ValueType::Quatd => V::QuatdArray(self.read_tuples::<f64, 4>(count)?.into_iter().map(DQuat::from_array).collect()),

            other => return Err(Error::invalid(format!("{other} values cannot be arrays"))),
        })
    }
}

#[inline]
fn half(v: i8) -> f16 {
    f16::from_f32(v as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::integer_coding::compress_i32;

    struct Fixture {
        tokens: Vec<String>,
        strings: Vec<TokenIndex>,
        paths: Vec<Path>,
        config: DecodeConfig,
        budget: MemoryBudget,
        diag: Diagnostics,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tokens: ["", "a", "b", "hello"].iter().map(|s| s.to_string()).collect(),
                strings: vec![TokenIndex(3), TokenIndex(1), TokenIndex(2)],
                paths: vec![Path::absolute_root(), Path::new("/World", "")],
                config: DecodeConfig::default(),
                budget: MemoryBudget::new(1 << 20),
                diag: Diagnostics::new(),
            }
        }

        fn unpacker<'a>(&'a mut self, data: &'a [u8], version: CrateVersion) -> ValueUnpacker<'a> {
            let tables = UnpackTables {
                version,
                tokens: &self.tokens,
                strings: &self.strings,
                paths: &self.paths,
            };
            ValueUnpacker::new(data, tables, &self.config, &mut self.budget, &mut self.diag)
        }
    }

    const V08: CrateVersion = CrateVersion::new(0, 8, 0);

    fn inline(ty: ValueType, payload: u64) -> ValueRep {
        ValueRep::new(ty as u8, false, true, false, payload)
    }

    fn at(ty: ValueType, offset: u64) -> ValueRep {
        ValueRep::new(ty as u8, false, false, false, offset)
    }

    fn array_at(ty: ValueType, offset: u64, compressed: bool) -> ValueRep {
        ValueRep::new(ty as u8, true, false, compressed, offset)
    }

    #[test]
    fn test_inlined_scalars() {
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&[], V08);
        assert_eq!(u.unpack(inline(ValueType::Bool, 1)).unwrap(), CrateValue::Bool(true));
        assert_eq!(u.unpack(inline(ValueType::Int, (-5i32) as u32 as u64)).unwrap(), CrateValue::Int(-5));
        assert_eq!(
            u.unpack(inline(ValueType::Int64, 0xFFFF_FFFF)).unwrap(),
            CrateValue::Int64(-1)
        );
        assert_eq!(
            u.unpack(inline(ValueType::UInt64, 0xFFFF_FFFF)).unwrap(),
            CrateValue::UInt64(0xFFFF_FFFF)
        );
        assert_eq!(
            u.unpack(inline(ValueType::Double, 2.5f32.to_bits() as u64)).unwrap(),
            CrateValue::Double(2.5)
        );
        assert_eq!(
            u.unpack(inline(ValueType::Half, f16::from_f32(1.5).to_bits() as u64)).unwrap(),
            CrateValue::Half(f16::from_f32(1.5))
        );
        assert_eq!(u.unpack(inline(ValueType::Token, 3)).unwrap(), CrateValue::Token("hello".into()));
        assert_eq!(u.unpack(inline(ValueType::String, 1)).unwrap(), CrateValue::String("a".into()));
        assert_eq!(
            u.unpack(inline(ValueType::Specifier, 2)).unwrap(),
            CrateValue::Specifier(Specifier::Class)
        );
    }

    #[test]
    fn test_inlined_vectors_and_matrices() {
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&[], V08);
        let payload = u64::from_le_bytes([1, 0xFF, 3, 0, 0, 0, 0, 0]);
        assert_eq!(
            u.unpack(inline(ValueType::Vec3f, payload)).unwrap(),
            CrateValue::Vec3f(Vec3::new(1.0, -1.0, 3.0))
        );
        assert_eq!(
            u.unpack(inline(ValueType::Vec2i, payload)).unwrap(),
            CrateValue::Vec2i(IVec2::new(1, -1))
        );
        let diag = u64::from_le_bytes([1, 1, 1, 1, 0, 0, 0, 0]);
        assert_eq!(
            u.unpack(inline(ValueType::Matrix4d, diag)).unwrap(),
            CrateValue::Matrix4d(DMat4::IDENTITY)
        );
    }

    #[test]
    fn test_inline_errors() {
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&[], V08);
        for ty in [ValueType::Dictionary, ValueType::ValueBlock, ValueType::Quatf, ValueType::Quath] {
            assert!(matches!(u.unpack(inline(ty, 0)), Err(Error::InvalidEncoding(_))), "{ty}");
        }
        let bad = ValueRep::new(ValueType::Int as u8, true, true, false, 0);
        assert!(matches!(u.unpack(bad), Err(Error::InvalidEncoding(_))));
        let bad = ValueRep::new(ValueType::Int as u8, false, true, true, 0);
        assert!(matches!(u.unpack(bad), Err(Error::InvalidEncoding(_))));
        assert!(matches!(u.unpack(inline(ValueType::Token, 99)), Err(Error::InvalidEncoding(_))));
    }

    #[test]
    fn test_unknown_type() {
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&[], V08);
        assert!(matches!(u.unpack(ValueRep::new(200, false, true, false, 0)), Err(Error::UnknownType(_))));
        assert!(matches!(u.unpack(ValueRep::new(0, false, true, false, 0)), Err(Error::UnknownType(_))));
    }

    #[test]
    fn test_out_of_line_scalars() {
        let mut data = vec![0u8; 8];
        data.extend_from_slice(&1.25f64.to_le_bytes()); // 8
        for v in [0.0f32, 0.0, 0.0, 1.0] {
            data.extend_from_slice(&v.to_le_bytes()); // 16
        }
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        assert_eq!(u.unpack(at(ValueType::Double, 8)).unwrap(), CrateValue::Double(1.25));
        assert_eq!(u.unpack(at(ValueType::Quatf, 16)).unwrap(), CrateValue::Quatf(Quat::IDENTITY));
        assert!(matches!(u.unpack(at(ValueType::Double, 28)), Err(Error::TruncatedData { .. })));
    }

    #[test]
    fn test_raw_and_compressed_int_arrays() {
        let values: Vec<i32> = (0..20).map(|i| i * 3 - 7).collect();
        let mut data = Vec::new();
        // raw, short
        data.extend_from_slice(&3u64.to_le_bytes());
        for v in [4i32, 5, 6] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let compressed_at = data.len() as u64;
        let packed = compress_i32(&values).unwrap();
        data.extend_from_slice(&(values.len() as u64).to_le_bytes());
        data.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        data.extend_from_slice(&packed);

        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        assert_eq!(u.unpack(array_at(ValueType::Int, 0, true)).unwrap(), CrateValue::IntArray(vec![4, 5, 6]));
        assert_eq!(
            u.unpack(array_at(ValueType::Int, compressed_at, true)).unwrap(),
            CrateValue::IntArray(values)
        );
    }

    #[test]
    fn test_legacy_u32_array_count() {
        let mut data = 2u32.to_le_bytes().to_vec();
        data.extend_from_slice(&1.0f32.to_le_bytes());
        data.extend_from_slice(&2.0f32.to_le_bytes());
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, CrateVersion::new(0, 6, 0));
        assert_eq!(
            u.unpack(array_at(ValueType::Float, 0, false)).unwrap(),
            CrateValue::FloatArray(vec![1.0, 2.0])
        );
    }

    #[test]
    fn test_compressed_float_arrays() {
        let ints: Vec<i32> = (0..16).collect();
        let packed = compress_i32(&ints).unwrap();
        let mut data = 16u64.to_le_bytes().to_vec();
        data.push(b'i');
        data.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        data.extend_from_slice(&packed);

        let lut_at = data.len() as u64;
        let indexes: Vec<u32> = (0..16).map(|i| i % 2).collect();
        let packed = crate::core::integer_coding::compress_u32(&indexes).unwrap();
        data.extend_from_slice(&16u64.to_le_bytes());
        data.push(b't');
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&0.5f32.to_le_bytes());
        data.extend_from_slice(&(-0.5f32).to_le_bytes());
        data.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        data.extend_from_slice(&packed);

        let bad_at = data.len() as u64;
        data.extend_from_slice(&16u64.to_le_bytes());
        data.push(b'x');

        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        let expected: Vec<f32> = (0..16).map(|i| i as f32).collect();
        assert_eq!(u.unpack(array_at(ValueType::Float, 0, true)).unwrap(), CrateValue::FloatArray(expected));
        let expected: Vec<f32> = (0..16).map(|i| if i % 2 == 0 { 0.5 } else { -0.5 }).collect();
        assert_eq!(u.unpack(array_at(ValueType::Float, lut_at, true)).unwrap(), CrateValue::FloatArray(expected));
        assert!(matches!(u.unpack(array_at(ValueType::Float, bad_at, true)), Err(Error::InvalidEncoding(_))));
    }

    #[test]
    fn test_array_limits() {
        let data = (1u64 << 40).to_le_bytes().to_vec();
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        assert!(matches!(u.unpack(array_at(ValueType::Double, 0, false)), Err(Error::BudgetExceeded(_))));

        let mut fx = Fixture::new();
        fx.config.max_array_elements = 4;
        let data = 5u64.to_le_bytes().to_vec();
        let mut u = fx.unpacker(&data, V08);
        assert!(matches!(u.unpack(array_at(ValueType::Int, 0, false)), Err(Error::BudgetExceeded(_))));
    }

    #[test]
    fn test_token_array() {
        let mut data = 3u64.to_le_bytes().to_vec();
        for i in [1u32, 2, 3] {
            data.extend_from_slice(&i.to_le_bytes());
        }
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        assert_eq!(
            u.unpack(array_at(ValueType::Token, 0, false)).unwrap(),
            CrateValue::TokenArray(vec!["a".into(), "b".into(), "hello".into()])
        );
        assert_eq!(
            u.unpack(array_at(ValueType::String, 0, false)).unwrap_err().kind(),
            "InvalidEncoding"
        );
    }

    #[test]
    fn test_token_text_is_charged() {
        let mut data = 1000u64.to_le_bytes().to_vec();
        for _ in 0..1000 {
            data.extend_from_slice(&4u32.to_le_bytes());
        }
        let mut fx = Fixture::new();
        fx.tokens.push("x".repeat(4000));
        fx.budget = MemoryBudget::new(64 * 1024);
        let mut u = fx.unpacker(&data, V08);
        assert!(matches!(u.unpack(array_at(ValueType::Token, 0, false)), Err(Error::BudgetExceeded(_))));

        // the same array fits once the text is paid for
        let mut fx = Fixture::new();
        fx.tokens.push("x".repeat(4000));
        fx.budget = MemoryBudget::new(8 << 20);
        let value = fx.unpacker(&data, V08).unpack(array_at(ValueType::Token, 0, false)).unwrap();
        let CrateValue::TokenArray(tokens) = value else {
            panic!("not a token array");
        };
        assert_eq!(tokens.len(), 1000);
        assert!(fx.budget.used() >= 4_000_000);
    }

    #[test]
    fn test_int_array_scratch_is_charged() {
        let values: Vec<i32> = (0..200).collect();
        let packed = compress_i32(&values).unwrap();
        let mut data = 200u64.to_le_bytes().to_vec();
        data.extend_from_slice(&(packed.len() as u64).to_le_bytes());
        data.extend_from_slice(&packed);

        // 800 output bytes fit, the decode scratch on top does not
        let mut fx = Fixture::new();
        fx.budget = MemoryBudget::new(1024);
        let mut u = fx.unpacker(&data, V08);
        assert!(matches!(u.unpack(array_at(ValueType::Int, 0, true)), Err(Error::BudgetExceeded(_))));

        let mut fx = Fixture::new();
        fx.budget = MemoryBudget::new(2048);
        let value = fx.unpacker(&data, V08).unpack(array_at(ValueType::Int, 0, true)).unwrap();
        assert_eq!(value, CrateValue::IntArray(values));
        assert_eq!(fx.budget.used(), 800);
    }

    /// Dictionary {"hello": 7, "a": {"b": 1.5}} laid out the way writers
    /// emit it: key, offset, value data, rep.
    fn dictionary_bytes() -> Vec<u8> {
        let mut d = vec![0u8; 4];
        d.extend_from_slice(&2u64.to_le_bytes()); // 4
        // entry 0: key string 0 ("hello"), offset 8 -> rep right after
        d.extend_from_slice(&0u32.to_le_bytes()); // 12
        d.extend_from_slice(&8i64.to_le_bytes()); // 16
        d.extend_from_slice(&inline(ValueType::Int, 7).0.to_le_bytes()); // 24
        // entry 1: key string 1 ("a"), nested dictionary at 52
        d.extend_from_slice(&1u32.to_le_bytes()); // 32
        d.extend_from_slice(&8i64.to_le_bytes()); // 36
        d.extend_from_slice(&at(ValueType::Dictionary, 52).0.to_le_bytes()); // 44
        d.extend_from_slice(&1u64.to_le_bytes()); // 52
        d.extend_from_slice(&2u32.to_le_bytes()); // 60
        d.extend_from_slice(&8i64.to_le_bytes()); // 64
        d.extend_from_slice(&at(ValueType::Double, 80).0.to_le_bytes()); // 72
        d.extend_from_slice(&1.5f64.to_le_bytes()); // 80
        d
    }

    #[test]
    fn test_dictionary() {
        let data = dictionary_bytes();
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        u.seek(2).unwrap();
        let value = u.unpack(at(ValueType::Dictionary, 4)).unwrap();
        assert_eq!(u.tell(), 2);

        let dict = value.as_dictionary().unwrap();
        assert_eq!(dict.keys().collect::<Vec<_>>(), ["hello", "a"]);
        assert_eq!(dict.get("hello"), Some(&CrateValue::Int(7)));
        let inner = dict.get("a").and_then(|v| v.as_dictionary()).unwrap();
        assert_eq!(inner.get("b"), Some(&CrateValue::Double(1.5)));

        // same rep twice gives the same value
        assert_eq!(u.unpack(at(ValueType::Dictionary, 4)).unwrap(), value);
    }

    #[test]
    fn test_dictionary_duplicate_key_warns() {
        let mut d = 2u64.to_le_bytes().to_vec();
        for v in [1u64, 2] {
            d.extend_from_slice(&1u32.to_le_bytes());
            d.extend_from_slice(&8i64.to_le_bytes());
            d.extend_from_slice(&inline(ValueType::UInt, v).0.to_le_bytes());
        }
        let mut fx = Fixture::new();
        let value = fx.unpacker(&d, V08).unpack(at(ValueType::Dictionary, 0)).unwrap();
        assert_eq!(value.as_dictionary().unwrap().get("a"), Some(&CrateValue::UInt(2)));
        assert_eq!(fx.diag.warnings().len(), 1);
    }

    #[test]
    fn test_dictionary_limit() {
        let d = 300u64.to_le_bytes().to_vec();
        let mut fx = Fixture::new();
        let err = fx.unpacker(&d, V08).unpack(at(ValueType::Dictionary, 0)).unwrap_err();
        assert!(matches!(err, Error::BudgetExceeded(_)));
    }

    fn time_samples_bytes(num_values: u64) -> Vec<u8> {
        let mut d = Vec::new();
        // times rep right after its offset; values offset follows the rep
        d.extend_from_slice(&8i64.to_le_bytes()); // 0
        d.extend_from_slice(&array_at(ValueType::Double, 24, false).0.to_le_bytes()); // 8
        d.extend_from_slice(&32i64.to_le_bytes()); // 16 -> 48
        d.extend_from_slice(&2u64.to_le_bytes()); // 24
        d.extend_from_slice(&1.0f64.to_le_bytes()); // 32
        d.extend_from_slice(&2.0f64.to_le_bytes()); // 40
        d.extend_from_slice(&num_values.to_le_bytes()); // 48
        d.extend_from_slice(&inline(ValueType::Float, 0.5f32.to_bits() as u64).0.to_le_bytes());
        d.extend_from_slice(&at(ValueType::ValueBlock, 0).0.to_le_bytes());
        d
    }

    #[test]
    fn test_time_samples() {
        let data = time_samples_bytes(2);
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&data, V08);
        let value = u.unpack(at(ValueType::TimeSamples, 0)).unwrap();
        assert_eq!(u.tell(), 0);
        let ts = value.as_time_samples().unwrap();
        assert_eq!(ts.times, [1.0, 2.0]);
        assert_eq!(ts.values, [CrateValue::Float(0.5), CrateValue::ValueBlock]);
        assert_eq!(u.unpack(at(ValueType::TimeSamples, 0)).unwrap(), value);
    }

    #[test]
    fn test_time_samples_count_mismatch() {
        let data = time_samples_bytes(3);
        let mut fx = Fixture::new();
        let err = fx.unpacker(&data, V08).unpack(at(ValueType::TimeSamples, 0)).unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }

    #[test]
    fn test_self_referencing_value() {
        // VALUE at 0: offset 8 -> rep at 8, which is VALUE pointing back at 0
        let mut d = 8i64.to_le_bytes().to_vec();
        d.extend_from_slice(&at(ValueType::Value, 0).0.to_le_bytes());
        let mut fx = Fixture::new();
        let err = fx.unpacker(&d, V08).unpack(at(ValueType::Value, 0)).unwrap_err();
        assert!(matches!(err, Error::RecursionLimitExceeded { .. }));
    }

    #[test]
    fn test_value_chain_depth() {
        // a chain of VALUEs, each pointing at the next, ending in an int
        let links = 20u64;
        let mut d = Vec::new();
        for i in 0..links {
            let next = 16 * (i + 1);
            d.extend_from_slice(&8i64.to_le_bytes());
            d.extend_from_slice(&at(ValueType::Value, next).0.to_le_bytes());
        }
        d.extend_from_slice(&8i64.to_le_bytes());
        d.extend_from_slice(&inline(ValueType::Int, 42).0.to_le_bytes());

        let mut fx = Fixture::new();
        let err = fx.unpacker(&d, V08).unpack(at(ValueType::Value, 0)).unwrap_err();
        assert!(matches!(err, Error::RecursionLimitExceeded { limit: 16, .. }));

        let mut fx = Fixture::new();
        fx.config.max_value_recursion = 32;
        assert_eq!(fx.unpacker(&d, V08).unpack(at(ValueType::Value, 0)).unwrap(), CrateValue::Int(42));
    }

    #[test]
    fn test_list_ops() {
        let mut d = vec![LIST_OP_HAS_PREPENDED | LIST_OP_HAS_DELETED];
        // prepended comes before deleted
        d.extend_from_slice(&2u64.to_le_bytes());
        d.extend_from_slice(&1u32.to_le_bytes());
        d.extend_from_slice(&3u32.to_le_bytes());
        d.extend_from_slice(&1u64.to_le_bytes());
        d.extend_from_slice(&2u32.to_le_bytes());

        let mut fx = Fixture::new();
        let value = fx.unpacker(&d, V08).unpack(at(ValueType::TokenListOp, 0)).unwrap();
        let CrateValue::TokenListOp(op) = value else { panic!("not a token list op") };
        assert!(!op.is_explicit);
        assert_eq!(op.prepended_items, ["a", "hello"]);
        assert_eq!(op.deleted_items, ["b"]);
        assert!(op.added_items.is_empty());

        let mut d = vec![LIST_OP_IS_EXPLICIT | LIST_OP_HAS_EXPLICIT];
        d.extend_from_slice(&1u64.to_le_bytes());
        d.extend_from_slice(&(-4i64).to_le_bytes());
        let value = fx.unpacker(&d, V08).unpack(at(ValueType::Int64ListOp, 0)).unwrap();
        let CrateValue::Int64ListOp(op) = value else { panic!("not an int64 list op") };
        assert!(op.is_explicit);
        assert_eq!(op.explicit_items, [-4]);
    }

    #[test]
    fn test_reference_and_payload() {
        let mut d = vec![LIST_OP_HAS_APPENDED];
        d.extend_from_slice(&1u64.to_le_bytes());
        d.extend_from_slice(&0u32.to_le_bytes()); // asset "hello"
        d.extend_from_slice(&1u32.to_le_bytes()); // </World>
        d.extend_from_slice(&10.0f64.to_le_bytes());
        d.extend_from_slice(&2.0f64.to_le_bytes());
        d.extend_from_slice(&0u64.to_le_bytes()); // empty custom data

        let payload_at = d.len() as u64;
        d.extend_from_slice(&2u32.to_le_bytes()); // asset "b"
        d.extend_from_slice(&u32::MAX.to_le_bytes()); // no prim path
        d.extend_from_slice(&0.0f64.to_le_bytes());
        d.extend_from_slice(&1.0f64.to_le_bytes());

        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&d, V08);
        let CrateValue::ReferenceListOp(op) = u.unpack(at(ValueType::ReferenceListOp, 0)).unwrap() else {
            panic!("not a reference list op")
        };
        let r = &op.appended_items[0];
        assert_eq!(r.asset_path, "hello");
        assert_eq!(r.prim_path.to_string(), "/World");
        assert_eq!(r.layer_offset, LayerOffset { offset: 10.0, scale: 2.0 });
        assert!(r.custom_data.is_empty());

        let CrateValue::Payload(p) = u.unpack(at(ValueType::Payload, payload_at)).unwrap() else {
            panic!("not a payload")
        };
        assert_eq!(p.asset_path, "b");
        assert!(p.prim_path.is_empty());
        assert_eq!(p.layer_offset, Some(LayerOffset::default()));

        // before 0.8.0 payloads have no layer offset
        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&d, CrateVersion::new(0, 7, 0));
        let CrateValue::Payload(p) = u.unpack(at(ValueType::Payload, payload_at)).unwrap() else {
            panic!("not a payload")
        };
        assert_eq!(p.layer_offset, None);
    }

    #[test]
    fn test_vectors_and_variant_map() {
        let mut d = 2u64.to_le_bytes().to_vec();
        d.extend_from_slice(&0.5f64.to_le_bytes());
        d.extend_from_slice(&1.5f64.to_le_bytes());
        let map_at = d.len() as u64;
        d.extend_from_slice(&1u64.to_le_bytes());
        d.extend_from_slice(&1u32.to_le_bytes());
        d.extend_from_slice(&2u32.to_le_bytes());
        let paths_at = d.len() as u64;
        d.extend_from_slice(&2u64.to_le_bytes());
        d.extend_from_slice(&1u32.to_le_bytes());
        d.extend_from_slice(&0u32.to_le_bytes());

        let mut fx = Fixture::new();
        let mut u = fx.unpacker(&d, V08);
        assert_eq!(u.unpack(at(ValueType::DoubleVector, 0)).unwrap(), CrateValue::DoubleVector(vec![0.5, 1.5]));
        let CrateValue::VariantSelectionMap(m) = u.unpack(at(ValueType::VariantSelectionMap, map_at)).unwrap() else {
            panic!("not a variant map")
        };
        assert_eq!(m.get("a").map(String::as_str), Some("b"));
        let CrateValue::PathVector(p) = u.unpack(at(ValueType::PathVector, paths_at)).unwrap() else {
            panic!("not a path vector")
        };
        assert_eq!(p, [Path::new("/World", ""), Path::absolute_root()]);
    }

    #[test]
    fn test_unregistered_list_op_is_unsupported() {
        let mut fx = Fixture::new();
        let err = fx.unpacker(&[0u8; 8], V08).unpack(at(ValueType::UnregisteredValueListOp, 0)).unwrap_err();
        assert!(matches!(err, Error::UnknownType(_)));
    }
}
