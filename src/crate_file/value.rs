//! Decoded field values.

use std::collections::BTreeMap;
use std::fmt;

use super::dictionary::Dictionary;
use super::format::{Permission, Specifier, Variability};
use crate::core::Path;
use crate::util::*;

/// Time offset and scale applied to a referenced layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self { offset: 0.0, scale: 1.0 }
    }
}

impl LayerOffset {
    /// Check for the identity offset.
    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }
}

/// Composition arc to a prim in another (or the same) layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reference {
    pub asset_path: String,
    pub prim_path: Path,
    pub layer_offset: LayerOffset,
    pub custom_data: Dictionary,
}

/// Like a [`Reference`], but loaded on demand.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    pub asset_path: String,
    pub prim_path: Path,
    /// Present from file version 0.8.0 on.
    pub layer_offset: Option<LayerOffset>,
}

/// List editing operation.
#[derive(Clone, Debug, PartialEq)]
pub struct ListOp<T> {
    /// The list replaces rather than edits the weaker opinion.
    pub is_explicit: bool,
    pub explicit_items: Vec<T>,
    pub added_items: Vec<T>,
    pub prepended_items: Vec<T>,
    pub appended_items: Vec<T>,
    pub deleted_items: Vec<T>,
    pub ordered_items: Vec<T>,
}

impl<T> Default for ListOp<T> {
    fn default() -> Self {
        Self {
            is_explicit: false,
            explicit_items: Vec::new(),
            added_items: Vec::new(),
            prepended_items: Vec::new(),
            appended_items: Vec::new(),
            deleted_items: Vec::new(),
            ordered_items: Vec::new(),
        }
    }
}

impl<T> ListOp<T> {
    /// Check if no list carries items.
    pub fn is_empty(&self) -> bool {
        self.explicit_items.is_empty()
            && self.added_items.is_empty()
            && self.prepended_items.is_empty()
            && self.appended_items.is_empty()
            && self.deleted_items.is_empty()
            && self.ordered_items.is_empty()
    }
}

/// Values keyed by time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSamples {
    pub times: Vec<TimeCode>,
    pub values: Vec<CrateValue>,
}

impl TimeSamples {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterate `(time, value)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (TimeCode, &CrateValue)> {
        self.times.iter().copied().zip(self.values.iter())
    }
}

/// A fully decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum CrateValue {
    Bool(bool),
    UChar(u8),
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Half(f16),
    Float(f32),
    Double(f64),
    TimeCode(TimeCode),
    String(String),
    Token(String),
    AssetPath(String),

    Vec2h(Vec2h),
    Vec3h(Vec3h),
    Vec4h(Vec4h),
    Vec2f(Vec2),
    Vec3f(Vec3),
    Vec4f(Vec4),
    Vec2d(DVec2),
    Vec3d(DVec3),
    Vec4d(DVec4),
    Vec2i(IVec2),
    Vec3i(IVec3),
    Vec4i(IVec4),
    Matrix2d(DMat2),
    Matrix3d(DMat3),
    Matrix4d(DMat4),
    Quath(Quath),
    Quatf(Quat),
    Quatd(DQuat),

    BoolArray(Vec<bool>),
    UCharArray(Vec<u8>),
    IntArray(Vec<i32>),
    UIntArray(Vec<u32>),
    Int64Array(Vec<i64>),
    UInt64Array(Vec<u64>),
    HalfArray(Vec<f16>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    TimeCodeArray(Vec<TimeCode>),
    StringArray(Vec<String>),
    TokenArray(Vec<String>),
    AssetPathArray(Vec<String>),
    Vec2hArray(Vec<Vec2h>),
    Vec3hArray(Vec<Vec3h>),
    Vec4hArray(Vec<Vec4h>),
    Vec2fArray(Vec<Vec2>),
    Vec3fArray(Vec<Vec3>),
    Vec4fArray(Vec<Vec4>),
    Vec2dArray(Vec<DVec2>),
    Vec3dArray(Vec<DVec3>),
    Vec4dArray(Vec<DVec4>),
    Vec2iArray(Vec<IVec2>),
    Vec3iArray(Vec<IVec3>),
    Vec4iArray(Vec<IVec4>),
    Matrix2dArray(Vec<DMat2>),
    Matrix3dArray(Vec<DMat3>),
    Matrix4dArray(Vec<DMat4>),
    QuathArray(Vec<Quath>),
    QuatfArray(Vec<Quat>),
    QuatdArray(Vec<DQuat>),

    Dictionary(Dictionary),
    TimeSamples(TimeSamples),
    TokenListOp(ListOp<String>),
    StringListOp(ListOp<String>),
    PathListOp(ListOp<Path>),
    ReferenceListOp(ListOp<Reference>),
    PayloadListOp(ListOp<Payload>),
    IntListOp(ListOp<i32>),
    UIntListOp(ListOp<u32>),
    Int64ListOp(ListOp<i64>),
    UInt64ListOp(ListOp<u64>),
    VariantSelectionMap(BTreeMap<String, String>),
    Specifier(Specifier),
    Permission(Permission),
    Variability(Variability),
    PathVector(Vec<Path>),
    TokenVector(Vec<String>),
    StringVector(Vec<String>),
    DoubleVector(Vec<f64>),
    LayerOffsetVector(Vec<LayerOffset>),
    Payload(Payload),
    ValueBlock,
    Unregistered(Box<CrateValue>),
}

impl CrateValue {
    /// Kind of the value. Array kinds map to their element kind.
    pub fn value_type(&self) -> ValueType {
        use CrateValue as V;
        match self {
            V::Bool(_) | V::BoolArray(_) => ValueType::Bool,
            V::UChar(_) | V::UCharArray(_) => ValueType::UChar,
            V::Int(_) | V::IntArray(_) => ValueType::Int,
            V::UInt(_) | V::UIntArray(_) => ValueType::UInt,
            V::Int64(_) | V::Int64Array(_) => ValueType::Int64,
            V::UInt64(_) | V::UInt64Array(_) => ValueType::UInt64,
            V::Half(_) | V::HalfArray(_) => ValueType::Half,
            V::Float(_) | V::FloatArray(_) => ValueType::Float,
            V::Double(_) | V::DoubleArray(_) => ValueType::Double,
            V::TimeCode(_) | V::TimeCodeArray(_) => ValueType::TimeCode,
            V::String(_) | V::StringArray(_) => ValueType::String,
            V::Token(_) | V::TokenArray(_) => ValueType::Token,
            V::AssetPath(_) | V::AssetPathArray(_) => ValueType::AssetPath,
            V::Vec2h(_) | V::Vec2hArray(_) => ValueType::Vec2h,
            V::Vec3h(_) | V::Vec3hArray(_) => ValueType::Vec3h,
            V::Vec4h(_) | V::Vec4hArray(_) => ValueType::Vec4h,
            V::Vec2f(_) | V::Vec2fArray(_) => ValueType::Vec2f,
            V::Vec3f(_) | V::Vec3fArray(_) => ValueType::Vec3f,
            V::Vec4f(_) | V::Vec4fArray(_) => ValueType::Vec4f,
            V::Vec2d(_) | V::Vec2dArray(_) => ValueType::Vec2d,
            V::Vec3d(_) | V::Vec3dArray(_) => ValueType::Vec3d,
            V::Vec4d(_) | V::Vec4dArray(_) => ValueType::Vec4d,
            V::Vec2i(_) | V::Vec2iArray(_) => ValueType::Vec2i,
            V::Vec3i(_) | V::Vec3iArray(_) => ValueType::Vec3i,
            V::Vec4i(_) | V::Vec4iArray(_) => ValueType::Vec4i,
            V::Matrix2d(_) | V::Matrix2dArray(_) => ValueType::Matrix2d,
            V::Matrix3d(_) | V::Matrix3dArray(_) => ValueType::Matrix3d,
            V::Matrix4d(_) | V::Matrix4dArray(_) => ValueType::Matrix4d,
            V::Quath(_) | V::QuathArray(_) => ValueType::Quath,
            V::Quatf(_) | V::QuatfArray(_) => ValueType::Quatf,
            V::Quatd(_) | V::QuatdArray(_) => ValueType::Quatd,
            V::Dictionary(_) => ValueType::Dictionary,
            V::TimeSamples(_) => ValueType::TimeSamples,
            V::TokenListOp(_) => ValueType::TokenListOp,
            V::StringListOp(_) => ValueType::StringListOp,
            V::PathListOp(_) => ValueType::PathListOp,
            V::ReferenceListOp(_) => ValueType::ReferenceListOp,
            V::PayloadListOp(_) => ValueType::PayloadListOp,
            V::IntListOp(_) => ValueType::IntListOp,
            V::UIntListOp(_) => ValueType::UIntListOp,
            V::Int64ListOp(_) => ValueType::Int64ListOp,
            V::UInt64ListOp(_) => ValueType::UInt64ListOp,
            V::VariantSelectionMap(_) => ValueType::VariantSelectionMap,
            V::Specifier(_) => ValueType::Specifier,
            V::Permission(_) => ValueType::Permission,
            V::Variability(_) => ValueType::Variability,
            V::PathVector(_) => ValueType::PathVector,
            V::TokenVector(_) => ValueType::TokenVector,
            V::StringVector(_) => ValueType::StringVector,
            V::DoubleVector(_) => ValueType::DoubleVector,
            V::LayerOffsetVector(_) => ValueType::LayerOffsetVector,
            V::Payload(_) => ValueType::Payload,
            V::ValueBlock => ValueType::ValueBlock,
            V::Unregistered(_) => ValueType::UnregisteredValue,
        }
    }

    /// Check if this is an array of a scalar, vector, matrix or
    /// quaternion kind.
    pub fn is_array(&self) -> bool {
        use CrateValue as V;
        matches!(
            self,
            V::BoolArray(_)
                | V::UCharArray(_)
                | V::IntArray(_)
                | V::UIntArray(_)
                | V::Int64Array(_)
                | V::UInt64Array(_)
                | V::HalfArray(_)
                | V::FloatArray(_)
                | V::DoubleArray(_)
                | V::TimeCodeArray(_)
                | V::StringArray(_)
                | V::TokenArray(_)
                | V::AssetPathArray(_)
                | V::Vec2hArray(_)
                | V::Vec3hArray(_)
                | V::Vec4hArray(_)
                | V::Vec2fArray(_)
                | V::Vec3fArray(_)
                | V::Vec4fArray(_)
                | V::Vec2dArray(_)
                | V::Vec3dArray(_)
                | V::Vec4dArray(_)
                | V::Vec2iArray(_)
                | V::Vec3iArray(_)
                | V::Vec4iArray(_)
                | V::Matrix2dArray(_)
                | V::Matrix3dArray(_)
                | V::Matrix4dArray(_)
                | V::QuathArray(_)
                | V::QuatfArray(_)
                | V::QuatdArray(_)
        )
    }

    /// Type name as written in scene description, e.g. `float3[]`.
    pub fn type_name(&self) -> String {
        let base = self.value_type().name();
        if self.is_array() {
            format!("{base}[]")
        } else {
            base.to_string()
        }
    }

    /// Any scalar number widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match *self {
            Self::Bool(v) => v as u8 as f64,
            Self::UChar(v) => v as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Int64(v) => v as f64,
            Self::UInt64(v) => v as f64,
            Self::Half(v) => v.to_f64(),
            Self::Float(v) => v as f64,
            Self::Double(v) | Self::TimeCode(v) => v,
            _ => return None,
        })
    }

    /// A half, float or double 3-vector as `Vec3`.
    pub fn as_vec3f(&self) -> Option<Vec3> {
        match self {
            Self::Vec3h([x, y, z]) => Some(Vec3::new(x.to_f32(), y.to_f32(), z.to_f32())),
            Self::Vec3f(v) => Some(*v),
            Self::Vec3d(v) => Some(v.as_vec3()),
            _ => None,
        }
    }

    /// Token text.
    pub fn as_token_str(&self) -> Option<&str> {
        match self {
            Self::Token(s) => Some(s),
            _ => None,
        }
    }

    /// String, token or asset path text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Token(s) | Self::AssetPath(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_dictionary(&self) -> Option<&Dictionary> {
        match self {
            Self::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_time_samples(&self) -> Option<&TimeSamples> {
        match self {
            Self::TimeSamples(ts) => Some(ts),
            _ => None,
        }
    }

    /// Element count of an array value.
    pub fn array_len(&self) -> Option<usize> {
        use CrateValue as V;
        Some(match self {
            V::BoolArray(v) => v.len(),
            V::UCharArray(v) => v.len(),
            V::IntArray(v) => v.len(),
            V::UIntArray(v) => v.len(),
            V::Int64Array(v) => v.len(),
            V::UInt64Array(v) => v.len(),
            V::HalfArray(v) => v.len(),
            V::FloatArray(v) => v.len(),
            V::DoubleArray(v) | V::TimeCodeArray(v) => v.len(),
            V::StringArray(v) | V::TokenArray(v) | V::AssetPathArray(v) => v.len(),
            V::Vec2hArray(v) => v.len(),
            V::Vec3hArray(v) => v.len(),
            V::Vec4hArray(v) => v.len(),
            V::Vec2fArray(v) => v.len(),
            V::Vec3fArray(v) => v.len(),
            V::Vec4fArray(v) => v.len(),
            V::Vec2dArray(v) => v.len(),
            V::Vec3dArray(v) => v.len(),
            V::Vec4dArray(v) => v.len(),
            V::Vec2iArray(v) => v.len(),
            V::Vec3iArray(v) => v.len(),
            V::Vec4iArray(v) => v.len(),
            V::Matrix2dArray(v) => v.len(),
            V::Matrix3dArray(v) => v.len(),
            V::Matrix4dArray(v) => v.len(),
            V::QuathArray(v) => v.len(),
            V::QuatfArray(v) => v.len(),
            V::QuatdArray(v) => v.len(),
            _ => return None,
        })
    }
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut one: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        one(f, item)?;
    }
    f.write_str("]")
}

fn write_debug_list<T: fmt::Debug>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    write_list(f, items, |f, v| write!(f, "{v:?}"))
}

fn write_quoted_list(f: &mut fmt::Formatter<'_>, items: &[String]) -> fmt::Result {
    write_list(f, items, |f, s| write!(f, "{s:?}"))
}

fn write_list_op<T>(
    f: &mut fmt::Formatter<'_>,
    op: &ListOp<T>,
    mut one: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    if op.is_explicit {
        f.write_str("explicit ")?;
        return write_list(f, &op.explicit_items, &mut one);
    }
    let parts = [
        ("add", &op.added_items),
        ("prepend", &op.prepended_items),
        ("append", &op.appended_items),
        ("delete", &op.deleted_items),
        ("reorder", &op.ordered_items),
    ];
    let mut first = true;
    for (label, items) in parts {
        if items.is_empty() {
            continue;
        }
        if !first {
            f.write_str("; ")?;
        }
        first = false;
        write!(f, "{label} ")?;
        write_list(f, items, &mut one)?;
    }
    if first {
        f.write_str("[]")?;
    }
    Ok(())
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@", self.asset_path)?;
        if !self.prim_path.is_empty() {
            write!(f, "<{}>", self.prim_path)?;
        }
        if !self.layer_offset.is_identity() {
            write!(f, " (offset = {}; scale = {})", self.layer_offset.offset, self.layer_offset.scale)?;
        }
        Ok(())
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@", self.asset_path)?;
        if !self.prim_path.is_empty() {
            write!(f, "<{}>", self.prim_path)?;
        }
        if let Some(lo) = self.layer_offset.filter(|lo| !lo.is_identity()) {
            write!(f, " (offset = {}; scale = {})", lo.offset, lo.scale)?;
        }
        Ok(())
    }
}

impl fmt::Display for CrateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use CrateValue as V;
        match self {
            V::Bool(v) => write!(f, "{v}"),
            V::UChar(v) => write!(f, "{v}"),
            V::Int(v) => write!(f, "{v}"),
            V::UInt(v) => write!(f, "{v}"),
            V::Int64(v) => write!(f, "{v}"),
            V::UInt64(v) => write!(f, "{v}"),
            V::Half(v) => write!(f, "{v}"),
            V::Float(v) => write!(f, "{v}"),
            V::Double(v) | V::TimeCode(v) => write!(f, "{v}"),
            V::String(s) => write!(f, "{s:?}"),
            V::Token(s) => write!(f, "{s:?}"),
            V::AssetPath(s) => write!(f, "@{s}@"),
            V::Vec2h(v) => write!(f, "{v:?}"),
            V::Vec3h(v) => write!(f, "{v:?}"),
            V::Vec4h(v) => write!(f, "{v:?}"),
            V::Vec2f(v) => write!(f, "{v}"),
            V::Vec3f(v) => write!(f, "{v}"),
            V::Vec4f(v) => write!(f, "{v}"),
            V::Vec2d(v) => write!(f, "{v}"),
            V::Vec3d(v) => write!(f, "{v}"),
            V::Vec4d(v) => write!(f, "{v}"),
            V::Vec2i(v) => write!(f, "{v}"),
            V::Vec3i(v) => write!(f, "{v}"),
            V::Vec4i(v) => write!(f, "{v}"),
            V::Matrix2d(m) => write!(f, "{m}"),
            V::Matrix3d(m) => write!(f, "{m}"),
            V::Matrix4d(m) => write!(f, "{m}"),
            V::Quath(q) => write!(f, "{q:?}"),
            V::Quatf(q) => write!(f, "{q}"),
            V::Quatd(q) => write!(f, "{q}"),

            V::BoolArray(v) => write_debug_list(f, v),
            V::UCharArray(v) => write_debug_list(f, v),
            V::IntArray(v) => write_debug_list(f, v),
            V::UIntArray(v) => write_debug_list(f, v),
            V::Int64Array(v) => write_debug_list(f, v),
            V::UInt64Array(v) => write_debug_list(f, v),
            V::HalfArray(v) => write_list(f, v, |f, h| write!(f, "{h}")),
            V::FloatArray(v) => write_debug_list(f, v),
            V::DoubleArray(v) | V::TimeCodeArray(v) => write_debug_list(f, v),
            V::StringArray(v) | V::TokenArray(v) => write_quoted_list(f, v),
            V::AssetPathArray(v) => write_list(f, v, |f, s| write!(f, "@{s}@")),
            V::Vec2hArray(v) => write_debug_list(f, v),
            V::Vec3hArray(v) => write_debug_list(f, v),
            V::Vec4hArray(v) => write_debug_list(f, v),
            V::Vec2fArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec3fArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec4fArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec2dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec3dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec4dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec2iArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec3iArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Vec4iArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Matrix2dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Matrix3dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::Matrix4dArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::QuathArray(v) => write_debug_list(f, v),
            V::QuatfArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),
            V::QuatdArray(v) => write_list(f, v, |f, x| write!(f, "{x}")),

            V::Dictionary(d) => write!(f, "{d}"),
            V::TimeSamples(ts) => {
                f.write_str("{")?;
                for (i, (t, v)) in ts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{t}: {v}")?;
                }
                f.write_str("}")
            }
            V::TokenListOp(op) | V::StringListOp(op) => write_list_op(f, op, |f, s| write!(f, "{s:?}")),
            V::PathListOp(op) => write_list_op(f, op, |f, p| write!(f, "<{p}>")),
            V::ReferenceListOp(op) => write_list_op(f, op, |f, r| write!(f, "{r}")),
            V::PayloadListOp(op) => write_list_op(f, op, |f, p| write!(f, "{p}")),
            V::IntListOp(op) => write_list_op(f, op, |f, v| write!(f, "{v}")),
            V::UIntListOp(op) => write_list_op(f, op, |f, v| write!(f, "{v}")),
            V::Int64ListOp(op) => write_list_op(f, op, |f, v| write!(f, "{v}")),
            V::UInt64ListOp(op) => write_list_op(f, op, |f, v| write!(f, "{v}")),
            V::VariantSelectionMap(m) => {
                f.write_str("{")?;
                for (i, (k, v)) in m.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} = {v:?}")?;
                }
                f.write_str("}")
            }
            V::Specifier(s) => write!(f, "{s:?}"),
            V::Permission(p) => write!(f, "{p:?}"),
            V::Variability(v) => write!(f, "{v:?}"),
            V::PathVector(v) => write_list(f, v, |f, p| write!(f, "<{p}>")),
            V::TokenVector(v) | V::StringVector(v) => write_quoted_list(f, v),
            V::DoubleVector(v) => write_debug_list(f, v),
            V::LayerOffsetVector(v) => write_list(f, v, |f, lo| write!(f, "({}, {})", lo.offset, lo.scale)),
            V::Payload(p) => write!(f, "{p}"),
            V::ValueBlock => f.write_str("None"),
            V::Unregistered(v) => write!(f, "{v}"),
        }
    }
}
