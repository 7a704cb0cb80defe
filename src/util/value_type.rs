//! Value type ids - the kinds a `ValueRep` can point at.

use std::fmt;

/// Type id stored in bits 48..56 of a `ValueRep`.
///
/// The numbering is part of the file format and must never change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ValueType {
    Invalid = 0,
    Bool = 1,
    UChar = 2,
    Int = 3,
    UInt = 4,
    Int64 = 5,
    UInt64 = 6,
    Half = 7,
    Float = 8,
    Double = 9,
    String = 10,
    Token = 11,
    AssetPath = 12,
    Matrix2d = 13,
    Matrix3d = 14,
    Matrix4d = 15,
    Quatd = 16,
    Quatf = 17,
    Quath = 18,
    Vec2d = 19,
    Vec2f = 20,
    Vec2h = 21,
    Vec2i = 22,
    Vec3d = 23,
    Vec3f = 24,
    Vec3h = 25,
    Vec3i = 26,
    Vec4d = 27,
    Vec4f = 28,
    Vec4h = 29,
    Vec4i = 30,
    Dictionary = 31,
    TokenListOp = 32,
    StringListOp = 33,
    PathListOp = 34,
    ReferenceListOp = 35,
    IntListOp = 36,
    Int64ListOp = 37,
    UIntListOp = 38,
    UInt64ListOp = 39,
    PathVector = 40,
    TokenVector = 41,
    Specifier = 42,
    Permission = 43,
    Variability = 44,
    VariantSelectionMap = 45,
    TimeSamples = 46,
    Payload = 47,
    DoubleVector = 48,
    LayerOffsetVector = 49,
    StringVector = 50,
    ValueBlock = 51,
    Value = 52,
    UnregisteredValue = 53,
    UnregisteredValueListOp = 54,
    PayloadListOp = 55,
    TimeCode = 56,
}

impl ValueType {
    /// Highest type id this reader knows.
    pub const MAX_ID: u8 = 56;

    /// Convert from the raw id. Unknown ids give `None`.
    pub const fn from_u8(v: u8) -> Option<Self> {
        use ValueType::*;
        Some(match v {
            0 => Invalid,
            1 => Bool,
            2 => UChar,
            3 => Int,
            4 => UInt,
            5 => Int64,
            6 => UInt64,
            7 => Half,
            8 => Float,
            9 => Double,
            10 => String,
            11 => Token,
            12 => AssetPath,
            13 => Matrix2d,
            14 => Matrix3d,
            15 => Matrix4d,
            16 => Quatd,
            17 => Quatf,
            18 => Quath,
            19 => Vec2d,
            20 => Vec2f,
            21 => Vec2h,
            22 => Vec2i,
            23 => Vec3d,
            24 => Vec3f,
            25 => Vec3h,
            26 => Vec3i,
            27 => Vec4d,
            28 => Vec4f,
            29 => Vec4h,
            30 => Vec4i,
            31 => Dictionary,
            32 => TokenListOp,
            33 => StringListOp,
            34 => PathListOp,
            35 => ReferenceListOp,
            36 => IntListOp,
            37 => Int64ListOp,
            38 => UIntListOp,
            39 => UInt64ListOp,
            40 => PathVector,
            41 => TokenVector,
            42 => Specifier,
            43 => Permission,
            44 => Variability,
            45 => VariantSelectionMap,
            46 => TimeSamples,
            47 => Payload,
            48 => DoubleVector,
            49 => LayerOffsetVector,
            50 => StringVector,
            51 => ValueBlock,
            52 => Value,
            53 => UnregisteredValue,
            54 => UnregisteredValueListOp,
            55 => PayloadListOp,
            56 => TimeCode,
            _ => return None,
        })
    }

    /// Name as used in the scene description language.
    pub const fn name(self) -> &'static str {
        use ValueType::*;
        match self {
            Invalid => "invalid",
            Bool => "bool",
            UChar => "uchar",
            Int => "int",
            UInt => "uint",
            Int64 => "int64",
            UInt64 => "uint64",
            Half => "half",
            Float => "float",
            Double => "double",
            String => "string",
            Token => "token",
            AssetPath => "asset",
            Matrix2d => "matrix2d",
            Matrix3d => "matrix3d",
            Matrix4d => "matrix4d",
            Quatd => "quatd",
            Quatf => "quatf",
            Quath => "quath",
            Vec2d => "double2",
            Vec2f => "float2",
            Vec2h => "half2",
            Vec2i => "int2",
            Vec3d => "double3",
            Vec3f => "float3",
            Vec3h => "half3",
            Vec3i => "int3",
            Vec4d => "double4",
            Vec4f => "float4",
            Vec4h => "half4",
            Vec4i => "int4",
            Dictionary => "dictionary",
            TokenListOp => "ListOp<token>",
            StringListOp => "ListOp<string>",
            PathListOp => "ListOp<Path>",
            ReferenceListOp => "ListOp<Reference>",
            IntListOp => "ListOp<int>",
            Int64ListOp => "ListOp<int64>",
            UIntListOp => "ListOp<uint>",
            UInt64ListOp => "ListOp<uint64>",
            PathVector => "PathVector",
            TokenVector => "token[]",
            Specifier => "Specifier",
            Permission => "Permission",
            Variability => "Variability",
            VariantSelectionMap => "VariantSelectionMap",
            TimeSamples => "TimeSamples",
            Payload => "Payload",
            DoubleVector => "double[]",
            LayerOffsetVector => "LayerOffset[]",
            StringVector => "string[]",
            ValueBlock => "ValueBlock",
            Value => "Value",
            UnregisteredValue => "UnregisteredValue",
            UnregisteredValueListOp => "ListOp<UnregisteredValue>",
            PayloadListOp => "ListOp<Payload>",
            TimeCode => "timecode",
        }
    }

    /// Size in bytes of one element when stored raw, for fixed-size kinds.
    pub const fn num_bytes(self) -> Option<usize> {
        use ValueType::*;
        Some(match self {
            Bool | UChar => 1,
            Half => 2,
            Int | UInt | Float | String | Token | AssetPath => 4,
            Int64 | UInt64 | Double | TimeCode => 8,
            Vec2h => 4,
            Vec3h => 6,
            Vec4h | Quath => 8,
            Vec2f | Vec2i => 8,
            Vec3f | Vec3i => 12,
            Vec4f | Vec4i | Quatf => 16,
            Vec2d => 16,
            Vec3d => 24,
            Vec4d | Quatd => 32,
            Matrix2d => 32,
            Matrix3d => 72,
            Matrix4d => 128,
            _ => return None,
        })
    }

    /// Returns true for kinds that may appear with the array bit set.
    pub const fn supports_array(self) -> bool {
        use ValueType::*;
        matches!(
            self,
            Bool | UChar
                | Int
                | UInt
                | Int64
                | UInt64
                | Half
                | Float
                | Double
                | TimeCode
                | String
                | Token
                | AssetPath
                | Matrix2d
                | Matrix3d
                | Matrix4d
                | Quatd
                | Quatf
                | Quath
                | Vec2d
                | Vec2f
                | Vec2h
                | Vec2i
                | Vec3d
                | Vec3f
                | Vec3h
                | Vec3i
                | Vec4d
                | Vec4f
                | Vec4h
                | Vec4i
        )
    }

    /// Returns true for integer kinds stored with the integer codec.
    pub const fn is_integer(self) -> bool {
        matches!(self, Self::Int | Self::UInt | Self::Int64 | Self::UInt64)
    }

    /// Returns true for scalar floating point kinds.
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Half | Self::Float | Self::Double | Self::TimeCode)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_roundtrip() {
        for id in 0..=ValueType::MAX_ID {
            let ty = ValueType::from_u8(id).unwrap();
            assert_eq!(ty as u8, id);
        }
        assert!(ValueType::from_u8(ValueType::MAX_ID + 1).is_none());
        assert!(ValueType::from_u8(255).is_none());
    }

    #[test]
    fn test_sizes() {
        assert_eq!(ValueType::Bool.num_bytes(), Some(1));
        assert_eq!(ValueType::Vec3h.num_bytes(), Some(6));
        assert_eq!(ValueType::Matrix4d.num_bytes(), Some(128));
        assert_eq!(ValueType::Dictionary.num_bytes(), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(ValueType::Vec3f.name(), "float3");
        assert_eq!(ValueType::Token.to_string(), "token");
        assert!(ValueType::Quatf.supports_array());
        assert!(!ValueType::Dictionary.supports_array());
    }
}
