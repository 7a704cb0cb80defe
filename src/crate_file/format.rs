//! Crate format constants and structures.

use std::fmt;

use crate::util::ValueType;

/// Magic bytes at the start of a Crate file.
pub const CRATE_MAGIC: &[u8; 8] = b"PXR-USDC";

/// Size of the bootstrap header in bytes:
/// magic (8) + version (8) + TOC offset (8) + reserved (64).
pub const BOOTSTRAP_SIZE: usize = 88;

/// Offset of the version bytes in the bootstrap.
pub const VERSION_OFFSET: usize = 8;

/// Offset of the TOC offset in the bootstrap.
pub const TOC_OFFSET_OFFSET: usize = 16;

/// Section names are at most this many characters.
pub const SECTION_NAME_MAX_LENGTH: usize = 15;

/// Size of a TOC record: name[16] + start (i64) + size (i64).
pub const SECTION_RECORD_SIZE: usize = SECTION_NAME_MAX_LENGTH + 1 + 8 + 8;

/// Oldest version this reader accepts.
pub const MIN_VERSION: CrateVersion = CrateVersion::new(0, 4, 0);

/// Newest version this reader accepts.
pub const MAX_VERSION: CrateVersion = CrateVersion::new(0, 10, 0);

/// Arrays shorter than this are never integer/float compressed.
pub const MIN_COMPRESSED_ARRAY_SIZE: usize = 16;

/// Section names.
pub const TOKENS_SECTION: &str = "TOKENS";
pub const STRINGS_SECTION: &str = "STRINGS";
pub const FIELDS_SECTION: &str = "FIELDS";
pub const FIELDSETS_SECTION: &str = "FIELDSETS";
pub const PATHS_SECTION: &str = "PATHS";
pub const SPECS_SECTION: &str = "SPECS";

/// The six sections every Crate file needs, in decode order.
pub const KNOWN_SECTIONS: [&str; 6] = [
    TOKENS_SECTION,
    STRINGS_SECTION,
    FIELDS_SECTION,
    FIELDSETS_SECTION,
    PATHS_SECTION,
    SPECS_SECTION,
];

// ============================================================================
// Version
// ============================================================================

/// File format version `major.minor.patch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CrateVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl CrateVersion {
    /// Create a version.
    pub const fn new(major: u8, minor: u8, patch: u8) -> Self {
        Self { major, minor, patch }
    }

    /// Check if this version is inside the supported range.
    pub fn is_supported(self) -> bool {
        self >= MIN_VERSION && self <= MAX_VERSION
    }

    /// Array element counts are `u64` from 0.7.0 on, `u32` before.
    pub fn has_u64_array_counts(self) -> bool {
        self >= Self::new(0, 7, 0)
    }

    /// Before 0.5.0 arrays carry a `u32` rank ahead of the element count
    /// and are never compressed.
    pub fn has_legacy_array_rank(self) -> bool {
        self < Self::new(0, 5, 0)
    }

    /// Payloads carry a layer offset from 0.8.0 on.
    pub fn has_payload_layer_offset(self) -> bool {
        self >= Self::new(0, 8, 0)
    }
}

impl fmt::Display for CrateVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ============================================================================
// Indices
// ============================================================================

macro_rules! index_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            /// Sentinel value (`!0`).
            pub const INVALID: Self = Self(u32::MAX);

            /// Check that this is not the sentinel.
            #[inline]
            pub const fn is_valid(self) -> bool {
                self.0 != u32::MAX
            }

            /// Index as `usize`.
            #[inline]
            pub const fn get(self) -> usize {
                self.0 as usize
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::INVALID
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> Self {
                Self(v)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(INVALID)", stringify!($name))
                }
            }
        }
    };
}

index_type!(
    /// Index into the token table.
    TokenIndex
);
index_type!(
    /// Index into the string table.
    StringIndex
);
index_type!(
    /// Index into the field table.
    FieldIndex
);
index_type!(
    /// Index of the first entry of a group in the flat fieldset table.
    FieldSetIndex
);
index_type!(
    /// Index into the path table.
    PathIndex
);

// ============================================================================
// ValueRep
// ============================================================================

/// Bit flag: value is an array.
pub const IS_ARRAY_BIT: u64 = 1 << 63;
/// Bit flag: value is stored in the payload itself.
pub const IS_INLINED_BIT: u64 = 1 << 62;
/// Bit flag: out-of-line data is compressed.
pub const IS_COMPRESSED_BIT: u64 = 1 << 61;
/// Mask of the 48-bit payload.
pub const PAYLOAD_MASK: u64 = (1 << 48) - 1;

/// 64-bit tagged reference to a value.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ValueRep(pub u64);

impl ValueRep {
    /// Build a rep from its parts.
    pub const fn new(ty: u8, is_array: bool, is_inlined: bool, is_compressed: bool, payload: u64) -> Self {
        let mut bits = ((ty as u64) << 48) | (payload & PAYLOAD_MASK);
        if is_array {
            bits |= IS_ARRAY_BIT;
        }
        if is_inlined {
            bits |= IS_INLINED_BIT;
        }
        if is_compressed {
            bits |= IS_COMPRESSED_BIT;
        }
        Self(bits)
    }

    /// Raw type id.
    #[inline]
    pub const fn type_id(self) -> u8 {
        ((self.0 >> 48) & 0xFF) as u8
    }

    /// Decoded type id, if known.
    #[inline]
    pub const fn value_type(self) -> Option<ValueType> {
        ValueType::from_u8(self.type_id())
    }

    #[inline]
    pub const fn is_array(self) -> bool {
        self.0 & IS_ARRAY_BIT != 0
    }

    #[inline]
    pub const fn is_inlined(self) -> bool {
        self.0 & IS_INLINED_BIT != 0
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        self.0 & IS_COMPRESSED_BIT != 0
    }

    /// Low 48 bits: inline value or byte offset.
    #[inline]
    pub const fn payload(self) -> u64 {
        self.0 & PAYLOAD_MASK
    }
}

impl fmt::Debug for ValueRep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = match self.value_type() {
            Some(t) => t.name().to_string(),
            None => format!("type#{}", self.type_id()),
        };
        write!(
            f,
            "ValueRep({ty}{}{}{}, payload={:#x})",
            if self.is_array() { ", array" } else { "" },
            if self.is_inlined() { ", inlined" } else { "" },
            if self.is_compressed() { ", compressed" } else { "" },
            self.payload()
        )
    }
}

// ============================================================================
// Records
// ============================================================================

/// A named value: token of the name plus a rep of the value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Field {
    pub token_index: TokenIndex,
    pub value_rep: ValueRep,
}

/// Structural role of a spec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SpecType {
    #[default]
    Unknown = 0,
    Attribute = 1,
    Connection = 2,
    Expression = 3,
    Mapper = 4,
    MapperArg = 5,
    Prim = 6,
    PseudoRoot = 7,
    Relationship = 8,
    RelationshipTarget = 9,
    Variant = 10,
    VariantSet = 11,
}

impl SpecType {
    /// Convert from the raw code.
    pub const fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            1 => Self::Attribute,
            2 => Self::Connection,
            3 => Self::Expression,
            4 => Self::Mapper,
            5 => Self::MapperArg,
            6 => Self::Prim,
            7 => Self::PseudoRoot,
            8 => Self::Relationship,
            9 => Self::RelationshipTarget,
            10 => Self::Variant,
            11 => Self::VariantSet,
            _ => return None,
        })
    }

    /// Name of the role.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Attribute => "Attribute",
            Self::Connection => "Connection",
            Self::Expression => "Expression",
            Self::Mapper => "Mapper",
            Self::MapperArg => "MapperArg",
            Self::Prim => "Prim",
            Self::PseudoRoot => "PseudoRoot",
            Self::Relationship => "Relationship",
            Self::RelationshipTarget => "RelationshipTarget",
            Self::Variant => "Variant",
            Self::VariantSet => "VariantSet",
        }
    }
}

impl fmt::Display for SpecType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binds a path to its field group and role.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Spec {
    pub path_index: PathIndex,
    pub fieldset_index: FieldSetIndex,
    pub spec_type: SpecType,
}

/// One TOC record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    pub start: i64,
    pub size: i64,
}

impl Section {
    /// Byte range of the section inside the file.
    pub fn range(&self) -> std::ops::Range<u64> {
        self.start as u64..(self.start + self.size) as u64
    }
}

/// Section directory plus the positions of the known sections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableOfContents {
    pub sections: Vec<Section>,
    pub tokens: Option<usize>,
    pub strings: Option<usize>,
    pub fields: Option<usize>,
    pub fieldsets: Option<usize>,
    pub paths: Option<usize>,
    pub specs: Option<usize>,
}

impl TableOfContents {
    /// Look up a section by name.
    pub fn section(&self, name: &str) -> Option<&Section> {
        let idx = match name {
            TOKENS_SECTION => self.tokens,
            STRINGS_SECTION => self.strings,
            FIELDS_SECTION => self.fields,
            FIELDSETS_SECTION => self.fieldsets,
            PATHS_SECTION => self.paths,
            SPECS_SECTION => self.specs,
            _ => return self.sections.iter().find(|s| s.name == name),
        };
        idx.map(|i| &self.sections[i])
    }

    pub(crate) fn slot_mut(&mut self, name: &str) -> Option<&mut Option<usize>> {
        Some(match name {
            TOKENS_SECTION => &mut self.tokens,
            STRINGS_SECTION => &mut self.strings,
            FIELDS_SECTION => &mut self.fields,
            FIELDSETS_SECTION => &mut self.fieldsets,
            PATHS_SECTION => &mut self.paths,
            SPECS_SECTION => &mut self.specs,
            _ => return None,
        })
    }
}

// ============================================================================
// Small enums carried as values
// ============================================================================

/// How a prim spec contributes to composition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Def),
            1 => Some(Self::Over),
            2 => Some(Self::Class),
            _ => None,
        }
    }
}

/// Visibility of a spec to other layers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    Public,
    Private,
}

impl Permission {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            _ => None,
        }
    }
}

/// Whether an attribute may vary over time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variability {
    Varying,
    Uniform,
}

impl Variability {
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Varying),
            1 => Some(Self::Uniform),
            _ => None,
        }
    }
}
