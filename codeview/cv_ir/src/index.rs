//! Type stream indices.
//!
//! CodeView addresses every type by a numeric index. Values below
//! [`TypeIndex::FIRST_NONPRIMITIVE`] are predefined primitives (or composite
//! pointer-to-primitive encodings); everything at or above it names a record
//! written to the types section, numbered in creation order by the finishing
//! pass.

use std::fmt;

/// Index of a type in the CodeView type stream.
///
/// # Predefined indices
///
/// Primitive types have fixed indices below the reserved threshold. A near
/// 32-bit or 64-bit pointer to a primitive collapses to a composite index
/// (`mode << 8 | primitive`) and never occupies a slot in the type stream.
///
/// `TypeIndex::NONE` doubles as the "no type" sentinel used when a source
/// type has no canonical CodeView mapping.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TypeIndex(u32);

impl TypeIndex {
    /// Absent or unrepresentable type (`T_NOTYPE`).
    pub const NONE: TypeIndex = TypeIndex(0x0000);
    /// `void`.
    pub const VOID: TypeIndex = TypeIndex(0x0003);
    /// `nullptr_t`, encoded as a near pointer to `void`.
    pub const NULLPTR: TypeIndex = TypeIndex(0x0103);

    // Signed integers by exact width.
    pub const INT8: TypeIndex = TypeIndex(0x0068);
    pub const INT16: TypeIndex = TypeIndex(0x0072);
    pub const INT32: TypeIndex = TypeIndex(0x0074);
    pub const INT64: TypeIndex = TypeIndex(0x0076);
    pub const INT128: TypeIndex = TypeIndex(0x0078);

    // Unsigned integers by exact width.
    pub const UINT8: TypeIndex = TypeIndex(0x0069);
    pub const UINT16: TypeIndex = TypeIndex(0x0073);
    pub const UINT32: TypeIndex = TypeIndex(0x0075);
    pub const UINT64: TypeIndex = TypeIndex(0x0077);
    pub const UINT128: TypeIndex = TypeIndex(0x0079);

    // Floating point.
    pub const FLOAT16: TypeIndex = TypeIndex(0x0046);
    pub const FLOAT32: TypeIndex = TypeIndex(0x0040);
    pub const FLOAT48: TypeIndex = TypeIndex(0x0044);
    pub const FLOAT64: TypeIndex = TypeIndex(0x0041);
    pub const FLOAT80: TypeIndex = TypeIndex(0x0042);
    pub const FLOAT128: TypeIndex = TypeIndex(0x0043);

    // Booleans.
    pub const BOOL8: TypeIndex = TypeIndex(0x0030);
    pub const BOOL16: TypeIndex = TypeIndex(0x0031);
    pub const BOOL32: TypeIndex = TypeIndex(0x0032);
    pub const BOOL64: TypeIndex = TypeIndex(0x0033);

    // Complex, by component width.
    pub const COMPLEX32: TypeIndex = TypeIndex(0x0050);
    pub const COMPLEX64: TypeIndex = TypeIndex(0x0051);
    pub const COMPLEX80: TypeIndex = TypeIndex(0x0052);
    pub const COMPLEX128: TypeIndex = TypeIndex(0x0053);

    /// First index available to records in the types section.
    pub const FIRST_NONPRIMITIVE: u32 = 0x1000;

    /// Last assignable index; the sequential counter must not wrap past
    /// the format's 16-bit index space.
    pub const MAX: u32 = 0xFFFF;

    /// Composite mode byte for a near 32-bit pointer to a primitive.
    pub const MODE_NEAR32: u32 = 0x04;
    /// Composite mode byte for a 64-bit pointer to a primitive.
    pub const MODE_PTR64: u32 = 0x06;

    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        TypeIndex(raw)
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Whether this index lies in the predefined primitive space.
    #[inline]
    #[must_use]
    pub const fn is_primitive(self) -> bool {
        self.0 < Self::FIRST_NONPRIMITIVE
    }

    /// Whether this is the "no type" sentinel.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Composite pointer-to-primitive index for this primitive.
    ///
    /// Valid only for true primitives (low byte range) and the two canonical
    /// pointer shapes; returns `None` otherwise.
    #[must_use]
    pub const fn composite_pointer(self, mode: u32) -> Option<TypeIndex> {
        if self.0 == 0 || self.0 > 0xFF {
            return None;
        }
        match mode {
            Self::MODE_NEAR32 | Self::MODE_PTR64 => Some(TypeIndex((mode << 8) | self.0)),
            _ => None,
        }
    }
}

impl fmt::Debug for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeIndex({:#06x})", self.0)
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}
