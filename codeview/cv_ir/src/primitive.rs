//! Classification of source primitives onto predefined type indices.

use crate::index::TypeIndex;

/// Kind of a source-level primitive type, as reported by the front end.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum PrimitiveKind {
    SignedInt,
    UnsignedInt,
    Float,
    Bool,
    /// Complex number; the width is the component width in bits.
    Complex,
    Void,
    NullPointer,
}

/// Map a primitive kind and bit width onto its predefined type index.
///
/// Widths without a canonical CodeView mapping classify to
/// [`TypeIndex::NONE`]; callers treat that as "no type", not an error.
#[must_use]
pub fn classify_primitive(kind: PrimitiveKind, width_bits: u32) -> TypeIndex {
    match kind {
        PrimitiveKind::SignedInt => match width_bits {
            8 => TypeIndex::INT8,
            16 => TypeIndex::INT16,
            32 => TypeIndex::INT32,
            64 => TypeIndex::INT64,
            128 => TypeIndex::INT128,
            _ => TypeIndex::NONE,
        },
        PrimitiveKind::UnsignedInt => match width_bits {
            8 => TypeIndex::UINT8,
            16 => TypeIndex::UINT16,
            32 => TypeIndex::UINT32,
            64 => TypeIndex::UINT64,
            128 => TypeIndex::UINT128,
            _ => TypeIndex::NONE,
        },
        PrimitiveKind::Float => match width_bits {
            16 => TypeIndex::FLOAT16,
            32 => TypeIndex::FLOAT32,
            48 => TypeIndex::FLOAT48,
            64 => TypeIndex::FLOAT64,
            80 => TypeIndex::FLOAT80,
            128 => TypeIndex::FLOAT128,
            _ => TypeIndex::NONE,
        },
        PrimitiveKind::Bool => match width_bits {
            8 => TypeIndex::BOOL8,
            16 => TypeIndex::BOOL16,
            32 => TypeIndex::BOOL32,
            64 => TypeIndex::BOOL64,
            _ => TypeIndex::NONE,
        },
        PrimitiveKind::Complex => match width_bits {
            32 => TypeIndex::COMPLEX32,
            64 => TypeIndex::COMPLEX64,
            80 => TypeIndex::COMPLEX80,
            128 => TypeIndex::COMPLEX128,
            _ => TypeIndex::NONE,
        },
        PrimitiveKind::Void => TypeIndex::VOID,
        PrimitiveKind::NullPointer => TypeIndex::NULLPTR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_widths_map() {
        assert_eq!(
            classify_primitive(PrimitiveKind::SignedInt, 32),
            TypeIndex::INT32
        );
        assert_eq!(
            classify_primitive(PrimitiveKind::UnsignedInt, 64),
            TypeIndex::UINT64
        );
        assert_eq!(classify_primitive(PrimitiveKind::Bool, 8), TypeIndex::BOOL8);
        assert_eq!(classify_primitive(PrimitiveKind::Void, 0), TypeIndex::VOID);
    }

    #[test]
    fn odd_widths_degrade_to_no_type() {
        assert_eq!(
            classify_primitive(PrimitiveKind::SignedInt, 24),
            TypeIndex::NONE
        );
        assert_eq!(classify_primitive(PrimitiveKind::Float, 96), TypeIndex::NONE);
        assert_eq!(classify_primitive(PrimitiveKind::Bool, 1), TypeIndex::NONE);
    }
}
