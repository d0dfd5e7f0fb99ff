//! The tagged type-record union and its attribute words.

use bitflags::bitflags;

use crate::interner::TypeRef;

bitflags! {
    /// Qualifier mask carried by an `LF_MODIFIER` record.
    #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
    pub struct ModifierFlags: u16 {
        const CONST = 0x0001;
        const VOLATILE = 0x0002;
        const UNALIGNED = 0x0004;
    }
}

/// Pointer mode stored in the attribute word of an `LF_POINTER` record.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(u32)]
pub enum PointerMode {
    Pointer = 0x00,
    LValueReference = 0x01,
    RValueReference = 0x04,
}

/// Packed attribute word of an `LF_POINTER` record.
///
/// Layout: kind in bits 0-4, mode in bits 5-7, flag bits 8-12, pointee size
/// in bytes in bits 13-18. Only the near 32-bit and 64-bit kinds are ever
/// produced here.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct PointerAttrs(u32);

impl PointerAttrs {
    const KIND_NEAR32: u32 = 0x0A;
    const KIND_PTR64: u32 = 0x0C;

    /// Near 32-bit pointer (4-byte).
    #[must_use]
    pub const fn near32() -> Self {
        PointerAttrs(Self::KIND_NEAR32 | (4 << 13))
    }

    /// 64-bit pointer (8-byte).
    #[must_use]
    pub const fn ptr64() -> Self {
        PointerAttrs(Self::KIND_PTR64 | (8 << 13))
    }

    /// Same kind and size, with the given reference mode.
    #[must_use]
    pub const fn with_mode(self, mode: PointerMode) -> Self {
        PointerAttrs((self.0 & !(0x7 << 5)) | ((mode as u32) << 5))
    }

    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    #[must_use]
    pub const fn kind(self) -> u32 {
        self.0 & 0x1F
    }

    #[inline]
    #[must_use]
    pub const fn mode(self) -> u32 {
        (self.0 >> 5) & 0x7
    }

    /// Pointee size in bytes.
    #[inline]
    #[must_use]
    pub const fn size(self) -> u32 {
        (self.0 >> 13) & 0x3F
    }

    /// Whether this is one of the two canonical plain-pointer shapes that
    /// collapse to a composite pointer-to-primitive index.
    #[must_use]
    pub const fn is_plain_canonical(self) -> bool {
        if self.mode() != 0 {
            return false;
        }
        (self.kind() == Self::KIND_NEAR32 && self.size() == 4)
            || (self.kind() == Self::KIND_PTR64 && self.size() == 8)
    }

    /// Composite mode byte for the canonical shapes (`0x04` near, `0x06` 64-bit).
    #[must_use]
    pub const fn composite_mode(self) -> u32 {
        if self.kind() == Self::KIND_PTR64 {
            0x06
        } else {
            0x04
        }
    }
}

/// Calling convention declared by a procedure type, with the format's
/// numeric encoding.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[repr(u8)]
pub enum CallingConvention {
    #[default]
    NearC = 0x00,
    NearFast = 0x04,
    NearStd = 0x07,
    NearSys = 0x09,
    ThisCall = 0x0B,
    NearVector = 0x18,
}

impl CallingConvention {
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One interned, non-primitive type descriptor.
///
/// Structural equality over these variants is the interner's deduplication
/// key: same variant, same field values, nested types compared by
/// [`TypeRef`] identity.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum TypeRecord {
    /// `const`/`volatile` qualification over any base, primitives included.
    Modifier { base: TypeRef, flags: ModifierFlags },
    /// Pointer or reference, with the full packed attribute word.
    Pointer { target: TypeRef, attrs: PointerAttrs },
    /// Fixed-length array. `length_bytes` is canonicalized to a whole
    /// multiple of the element size (count times element bytes, count
    /// computed rounding toward zero), so equality on it is equality on
    /// the element count.
    Array {
        element: TypeRef,
        index: crate::TypeIndex,
        length_bytes: u64,
    },
    /// Ordered procedure parameter list.
    ArgList { args: Box<[TypeRef]> },
    /// Procedure prototype.
    Procedure {
        return_type: TypeRef,
        convention: CallingConvention,
        attrs: u8,
        param_count: u16,
        arg_list: TypeRef,
    },
}
