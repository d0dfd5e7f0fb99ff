//! Structural type interner with a deferred numbering pass.
//!
//! Descriptors are deduplicated the moment they are interned, but type
//! stream indices are only pinned down by [`TypeTable::assign_indices`],
//! which runs once at unit finish: every type must have been observed
//! before any type reference can be printed immutably.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::index::TypeIndex;
use crate::record::{CallingConvention, ModifierFlags, PointerAttrs, TypeRecord};

/// Stable handle of an interned record, valid for the lifetime of its
/// [`TypeTable`]. Handles are creation-ordered.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct TypeHandle(u32);

impl TypeHandle {
    #[inline]
    fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Reference to a type: either a resolved primitive index or a handle into
/// the record table. Handles stay forward-reference-safe until the
/// numbering pass resolves them.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum TypeRef {
    Primitive(TypeIndex),
    Record(TypeHandle),
}

impl TypeRef {
    /// The "no type" reference.
    pub const NONE: TypeRef = TypeRef::Primitive(TypeIndex::NONE);

    /// Whether this is the "no type" sentinel.
    #[must_use]
    pub fn is_none(self) -> bool {
        matches!(self, TypeRef::Primitive(i) if i.is_none())
    }
}

impl From<TypeIndex> for TypeRef {
    fn from(index: TypeIndex) -> Self {
        TypeRef::Primitive(index)
    }
}

/// The non-primitive type ID space ran out during the numbering pass: the
/// translation unit has more distinct types than the format's 16-bit index
/// width allows. Fatal; the driver diagnoses and aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeIndexExhausted {
    /// Number of records awaiting sequential indices.
    pub record_count: usize,
}

impl fmt::Display for TypeIndexExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "too many distinct types for the 16-bit type index space ({} records)",
            self.record_count
        )
    }
}

impl std::error::Error for TypeIndexExhausted {}

struct Entry {
    record: TypeRecord,
    /// Final type stream index. Pre-set at intern time for records that
    /// collapse to a composite pointer-to-primitive index; everything else
    /// is filled in by the numbering pass.
    index: Option<TypeIndex>,
}

/// Deduplicating table of non-primitive type records.
///
/// Two structurally-equal descriptors always resolve to the same record
/// instance, so `intern` is idempotent and `TypeRef` equality is type
/// identity.
#[derive(Default)]
pub struct TypeTable {
    map: FxHashMap<TypeRecord, TypeHandle>,
    records: Vec<Entry>,
    numbered: bool,
}

impl TypeTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interned records (composite-collapsed pointers included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Intern a descriptor, returning the shared reference for it.
    ///
    /// A pointer record in one of the two canonical shapes whose target is
    /// a true primitive gets its composite index assigned immediately; the
    /// record still occupies a table slot so interning stays idempotent,
    /// but the numbering pass and the types section both skip it.
    pub fn intern(&mut self, record: TypeRecord) -> TypeRef {
        if let Some(&handle) = self.map.get(&record) {
            return TypeRef::Record(handle);
        }

        debug_assert!(!self.numbered, "intern after the numbering pass");

        let index = match &record {
            TypeRecord::Pointer {
                target: TypeRef::Primitive(p),
                attrs,
            } if attrs.is_plain_canonical() => p.composite_pointer(attrs.composite_mode()),
            _ => None,
        };

        let handle = TypeHandle(self.records.len() as u32);
        self.records.push(Entry {
            record: record.clone(),
            index,
        });
        self.map.insert(record, handle);
        TypeRef::Record(handle)
    }

    // Convenience constructors. All of them go through `intern`, so calling
    // the same constructor with the same arguments returns the same ref.

    /// Qualify `base` with a `const`/`volatile` mask. An empty mask is the
    /// unqualified type itself.
    pub fn modifier(&mut self, base: TypeRef, flags: ModifierFlags) -> TypeRef {
        if flags.is_empty() {
            return base;
        }
        self.intern(TypeRecord::Modifier { base, flags })
    }

    /// Pointer to `target` with the given attribute word.
    pub fn pointer(&mut self, target: TypeRef, attrs: PointerAttrs) -> TypeRef {
        self.intern(TypeRecord::Pointer { target, attrs })
    }

    /// Fixed-length array of `element`.
    ///
    /// The element count is the byte length divided by the element size
    /// (taken from its declared size in bits), rounding toward zero; the
    /// stored length is canonicalized back to count times element size.
    pub fn array(
        &mut self,
        element: TypeRef,
        index: TypeIndex,
        length_bytes: u64,
        element_size_bits: u64,
    ) -> TypeRef {
        let element_bytes = element_size_bits / 8;
        let count = if element_bytes == 0 {
            0
        } else {
            length_bytes / element_bytes
        };
        self.intern(TypeRecord::Array {
            element,
            index,
            length_bytes: count * element_bytes,
        })
    }

    /// Ordered parameter list. The zero-parameter list is a single shared
    /// canonical instance across all call sites.
    pub fn arg_list(&mut self, args: &[TypeRef]) -> TypeRef {
        self.intern(TypeRecord::ArgList { args: args.into() })
    }

    /// Procedure prototype over an already-interned arg list.
    pub fn procedure(
        &mut self,
        return_type: TypeRef,
        convention: CallingConvention,
        param_count: u16,
        arg_list: TypeRef,
    ) -> TypeRef {
        self.intern(TypeRecord::Procedure {
            return_type,
            convention,
            attrs: 0,
            param_count,
            arg_list,
        })
    }

    /// Look up a record by handle.
    ///
    /// # Panics
    /// Panics if the handle was not created by this table.
    #[must_use]
    pub fn record(&self, handle: TypeHandle) -> &TypeRecord {
        &self.records[handle.idx()].record
    }

    /// Assign final indices to every record, in creation order.
    ///
    /// Records that already collapsed to a composite index are skipped;
    /// everything else gets the next sequential index starting at
    /// [`TypeIndex::FIRST_NONPRIMITIVE`]. Fails when the counter would wrap
    /// past the 16-bit index space.
    pub fn assign_indices(&mut self) -> Result<(), TypeIndexExhausted> {
        let mut next = TypeIndex::FIRST_NONPRIMITIVE;
        for entry in &mut self.records {
            if entry.index.is_some() {
                continue;
            }
            if next > TypeIndex::MAX {
                return Err(TypeIndexExhausted {
                    record_count: self.records.len(),
                });
            }
            entry.index = Some(TypeIndex::new(next));
            next += 1;
        }
        self.numbered = true;
        Ok(())
    }

    /// Resolve a reference to its final type stream index.
    ///
    /// # Panics
    /// Panics if called on a record reference before [`Self::assign_indices`].
    #[must_use]
    pub fn resolve(&self, r: TypeRef) -> TypeIndex {
        match r {
            TypeRef::Primitive(index) => index,
            TypeRef::Record(handle) => match self.records[handle.idx()].index {
                Some(index) => index,
                None => panic!("type reference resolved before the numbering pass"),
            },
        }
    }

    /// Sequentially numbered records in numbering order, for the types
    /// section. Composite-collapsed records do not appear.
    pub fn numbered_records(&self) -> impl Iterator<Item = (TypeIndex, &TypeRecord)> {
        self.records.iter().filter_map(|entry| {
            let index = entry.index?;
            (!index.is_primitive()).then_some((index, &entry.record))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_is_idempotent() {
        let mut table = TypeTable::new();
        let target_a = TypeRef::Record(dummy(&mut table));
        let a = table.pointer(target_a, PointerAttrs::ptr64());
        let target_b = TypeRef::Record(dummy(&mut table));
        let b = table.pointer(target_b, PointerAttrs::ptr64());
        assert_eq!(a, b);
    }

    // A non-primitive target so pointers don't collapse to composites.
    fn dummy(table: &mut TypeTable) -> TypeHandle {
        match table.modifier(TypeIndex::INT32.into(), ModifierFlags::VOLATILE) {
            TypeRef::Record(h) => h,
            TypeRef::Primitive(_) => unreachable!(),
        }
    }

    #[test]
    fn arrays_differing_in_length_are_distinct() {
        let mut table = TypeTable::new();
        let a = table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, 8, 32);
        let b = table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, 16, 32);
        assert_ne!(a, b);
    }

    #[test]
    fn array_length_rounds_toward_zero() {
        let mut table = TypeTable::new();
        // 9 bytes of 4-byte elements is two elements: same record as 8 bytes.
        let a = table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, 9, 32);
        let b = table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, 8, 32);
        assert_eq!(a, b);
    }

    #[test]
    fn empty_arg_list_is_shared() {
        let mut table = TypeTable::new();
        let a = table.arg_list(&[]);
        let b = table.arg_list(&[]);
        assert_eq!(a, b);
    }

    #[test]
    fn numbering_is_sequential_and_skips_composites() {
        let mut table = TypeTable::new();
        // Collapses to composite 0x0674, takes no sequential slot.
        let p = table.pointer(TypeIndex::INT32.into(), PointerAttrs::ptr64());
        let m = table.modifier(TypeIndex::INT32.into(), ModifierFlags::CONST);
        let a = table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, 8, 32);
        table.assign_indices().unwrap();

        assert_eq!(table.resolve(p), TypeIndex::new(0x0674));
        assert_eq!(table.resolve(m), TypeIndex::new(0x1000));
        assert_eq!(table.resolve(a), TypeIndex::new(0x1001));

        let numbered: Vec<_> = table.numbered_records().map(|(i, _)| i).collect();
        assert_eq!(numbered, vec![TypeIndex::new(0x1000), TypeIndex::new(0x1001)]);
    }

    #[test]
    fn pointer_to_record_gets_sequential_index() {
        let mut table = TypeTable::new();
        let m = table.modifier(TypeIndex::INT32.into(), ModifierFlags::CONST);
        let p = table.pointer(m, PointerAttrs::ptr64());
        table.assign_indices().unwrap();
        assert_eq!(table.resolve(p), TypeIndex::new(0x1001));
    }

    #[test]
    fn reference_mode_pointer_to_primitive_is_not_collapsed() {
        let mut table = TypeTable::new();
        let attrs = PointerAttrs::ptr64().with_mode(crate::PointerMode::LValueReference);
        let p = table.pointer(TypeIndex::INT32.into(), attrs);
        table.assign_indices().unwrap();
        assert_eq!(table.resolve(p), TypeIndex::new(0x1000));
    }

    #[test]
    fn numbering_fails_when_the_index_space_wraps() {
        let mut table = TypeTable::new();
        // One more record than fits in [0x1000, 0xFFFF].
        for i in 0..=0xF000u64 {
            table.array(TypeIndex::INT32.into(), TypeIndex::UINT64, i * 4, 32);
        }
        let err = table.assign_indices().unwrap_err();
        assert_eq!(err.record_count, 0xF001);
    }

    #[test]
    fn empty_modifier_mask_is_the_base() {
        let mut table = TypeTable::new();
        let base = TypeRef::from(TypeIndex::INT32);
        assert_eq!(table.modifier(base, ModifierFlags::empty()), base);
    }
}
