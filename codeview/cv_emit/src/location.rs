//! Variable storage classification and location-range reconstruction.
//!
//! Every local gets a one-time classification at declaration. Variables
//! that later receive location-change events are reclassified as
//! "optimized": their lifetime is partitioned into consecutive,
//! non-overlapping, gap-free validity ranges, one per pair of adjacent
//! events, with the last range running to function end.

use cv_ir::{CvRegister, FrameBase, MachineReg, RegisterClass, RegisterMapper, TypeRef};

use crate::block::BlockId;
use crate::sink::Label;

/// Index of a local variable within its function.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct LocalId(u32);

impl LocalId {
    #[must_use]
    pub fn new(raw: u32) -> Self {
        LocalId(raw)
    }

    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Raw storage fact supplied by the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAssignment {
    /// The value lives in a machine register.
    Register {
        reg: MachineReg,
        class: RegisterClass,
        width_bits: u32,
    },
    /// The value lives at an offset from one of the two frame pseudo-bases;
    /// the offset is re-derived against the final frame geometry before
    /// emission.
    FrameRelative { base: FrameBase, offset: i32 },
    /// The value lives at an offset from an ordinary register.
    RegisterRelative {
        reg: MachineReg,
        class: RegisterClass,
        width_bits: u32,
        offset: i32,
    },
    /// The value lives at a named symbol (static storage).
    Static { label: Label },
}

/// Declaration-time classification of a local's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarStorage {
    Register(CvRegister),
    FrameRelative { base: FrameBase, offset: i32 },
    RegisterRelative { reg: CvRegister, offset: i32 },
    Static { label: Label },
    /// No representable fixed location.
    Unrepresentable,
}

/// Physical location carried by one location-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackedLocation {
    Register(CvRegister),
    FrameRelative { base: FrameBase, offset: i32 },
    RegisterRelative { reg: CvRegister, offset: i32 },
    /// The code generator lost track of the value. Still emitted as an
    /// explicit range so lifetime coverage stays exact.
    Unknown,
}

/// One "variable now lives here" note from the code generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationEvent {
    /// Monotonic event index within the function.
    pub seq: u32,
    pub var: LocalId,
    pub loc: TrackedLocation,
    pub label: Label,
}

/// One local variable: either a fixed location or, once events exist,
/// "optimized" and resolved against the event list.
#[derive(Debug)]
pub struct LocalVariable {
    pub name: String,
    pub ty: TypeRef,
    pub block: BlockId,
    pub is_param: bool,
    pub storage: VarStorage,
    /// Set once any location-change event names this variable.
    pub optimized: bool,
}

/// Map a machine register through the target's canonical table, degrading
/// to the no-register sentinel with a diagnostic when the pair has no
/// mapping.
pub fn map_register(
    mapper: &dyn RegisterMapper,
    reg: MachineReg,
    class: RegisterClass,
    width_bits: u32,
) -> CvRegister {
    match mapper.canonical(reg, class, width_bits) {
        Some(cv) => cv,
        None => {
            tracing::warn!(?reg, ?class, width_bits, "no canonical register id");
            CvRegister::NONE
        }
    }
}

/// One-time declaration classification.
pub fn classify(mapper: &dyn RegisterMapper, assignment: &StorageAssignment) -> VarStorage {
    match *assignment {
        StorageAssignment::Register {
            reg,
            class,
            width_bits,
        } => VarStorage::Register(map_register(mapper, reg, class, width_bits)),
        StorageAssignment::FrameRelative { base, offset } => {
            VarStorage::FrameRelative { base, offset }
        }
        StorageAssignment::RegisterRelative {
            reg,
            class,
            width_bits,
            offset,
        } => VarStorage::RegisterRelative {
            reg: map_register(mapper, reg, class, width_bits),
            offset,
        },
        StorageAssignment::Static { label } => VarStorage::Static { label },
    }
}

/// Event location for a change note; `None` means the value's location is
/// unknown from this point.
pub fn track(mapper: &dyn RegisterMapper, assignment: Option<&StorageAssignment>) -> TrackedLocation {
    match assignment {
        None => TrackedLocation::Unknown,
        Some(&StorageAssignment::Register {
            reg,
            class,
            width_bits,
        }) => TrackedLocation::Register(map_register(mapper, reg, class, width_bits)),
        Some(&StorageAssignment::FrameRelative { base, offset }) => {
            TrackedLocation::FrameRelative { base, offset }
        }
        Some(&StorageAssignment::RegisterRelative {
            reg,
            class,
            width_bits,
            offset,
        }) => TrackedLocation::RegisterRelative {
            reg: map_register(mapper, reg, class, width_bits),
            offset,
        },
        // A move into static storage has no range record form; coverage is
        // preserved with an explicit unknown range.
        Some(&StorageAssignment::Static { .. }) => TrackedLocation::Unknown,
    }
}

/// One validity range of an optimized variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationRange {
    pub loc: TrackedLocation,
    pub start: Label,
    pub end: Label,
}

/// Partition a variable's lifetime into validity ranges.
///
/// Each range is bounded by two consecutive events for the variable; the
/// last range extends to `function_end`. Ranges tile the lifetime with no
/// gaps and no overlaps, and unknown-location ranges are kept explicit.
#[must_use]
pub fn build_ranges(
    events: &[LocationEvent],
    var: LocalId,
    function_end: Label,
) -> Vec<LocationRange> {
    let own: Vec<&LocationEvent> = events.iter().filter(|e| e.var == var).collect();
    let mut ranges = Vec::with_capacity(own.len());
    for (i, event) in own.iter().enumerate() {
        let end = own.get(i + 1).map_or(function_end, |next| next.label);
        ranges.push(LocationRange {
            loc: event.loc,
            start: event.label,
            end,
        });
    }
    ranges
}
