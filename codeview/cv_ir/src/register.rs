//! Register and frame contracts supplied by the target description.
//!
//! The mapping from machine registers to the format's canonical register
//! IDs is a fixed per-architecture table owned by the target description;
//! this module only defines the seam.

/// The format's architecture-independent register identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct CvRegister(pub u16);

impl CvRegister {
    /// "No register" sentinel, used when a register/mode pair has no
    /// canonical ID.
    pub const NONE: CvRegister = CvRegister(0);

    #[must_use]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

/// The compiler's internal register number, opaque to this backend.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct MachineReg(pub u32);

/// Value class held in a register, part of the canonical-ID lookup key.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RegisterClass {
    Integer,
    Float,
    Vector,
}

/// Pure lookup from (machine register, value class/width) to canonical
/// register ID. `None` means the pair has no canonical mapping; callers
/// degrade to [`CvRegister::NONE`] with a diagnostic.
pub trait RegisterMapper {
    fn canonical(&self, reg: MachineReg, class: RegisterClass, width_bits: u32)
        -> Option<CvRegister>;
}

/// Pseudo-base a register-relative offset was recorded against, before the
/// final frame layout is known.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum FrameBase {
    /// Offsets relative to the incoming-argument pointer.
    ArgPointer,
    /// Offsets relative to the (virtual) frame pointer.
    FramePointer,
}

/// Canonical frame geometry of a function, fixed once final frame layout
/// is known.
///
/// Offsets recorded against the two pseudo-bases are re-derived through
/// [`FrameGeometry::resolve`]: each base maps to the real base register
/// (hard frame pointer if the function got one, else the stack pointer)
/// plus a canonical displacement.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct FrameGeometry {
    /// Whether the function ended up with a hard frame pointer.
    pub hard_frame_pointer: bool,
    /// Canonical ID of the frame pointer register.
    pub frame_pointer: CvRegister,
    /// Canonical ID of the stack pointer register.
    pub stack_pointer: CvRegister,
    /// Whether the frame pointer is the BP-convention register, making
    /// fixed frame-relative locals eligible for `S_BPREL32`.
    pub bp_convention: bool,
    /// Displacement from the real base to the argument-pointer pseudo-base.
    pub arg_base_offset: i32,
    /// Displacement from the real base to the frame-pointer pseudo-base.
    pub frame_base_offset: i32,
}

impl Default for FrameGeometry {
    /// Stack-pointer-relative frame with no known registers; only useful
    /// as a placeholder before the final layout is recorded.
    fn default() -> Self {
        FrameGeometry {
            hard_frame_pointer: false,
            frame_pointer: CvRegister::NONE,
            stack_pointer: CvRegister::NONE,
            bp_convention: false,
            arg_base_offset: 0,
            frame_base_offset: 0,
        }
    }
}

impl FrameGeometry {
    /// Real base register frame offsets resolve against.
    #[must_use]
    pub fn base_register(&self) -> CvRegister {
        if self.hard_frame_pointer {
            self.frame_pointer
        } else {
            self.stack_pointer
        }
    }

    /// Re-derive a recorded (pseudo-base, offset) pair against the final
    /// frame layout.
    #[must_use]
    pub fn resolve(&self, base: FrameBase, offset: i32) -> (CvRegister, i32) {
        let displacement = match base {
            FrameBase::ArgPointer => self.arg_base_offset,
            FrameBase::FramePointer => self.frame_base_offset,
        };
        (self.base_register(), offset + displacement)
    }

    /// Whether fixed frame-relative locals should use the BP-relative
    /// record form.
    #[must_use]
    pub fn use_bprel(&self) -> bool {
        self.hard_frame_pointer && self.bp_convention
    }
}
