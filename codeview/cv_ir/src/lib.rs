//! Data model for the CodeView debug-information backend.
//!
//! This crate owns the pieces of the debug backend that are independent of
//! the emission pass: type indices and primitive classification, the tagged
//! type-record union, the structural type interner with its deferred
//! numbering pass, and the register/frame contracts supplied by the target
//! description.
//!
//! Type references are forward-reference-safe: [`TypeRef`] values hand out
//! stable handles long before the numbering pass runs, and only the finishing
//! pass pins down the [`TypeIndex`] each record gets in the type stream.

mod index;
mod interner;
mod primitive;
mod record;
mod register;

pub use index::TypeIndex;
pub use interner::{TypeHandle, TypeIndexExhausted, TypeRef, TypeTable};
pub use primitive::{classify_primitive, PrimitiveKind};
pub use record::{CallingConvention, ModifierFlags, PointerAttrs, PointerMode, TypeRecord};
pub use register::{CvRegister, FrameBase, FrameGeometry, MachineReg, RegisterClass, RegisterMapper};
