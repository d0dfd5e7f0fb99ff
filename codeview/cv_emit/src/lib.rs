//! CodeView symbol and type section emission.
//!
//! This crate turns the facts a host compiler reports during code
//! generation (declarations, storage assignments, location-change notes,
//! line transitions, lexical blocks, globals) into the two binary debug
//! sections external debuggers consume: a symbols section and a types
//! section.
//!
//! # Driving the context
//!
//! ```ignore
//! let mut ctx = DebugContext::new(&mapper);            // unit start
//! let file = ctx.add_file(Path::new("src/main.x"));
//! let start = ctx.make_label();
//! ctx.begin_function(Some("main"), Visibility::Public, proto, start);
//! // ... declarations, lines, blocks, location notes ...
//! let end = ctx.make_label();
//! ctx.end_function(end, frame_geometry);
//! ctx.finish(&mut sink)?;                              // unit finish
//! ```
//!
//! Emission is a single batched pass at unit finish: type indices are not
//! final until every type has been observed, so nothing can be streamed
//! earlier. Code addresses never appear literally; the [`OutputSink`] seam
//! expresses them as labels, section-relative references, and label
//! differences resolved at link time.

mod block;
mod context;
mod line;
mod location;
mod sink;
mod source_file;
mod strings;
mod symbols;
mod types_section;
mod writer;

pub use block::{Block, BlockId, BlockTree};
pub use context::{DebugContext, EmitError, FunctionRecord, GlobalVariable, Visibility};
pub use line::{LineEntry, LineTable};
pub use location::{
    build_ranges, LocalId, LocalVariable, LocationEvent, LocationRange, StorageAssignment,
    TrackedLocation, VarStorage,
};
pub use sink::{
    DebugSection, Directive, Label, LabelAlloc, ObjectBuffer, OutputSink, ResolvedSections,
    UnresolvedLabel,
};
pub use source_file::{FileId, FileTable, SourceFile};
pub use strings::StringTable;
pub use writer::SectionBuilder;

#[cfg(test)]
mod tests;
