//! The per-unit emitter context.
//!
//! One [`DebugContext`] spans one compilation unit and is driven
//! synchronously by the host compiler's callback sequence: unit start,
//! per-file registration, per-function begin, interleaved
//! declaration/location/line/block events, per-function end, global
//! registrations, unit finish. Nothing is streamed incrementally: every
//! function and type is retained until the single finishing pass, because
//! type indices are not final until every type has been observed.

use std::path::Path;

use cv_ir::{FrameGeometry, RegisterMapper, TypeIndexExhausted, TypeRef, TypeTable};

use crate::block::BlockTree;
use crate::line::LineTable;
use crate::location::{
    classify, track, LocalId, LocalVariable, LocationEvent, StorageAssignment,
};
use crate::sink::{DebugSection, Label, LabelAlloc, OutputSink};
use crate::source_file::{FileId, FileTable};
use crate::strings::StringTable;
use crate::{symbols, types_section};

/// Symbol visibility, selecting between the local and global record forms.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Visibility {
    Public,
    Private,
}

/// Function lifecycle within the unit.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum FunctionState {
    /// Begun; declarations and events still arriving.
    Created,
    /// Fully recorded; awaiting the batched emission pass.
    Populated,
    /// Drained by the finishing pass.
    Emitted,
}

/// Everything recorded for one function between its begin and end
/// callbacks, consumed by the emitter at unit finish.
#[derive(Debug)]
pub struct FunctionRecord {
    pub(crate) name: Option<String>,
    pub(crate) seq: u32,
    pub(crate) visibility: Visibility,
    pub(crate) proto: TypeRef,
    pub(crate) start: Label,
    pub(crate) end: Option<Label>,
    pub(crate) geometry: Option<FrameGeometry>,
    pub(crate) blocks: BlockTree,
    pub(crate) locals: Vec<LocalVariable>,
    pub(crate) events: Vec<LocationEvent>,
    pub(crate) lines: LineTable,
    pub(crate) state: FunctionState,
}

impl FunctionRecord {
    /// End-of-code label; only meaningful once the function is populated.
    pub(crate) fn end_label(&self) -> Label {
        self.end.unwrap_or(self.start)
    }

    /// Final frame geometry recorded at function end.
    pub(crate) fn frame_geometry(&self) -> FrameGeometry {
        self.geometry.unwrap_or_default()
    }
}

/// A queued global variable, emitted and freed at unit finish.
#[derive(Debug)]
pub struct GlobalVariable {
    pub name: String,
    /// Object-layer symbol name; the emitted record name when `name` is
    /// empty.
    pub linkage_name: String,
    pub visibility: Visibility,
    pub ty: TypeRef,
    pub label: Label,
}

/// Emission failed fatally; the driver diagnoses and aborts.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("type index space exhausted: {0}")]
    TypeIndexSpace(#[from] TypeIndexExhausted),
    #[error("function {0:?} still open at unit finish")]
    OpenFunction(String),
}

/// Per-unit emitter context.
///
/// Single-threaded and strictly sequential by the caller's contract; all
/// state is unit-scoped and fully drained by [`DebugContext::finish`].
pub struct DebugContext<'a> {
    mapper: &'a dyn RegisterMapper,
    types: TypeTable,
    files: FileTable,
    strings: StringTable,
    labels: LabelAlloc,
    functions: Vec<FunctionRecord>,
    current: Option<FunctionRecord>,
    globals: Vec<GlobalVariable>,
    next_event: u32,
    next_seq: u32,
}

impl<'a> DebugContext<'a> {
    /// Unit start.
    #[must_use]
    pub fn new(mapper: &'a dyn RegisterMapper) -> Self {
        tracing::debug!("debug unit start");
        DebugContext {
            mapper,
            types: TypeTable::new(),
            files: FileTable::new(),
            strings: StringTable::new(),
            labels: LabelAlloc::default(),
            functions: Vec::new(),
            current: None,
            globals: Vec::new(),
            next_event: 0,
            next_seq: 0,
        }
    }

    /// The unit's type table, for on-demand interning.
    pub fn types(&mut self) -> &mut TypeTable {
        &mut self.types
    }

    /// Allocate the next code-position label. Allocation order is the
    /// code-position order the callbacks rely on.
    pub fn make_label(&mut self) -> Label {
        self.labels.fresh()
    }

    /// Register a source file (first reference creates and hashes it).
    pub fn add_file(&mut self, path: &Path) -> FileId {
        self.files.intern(path)
    }

    /// Register a source file with externally supplied contents.
    pub fn add_file_with_contents(&mut self, path: &Path, contents: Option<&[u8]>) -> FileId {
        self.files.intern_with_contents(path, contents)
    }

    /// Function begin.
    ///
    /// # Panics
    /// Panics if the previous function was never ended.
    pub fn begin_function(
        &mut self,
        name: Option<&str>,
        visibility: Visibility,
        proto: TypeRef,
        start: Label,
    ) {
        assert!(
            self.current.is_none(),
            "function begun while another is open"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.current = Some(FunctionRecord {
            name: name.map(str::to_owned),
            seq,
            visibility,
            proto,
            start,
            end: None,
            geometry: None,
            blocks: BlockTree::new(),
            locals: Vec::new(),
            events: Vec::new(),
            lines: LineTable::new(),
            state: FunctionState::Created,
        });
    }

    fn current_mut(&mut self) -> &mut FunctionRecord {
        match self.current.as_mut() {
            Some(f) => f,
            None => panic!("function callback outside begin/end"),
        }
    }

    /// Declare a local in the current block, classifying its storage once
    /// from the initial physical assignment.
    pub fn declare_local(
        &mut self,
        name: &str,
        ty: TypeRef,
        assignment: &StorageAssignment,
        is_param: bool,
    ) -> LocalId {
        let storage = classify(self.mapper, assignment);
        let f = self.current_mut();
        let id = LocalId::new(f.locals.len() as u32);
        let block = f.blocks.current();
        f.locals.push(LocalVariable {
            name: name.to_owned(),
            ty,
            block,
            is_param,
            storage,
            optimized: false,
        });
        f.blocks.add_local(id);
        id
    }

    /// Record a "variable now lives here" note; `None` means the location
    /// is unknown from this point. The variable is reclassified as
    /// optimized and resolved against its event list at emission.
    pub fn note_location(
        &mut self,
        var: LocalId,
        assignment: Option<&StorageAssignment>,
        label: Label,
    ) {
        let loc = track(self.mapper, assignment);
        let seq = self.next_event;
        self.next_event += 1;
        let f = self.current_mut();
        f.locals[var.index()].optimized = true;
        f.events.push(LocationEvent {
            seq,
            var,
            loc,
            label,
        });
    }

    /// Record a source position transition.
    pub fn line(&mut self, line: u32, file: FileId, label: Label) {
        self.current_mut().lines.add(line, file, label);
    }

    /// Lexical block enter.
    pub fn begin_block(&mut self, start: Label) {
        self.current_mut().blocks.enter(start);
    }

    /// Lexical block exit.
    ///
    /// # Panics
    /// Panics when no block is open; strict nesting is the caller's
    /// contract.
    pub fn end_block(&mut self, end: Label) {
        self.current_mut().blocks.exit(end);
    }

    /// Function end: the final frame geometry is now known, and the
    /// function is fully populated.
    ///
    /// # Panics
    /// Panics if blocks are still open or no function is current.
    pub fn end_function(&mut self, end: Label, geometry: FrameGeometry) {
        let f = self.current_mut();
        debug_assert_eq!(
            f.state,
            FunctionState::Created,
            "function ended out of order"
        );
        assert!(f.blocks.is_balanced(), "function ended with open blocks");
        f.end = Some(end);
        f.geometry = Some(geometry);
        f.state = FunctionState::Populated;
        let f = match self.current.take() {
            Some(f) => f,
            None => unreachable!("current_mut() above guarantees a function"),
        };
        tracing::debug!(name = ?f.name, seq = f.seq, locals = f.locals.len(), "function populated");
        self.functions.push(f);
    }

    /// Queue a global variable for the finishing pass.
    pub fn add_global(
        &mut self,
        name: &str,
        linkage_name: &str,
        visibility: Visibility,
        ty: TypeRef,
        label: Label,
    ) {
        self.globals.push(GlobalVariable {
            name: name.to_owned(),
            linkage_name: linkage_name.to_owned(),
            visibility,
            ty,
            label,
        });
    }

    /// Unit finish: run the numbering pass, then emit both sections in one
    /// batched pass, draining all unit state.
    pub fn finish(mut self, sink: &mut dyn OutputSink) -> Result<(), EmitError> {
        if let Some(open) = &self.current {
            return Err(EmitError::OpenFunction(
                open.name.clone().unwrap_or_default(),
            ));
        }

        self.types.assign_indices().map_err(|err| {
            tracing::error!(%err, "fatal: cannot number type records");
            EmitError::from(err)
        })?;

        for f in &mut self.functions {
            debug_assert_eq!(
                f.state,
                FunctionState::Populated,
                "unpopulated function reached the finishing pass"
            );
            f.state = FunctionState::Emitted;
        }

        let symbols = symbols::emit_symbols(
            &self.types,
            &self.functions,
            &self.globals,
            &self.files,
            &mut self.strings,
            &mut self.labels,
        );
        let types = types_section::emit_types(&self.types);

        sink.switch_section(DebugSection::Symbols);
        symbols.drain_into(sink);
        sink.switch_section(DebugSection::Types);
        types.drain_into(sink);

        tracing::debug!(
            functions = self.functions.len(),
            globals = self.globals.len(),
            types = self.types.len(),
            "debug unit finished"
        );
        Ok(())
    }
}
