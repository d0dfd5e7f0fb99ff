//! Symbols section: globals, per-function procedure/scope/variable/location
//! records, the string table, the file-checksum table, and the line tables.

use cv_ir::{FrameGeometry, TypeTable};

use crate::block::BlockId;
use crate::context::{FunctionRecord, GlobalVariable, Visibility};
use crate::location::{build_ranges, LocalVariable, LocationRange, TrackedLocation, VarStorage};
use crate::sink::{Label, LabelAlloc};
use crate::source_file::{FileId, FileTable};
use crate::strings::StringTable;
use crate::writer::{SectionBuilder, CV_SIGNATURE_C13};

const S_END: u16 = 0x0006;
const S_BLOCK32: u16 = 0x1103;
const S_REGISTER: u16 = 0x1106;
const S_BPREL32: u16 = 0x110B;
const S_LDATA32: u16 = 0x110C;
const S_GDATA32: u16 = 0x110D;
const S_LPROC32: u16 = 0x110F;
const S_GPROC32: u16 = 0x1110;
const S_REGREL32: u16 = 0x1111;
const S_LOCAL: u16 = 0x113E;
const S_DEFRANGE_REGISTER: u16 = 0x1141;
const S_DEFRANGE_FRAMEPOINTER_REL: u16 = 0x1142;
const S_DEFRANGE_REGISTER_REL: u16 = 0x1145;

const DEBUG_S_SYMBOLS: u32 = 0xF1;
const DEBUG_S_LINES: u32 = 0xF2;
const DEBUG_S_STRINGTABLE: u32 = 0xF3;
const DEBUG_S_FILECHKSMS: u32 = 0xF4;

/// Statement flag on a line-number word; the source IR carries no
/// is-statement distinction, so every entry sets it.
const LINE_STATEMENT: u32 = 0x8000_0000;

/// MD5 checksum entry: type byte and payload size.
const CHKSUM_TYPE_MD5: u8 = 1;
const MD5_LEN: usize = 16;

pub(crate) fn emit_symbols(
    types: &TypeTable,
    functions: &[FunctionRecord],
    globals: &[GlobalVariable],
    files: &FileTable,
    strings: &mut StringTable,
    labels: &mut LabelAlloc,
) -> SectionBuilder {
    let mut b = SectionBuilder::new();
    b.u32(CV_SIGNATURE_C13);

    // Per-file byte offsets into the checksum table; files without a
    // digest are omitted from the table. Interning the normalized paths
    // here also fixes the string table before it is written out.
    let checksum_offsets = checksum_offsets(files, strings);

    let end = begin_subsection(&mut b, DEBUG_S_SYMBOLS, labels);
    for global in globals {
        emit_global(&mut b, types, global);
    }
    for function in functions {
        emit_function(&mut b, types, function);
    }
    end_subsection(&mut b, end);

    let end = begin_subsection(&mut b, DEBUG_S_STRINGTABLE, labels);
    b.bytes(strings.bytes());
    end_subsection(&mut b, end);

    let end = begin_subsection(&mut b, DEBUG_S_FILECHKSMS, labels);
    for (_, file) in files.iter() {
        if let Some(digest) = file.digest {
            b.u32(strings.offset(&file.normalized));
            b.u8(MD5_LEN as u8);
            b.u8(CHKSUM_TYPE_MD5);
            b.bytes(&digest);
            b.align4();
        }
    }
    end_subsection(&mut b, end);

    for function in functions {
        if !function.lines.is_empty() {
            emit_line_table(&mut b, function, &checksum_offsets, labels);
        }
    }

    b
}

/// Subsection header: kind, then a link-time-resolved content length.
fn begin_subsection(b: &mut SectionBuilder, kind: u32, labels: &mut LabelAlloc) -> Label {
    b.u32(kind);
    let start = labels.fresh();
    let end = labels.fresh();
    b.diff32(end, start);
    b.define_label(start);
    end
}

fn end_subsection(b: &mut SectionBuilder, end: Label) {
    b.define_label(end);
    b.align4();
}

fn checksum_offsets(files: &FileTable, strings: &mut StringTable) -> Vec<Option<u32>> {
    let mut offsets = vec![None; files.len()];
    let mut at = 0u32;
    for (id, file) in files.iter() {
        strings.offset(&file.normalized);
        if file.digest.is_some() {
            offsets[id.index()] = Some(at);
            // Entry header + digest, padded to 4 bytes.
            let entry = 4 + 1 + 1 + MD5_LEN as u32;
            at += (entry + 3) & !3;
        }
    }
    offsets
}

fn emit_global(b: &mut SectionBuilder, types: &TypeTable, global: &GlobalVariable) {
    let kind = match global.visibility {
        Visibility::Public => S_GDATA32,
        Visibility::Private => S_LDATA32,
    };
    // Source-level name, falling back to the linkage name for globals the
    // front end never named (compiler-generated data).
    let name = if global.name.is_empty() {
        &global.linkage_name
    } else {
        &global.name
    };
    let mark = b.begin_record(kind);
    b.u32(types.resolve(global.ty).raw());
    b.secrel32(global.label);
    b.secidx16(global.label);
    b.strz(name);
    b.end_record(mark);
}

fn emit_function(b: &mut SectionBuilder, types: &TypeTable, f: &FunctionRecord) {
    let kind = match f.visibility {
        Visibility::Public => S_GPROC32,
        Visibility::Private => S_LPROC32,
    };
    let end_label = f.end_label();

    let mark = b.begin_record(kind);
    b.u32(0); // parent
    b.u32(0); // end
    b.u32(0); // next
    b.diff32(end_label, f.start); // code length, resolved at link time
    b.u32(0); // debug start
    b.u32(0); // debug end
    b.u32(types.resolve(f.proto).raw());
    b.secrel32(f.start);
    b.secidx16(f.start);
    b.u8(0); // proc flags
    b.strz(f.name.as_deref().unwrap_or(""));
    b.end_record(mark);

    emit_block_contents(b, types, f, BlockId::ROOT);

    let mark = b.begin_record(S_END);
    b.end_record(mark);
}

/// Pre-order flush: a block's own locals first, then each child wrapped in
/// scope-open/scope-close records.
fn emit_block_contents(b: &mut SectionBuilder, types: &TypeTable, f: &FunctionRecord, id: BlockId) {
    let block = f.blocks.block(id);
    for &local in &block.locals {
        emit_local(b, types, f, &f.locals[local.index()], local);
    }
    for &child in &block.children {
        let child_block = f.blocks.block(child);
        let start = child_block.start.unwrap_or(f.start);
        let end = child_block.end.unwrap_or_else(|| f.end_label());

        let mark = b.begin_record(S_BLOCK32);
        b.u32(0); // parent
        b.u32(0); // end
        b.diff32(end, start);
        b.secrel32(start);
        b.secidx16(start);
        b.strz("");
        b.end_record(mark);

        emit_block_contents(b, types, f, child);

        let mark = b.begin_record(S_END);
        b.end_record(mark);
    }
}

fn emit_local(
    b: &mut SectionBuilder,
    types: &TypeTable,
    f: &FunctionRecord,
    var: &LocalVariable,
    id: crate::location::LocalId,
) {
    let typind = types.resolve(var.ty).raw();
    let geometry = f.frame_geometry();

    if var.optimized {
        emit_s_local(b, typind, var);
        for range in build_ranges(&f.events, id, f.end_label()) {
            emit_defrange(b, &geometry, &range);
        }
        return;
    }

    match var.storage {
        VarStorage::Register(reg) => {
            let mark = b.begin_record(S_REGISTER);
            b.u32(typind);
            b.u16(reg.0);
            b.strz(&var.name);
            b.end_record(mark);
        }
        VarStorage::FrameRelative { base, offset } => {
            let (reg, offset) = geometry.resolve(base, offset);
            if geometry.use_bprel() {
                let mark = b.begin_record(S_BPREL32);
                b.i32(offset);
                b.u32(typind);
                b.strz(&var.name);
                b.end_record(mark);
            } else {
                emit_regrel(b, typind, reg.0, offset, &var.name);
            }
        }
        VarStorage::RegisterRelative { reg, offset } => {
            emit_regrel(b, typind, reg.0, offset, &var.name);
        }
        VarStorage::Static { label } => {
            let mark = b.begin_record(S_LDATA32);
            b.u32(typind);
            b.secrel32(label);
            b.secidx16(label);
            b.strz(&var.name);
            b.end_record(mark);
        }
        // No representable fixed location: the variable is still emitted,
        // as a local with no ranges.
        VarStorage::Unrepresentable => emit_s_local(b, typind, var),
    }
}

fn emit_s_local(b: &mut SectionBuilder, typind: u32, var: &LocalVariable) {
    let mark = b.begin_record(S_LOCAL);
    b.u32(typind);
    b.u16(u16::from(var.is_param)); // flags: bit 0 = parameter
    b.strz(&var.name);
    b.end_record(mark);
}

fn emit_regrel(b: &mut SectionBuilder, typind: u32, reg: u16, offset: i32, name: &str) {
    let mark = b.begin_record(S_REGREL32);
    b.i32(offset);
    b.u32(typind);
    b.u16(reg);
    b.strz(name);
    b.end_record(mark);
}

fn emit_defrange(b: &mut SectionBuilder, geometry: &FrameGeometry, range: &LocationRange) {
    match range.loc {
        TrackedLocation::Register(reg) => {
            let mark = b.begin_record(S_DEFRANGE_REGISTER);
            b.u16(reg.0);
            b.u16(0); // range attributes
            emit_range_span(b, range);
            b.end_record(mark);
        }
        TrackedLocation::FrameRelative { base, offset } => {
            let (reg, offset) = geometry.resolve(base, offset);
            if geometry.hard_frame_pointer {
                let mark = b.begin_record(S_DEFRANGE_FRAMEPOINTER_REL);
                b.i32(offset);
                emit_range_span(b, range);
                b.end_record(mark);
            } else {
                let mark = b.begin_record(S_DEFRANGE_REGISTER_REL);
                b.u16(reg.0);
                b.u16(0);
                b.i32(offset);
                emit_range_span(b, range);
                b.end_record(mark);
            }
        }
        TrackedLocation::RegisterRelative { reg, offset } => {
            let mark = b.begin_record(S_DEFRANGE_REGISTER_REL);
            b.u16(reg.0);
            b.u16(0);
            b.i32(offset);
            emit_range_span(b, range);
            b.end_record(mark);
        }
        // Lost track of the value: explicit range with the no-register
        // sentinel so lifetime coverage stays exact.
        TrackedLocation::Unknown => {
            let mark = b.begin_record(S_DEFRANGE_REGISTER);
            b.u16(cv_ir::CvRegister::NONE.0);
            b.u16(0);
            emit_range_span(b, range);
            b.end_record(mark);
        }
    }
}

fn emit_range_span(b: &mut SectionBuilder, range: &LocationRange) {
    b.secrel32(range.start);
    b.secidx16(range.start);
    b.diff16(range.end, range.start);
}

fn emit_line_table(
    b: &mut SectionBuilder,
    f: &FunctionRecord,
    checksum_offsets: &[Option<u32>],
    labels: &mut LabelAlloc,
) {
    let end = begin_subsection(b, DEBUG_S_LINES, labels);
    let fn_end = f.end_label();

    b.secrel32(f.start);
    b.secidx16(f.start);
    b.u16(0); // flags: no columns
    b.diff32(fn_end, f.start);

    for (file, run) in f.lines.runs() {
        b.u32(file_offset(checksum_offsets, file));
        b.u32(run.len() as u32);
        b.u32(12 + 8 * run.len() as u32);
        for entry in run {
            b.diff32(entry.label, f.start);
            b.u32((entry.line & 0x00FF_FFFF) | LINE_STATEMENT);
        }
    }
    end_subsection(b, end);
}

/// Checksum-table offset for a file; a file omitted from the table (its
/// contents were unreadable) degrades to the table's first entry.
fn file_offset(checksum_offsets: &[Option<u32>], file: FileId) -> u32 {
    checksum_offsets
        .get(file.index())
        .copied()
        .flatten()
        .unwrap_or(0)
}
