//! End-to-end emission tests over the resolving object buffer.

use std::path::Path;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use cv_ir::{
    classify_primitive, CallingConvention, CvRegister, FrameGeometry, MachineReg, ModifierFlags,
    PointerAttrs, PrimitiveKind, RegisterClass, RegisterMapper, TypeIndex, TypeRef,
};

use crate::location::{LocationEvent, TrackedLocation};
use crate::sink::{Label, ObjectBuffer};
use crate::writer::SectionBuilder;
use crate::{DebugContext, LocalId, StorageAssignment, Visibility};

const S_END: u16 = 0x0006;
const S_BLOCK32: u16 = 0x1103;
const S_REGISTER: u16 = 0x1106;
const S_GDATA32: u16 = 0x110D;
const S_GPROC32: u16 = 0x1110;
const S_LOCAL: u16 = 0x113E;
const S_DEFRANGE_REGISTER: u16 = 0x1141;

const DEBUG_S_SYMBOLS: u32 = 0xF1;
const DEBUG_S_LINES: u32 = 0xF2;
const DEBUG_S_STRINGTABLE: u32 = 0xF3;
const DEBUG_S_FILECHKSMS: u32 = 0xF4;

/// Shifts machine register numbers by 100; register 999 has no mapping.
struct TestMapper;

impl RegisterMapper for TestMapper {
    fn canonical(
        &self,
        reg: MachineReg,
        _class: RegisterClass,
        _width_bits: u32,
    ) -> Option<CvRegister> {
        (reg.0 != 999).then(|| CvRegister((reg.0 + 100) as u16))
    }
}

fn geometry() -> FrameGeometry {
    FrameGeometry {
        hard_frame_pointer: true,
        frame_pointer: CvRegister(334),
        stack_pointer: CvRegister(335),
        bp_convention: false,
        arg_base_offset: 16,
        frame_base_offset: 0,
    }
}

fn in_register(n: u32) -> StorageAssignment {
    StorageAssignment::Register {
        reg: MachineReg(n),
        class: RegisterClass::Integer,
        width_bits: 64,
    }
}

struct Subsection {
    kind: u32,
    data: Vec<u8>,
}

fn parse_subsections(section: &[u8]) -> Vec<Subsection> {
    assert_eq!(&section[0..4], &4u32.to_le_bytes(), "unit signature");
    let mut subsections = Vec::new();
    let mut at = 4;
    while at < section.len() {
        let kind = u32::from_le_bytes(section[at..at + 4].try_into().unwrap());
        let len = u32::from_le_bytes(section[at + 4..at + 8].try_into().unwrap()) as usize;
        subsections.push(Subsection {
            kind,
            data: section[at + 8..at + 8 + len].to_vec(),
        });
        at += 8 + len;
        at += (4 - at % 4) % 4;
    }
    subsections
}

fn subsection<'a>(subsections: &'a [Subsection], kind: u32) -> &'a Subsection {
    subsections
        .iter()
        .find(|s| s.kind == kind)
        .unwrap_or_else(|| panic!("missing subsection {kind:#x}"))
}

/// (kind, body-after-kind) for each record in a flat record stream.
fn parse_records(data: &[u8]) -> Vec<(u16, Vec<u8>)> {
    let mut records = Vec::new();
    let mut at = 0;
    while at < data.len() {
        let len = u16::from_le_bytes(data[at..at + 2].try_into().unwrap()) as usize;
        let kind = u16::from_le_bytes(data[at + 2..at + 4].try_into().unwrap());
        records.push((kind, data[at + 4..at + 2 + len].to_vec()));
        at += 2 + len;
    }
    assert_eq!(at, data.len(), "record stream consumed exactly");
    records
}

fn u32_at(body: &[u8], at: usize) -> u32 {
    u32::from_le_bytes(body[at..at + 4].try_into().unwrap())
}

fn u16_at(body: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(body[at..at + 2].try_into().unwrap())
}

/// One register parameter held for the whole function: exactly one fixed
/// location record, never an optimized/ranged one.
#[test]
fn register_parameter_emits_one_fixed_record() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let int32: TypeRef = classify_primitive(PrimitiveKind::SignedInt, 32).into();
    let args = ctx.types().arg_list(&[int32]);
    let proto = ctx.types().procedure(int32, CallingConvention::NearC, 1, args);

    let start = ctx.make_label();
    let end = ctx.make_label();
    ctx.begin_function(Some("square"), Visibility::Public, proto, start);
    ctx.declare_local("n", int32, &in_register(3), true);
    ctx.end_function(end, geometry());

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(start, 0, 1);
    sink.place_code_label(end, 0x20, 1);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);
    let records = parse_records(&subsection(&subs, DEBUG_S_SYMBOLS).data);
    let kinds: Vec<u16> = records.iter().map(|(k, _)| *k).collect();
    assert_eq!(kinds, vec![S_GPROC32, S_REGISTER, S_END]);

    let (_, body) = &records[1];
    assert_eq!(u32_at(body, 0), TypeIndex::INT32.raw());
    assert_eq!(u16_at(body, 4), 103); // machine reg 3 through the test map
    assert_eq!(&body[6..8], b"n\0");
}

/// Two globals of the same primitive type reference the same type index.
#[test]
fn globals_share_one_interned_type() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let u32_ty: TypeRef = classify_primitive(PrimitiveKind::UnsignedInt, 32).into();

    let a = ctx.make_label();
    let b = ctx.make_label();
    ctx.add_global("first", "_first", Visibility::Public, u32_ty, a);
    ctx.add_global("second", "_second", Visibility::Public, u32_ty, b);

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(a, 0, 2);
    sink.place_code_label(b, 4, 2);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);
    let records = parse_records(&subsection(&subs, DEBUG_S_SYMBOLS).data);
    assert_eq!(records.len(), 2);
    for (kind, body) in &records {
        assert_eq!(*kind, S_GDATA32);
        assert_eq!(u32_at(body, 0), TypeIndex::UINT32.raw());
    }
    // Both resolve to the same primitive index; no record was created.
    assert!(out.types.len() == 4, "types section holds only the signature");
}

/// A const pointer to a primitive: LF_MODIFIER over the composite
/// pointer index, with no LF_POINTER record in the stream.
#[test]
fn const_pointer_to_primitive_uses_composite_index() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let int32: TypeRef = TypeIndex::INT32.into();
    let ptr = ctx.types().pointer(int32, PointerAttrs::ptr64());
    ctx.types().modifier(ptr, ModifierFlags::CONST);

    let mut sink = ObjectBuffer::new();
    ctx.finish(&mut sink).unwrap();
    let out = sink.finish().unwrap();

    assert_eq!(&out.types[0..4], &4u32.to_le_bytes());
    let records = parse_records(&out.types[4..]);
    assert_eq!(records.len(), 1, "only the modifier reaches the stream");
    let (kind, body) = &records[0];
    assert_eq!(*kind, 0x1001); // LF_MODIFIER
    assert_eq!(u32_at(body, 0), 0x0674); // 64-bit pointer to INT32
    assert_eq!(u16_at(body, 4), ModifierFlags::CONST.bits());
}

/// Three nested blocks, one local each: scope records nest correctly and
/// each block's local is flushed before its children.
#[test]
fn nested_blocks_emit_nested_scopes() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let int32: TypeRef = TypeIndex::INT32.into();
    let args = ctx.types().arg_list(&[]);
    let proto = ctx.types().procedure(int32, CallingConvention::NearC, 0, args);

    let start = ctx.make_label();
    ctx.begin_function(Some("nested"), Visibility::Private, proto, start);
    let mut opens = Vec::new();
    for i in 0..3u32 {
        let open = ctx.make_label();
        ctx.begin_block(open);
        ctx.declare_local(&format!("v{i}"), int32, &in_register(i), false);
        opens.push(open);
    }
    let mut closes = Vec::new();
    for _ in 0..3 {
        let close = ctx.make_label();
        ctx.end_block(close);
        closes.push(close);
    }
    let end = ctx.make_label();
    ctx.end_function(end, geometry());

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(start, 0, 1);
    for (i, l) in opens.iter().enumerate() {
        sink.place_code_label(*l, 4 + 4 * i as u32, 1);
    }
    for (i, l) in closes.iter().enumerate() {
        sink.place_code_label(*l, 0x40 - 4 * i as u32, 1);
    }
    sink.place_code_label(end, 0x44, 1);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);
    let kinds: Vec<u16> = parse_records(&subsection(&subs, DEBUG_S_SYMBOLS).data)
        .iter()
        .map(|(k, _)| *k)
        .collect();
    assert_eq!(
        kinds,
        vec![
            0x110F, // S_LPROC32
            S_BLOCK32, S_REGISTER, S_BLOCK32, S_REGISTER, S_BLOCK32, S_REGISTER,
            S_END, S_END, S_END, S_END,
        ]
    );
}

/// A variable with location-change events becomes S_LOCAL plus one range
/// record per event, unknown ranges included.
#[test]
fn optimized_variable_emits_explicit_ranges() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let int64: TypeRef = TypeIndex::INT64.into();
    let args = ctx.types().arg_list(&[int64]);
    let proto = ctx.types().procedure(int64, CallingConvention::NearC, 1, args);

    let start = ctx.make_label();
    ctx.begin_function(Some("shuffle"), Visibility::Public, proto, start);
    let var = ctx.declare_local("x", int64, &in_register(5), true);
    let l1 = ctx.make_label();
    let l2 = ctx.make_label();
    let l3 = ctx.make_label();
    ctx.note_location(var, Some(&in_register(5)), l1);
    ctx.note_location(var, None, l2);
    ctx.note_location(var, Some(&in_register(7)), l3);
    let end = ctx.make_label();
    ctx.end_function(end, geometry());

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(start, 0, 1);
    sink.place_code_label(l1, 0x10, 1);
    sink.place_code_label(l2, 0x18, 1);
    sink.place_code_label(l3, 0x20, 1);
    sink.place_code_label(end, 0x30, 1);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);
    let records = parse_records(&subsection(&subs, DEBUG_S_SYMBOLS).data);
    let kinds: Vec<u16> = records.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            S_GPROC32,
            S_LOCAL,
            S_DEFRANGE_REGISTER,
            S_DEFRANGE_REGISTER,
            S_DEFRANGE_REGISTER,
            S_END,
        ]
    );

    // S_LOCAL carries the parameter flag.
    assert_eq!(u16_at(&records[1].1, 4), 1);

    // First range: register 105, [0x10, 0x18) = 8 bytes.
    let body = &records[2].1;
    assert_eq!(u16_at(body, 0), 105);
    assert_eq!(u32_at(body, 4), 0x10);
    assert_eq!(u16_at(body, 10), 8);

    // The unknown range is explicit, with the no-register sentinel, and
    // tiles [0x18, 0x20) with no gap.
    let body = &records[3].1;
    assert_eq!(u16_at(body, 0), CvRegister::NONE.0);
    assert_eq!(u32_at(body, 4), 0x18);
    assert_eq!(u16_at(body, 10), 8);

    // Last range runs to function end: [0x20, 0x30).
    let body = &records[4].1;
    assert_eq!(u16_at(body, 0), 107);
    assert_eq!(u16_at(body, 10), 0x10);
}

/// Full pipeline: line tables, string table, and checksum table.
#[test]
fn line_and_file_tables_round_out_the_section() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let file_a = ctx.add_file_with_contents(Path::new("src/a.x"), Some(b"fn main"));
    let file_b = ctx.add_file_with_contents(Path::new("src/b.x"), Some(b"helpers"));
    let void: TypeRef = TypeIndex::VOID.into();
    let args = ctx.types().arg_list(&[]);
    let proto = ctx.types().procedure(void, CallingConvention::NearC, 0, args);

    let start = ctx.make_label();
    ctx.begin_function(Some("main"), Visibility::Public, proto, start);
    let l1 = ctx.make_label();
    let l2 = ctx.make_label();
    let l3 = ctx.make_label();
    ctx.line(10, file_a, l1);
    ctx.line(10, file_a, l1); // duplicate transition, dropped
    ctx.line(3, file_b, l2);
    ctx.line(11, file_a, l3);
    let end = ctx.make_label();
    ctx.end_function(end, geometry());

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(start, 0, 1);
    sink.place_code_label(l1, 0x4, 1);
    sink.place_code_label(l2, 0x8, 1);
    sink.place_code_label(l3, 0xC, 1);
    sink.place_code_label(end, 0x10, 1);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);

    // String table: empty string first, then the normalized paths.
    let strings = &subsection(&subs, DEBUG_S_STRINGTABLE).data;
    assert_eq!(strings[0], 0);
    let needle = b"src\\a.x\0";
    assert!(strings.windows(needle.len()).any(|w| w == needle));

    // Checksum table: both files hashed, 24 bytes per MD5 entry.
    let checksums = &subsection(&subs, DEBUG_S_FILECHKSMS).data;
    assert_eq!(checksums.len(), 48);
    assert_eq!(checksums[4], 16); // digest length
    assert_eq!(checksums[5], 1); // MD5

    // Line table: three maximal same-file runs (a, b, a).
    let lines = &subsection(&subs, DEBUG_S_LINES).data;
    assert_eq!(u32_at(lines, 8), 0x10); // code length
    let mut at = 12;
    let mut blocks = Vec::new();
    while at < lines.len() {
        let file_off = u32_at(lines, at);
        let count = u32_at(lines, at + 4);
        let size = u32_at(lines, at + 8);
        assert_eq!(size, 12 + 8 * count);
        blocks.push((file_off, count));
        at += size as usize;
    }
    assert_eq!(blocks, vec![(0, 1), (24, 1), (0, 1)]);

    // First entry of the first block: offset 4, line 10, statement flag.
    assert_eq!(u32_at(lines, 24), 0x4);
    assert_eq!(u32_at(lines, 28), 10 | 0x8000_0000);
}

/// A global the front end never named carries its linkage name instead.
#[test]
fn unnamed_global_falls_back_to_linkage_name() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let u32_ty: TypeRef = TypeIndex::UINT32.into();
    let label = ctx.make_label();
    ctx.add_global("", "__anon_init", Visibility::Private, u32_ty, label);

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(label, 0, 2);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);
    let records = parse_records(&subsection(&subs, DEBUG_S_SYMBOLS).data);
    assert_eq!(records.len(), 1);
    let (kind, body) = &records[0];
    assert_eq!(*kind, 0x110C); // S_LDATA32
    let name = b"__anon_init\0";
    assert_eq!(&body[10..10 + name.len()], name);
}

/// A file without a digest is skipped by the checksum table: later files
/// shift down, and line blocks naming it fall back to the first entry.
#[test]
fn skipped_checksum_entry_shifts_table_offsets() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let file_a = ctx.add_file_with_contents(Path::new("a.x"), Some(b"aa"));
    let file_b = ctx.add_file_with_contents(Path::new("b.x"), None);
    let file_c = ctx.add_file_with_contents(Path::new("c.x"), Some(b"cc"));
    let void: TypeRef = TypeIndex::VOID.into();
    let args = ctx.types().arg_list(&[]);
    let proto = ctx.types().procedure(void, CallingConvention::NearC, 0, args);

    let start = ctx.make_label();
    ctx.begin_function(Some("f"), Visibility::Public, proto, start);
    let l1 = ctx.make_label();
    let l2 = ctx.make_label();
    let l3 = ctx.make_label();
    ctx.line(1, file_a, l1);
    ctx.line(2, file_b, l2);
    ctx.line(3, file_c, l3);
    let end = ctx.make_label();
    ctx.end_function(end, geometry());

    let mut sink = ObjectBuffer::new();
    sink.place_code_label(start, 0, 1);
    sink.place_code_label(l1, 0x4, 1);
    sink.place_code_label(l2, 0x8, 1);
    sink.place_code_label(l3, 0xC, 1);
    sink.place_code_label(end, 0x10, 1);
    ctx.finish(&mut sink).unwrap();

    let out = sink.finish().unwrap();
    let subs = parse_subsections(&out.symbols);

    // Two entries only; the digest-less file has no slot. The string
    // offsets name the first and third paths ("" is offset 0, then the
    // three paths in registration order).
    let checksums = &subsection(&subs, DEBUG_S_FILECHKSMS).data;
    assert_eq!(checksums.len(), 48);
    assert_eq!(u32_at(checksums, 0), 1); // "a.x"
    assert_eq!(u32_at(checksums, 24), 9); // "c.x"

    // Line blocks: the skipped file degrades to table offset 0, and the
    // third file's block references the shifted offset 24.
    let lines = &subsection(&subs, DEBUG_S_LINES).data;
    let mut at = 12;
    let mut blocks = Vec::new();
    while at < lines.len() {
        let file_off = u32_at(lines, at);
        let count = u32_at(lines, at + 4);
        blocks.push((file_off, count));
        at += u32_at(lines, at + 8) as usize;
    }
    assert_eq!(blocks, vec![(0, 1), (0, 1), (24, 1)]);
}

#[test]
fn finish_with_an_open_function_is_an_error() {
    let mapper = TestMapper;
    let mut ctx = DebugContext::new(&mapper);
    let start = ctx.make_label();
    ctx.begin_function(Some("open"), Visibility::Public, TypeRef::NONE, start);

    let mut sink = ObjectBuffer::new();
    let err = ctx.finish(&mut sink).unwrap_err();
    assert!(matches!(err, crate::EmitError::OpenFunction(name) if name == "open"));
}

proptest! {
    /// Every variable-length record's total serialized size is a multiple
    /// of four bytes, whatever the body length.
    #[test]
    fn record_padding_invariant(kind in any::<u16>(), body in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut b = SectionBuilder::new();
        let mark = b.begin_record(kind);
        b.bytes(&body);
        b.end_record(mark);
        prop_assert_eq!(b.size() % 4, 0);
    }

    /// Ranges built from any event sequence tile the lifetime exactly.
    #[test]
    fn ranges_always_tile(count in 1usize..8) {
        let events: Vec<LocationEvent> = (0..count)
            .map(|i| LocationEvent {
                seq: i as u32,
                var: LocalId::new(0),
                loc: if i % 2 == 0 {
                    TrackedLocation::Register(CvRegister(1))
                } else {
                    TrackedLocation::Unknown
                },
                label: Label(i as u32),
            })
            .collect();
        let end = Label(100);
        let ranges = crate::build_ranges(&events, LocalId::new(0), end);

        prop_assert_eq!(ranges.len(), count);
        prop_assert_eq!(ranges[0].start, Label(0));
        prop_assert_eq!(ranges[ranges.len() - 1].end, end);
        for pair in ranges.windows(2) {
            prop_assert_eq!(pair[0].end, pair[1].start);
        }
    }
}

/// The sink seam is exercised directly elsewhere; make sure a raw
/// directive stream and the context agree on section selection.
#[test]
fn sections_are_written_separately() {
    let mapper = TestMapper;
    let ctx = DebugContext::new(&mapper);
    let mut sink = ObjectBuffer::new();
    ctx.finish(&mut sink).unwrap();
    let out = sink.finish().unwrap();
    assert_eq!(&out.symbols[0..4], &4u32.to_le_bytes());
    assert_eq!(&out.types[0..4], &4u32.to_le_bytes());
}
