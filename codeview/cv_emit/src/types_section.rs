//! Types section: all sequentially numbered records, in numbering order.

use cv_ir::{TypeRecord, TypeTable};

use crate::writer::{SectionBuilder, CV_SIGNATURE_C13};

const LF_MODIFIER: u16 = 0x1001;
const LF_POINTER: u16 = 0x1002;
const LF_PROCEDURE: u16 = 0x1008;
const LF_ARGLIST: u16 = 0x1201;
const LF_ARRAY: u16 = 0x1503;

pub(crate) fn emit_types(types: &TypeTable) -> SectionBuilder {
    let mut b = SectionBuilder::new();
    b.u32(CV_SIGNATURE_C13);

    for (_, record) in types.numbered_records() {
        match record {
            TypeRecord::Modifier { base, flags } => {
                let mark = b.begin_record(LF_MODIFIER);
                b.u32(types.resolve(*base).raw());
                b.u16(flags.bits());
                b.end_record(mark);
            }
            TypeRecord::Pointer { target, attrs } => {
                let mark = b.begin_record(LF_POINTER);
                b.u32(types.resolve(*target).raw());
                b.u32(attrs.raw());
                b.end_record(mark);
            }
            TypeRecord::Array {
                element,
                index,
                length_bytes,
            } => {
                let mark = b.begin_record(LF_ARRAY);
                b.u32(types.resolve(*element).raw());
                b.u32(index.raw());
                b.numeric_leaf(*length_bytes);
                b.strz("");
                b.end_record(mark);
            }
            TypeRecord::ArgList { args } => {
                let mark = b.begin_record(LF_ARGLIST);
                if args.is_empty() {
                    // Format quirk kept bit-exact: an empty list is written
                    // as one dummy no-type slot with a count of 1.
                    b.u32(1);
                    b.u32(0);
                } else {
                    b.u32(args.len() as u32);
                    for arg in args.iter() {
                        b.u32(types.resolve(*arg).raw());
                    }
                }
                b.end_record(mark);
            }
            TypeRecord::Procedure {
                return_type,
                convention,
                attrs,
                param_count,
                arg_list,
            } => {
                let mark = b.begin_record(LF_PROCEDURE);
                b.u32(types.resolve(*return_type).raw());
                b.u8(convention.as_u8());
                b.u8(*attrs);
                b.u16(*param_count);
                b.u32(types.resolve(*arg_list).raw());
                b.end_record(mark);
            }
        }
    }
    b
}
