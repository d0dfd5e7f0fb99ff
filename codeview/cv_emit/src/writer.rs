//! Binary record staging for the two debug sections.
//!
//! A [`SectionBuilder`] accumulates a directive stream with exact byte
//! accounting, so record length prefixes can be patched once a record body
//! is complete even when the body contains link-time-resolved references.

use smallvec::SmallVec;

use crate::sink::{Directive, Label, OutputSink};

/// Unit header signature written at the head of both sections.
pub(crate) const CV_SIGNATURE_C13: u32 = 4;

// Pad marker bytes. The value itself encodes how many pad bytes remain,
// so a reader can skip the padding using only the markers.
const LF_PAD1: u8 = 0xF1;
const LF_PAD2: u8 = 0xF2;
const LF_PAD3: u8 = 0xF3;

// Width tags for the variable-width numeric leaf encoding.
const LF_USHORT: u16 = 0x8002;
const LF_ULONG: u16 = 0x8004;
const LF_UQUADWORD: u16 = 0x800A;

/// Marker for an open variable-length record; closed by
/// [`SectionBuilder::end_record`].
#[derive(Debug)]
pub struct RecordMark {
    dir: usize,
    inner: usize,
    start_size: u32,
}

/// Directive stream under construction for one section.
#[derive(Debug, Default)]
pub struct SectionBuilder {
    dirs: Vec<Directive>,
    size: u32,
}

impl SectionBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes emitted so far, relocated fields included.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn bytes(&mut self, bytes: &[u8]) {
        self.size += bytes.len() as u32;
        if let Some(Directive::Bytes(tail)) = self.dirs.last_mut() {
            tail.extend_from_slice(bytes);
        } else {
            self.dirs.push(Directive::Bytes(bytes.to_vec()));
        }
    }

    pub fn u8(&mut self, v: u8) {
        self.bytes(&[v]);
    }

    pub fn u16(&mut self, v: u16) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn u32(&mut self, v: u32) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn i32(&mut self, v: i32) {
        self.bytes(&v.to_le_bytes());
    }

    pub fn u64(&mut self, v: u64) {
        self.bytes(&v.to_le_bytes());
    }

    /// Null-terminated inline string, counted inside the record length.
    pub fn strz(&mut self, s: &str) {
        self.bytes(s.as_bytes());
        self.u8(0);
    }

    pub fn define_label(&mut self, label: Label) {
        self.dirs.push(Directive::Define(label));
    }

    pub fn secrel32(&mut self, label: Label) {
        self.size += 4;
        self.dirs.push(Directive::SecRel32(label));
    }

    pub fn secidx16(&mut self, label: Label) {
        self.size += 2;
        self.dirs.push(Directive::SecIdx16(label));
    }

    pub fn diff32(&mut self, hi: Label, lo: Label) {
        self.size += 4;
        self.dirs.push(Directive::Diff32 { hi, lo });
    }

    pub fn diff16(&mut self, hi: Label, lo: Label) {
        self.size += 2;
        self.dirs.push(Directive::Diff16 { hi, lo });
    }

    /// Variable-width numeric leaf: values below `0x8000` are a plain
    /// 16-bit literal; larger values get the smallest width tag that fits.
    pub fn numeric_leaf(&mut self, value: u64) {
        if value < 0x8000 {
            self.u16(value as u16);
        } else if let Ok(v) = u16::try_from(value) {
            self.u16(LF_USHORT);
            self.u16(v);
        } else if let Ok(v) = u32::try_from(value) {
            self.u16(LF_ULONG);
            self.u32(v);
        } else {
            self.u16(LF_UQUADWORD);
            self.u64(value);
        }
    }

    /// Open a length-prefixed record of the given kind. The length field
    /// excludes itself and is patched by [`Self::end_record`].
    pub fn begin_record(&mut self, kind: u16) -> RecordMark {
        let start_size = self.size;
        self.bytes(&[0, 0]);
        let (dir, inner) = match self.dirs.last() {
            Some(Directive::Bytes(tail)) => (self.dirs.len() - 1, tail.len() - 2),
            _ => unreachable!("bytes() always leaves a trailing byte run"),
        };
        self.u16(kind);
        RecordMark {
            dir,
            inner,
            start_size,
        }
    }

    /// Pad the open record to a 4-byte boundary with pad markers and patch
    /// its length prefix.
    ///
    /// # Panics
    /// Panics if the record body outgrows the 16-bit length prefix.
    pub fn end_record(&mut self, mark: RecordMark) {
        let mut pad: SmallVec<[u8; 4]> = SmallVec::new();
        let mut remaining = (4 - (self.size - mark.start_size) % 4) % 4;
        while remaining > 0 {
            pad.push(match remaining {
                3 => LF_PAD3,
                2 => LF_PAD2,
                _ => LF_PAD1,
            });
            remaining -= 1;
        }
        if !pad.is_empty() {
            self.bytes(&pad);
        }

        let length = self.size - mark.start_size - 2;
        assert!(
            length <= u32::from(u16::MAX),
            "record length {length} overflows the 16-bit length prefix"
        );
        match &mut self.dirs[mark.dir] {
            Directive::Bytes(buf) => {
                buf[mark.inner..mark.inner + 2]
                    .copy_from_slice(&(length as u16).to_le_bytes());
            }
            _ => unreachable!("record mark points into a byte run"),
        }
    }

    /// Zero-pad to a 4-byte boundary (subsection alignment, not record
    /// padding).
    pub fn align4(&mut self) {
        let remaining = (4 - self.size % 4) % 4;
        for _ in 0..remaining {
            self.u8(0);
        }
    }

    /// Stream the finished section into a sink.
    pub fn drain_into(self, sink: &mut dyn OutputSink) {
        for dir in &self.dirs {
            sink.directive(dir);
        }
    }
}
