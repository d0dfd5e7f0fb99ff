//! The object-emission seam.
//!
//! The emitter never computes absolute addresses: code positions are opaque
//! [`Label`]s defined by the host's assembler, and anything address- or
//! length-shaped is handed to the sink as a section-relative reference or a
//! difference of two labels, resolved at link time. [`ObjectBuffer`] is the
//! in-crate resolving sink used by tests and by callers that lay out code at
//! known offsets.

use rustc_hash::FxHashMap;

/// Opaque code- or debug-position label. Allocation is monotonic within a
/// unit; binding a label to an address is the sink's business.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Label(pub u32);

/// Monotonic label allocator, one per unit.
#[derive(Debug, Default)]
pub struct LabelAlloc {
    next: u32,
}

impl LabelAlloc {
    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

/// The two output sections.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum DebugSection {
    Symbols,
    Types,
}

/// One assembler-level output step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Literal bytes.
    Bytes(Vec<u8>),
    /// Bind a label to the current position.
    Define(Label),
    /// 32-bit section-relative offset of a label (relocated).
    SecRel32(Label),
    /// 16-bit section index of a label (relocated).
    SecIdx16(Label),
    /// 32-bit `hi - lo` label difference.
    Diff32 { hi: Label, lo: Label },
    /// 16-bit `hi - lo` label difference.
    Diff16 { hi: Label, lo: Label },
}

impl Directive {
    /// Encoded size in bytes.
    #[must_use]
    pub fn byte_len(&self) -> u32 {
        match self {
            Directive::Bytes(b) => b.len() as u32,
            Directive::Define(_) => 0,
            Directive::SecRel32(_) | Directive::Diff32 { .. } => 4,
            Directive::SecIdx16(_) | Directive::Diff16 { .. } => 2,
        }
    }
}

/// Consumer of the emitted directive streams; implemented by the
/// object-emission layer.
pub trait OutputSink {
    /// Select the section subsequent directives belong to.
    fn switch_section(&mut self, section: DebugSection);
    /// Append one directive to the current section.
    fn directive(&mut self, directive: &Directive);
}

/// A label difference could not be resolved because a label was never
/// defined or given an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("label {0:?} was never defined")]
pub struct UnresolvedLabel(pub Label);

#[derive(Debug, Copy, Clone)]
enum FixupKind {
    SecRel32(Label),
    SecIdx16(Label),
    Diff32 { hi: Label, lo: Label },
    Diff16 { hi: Label, lo: Label },
}

/// In-memory resolving sink.
///
/// Code labels must be given addresses up front via
/// [`ObjectBuffer::place_code_label`]; labels defined in-stream get the
/// byte offset at which they appear. Differences and section-relative
/// references are patched once the stream is complete.
#[derive(Debug, Default)]
pub struct ObjectBuffer {
    symbols: Vec<u8>,
    types: Vec<u8>,
    current: Option<DebugSection>,
    addresses: FxHashMap<Label, (u32, u16)>,
    fixups: Vec<(DebugSection, usize, FixupKind)>,
}

impl ObjectBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-assign a code label's (section-relative offset, section index).
    pub fn place_code_label(&mut self, label: Label, offset: u32, section_index: u16) {
        self.addresses.insert(label, (offset, section_index));
    }

    fn buf(&mut self, section: DebugSection) -> &mut Vec<u8> {
        match section {
            DebugSection::Symbols => &mut self.symbols,
            DebugSection::Types => &mut self.types,
        }
    }

    fn lookup(&self, label: Label) -> Result<(u32, u16), UnresolvedLabel> {
        self.addresses
            .get(&label)
            .copied()
            .ok_or(UnresolvedLabel(label))
    }

    /// Patch all pending fixups and return the finished section images.
    pub fn finish(mut self) -> Result<ResolvedSections, UnresolvedLabel> {
        for (section, at, fixup) in std::mem::take(&mut self.fixups) {
            let value: Vec<u8> = match fixup {
                FixupKind::SecRel32(l) => self.lookup(l)?.0.to_le_bytes().to_vec(),
                FixupKind::SecIdx16(l) => self.lookup(l)?.1.to_le_bytes().to_vec(),
                FixupKind::Diff32 { hi, lo } => {
                    let d = self.lookup(hi)?.0.wrapping_sub(self.lookup(lo)?.0);
                    d.to_le_bytes().to_vec()
                }
                FixupKind::Diff16 { hi, lo } => {
                    let d = self.lookup(hi)?.0.wrapping_sub(self.lookup(lo)?.0);
                    (d as u16).to_le_bytes().to_vec()
                }
            };
            let buf = self.buf(section);
            buf[at..at + value.len()].copy_from_slice(&value);
        }
        Ok(ResolvedSections {
            symbols: self.symbols,
            types: self.types,
        })
    }
}

/// Fully resolved section images produced by [`ObjectBuffer::finish`].
#[derive(Debug)]
pub struct ResolvedSections {
    pub symbols: Vec<u8>,
    pub types: Vec<u8>,
}

impl OutputSink for ObjectBuffer {
    fn switch_section(&mut self, section: DebugSection) {
        self.current = Some(section);
    }

    fn directive(&mut self, directive: &Directive) {
        let section = match self.current {
            Some(s) => s,
            None => panic!("directive before switch_section"),
        };
        let at = self.buf(section).len();
        match directive {
            Directive::Bytes(b) => self.buf(section).extend_from_slice(b),
            Directive::Define(l) => {
                // Debug-section labels live in the section being written;
                // the section index only matters for code labels.
                self.addresses.insert(*l, (at as u32, 0));
            }
            Directive::SecRel32(l) => {
                self.fixups.push((section, at, FixupKind::SecRel32(*l)));
                self.buf(section).extend_from_slice(&[0; 4]);
            }
            Directive::SecIdx16(l) => {
                self.fixups.push((section, at, FixupKind::SecIdx16(*l)));
                self.buf(section).extend_from_slice(&[0; 2]);
            }
            Directive::Diff32 { hi, lo } => {
                self.fixups
                    .push((section, at, FixupKind::Diff32 { hi: *hi, lo: *lo }));
                self.buf(section).extend_from_slice(&[0; 4]);
            }
            Directive::Diff16 { hi, lo } => {
                self.fixups
                    .push((section, at, FixupKind::Diff16 { hi: *hi, lo: *lo }));
                self.buf(section).extend_from_slice(&[0; 2]);
            }
        }
    }
}
