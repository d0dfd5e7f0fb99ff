//! Deduplicated string table (`DEBUG_S_STRINGTABLE` payload).

use rustc_hash::FxHashMap;

/// Shared strings referenced by byte offset. Offset 0 is the mandatory
/// empty string.
#[derive(Debug)]
pub struct StringTable {
    map: FxHashMap<String, u32>,
    data: Vec<u8>,
}

impl Default for StringTable {
    fn default() -> Self {
        let mut map = FxHashMap::default();
        map.insert(String::new(), 0);
        StringTable { map, data: vec![0] }
    }
}

impl StringTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset of `s`, interning it on first use.
    pub fn offset(&mut self, s: &str) -> u32 {
        if let Some(&off) = self.map.get(s) {
            return off;
        }
        let off = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.map.insert(s.to_owned(), off);
        off
    }

    /// Raw table payload: concatenated null-terminated strings.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }
}
