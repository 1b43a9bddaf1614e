#![forbid(unsafe_code)]

use rustc_hash::FxHashMap;

/// Interned string table. Index 0 is always the empty string, as the pprof
/// format requires.
#[derive(Debug, Clone)]
pub struct StringTable {
    strings: Vec<String>,
    index: FxHashMap<String, i64>,
}

impl Default for StringTable {
    fn default() -> Self {
        let mut index = FxHashMap::default();
        index.insert(String::new(), 0);
        Self {
            strings: vec![String::new()],
            index,
        }
    }
}

impl StringTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `s`, inserting it if needed.
    pub fn intern(&mut self, s: &str) -> i64 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        let idx = self.strings.len() as i64;
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), idx);
        idx
    }

    pub fn get(&self, idx: i64) -> Option<&str> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| self.strings.get(i))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.strings
    }
}
