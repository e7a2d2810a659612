//! String interning.
//!
//! A `Symbol` is a 4-byte handle into a global string table. Interning the
//! same string twice yields the same handle, so equality and hashing are
//! O(1) integer operations. Strings are never removed from the table; the
//! set of unique identifiers in a compilation is bounded, so the leak is
//! deliberate.

use std::fmt;
use std::sync::{Mutex, OnceLock};

use rustc_hash::FxHashMap;

/// An interned string identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    index: u32,
}

impl Symbol {
    /// Intern a string, returning its symbol.
    pub fn intern(string: &str) -> Self {
        table().lock().expect("string table poisoned").intern(string)
    }

    /// Get the string value associated with this symbol.
    pub fn as_str(&self) -> &'static str {
        table()
            .lock()
            .expect("string table poisoned")
            .get(*self)
            .expect("symbol created outside the global table")
    }

    /// Get the raw index value.
    pub fn as_u32(&self) -> u32 {
        self.index
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn table() -> &'static Mutex<StringTable> {
    static TABLE: OnceLock<Mutex<StringTable>> = OnceLock::new();
    TABLE.get_or_init(|| Mutex::new(StringTable::new()))
}

/// Global string table.
struct StringTable {
    /// Maps string contents to symbol index.
    index: FxHashMap<&'static str, u32>,
    /// Storage for actual string data.
    strings: Vec<&'static str>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            index: FxHashMap::default(),
            strings: Vec::new(),
        }
    }

    fn intern(&mut self, string: &str) -> Symbol {
        if let Some(&index) = self.index.get(string) {
            return Symbol { index };
        }

        // Leak to get a 'static lifetime; entries live for the process.
        let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
        let index = self.strings.len() as u32;
        self.strings.push(interned);
        self.index.insert(interned, index);

        Symbol { index }
    }

    fn get(&self, symbol: Symbol) -> Option<&'static str> {
        self.strings.get(symbol.index as usize).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_is_stable() {
        let a = Symbol::intern("lower");
        let b = Symbol::intern("lower");
        let c = Symbol::intern("emit");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str(), "lower");
        assert_eq!(c.as_str(), "emit");
    }

    #[test]
    fn display_round_trips() {
        let s = Symbol::intern("Point::translate");
        assert_eq!(s.to_string(), "Point::translate");
    }
}
