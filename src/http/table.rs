//! Sorted name/value tables over a per-request arena.
//!
//! The parser decodes every header and argument into one `String` and keeps
//! only `(start, end)` offsets per field. A [`Table`] pairs those offsets with
//! the arena so lookups hand out `&str` slices without any further allocation.

use crate::http::text::uri_decode_into;

/// Byte range of one decoded field inside the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    start: usize,
    end: usize,
}

impl Span {
    pub(crate) fn resolve<'a>(&self, arena: &'a str) -> &'a str {
        &arena[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Entry {
    pub(crate) name: Span,
    pub(crate) value: Span,
}

/// Owned text storage for one request.
///
/// Every push appends a complete string, so spans always fall on char
/// boundaries. The parser reserves the worst-case decoded size up front, so
/// pushes never reallocate.
#[derive(Debug)]
pub(crate) struct Arena {
    text: String,
    scratch: Vec<u8>,
}

impl Arena {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            scratch: Vec::new(),
        }
    }

    /// URI-decodes `raw` into the arena.
    pub(crate) fn push_decoded(&mut self, raw: &[u8]) -> Span {
        self.scratch.clear();
        uri_decode_into(raw, &mut self.scratch);

        let start = self.text.len();
        self.text.push_str(&String::from_utf8_lossy(&self.scratch));
        Span {
            start,
            end: self.text.len(),
        }
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.text.capacity()
    }

    pub(crate) fn into_text(self) -> String {
        self.text
    }
}

/// Sorts entries by name, byte-wise and case-sensitive.
pub(crate) fn sort_entries(arena: &str, entries: &mut [Entry]) {
    entries.sort_unstable_by(|a, b| a.name.resolve(arena).cmp(b.name.resolve(arena)));
}

/// Read-only view of a sorted header or argument table.
///
/// Names may repeat. [`Table::get`] returns whichever duplicate the binary
/// search lands on; walk the table with [`Table::get_by_index`] or
/// [`Table::iter`] to see all of them.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    arena: &'a str,
    entries: &'a [Entry],
}

impl<'a> Table<'a> {
    pub(crate) fn new(arena: &'a str, entries: &'a [Entry]) -> Self {
        Self { arena, entries }
    }

    /// Looks up a value by exact name in O(log n).
    pub fn get(&self, name: &str) -> Option<&'a str> {
        self.entries
            .binary_search_by(|e| e.name.resolve(self.arena).cmp(name))
            .ok()
            .map(|i| self.entries[i].value.resolve(self.arena))
    }

    /// Returns the `index`-th pair in sorted order.
    pub fn get_by_index(&self, index: usize) -> Option<(&'a str, &'a str)> {
        self.entries
            .get(index)
            .map(|e| (e.name.resolve(self.arena), e.value.resolve(self.arena)))
    }

    /// Number of pairs, fixed when the request was parsed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates all pairs in sorted order.
    pub fn iter(self) -> impl Iterator<Item = (&'a str, &'a str)> {
        let arena = self.arena;
        self.entries
            .iter()
            .map(move |e| (e.name.resolve(arena), e.value.resolve(arena)))
    }
}
