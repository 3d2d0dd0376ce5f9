use std::collections::HashMap;

use lj_record::{ColumnIndex, ColumnMissing, KeyedRecord, Record};

/// Key -> records sharing that key, in arrival order. Built over all of
/// file 1 or over one chunk of it, and dropped when that scope ends.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinIndex {
    groups: HashMap<Vec<u8>, Vec<Record>>,
    records: usize,
}

impl JoinIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes already-parsed `records` on `column`. Records without that
    /// column are handed to `on_missing` and left out of the index.
    ///
    /// Convenience entry point for callers holding records in memory. The
    /// strategies build their index line by line with [`insert`](Self::insert)
    /// instead, so cancellation and read errors are seen between lines; both
    /// paths produce equal indexes.
    pub fn build<I, F>(records: I, column: ColumnIndex, mut on_missing: F) -> Self
    where
        I: IntoIterator<Item = Record>,
        F: FnMut(ColumnMissing),
    {
        let mut index = Self::new();
        for record in records {
            match record.into_keyed(column) {
                Ok(keyed) => index.insert(keyed),
                Err(missing) => on_missing(missing),
            }
        }
        index
    }

    pub fn insert(&mut self, keyed: KeyedRecord) {
        self.records += 1;
        // Only allocate an owned key the first time a key is seen.
        if let Some(group) = self.groups.get_mut(keyed.key()) {
            group.push(keyed.into_record());
            return;
        }
        let key = keyed.key().to_vec();
        self.groups.insert(key, vec![keyed.into_record()]);
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[Record]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.groups.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.groups.keys().map(Vec::as_slice)
    }

    #[must_use]
    pub fn key_count(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}
