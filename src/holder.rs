//! In-memory accumulator for one slice of documents: a two-level ordered
//! map from `first_id` to `second_id` to the running `(cooc_tf, cooc_df)`
//! pair. One holder lives per worker per slice; there is no concurrency
//! inside it.

use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    cooc_tf: u64,
    cooc_df: u32,
    last_doc_id: u32,
}

#[derive(Debug, Default)]
pub struct CooccurrenceHolder {
    map: BTreeMap<i32, BTreeMap<i32, Entry>>,
}

impl CooccurrenceHolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `(first_id, second_id)` within `doc_id`.
    /// `cooc_df` only increases the first time a given document contributes
    /// to this pair; `cooc_tf` increases every time.
    pub fn record(&mut self, first_id: i32, second_id: i32, doc_id: u32) {
        let inner = self.map.entry(first_id).or_default();

        match inner.get_mut(&second_id) {
            None => {
                inner.insert(
                    second_id,
                    Entry {
                        cooc_tf: 1,
                        cooc_df: 1,
                        last_doc_id: doc_id,
                    },
                );
            }
            Some(entry) => {
                entry.cooc_tf += 1;
                if entry.last_doc_id != doc_id {
                    entry.cooc_df += 1;
                    entry.last_doc_id = doc_id;
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Consumes the holder in ascending `first_id` order, each with its
    /// `second_id`-ascending records — the order the spilled `Batch` file
    /// relies on.
    pub fn into_cells(self) -> impl Iterator<Item = (i32, Vec<(i32, u64, u32)>)> {
        self.map.into_iter().map(|(first_id, inner)| {
            let records = inner
                .into_iter()
                .map(|(second_id, e)| (second_id, e.cooc_tf, e.cooc_df))
                .collect();
            (first_id, records)
        })
    }
}
