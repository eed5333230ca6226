//! K-way external merge of sorted `Batch` runs into the final TF/DF files.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::arbiter::FileHandleArbiter;
use crate::batch::{Batch, Cell};
use crate::CliResult;

struct HeapEntry {
    first_id: i32,
    batch_index: usize,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the smallest first_id.
        other.first_id.cmp(&self.first_id)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.first_id == other.first_id
    }
}

impl Eq for HeapEntry {}

pub struct MergeOutputs<'a> {
    pub tf_path: Option<&'a Path>,
    pub df_path: Option<&'a Path>,
}

pub struct MergeOutcome {
    pub pair_occurrences: Vec<u64>,
}

pub fn run(
    mut batches: Vec<Batch>,
    vocab_len: usize,
    min_tf: u64,
    min_df: u32,
    outputs: MergeOutputs,
    arbiter: &FileHandleArbiter,
) -> CliResult<MergeOutcome> {
    let mut tf_writer = outputs
        .tf_path
        .map(|p| -> CliResult<_> { Ok(BufWriter::new(File::create(p)?)) })
        .transpose()?;
    let mut df_writer = outputs
        .df_path
        .map(|p| -> CliResult<_> { Ok(BufWriter::new(File::create(p)?)) })
        .transpose()?;

    let mut pair_occurrences = vec![0u64; vocab_len];

    let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::new();
    for (index, batch) in batches.iter_mut().enumerate() {
        batch.open_for_read(arbiter)?;
        if let Some(first_id) = batch.peek_first_id() {
            heap.push(HeapEntry {
                first_id,
                batch_index: index,
            });
        }
        if arbiter.is_full() {
            batch.close_for_read(arbiter)?;
        }
    }

    let mut accumulator: Option<Cell> = None;

    while let Some(HeapEntry { batch_index, .. }) = heap.pop() {
        let batch = &mut batches[batch_index];
        let cell = match batch.read_cell(arbiter)? {
            Some(cell) => cell,
            None => continue,
        };

        accumulator = Some(match accumulator.take() {
            None => cell,
            Some(acc) if acc.first_id == cell.first_id => merge_cells(acc, cell),
            Some(acc) => {
                finalize_cell(
                    &acc,
                    min_tf,
                    min_df,
                    tf_writer.as_mut(),
                    df_writer.as_mut(),
                    &mut pair_occurrences,
                )?;
                cell
            }
        });

        if let Some(first_id) = batch.peek_first_id() {
            heap.push(HeapEntry {
                first_id,
                batch_index,
            });
        }

        if arbiter.is_full() {
            batch.close_for_read(arbiter)?;
        }
    }

    if let Some(acc) = accumulator.take() {
        finalize_cell(
            &acc,
            min_tf,
            min_df,
            tf_writer.as_mut(),
            df_writer.as_mut(),
            &mut pair_occurrences,
        )?;
    }

    if let Some(w) = tf_writer.as_mut() {
        w.flush()?;
    }
    if let Some(w) = df_writer.as_mut() {
        w.flush()?;
    }

    Ok(MergeOutcome { pair_occurrences })
}

/// Merges two cells sharing the same `first_id`, summing tf/df on ties.
/// Both inputs are already sorted ascending by `second_id`.
fn merge_cells(a: Cell, b: Cell) -> Cell {
    let mut merged = Vec::with_capacity(a.records.len() + b.records.len());
    let mut ia = a.records.into_iter().peekable();
    let mut ib = b.records.into_iter().peekable();

    loop {
        match (ia.peek(), ib.peek()) {
            (Some(&(sa, tfa, dfa)), Some(&(sb, tfb, dfb))) => {
                if sa < sb {
                    merged.push((sa, tfa, dfa));
                    ia.next();
                } else if sb < sa {
                    merged.push((sb, tfb, dfb));
                    ib.next();
                } else {
                    merged.push((sa, tfa + tfb, dfa + dfb));
                    ia.next();
                    ib.next();
                }
            }
            (Some(&rec), None) => {
                merged.push(rec);
                ia.next();
            }
            (None, Some(&rec)) => {
                merged.push(rec);
                ib.next();
            }
            (None, None) => break,
        }
    }

    Cell {
        first_id: a.first_id,
        records: merged,
    }
}

fn finalize_cell(
    cell: &Cell,
    min_tf: u64,
    min_df: u32,
    mut tf_writer: Option<&mut BufWriter<File>>,
    mut df_writer: Option<&mut BufWriter<File>>,
    pair_occurrences: &mut [u64],
) -> CliResult<()> {
    let u = cell.first_id;

    for &(v, tf, df) in &cell.records {
        if tf >= min_tf {
            pair_occurrences[u as usize] += tf;
            if v != u {
                if let Some(w) = tf_writer.as_mut() {
                    writeln!(w, "{} {} {}", u, v, tf)?;
                }
            }
        }
        if v != u && df >= min_df {
            if let Some(w) = df_writer.as_mut() {
                writeln!(w, "{} {} {}", u, v, df)?;
            }
        }
    }

    Ok(())
}
