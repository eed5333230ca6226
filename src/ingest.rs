//! Parallel ingestion: reads the corpus in document slices, builds one
//! `CooccurrenceHolder` per slice per worker, and spills each full holder to
//! a sorted `Batch` on disk.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};

use crate::arbiter::FileHandleArbiter;
use crate::batch::{Batch, Cell};
use crate::holder::CooccurrenceHolder;
use crate::vocab::Vocabulary;
use crate::{CliError, CliResult};

const SENTINEL_DOC: u32 = u32::MAX;

pub struct IngestStats {
    pub total_documents: u32,
    pub total_pairs: u64,
    pub document_occurrences: Vec<u32>,
}

pub struct IngestOutcome {
    pub batches: Vec<Batch>,
    pub stats: IngestStats,
}

pub struct IngestorConfig {
    pub window_width: usize,
    pub docs_per_batch: usize,
    pub num_threads: usize,
}

/// Shares one buffered reader across workers: each call to `claim` hands out
/// the next slice of up to `n` lines, never overlapping another worker's.
struct SliceReader {
    reader: Mutex<BufReader<File>>,
}

impl SliceReader {
    fn new(file: File) -> Self {
        SliceReader {
            reader: Mutex::new(BufReader::new(file)),
        }
    }

    fn claim(&self, n: usize) -> CliResult<Vec<String>> {
        let mut reader = self.reader.lock().unwrap();
        let mut lines = Vec::with_capacity(n);

        for _ in 0..n {
            let mut buf = String::new();
            let read = reader.read_line(&mut buf)?;
            if read == 0 {
                break;
            }
            while buf.ends_with('\n') || buf.ends_with('\r') {
                buf.pop();
            }
            lines.push(buf);
        }

        Ok(lines)
    }
}

pub fn run(
    corpus_path: &Path,
    vocab: &Vocabulary,
    scratch_dir: &Path,
    arbiter: &FileHandleArbiter,
    config: &IngestorConfig,
) -> CliResult<IngestOutcome> {
    let file = File::open(corpus_path).map_err(|err| {
        CliError::Other(format!(
            "could not open corpus {}: {}",
            corpus_path.display(),
            err
        ))
    })?;
    let slices = SliceReader::new(file);

    let total_documents = AtomicU32::new(0);
    let total_pairs = AtomicU64::new(0);
    let document_occurrences: Vec<AtomicU32> =
        (0..vocab.len()).map(|_| AtomicU32::new(0)).collect();
    let registry: Mutex<Vec<Batch>> = Mutex::new(Vec::new());
    let batch_index = AtomicU32::new(0);
    let first_error: Mutex<Option<CliError>> = Mutex::new(None);

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {elapsed_precise} ingested {msg} documents")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let num_threads = config.num_threads.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|err| CliError::Other(format!("could not build thread pool: {}", err)))?;

    pool.scope(|scope| {
        for _ in 0..num_threads {
            scope.spawn(|_| {
                worker_loop(
                    &slices,
                    vocab,
                    scratch_dir,
                    arbiter,
                    config,
                    &total_documents,
                    &total_pairs,
                    &document_occurrences,
                    &registry,
                    &batch_index,
                    &first_error,
                    &progress,
                );
            });
        }
    });

    progress.finish_and_clear();

    if let Some(err) = first_error.lock().unwrap().take() {
        return Err(err);
    }

    let stats = IngestStats {
        total_documents: total_documents.load(Ordering::Relaxed),
        total_pairs: total_pairs.load(Ordering::Relaxed),
        document_occurrences: document_occurrences
            .into_iter()
            .map(|c| c.load(Ordering::Relaxed))
            .collect(),
    };

    Ok(IngestOutcome {
        batches: registry.into_inner().unwrap(),
        stats,
    })
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    slices: &SliceReader,
    vocab: &Vocabulary,
    scratch_dir: &Path,
    arbiter: &FileHandleArbiter,
    config: &IngestorConfig,
    total_documents: &AtomicU32,
    total_pairs: &AtomicU64,
    document_occurrences: &[AtomicU32],
    registry: &Mutex<Vec<Batch>>,
    batch_index: &AtomicU32,
    first_error: &Mutex<Option<CliError>>,
    progress: &ProgressBar,
) {
    loop {
        if first_error.lock().unwrap().is_some() {
            return;
        }

        let lines = match slices.claim(config.docs_per_batch) {
            Ok(lines) => lines,
            Err(err) => {
                *first_error.lock().unwrap() = Some(err);
                return;
            }
        };
        if lines.is_empty() {
            return;
        }

        let mut holder = CooccurrenceHolder::new();
        let mut last_doc_for_token = vec![SENTINEL_DOC; vocab.len()];

        for line in &lines {
            let doc_id = total_documents.fetch_add(1, Ordering::Relaxed);
            progress.set_message(doc_id.to_string());
            process_document(
                line,
                doc_id,
                vocab,
                config.window_width,
                &mut holder,
                &mut last_doc_for_token,
                document_occurrences,
                total_pairs,
            );
        }

        if holder.is_empty() {
            continue;
        }

        if let Err(err) = spill(holder, scratch_dir, arbiter, registry, batch_index) {
            *first_error.lock().unwrap() = Some(err);
            return;
        }
    }
}

fn spill(
    holder: CooccurrenceHolder,
    scratch_dir: &Path,
    arbiter: &FileHandleArbiter,
    registry: &Mutex<Vec<Batch>>,
    batch_index: &AtomicU32,
) -> CliResult<()> {
    let index = batch_index.fetch_add(1, Ordering::Relaxed) as usize;
    let mut batch = Batch::create_for_write(scratch_dir, index, arbiter)?;

    for (first_id, records) in holder.into_cells() {
        batch.write_cell(&Cell { first_id, records })?;
    }

    batch.finish_write(arbiter)?;
    registry.lock().unwrap().push(batch);
    Ok(())
}

/// Walks one document's tokens. `u` ranges only over default-modality
/// content tokens; the forward window from `u` spends its width budget only
/// on default-modality content tokens too, skipping modality markers and any
/// span under a non-default modality for free.
#[allow(clippy::too_many_arguments)]
fn process_document(
    line: &str,
    doc_id: u32,
    vocab: &Vocabulary,
    window_width: usize,
    holder: &mut CooccurrenceHolder,
    last_doc_for_token: &mut [u32],
    document_occurrences: &[AtomicU32],
    total_pairs: &AtomicU64,
) {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() <= 1 {
        return;
    }
    let tokens = &fields[1..];

    let mut doc_is_default = true;

    for j in 0..tokens.len() {
        let token = tokens[j];
        if token.is_empty() {
            continue;
        }
        if token.starts_with('|') {
            doc_is_default = token == "|@default_class";
            continue;
        }
        if !doc_is_default {
            continue;
        }

        let first_id = match vocab.lookup_default(token) {
            Some(id) => id as i32,
            None => continue,
        };

        let slot = first_id as usize;
        if last_doc_for_token[slot] != doc_id {
            last_doc_for_token[slot] = doc_id;
            document_occurrences[slot].fetch_add(1, Ordering::Relaxed);
        }

        let mut window_is_default = true;
        let mut consumed = 0usize;
        let mut k = 0usize;

        while j + k + 1 < tokens.len() {
            k += 1;
            let candidate = tokens[j + k];

            if candidate.is_empty() {
                continue;
            }

            if candidate.starts_with('|') {
                window_is_default = candidate == "|@default_class";
                continue;
            }

            if !window_is_default {
                continue;
            }

            if consumed >= window_width {
                break;
            }
            consumed += 1;

            if let Some(second_id) = vocab.lookup_default(candidate) {
                let second_id = second_id as i32;
                holder.record(first_id, second_id, doc_id);
                holder.record(second_id, first_id, doc_id);
                total_pairs.fetch_add(2, Ordering::Relaxed);
            }
        }
    }
}
