#[macro_use]
extern crate serde_derive;

use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use colored::Colorize;

mod arbiter;
mod batch;
mod holder;
mod ingest;
mod merge;
mod ppmi;
mod util;
mod vocab;

use arbiter::FileHandleArbiter;
use ingest::IngestorConfig;
use merge::MergeOutputs;
use vocab::Vocabulary;

static USAGE: &str = "
Computes token co-occurrence statistics and PPMI over a streaming corpus.

The corpus is a text file where each line is one document: a document id
followed by whitespace-separated tokens. A token starting with '|' switches
the modality of the tokens that follow it until the next such marker (e.g.
'|@default_class', the modality every document starts in).

Usage:
    cooccurrence-stats [options] --vocab <vocab> --vw <corpus>
    cooccurrence-stats --help

Options:
    --vocab <vocab>            Path to the vocabulary file (one `keyword
                                [modality]` pair per line).
    --vw <corpus>               Path to the Vowpal-Wabbit-like input corpus.
    --window-width <n>         Width of the forward co-occurrence window, in
                                default-modality content tokens. [default: 5]
    --cooc-min-tf <n>          Minimum token-frequency for a pair to survive
                                the merge. [default: 0]
    --cooc-min-df <n>          Minimum document-frequency for a pair to
                                survive the merge. [default: 0]
    --cooc-tf-file <path>      Where to write the `u v tf` co-occurrence
                                file. Required to also emit --ppmi-tf-file.
    --cooc-df-file <path>      Where to write the `u v df` co-occurrence
                                file. Required to also emit --ppmi-df-file.
    --ppmi-tf-file <path>      Where to write the TF-based PPMI file.
    --ppmi-df-file <path>      Where to write the DF-based PPMI file.
    --num-threads <n>          Number of ingestion worker threads. <=0 means
                                one thread per logical CPU. [default: 0]
    --docs-per-batch <n>       Documents claimed by a worker at a time, and
                                the unit of one spilled batch. [default: 10000]
    --max-open-files <n>       Cap on simultaneously open batch file handles
                                during ingestion and merge. [default: {max_open_files}]
    -h, --help                 Display this message.
";

#[derive(Debug, Deserialize)]
struct Args {
    flag_vw: String,
    flag_vocab: String,
    flag_window_width: usize,
    flag_cooc_min_tf: u64,
    flag_cooc_min_df: u32,
    flag_cooc_tf_file: Option<String>,
    flag_cooc_df_file: Option<String>,
    flag_ppmi_tf_file: Option<String>,
    flag_ppmi_df_file: Option<String>,
    flag_num_threads: i64,
    flag_docs_per_batch: usize,
    flag_max_open_files: usize,
}

fn main() {
    let argv: Vec<_> = env::args().collect();
    let argv: Vec<_> = argv.iter().map(|s| &**s).collect();

    match run(&argv) {
        Ok(()) => process::exit(0),
        Err(CliError::Flag(err)) => err.exit(),
        Err(CliError::Io(ref err)) if err.kind() == io::ErrorKind::BrokenPipe => {
            process::exit(0);
        }
        Err(CliError::Io(err)) => {
            eprintln!("cooccurrence-stats: {}", err);
            process::exit(1);
        }
        Err(CliError::Other(msg)) => {
            eprintln!("cooccurrence-stats: {}", msg);
            process::exit(1);
        }
        Err(CliError::Help(usage, exit_code)) => {
            println!("{}", usage);
            process::exit(exit_code);
        }
    }
}

fn run(argv: &[&str]) -> CliResult<()> {
    let usage = USAGE.replace(
        "{max_open_files}",
        &arbiter::DEFAULT_MAX_OPEN_FILES.to_string(),
    );
    let args: Args = util::get_args(&usage, argv)?;

    let num_threads = util::resolve_num_threads(args.flag_num_threads);
    let vocab = Vocabulary::from_path(&args.flag_vocab)?;

    let scratch_dir = util::create_scratch_dir(&env::current_dir()?)?;

    let result = run_pipeline(&args, &vocab, num_threads, &scratch_dir);

    fs::remove_dir_all(&scratch_dir).ok();

    result
}

fn run_pipeline(
    args: &Args,
    vocab: &Vocabulary,
    num_threads: usize,
    scratch_dir: &Path,
) -> CliResult<()> {
    let arbiter = FileHandleArbiter::new(args.flag_max_open_files);

    let need_tf = args.flag_cooc_tf_file.is_some() || args.flag_ppmi_tf_file.is_some();
    let need_df = args.flag_cooc_df_file.is_some() || args.flag_ppmi_df_file.is_some();

    let tf_path = resolve_output_path(args.flag_cooc_tf_file.as_deref(), scratch_dir, "cooc-tf");
    let df_path = resolve_output_path(args.flag_cooc_df_file.as_deref(), scratch_dir, "cooc-df");

    let outcome = ingest::run(
        Path::new(&args.flag_vw),
        vocab,
        scratch_dir,
        &arbiter,
        &IngestorConfig {
            window_width: args.flag_window_width,
            docs_per_batch: args.flag_docs_per_batch,
            num_threads,
        },
    )?;

    let merge_outcome = merge::run(
        outcome.batches,
        vocab.len(),
        args.flag_cooc_min_tf,
        args.flag_cooc_min_df,
        MergeOutputs {
            tf_path: if need_tf { Some(tf_path.as_path()) } else { None },
            df_path: if need_df { Some(df_path.as_path()) } else { None },
        },
        &arbiter,
    )?;

    if let Some(ppmi_tf_path) = &args.flag_ppmi_tf_file {
        ppmi::run(
            &tf_path,
            Path::new(ppmi_tf_path),
            &ppmi::Marginals {
                numerator_total: outcome.stats.total_pairs,
                per_token: &merge_outcome.pair_occurrences,
            },
        )?;
    }

    if let Some(ppmi_df_path) = &args.flag_ppmi_df_file {
        let document_occurrences: Vec<u64> = outcome
            .stats
            .document_occurrences
            .iter()
            .map(|&n| n as u64)
            .collect();

        ppmi::run(
            &df_path,
            Path::new(ppmi_df_path),
            &ppmi::Marginals {
                numerator_total: outcome.stats.total_documents as u64,
                per_token: &document_occurrences,
            },
        )?;
    }

    Ok(())
}

fn resolve_output_path(user_path: Option<&str>, scratch_dir: &Path, name: &str) -> PathBuf {
    match user_path {
        Some(p) => PathBuf::from(p),
        None => scratch_dir.join(name),
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub enum CliError {
    Flag(docopt::Error),
    Io(io::Error),
    Other(String),
    Help(String, i32),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            CliError::Flag(ref e) => e.fmt(f),
            CliError::Io(ref e) => e.fmt(f),
            CliError::Other(ref s) => f.write_str(s),
            CliError::Help(ref s, _) => f.write_str(s),
        }
    }
}

impl From<docopt::Error> for CliError {
    fn from(err: docopt::Error) -> CliError {
        match err {
            docopt::Error::WithProgramUsage(kind, usage) => {
                let usage = util::colorize_help(&usage);

                match kind.as_ref() {
                    docopt::Error::Help => CliError::Help(usage, 0),
                    _ => CliError::Help(
                        format!(
                            "{}\n\n{} Use the {} flag for more information.",
                            usage,
                            "Invalid command!".red(),
                            "-h,--help".cyan()
                        ),
                        1,
                    ),
                }
            }
            _ => CliError::Flag(err),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> CliError {
        CliError::Io(err)
    }
}

impl From<String> for CliError {
    fn from(err: String) -> CliError {
        CliError::Other(err)
    }
}

impl<'a> From<&'a str> for CliError {
    fn from(err: &'a str) -> CliError {
        CliError::Other(err.to_owned())
    }
}
