//! Streaming PPMI pass. Reads a sorted `"u v c"` file and emits `"u v ppmi"`
//! lines for every pair whose positive pointwise mutual information survives.
//! The same function serves both TF mode and DF mode; only the marginals and
//! the count file differ between them.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::CliResult;

const FLUSH_THRESHOLD_BYTES: usize = 8500;

pub struct Marginals<'a> {
    /// Total pairs (TF mode) or total documents (DF mode).
    pub numerator_total: u64,
    /// Per-token `n_u` (TF mode: `pair_occurrences`; DF mode: `document_occurrences`).
    pub per_token: &'a [u64],
}

pub fn run(input_path: &Path, output_path: &Path, marginals: &Marginals) -> CliResult<()> {
    let reader = BufReader::new(File::open(input_path)?);
    let mut writer = BufWriter::new(File::create(output_path)?);

    let mut buffer = String::new();

    for line in reader.lines() {
        let line = line?;
        let mut fields = line.split_whitespace();
        let u: usize = match fields.next().and_then(|s| s.parse().ok()) {
            Some(u) => u,
            None => continue,
        };
        let v: usize = match fields.next().and_then(|s| s.parse().ok()) {
            Some(v) => v,
            None => continue,
        };
        let c: u64 = match fields.next().and_then(|s| s.parse().ok()) {
            Some(c) => c,
            None => continue,
        };

        if u > v {
            continue;
        }

        let n_u = marginals.per_token.get(u).copied().unwrap_or(0);
        let n_v = marginals.per_token.get(v).copied().unwrap_or(0);
        if n_u == 0 || n_v == 0 || c == 0 {
            continue;
        }

        let x = (marginals.numerator_total as f64 / n_u as f64) / (n_v as f64 / c as f64);
        if x > 1.0 {
            buffer.push_str(&u.to_string());
            buffer.push(' ');
            buffer.push_str(&v.to_string());
            buffer.push(' ');
            buffer.push_str(&x.ln().to_string());
            buffer.push('\n');
        }

        if buffer.len() >= FLUSH_THRESHOLD_BYTES {
            writer.write_all(buffer.as_bytes())?;
            buffer.clear();
        }
    }

    if !buffer.is_empty() {
        writer.write_all(buffer.as_bytes())?;
    }
    writer.flush()?;

    Ok(())
}
