//! Immutable `(keyword, modality) -> id` mapping loaded once at startup.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::{CliError, CliResult};

pub const DEFAULT_MODALITY: &str = "@default_class";

#[derive(Debug, Default)]
pub struct Vocabulary {
    ids: HashMap<String, HashMap<String, u32>>,
    len: usize,
}

impl Vocabulary {
    pub fn from_path<P: AsRef<Path>>(path: P) -> CliResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| {
            CliError::Other(format!(
                "could not open vocab file {}: {}",
                path.display(),
                err
            ))
        })?;
        let reader = BufReader::new(file);

        let mut vocab = Vocabulary::default();

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let mut fields = trimmed.split_whitespace();
            let keyword = match fields.next() {
                Some(k) => k,
                None => continue,
            };
            let modality = fields.next().unwrap_or(DEFAULT_MODALITY);

            vocab.insert(keyword, modality)?;
        }

        Ok(vocab)
    }

    fn insert(&mut self, keyword: &str, modality: &str) -> CliResult<()> {
        let by_modality = self.ids.entry(keyword.to_string()).or_default();

        if by_modality.contains_key(modality) {
            return Err(CliError::Other(format!(
                "duplicate vocab entry: {} {}",
                keyword, modality
            )));
        }

        by_modality.insert(modality.to_string(), self.len as u32);
        self.len += 1;
        Ok(())
    }

    pub fn lookup(&self, keyword: &str, modality: &str) -> Option<u32> {
        self.ids.get(keyword)?.get(modality).copied()
    }

    pub fn lookup_default(&self, keyword: &str) -> Option<u32> {
        self.lookup(keyword, DEFAULT_MODALITY)
    }

    pub fn len(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vocab_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_lookup_default_modality() {
        let file = vocab_file("a\nb\nc\n");
        let vocab = Vocabulary::from_path(file.path()).unwrap();
        assert_eq!(vocab.len(), 3);
        assert_eq!(vocab.lookup_default("a"), Some(0));
        assert_eq!(vocab.lookup_default("b"), Some(1));
        assert_eq!(vocab.lookup_default("c"), Some(2));
        assert_eq!(vocab.lookup_default("d"), None);
    }

    #[test]
    fn test_explicit_modality_and_blank_lines() {
        let file = vocab_file("a @default_class\n\n  \nb @other\n");
        let vocab = Vocabulary::from_path(file.path()).unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(vocab.lookup("a", "@default_class"), Some(0));
        assert_eq!(vocab.lookup("b", "@other"), Some(1));
        assert_eq!(vocab.lookup_default("b"), None);
    }

    #[test]
    fn test_duplicate_entry_fails_construction() {
        let file = vocab_file("a\na\n");
        let err = Vocabulary::from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate vocab entry"));
    }
}
