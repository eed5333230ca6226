use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use docopt::Docopt;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::{CliError, CliResult};

pub fn version() -> String {
    let (maj, min, pat, pre) = (
        option_env!("CARGO_PKG_VERSION_MAJOR"),
        option_env!("CARGO_PKG_VERSION_MINOR"),
        option_env!("CARGO_PKG_VERSION_PATCH"),
        option_env!("CARGO_PKG_VERSION_PRE"),
    );
    match (maj, min, pat, pre) {
        (Some(maj), Some(min), Some(pat), Some(pre)) => {
            if pre.is_empty() {
                format!("{}.{}.{}", maj, min, pat)
            } else {
                format!("{}.{}.{}-{}", maj, min, pat, pre)
            }
        }
        _ => "".to_owned(),
    }
}

lazy_static! {
    static ref FLAG_REGEX: Regex = Regex::new(r"([\s,/\(])(--?[A-Za-z][\w\-]*)").unwrap();
    static ref SECTION_REGEX: Regex = Regex::new("(?im)^.*(?:usage|options?):|---+").unwrap();
    static ref DIMMED_REGEX: Regex =
        Regex::new(r"\[--\]|\[?<[\w|\-]+>(?:\.{3})?\]?|\[[\w\s:Â§|]+\]|\s+[\$>][^\n]+|\*[^*\n]+\*")
            .unwrap();
    static ref QUOTE_REGEX: Regex = Regex::new(r#"(?m)"[^"\n]+"|'[^'\n]+'|`[^`\n]+`"#).unwrap();
    static ref URL_REGEX: Regex = Regex::new(r"https?://\S+").unwrap();
}

pub fn colorize_help(help: &str) -> String {
    let help = FLAG_REGEX.replace_all(help, |caps: &Captures| {
        caps[1].to_string() + &caps[2].cyan().to_string()
    });
    let help =
        SECTION_REGEX.replace_all(&help, |caps: &Captures| caps[0].yellow().bold().to_string());
    let help = QUOTE_REGEX.replace_all(&help, |caps: &Captures| caps[0].green().to_string());

    let help = DIMMED_REGEX.replace_all(&help, |caps: &Captures| {
        caps[0].dimmed().white().to_string()
    });

    let help = URL_REGEX.replace_all(&help, |caps: &Captures| caps[0].blue().to_string());

    help.into_owned()
}

pub fn get_args<T>(usage: &str, argv: &[&str]) -> CliResult<T>
where
    T: DeserializeOwned,
{
    Docopt::new(usage)
        .and_then(|d| {
            d.argv(argv.iter().copied())
                .version(Some(version()))
                .help(true)
                .deserialize()
        })
        .map_err(From::from)
}

/// Resolves the `--num-threads` flag: zero or negative means one worker per
/// logical CPU.
pub fn resolve_num_threads(requested: i64) -> usize {
    if requested <= 0 {
        num_cpus::get()
    } else {
        requested as usize
    }
}

/// Creates a freshly named scratch directory under `base`. Fails rather than
/// picking another name on collision: a collision means something else is
/// already using that uuid, which is not this process's problem to paper
/// over.
pub fn create_scratch_dir(base: &Path) -> CliResult<PathBuf> {
    let dir = base.join(format!("cooccurrence-stats-{}", Uuid::new_v4()));

    if dir.exists() {
        return Err(CliError::Other(format!(
            "scratch directory {} already exists",
            dir.display()
        )));
    }

    fs::create_dir(&dir).map_err(|err| {
        CliError::Other(format!(
            "could not create scratch directory {}: {}",
            dir.display(),
            err
        ))
    })?;

    Ok(dir)
}
