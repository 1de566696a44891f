//! Dictionary-file parsing shared by `seed_from_dictionary` on every engine.
//!
//! Format: UTF-8 text, one token per line; blank lines and lines starting
//! with `#` are ignored; trailing whitespace is stripped.

use std::path::Path;

use crate::Error;

/// Default directory `load_vocab_from_dict` resolves file names against when
/// an engine has not been given an explicit root via `set_dictionary_root`.
pub(crate) const DEFAULT_DICTIONARY_ROOT: &str = "dict";

/// Parses already-loaded lines (e.g. from `read_line_iterator`) into the
/// sequence of distinct entries a dictionary file contributes, in order.
pub(crate) fn parse_entries<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|l| l.as_ref().trim_end().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect()
}

/// Reads a dictionary file from `root` joined with `name` and parses it.
pub(crate) fn read_dictionary_file(root: &Path, name: &str) -> Result<Vec<String>, Error> {
    let path = root.join(name);
    if !path.exists() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(&path)?;
    Ok(parse_entries(contents.lines()))
}
