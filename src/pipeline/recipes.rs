//! Recipe source: the recipe list file, filtered line by line.

use anyhow::{Context, Result};
use log::warn;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use crate::utils::config::RecipeListConsts;

/// Returns true if `line` names a recipe to run: not empty, not a `#` comment, not the
/// reserved `MakeCatalogs.munki` entry. No trimming; the line is the identifier.
pub fn is_recipe_line(line: &str) -> bool {
    !line.is_empty()
        && line != RecipeListConsts::MAKECATALOGS_SENTINEL
        && !line.starts_with(RecipeListConsts::COMMENT_MARKER)
}

/// Lazy single-pass sequence of recipe identifiers in file order, duplicates kept.
/// Re-open the file for every cycle; a consumed list cannot be restarted.
///
/// A line that is not valid UTF-8 is logged and skipped. A read error ends the list.
pub struct RecipeList<R> {
    reader: R,
    source: String,
    line_no: usize,
    done: bool,
}

impl RecipeList<BufReader<File>> {
    /// Open the recipe list. Failure here aborts the cycle; an empty file is not a failure.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("open recipe list {}", path.display()))?;
        Ok(Self::from_reader(
            BufReader::new(file),
            path.display().to_string(),
        ))
    }
}

impl<R: BufRead> RecipeList<R> {
    pub fn from_reader(reader: R, source: impl Into<String>) -> Self {
        Self {
            reader,
            source: source.into(),
            line_no: 0,
            done: false,
        }
    }
}

/// Drop the line terminator (`\n` or `\r\n`).
fn strip_eol(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    }
}

impl<R: BufRead> Iterator for RecipeList<R> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut buf = Vec::new();
        while !self.done {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line_no += 1;
                    strip_eol(&mut buf);
                    match String::from_utf8(std::mem::take(&mut buf)) {
                        Ok(line) if is_recipe_line(&line) => return Some(line),
                        Ok(_) => {}
                        Err(_) => warn!(
                            "{}:{}: skipping line that is not valid UTF-8",
                            self.source, self.line_no
                        ),
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("{}: stopped reading recipe list: {}", self.source, e);
                    self.done = true;
                }
            }
        }
        None
    }
}
