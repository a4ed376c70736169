//! Porcelain status line parsing
//!
//! Lines look like `XY filename`: a two-character status code, one space,
//! then the path. Renames are written `R  old -> new`.

use serde::Serialize;

/// Coarse classification of a changed file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

/// One parsed status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusLine<'a> {
    /// The raw two-character code (e.g. `"M "`, `"??"`, `" D"`)
    pub code: &'a str,
    /// Path of the changed file (the new path for renames)
    pub filename: &'a str,
}

impl<'a> StatusLine<'a> {
    /// Parse a porcelain line; `None` for lines too short to carry a filename
    pub fn parse(line: &'a str) -> Option<Self> {
        let code = line.get(..2)?;
        let rest = line.get(3..)?.trim_end();
        let path = match rest.rsplit_once(" -> ") {
            Some((_, new)) => new,
            None => rest,
        };
        let filename = path.trim_matches('"');
        if filename.is_empty() {
            return None;
        }
        Some(Self { code, filename })
    }

    /// Bucket this change by its status code
    pub fn kind(&self) -> ChangeKind {
        if self.code == "??" || self.code.contains('A') {
            ChangeKind::Added
        } else if self.code.contains('D') {
            ChangeKind::Deleted
        } else {
            ChangeKind::Modified
        }
    }

    /// Lowercased extension including the dot, if the filename has one
    pub fn extension(&self) -> Option<String> {
        let name = self.filename.rsplit('/').next().unwrap_or(self.filename);
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => Some(name[idx..].to_lowercase()),
            _ => None,
        }
    }
}

/// Iterate the parseable lines of a status block
pub fn parse_block(status: &str) -> impl Iterator<Item = StatusLine<'_>> {
    status.lines().filter_map(StatusLine::parse)
}
