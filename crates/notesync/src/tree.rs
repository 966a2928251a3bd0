//! Walking the notes tree.

use std::path::{Component, Path, PathBuf};

use tracing::trace;

use crate::error::{Error, Result};

/// File name of section index pages.
pub const INDEX_FILE: &str = "index.md";

/// A directory of the notes tree and the pages directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Path relative to the notes root; empty for the root itself.
    pub rel: PathBuf,
    /// Absolute (or root-joined) path.
    pub path: PathBuf,
    /// Markdown file names, byte-wise sorted, without `index.md`.
    pub pages: Vec<String>,
    /// Actual file name of the directory's index page, if it has one.
    pub index: Option<String>,
    /// Whether any Markdown lives in this directory or below it.
    pub has_markdown: bool,
}

impl SourceDir {
    /// Whether this is the notes root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.rel.as_os_str().is_empty()
    }

    /// The directory's own name, `None` for the root.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.rel.file_name().and_then(|n| n.to_str())
    }
}

/// Whether `name` is a Markdown file name.
#[must_use]
pub fn is_markdown(name: &str) -> bool {
    name.ends_with(".md")
}

/// Whether `name` is a section index page.
#[must_use]
pub fn is_index(name: &str) -> bool {
    name.eq_ignore_ascii_case(INDEX_FILE)
}

/// `/`-separated form of a relative path, used as a stable state key.
#[must_use]
pub fn rel_key(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Walk `root` depth-first in sorted order.
///
/// Directories named in `excluded` are skipped along with everything below
/// them, as are symlinked directories. The root is always the first entry.
///
/// # Errors
///
/// Returns an error if a directory cannot be listed.
pub fn scan(root: &Path, excluded: &[String]) -> Result<Vec<SourceDir>> {
    let mut out = Vec::new();
    visit(root, PathBuf::new(), excluded, &mut out)?;
    Ok(out)
}

/// Returns whether the subtree rooted at `rel` holds Markdown.
fn visit(
    root: &Path,
    rel: PathBuf,
    excluded: &[String],
    out: &mut Vec<SourceDir>,
) -> Result<bool> {
    let path = root.join(&rel);
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in std::fs::read_dir(&path).map_err(|e| Error::read(&path, e))? {
        let entry = entry.map_err(|e| Error::read(&path, e))?;
        let file_type = entry.file_type().map_err(|e| Error::read(entry.path(), e))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            trace!("Skipping non UTF-8 name in {}", path.display());
            continue;
        };
        if file_type.is_dir() {
            if !excluded.iter().any(|x| *x == name) {
                dirs.push(name);
            }
        } else if file_type.is_file() && is_markdown(&name) {
            files.push(name);
        }
    }
    files.sort();
    dirs.sort();

    let has_own_markdown = !files.is_empty();
    let (indexes, pages): (Vec<String>, Vec<String>) = files.into_iter().partition(|f| is_index(f));

    let slot = out.len();
    out.push(SourceDir {
        rel: rel.clone(),
        path,
        pages,
        index: indexes.into_iter().next(),
        has_markdown: has_own_markdown,
    });

    let mut has_markdown = has_own_markdown;
    for dir in dirs {
        has_markdown |= visit(root, rel.join(dir), excluded, out)?;
    }
    out[slot].has_markdown = has_markdown;
    Ok(has_markdown)
}
