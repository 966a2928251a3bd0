//! Diagnosis of how the notes tree maps onto sections.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::tree::{scan, SourceDir};

/// Files listed per directory in the text rendering.
const PREVIEW_FILES: usize = 3;

/// An immediate child of a top-level directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildDir {
    /// Directory name.
    pub name: String,
    /// Whether it holds notes (other than `index.md`) at any depth.
    pub has_markdown: bool,
}

/// Diagnosis of one top-level directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirReport {
    /// Directory name.
    pub name: String,
    /// Notes directly inside, without `index.md`.
    pub markdown_files: Vec<String>,
    /// Immediate subdirectories.
    pub children: Vec<ChildDir>,
    /// Whether any child directory holds notes.
    pub has_child_dir_with_markdown: bool,
}

/// Diagnosis of a whole notes tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructureReport {
    /// The analysed root.
    pub source_dir: PathBuf,
    /// Top-level directories in name order.
    pub directories: Vec<DirReport>,
}

/// Inspect the top-level directories of `source_root`.
///
/// # Errors
///
/// Returns an error if the tree cannot be read.
pub fn analyze_structure(source_root: &Path, exclude: &[String]) -> Result<StructureReport> {
    let dirs = scan(source_root, exclude)?;

    let directories = dirs
        .iter()
        .filter(|d| d.rel.components().count() == 1)
        .map(|top| {
            let children = children_of(top, &dirs);
            DirReport {
                name: top.name().unwrap_or_default().to_string(),
                markdown_files: top.pages.clone(),
                has_child_dir_with_markdown: children.iter().any(|c| c.has_markdown),
                children,
            }
        })
        .collect();

    Ok(StructureReport {
        source_dir: source_root.to_path_buf(),
        directories,
    })
}

fn children_of(parent: &SourceDir, all: &[SourceDir]) -> Vec<ChildDir> {
    all.iter()
        .filter(|d| d.rel.parent() == Some(parent.rel.as_path()))
        .map(|child| ChildDir {
            name: child.name().unwrap_or_default().to_string(),
            has_markdown: all
                .iter()
                .any(|d| d.rel.starts_with(&child.rel) && !d.pages.is_empty()),
        })
        .collect()
}

impl fmt::Display for StructureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Directory structure of {}", self.source_dir.display())?;
        for dir in &self.directories {
            writeln!(f)?;
            writeln!(f, "{}/", dir.name)?;
            if !dir.markdown_files.is_empty() {
                writeln!(f, "  Direct .md files: {}", dir.markdown_files.len())?;
                for name in dir.markdown_files.iter().take(PREVIEW_FILES) {
                    writeln!(f, "    - {name}")?;
                }
                if dir.markdown_files.len() > PREVIEW_FILES {
                    writeln!(
                        f,
                        "    ... and {} more",
                        dir.markdown_files.len() - PREVIEW_FILES
                    )?;
                }
            }
            if !dir.children.is_empty() {
                writeln!(f, "  Child directories:")?;
                for child in &dir.children {
                    let status = if child.has_markdown {
                        "has .md"
                    } else {
                        "no .md"
                    };
                    writeln!(f, "    - {}/ ({status})", child.name)?;
                }
            }
            writeln!(
                f,
                "  has_child_dir_with_markdown: {}",
                dir.has_child_dir_with_markdown
            )?;
        }
        Ok(())
    }
}
