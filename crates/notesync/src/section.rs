//! Section index pages.
//!
//! Every published directory gets an `index.md` that the site generator uses
//! as the section's parent page. The front matter is always regenerated; the
//! prose the author wrote above the TOC marker is kept.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::naming::{natural_key, parse_chapter_title, title_case, NaturalKey};
use crate::page::{read_text, split_front_matter, FrontMatter};

/// Heading placed above a generated table of contents.
const TOC_HEADING: &str = "## TABLE OF CONTENTS";

/// Navigation identity of a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Display title.
    pub title: String,
    /// Position among sibling sections.
    pub nav_order: i64,
    /// Title of the enclosing section, for nested directories.
    pub parent: Option<String>,
    /// Title of the section above `parent`.
    pub grand_parent: Option<String>,
}

impl Section {
    /// Resolve the section for a directory path relative to the notes root.
    ///
    /// Returns `None` for the root itself.
    #[must_use]
    pub fn for_dir(config: &Config, rel: &Path) -> Option<Self> {
        let mut titles: Vec<String> = rel
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .map(|name| section_title(config, name))
            .collect();
        let name = rel.file_name()?.to_str()?;

        let title = titles.pop()?;
        let parent = titles.pop();
        let grand_parent = titles.pop();
        Some(Self {
            title,
            nav_order: section_order(config, name),
            parent,
            grand_parent,
        })
    }

    /// Front matter managed for this section's index page.
    #[must_use]
    pub fn front_matter(&self, manual_toc: bool) -> FrontMatter {
        FrontMatter {
            title: Some(self.title.clone()),
            nav_order: Some(self.nav_order),
            parent: self.parent.clone(),
            grand_parent: self.grand_parent.clone(),
            has_children: Some(true),
            toc: manual_toc.then_some(false),
            ..FrontMatter::default()
        }
    }

    /// Body written into a brand new index page.
    #[must_use]
    pub fn default_body(&self) -> String {
        format!(
            "# {title}\n\nNotes for the **{title}** section.",
            title = self.title
        )
    }
}

/// Display title for a directory: configured, else the title-cased name.
#[must_use]
pub fn section_title(config: &Config, dir_name: &str) -> String {
    config
        .section(dir_name)
        .map_or_else(|| title_case(dir_name), |s| s.title.clone())
}

/// Navigation order for a directory: configured, else the default order.
#[must_use]
pub fn section_order(config: &Config, dir_name: &str) -> i64 {
    config
        .section(dir_name)
        .map_or(config.sync.default_section_order, |s| s.nav_order)
}

/// `nav_order` values for the children of one directory.
///
/// The pages of a directory and the index pages of its sub-sections share a
/// parent, so their orders must not collide. Chapter pages keep their chapter
/// number and configured sections their configured order. Remaining pages
/// follow the highest chapter number, and remaining sections count up from
/// the default section order, both skipping values already taken.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiblingOrders {
    pages: HashMap<String, i64>,
    sections: HashMap<String, i64>,
}

impl SiblingOrders {
    /// Allocate orders for `pages` (file names, in walk order) and the child
    /// section directory names `sections`.
    #[must_use]
    pub fn plan(config: &Config, pages: &[String], sections: &[String]) -> Self {
        let mut taken = BTreeSet::new();
        let mut page_orders = HashMap::new();
        let mut section_orders = HashMap::new();
        let mut plain_pages = Vec::new();
        let mut plain_sections = Vec::new();

        for name in pages {
            match parse_chapter_title(name).0 {
                Some(chapter) => {
                    taken.insert(i64::from(chapter));
                    page_orders.insert(name.clone(), i64::from(chapter));
                }
                None => plain_pages.push(name),
            }
        }
        for name in sections {
            match config.section(name) {
                Some(configured) => {
                    taken.insert(configured.nav_order);
                    section_orders.insert(name.clone(), configured.nav_order);
                }
                None => plain_sections.push(name),
            }
        }

        let mut next = page_orders.values().max().map_or(1, |last| last + 1);
        for name in plain_pages {
            next = claim(&mut taken, next);
            page_orders.insert(name.clone(), next);
        }
        let mut next = config.sync.default_section_order;
        for name in plain_sections {
            next = claim(&mut taken, next);
            section_orders.insert(name.clone(), next);
        }

        Self {
            pages: page_orders,
            sections: section_orders,
        }
    }

    /// Order for a page file name.
    #[must_use]
    pub fn page(&self, file_name: &str) -> Option<i64> {
        self.pages.get(file_name).copied()
    }

    /// Order for a child section directory name.
    #[must_use]
    pub fn section(&self, dir_name: &str) -> Option<i64> {
        self.sections.get(dir_name).copied()
    }
}

/// Take the first value at or after `from` that is not in `taken`.
fn claim(taken: &mut BTreeSet<i64>, from: i64) -> i64 {
    let mut value = from;
    while taken.contains(&value) {
        value = value.saturating_add(1);
    }
    taken.insert(value);
    value
}

/// One line of a manual table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TocEntry {
    /// Linked page title.
    pub title: String,
    /// Link target, relative to the index.
    pub file: String,
}

impl TocEntry {
    fn to_markdown(&self) -> String {
        format!("- [{}]({})", self.title, self.file)
    }
}

/// Build the full text of a section index.
///
/// `existing` is the current index text, if any. Its body up to `marker` is
/// preserved; its front matter is replaced.
#[must_use]
pub fn render_index(
    section: &Section,
    existing: Option<&str>,
    entries: &[TocEntry],
    manual_toc: bool,
    marker: &str,
) -> String {
    let preserved = existing
        .map(|text| {
            let (_, body) = split_front_matter(text);
            let above = body.split(marker).next().unwrap_or_default();
            above.trim_end().to_string()
        })
        .filter(|body| !body.trim().is_empty())
        .unwrap_or_else(|| section.default_body());

    let mut out = section.front_matter(manual_toc).render();
    out.push_str(&preserved);

    if manual_toc {
        out.push_str("\n\n");
        out.push_str(marker);
        out.push_str("\n\n");
        out.push_str(TOC_HEADING);
        out.push_str("\n\n---\n\n");

        let mut lines: Vec<(NaturalKey, String)> = Vec::new();
        for entry in entries {
            let line = entry.to_markdown();
            if !lines.iter().any(|(_, l)| *l == line) {
                lines.push((natural_key(&entry.title), line));
            }
        }
        lines.sort_by(|a, b| a.0.cmp(&b.0));
        for (_, line) in lines {
            out.push_str(&line);
            out.push('\n');
        }
    }

    let trimmed = out.trim_end_matches('\n').len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

/// What writing an index did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// The file was (or in a dry run, would be) written.
    Updated,
    /// The file already had this content.
    UpToDate,
}

/// Write the index for `section` at `path` if its content changed.
///
/// # Errors
///
/// Returns an error if the existing index cannot be read or the new one
/// cannot be written.
pub fn write_index(
    path: &Path,
    section: &Section,
    entries: &[TocEntry],
    manual_toc: bool,
    marker: &str,
    dry_run: bool,
) -> Result<IndexStatus> {
    let existing = if path.exists() {
        Some(read_text(path)?)
    } else {
        None
    };
    let content = render_index(section, existing.as_deref(), entries, manual_toc, marker);

    if existing.as_deref() == Some(content.as_str()) {
        debug!("Index is up to date: {}", path.display());
        return Ok(IndexStatus::UpToDate);
    }

    if !dry_run {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, &content).map_err(|e| Error::write(path, e))?;
    }
    Ok(IndexStatus::Updated)
}
