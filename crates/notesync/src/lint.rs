//! Checks a published docs tree against the front-matter contract.
//!
//! Every page must carry front matter with a title, every `parent` must name
//! an existing page, siblings must not share a `nav_order`, and relative
//! links (including `#fragment` anchors) must resolve.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::page::{anchors, read_text, split_front_matter, Fences, FrontMatter, Page};
use crate::tree::{rel_key, scan};

/// Directories under a docs root that hold generator output or tooling.
const SKIP_DIRS: &[&str] = &[".git", "_site", ".jekyll-cache", ".sass-cache", "vendor", "node_modules"];

fn link_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[[^\]]*\]\(([^)]+)\)").expect("Invalid link regex pattern"))
}

/// How serious an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Breaks the contract; fails the lint.
    Error,
    /// Suspicious but renderable.
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// Stable identifier of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// The page has no front-matter block.
    FrontMatterMissing,
    /// The front matter is not valid YAML or has mistyped keys.
    FrontMatterInvalid,
    /// No title, or a blank one.
    TitleMissing,
    /// `parent` names no page.
    ParentUnknown,
    /// `parent` names a page that is not a section index.
    ParentNotSection,
    /// Two navigable siblings share a `nav_order`.
    NavOrderDuplicate,
    /// Two section pages share a title.
    TitleAmbiguous,
    /// A relative link points at a missing file.
    LinkUnresolved,
    /// A link fragment names no heading of its target.
    AnchorUnresolved,
}

impl IssueCode {
    /// Severity of issues with this code.
    #[must_use]
    pub fn severity(self) -> Severity {
        match self {
            Self::ParentNotSection | Self::TitleAmbiguous => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// The code as printed and serialized.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FrontMatterMissing => "FRONT_MATTER_MISSING",
            Self::FrontMatterInvalid => "FRONT_MATTER_INVALID",
            Self::TitleMissing => "TITLE_MISSING",
            Self::ParentUnknown => "PARENT_UNKNOWN",
            Self::ParentNotSection => "PARENT_NOT_SECTION",
            Self::NavOrderDuplicate => "NAV_ORDER_DUPLICATE",
            Self::TitleAmbiguous => "TITLE_AMBIGUOUS",
            Self::LinkUnresolved => "LINK_UNRESOLVED",
            Self::AnchorUnresolved => "ANCHOR_UNRESOLVED",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LintIssue {
    /// Derived from `code`.
    pub severity: Severity,
    /// Which check fired.
    pub code: IssueCode,
    /// Page path relative to the docs root, `/`-separated.
    pub path: String,
    /// 1-based line, when the issue has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// Human-readable detail.
    pub message: String,
}

impl LintIssue {
    fn new(code: IssueCode, path: &str, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            path: path.to_string(),
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LintIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.line {
            Some(line) => write!(
                f,
                "{}: {}:{line} [{}] {}",
                self.severity, self.path, self.code, self.message
            ),
            None => write!(
                f,
                "{}: {} [{}] {}",
                self.severity, self.path, self.code, self.message
            ),
        }
    }
}

/// Result of linting a docs tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LintReport {
    /// The tree that was checked.
    pub docs_root: PathBuf,
    /// Number of Markdown pages read.
    pub pages_checked: usize,
    /// Findings sorted by path, line and code.
    pub issues: Vec<LintIssue>,
}

impl LintReport {
    /// Number of error-level issues.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Number of warnings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// A report passes when it has no errors.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }

    /// Issues carrying `code`.
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }
}

/// A docs page as seen by the checks.
#[derive(Debug)]
struct DocPage {
    rel: String,
    path: PathBuf,
    front_matter: Option<FrontMatter>,
    body: String,
    /// Lines in the file before `body` starts.
    body_offset: usize,
}

impl DocPage {
    fn title(&self) -> Option<&str> {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Lint every Markdown page below `docs_root`.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a page cannot be read.
pub fn lint_docs(docs_root: &Path) -> Result<LintReport> {
    let skip: Vec<String> = SKIP_DIRS.iter().map(|s| (*s).to_string()).collect();
    let mut issues = Vec::new();
    let mut pages = Vec::new();

    for dir in scan(docs_root, &skip)? {
        for file_name in dir.index.iter().chain(dir.pages.iter()) {
            let path = dir.path.join(file_name);
            let rel = path
                .strip_prefix(docs_root)
                .map(rel_key)
                .map_err(|_| Error::OutsideRoot {
                    path: path.clone(),
                    root: docs_root.to_path_buf(),
                })?;
            if let Some(page) = load_page(rel, path, &mut issues)? {
                pages.push(page);
            }
        }
    }
    pages.sort_by(|a, b| a.rel.cmp(&b.rel));
    debug!("Linting {} pages under {}", pages.len(), docs_root.display());

    check_titles(&pages, &mut issues);
    check_parents(&pages, &mut issues);
    check_nav_order(&pages, &mut issues);
    check_links(docs_root, &pages, &mut issues);

    issues.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then(a.line.cmp(&b.line))
            .then(a.code.cmp(&b.code))
            .then(a.message.cmp(&b.message))
    });
    issues.dedup();

    let report = LintReport {
        docs_root: docs_root.to_path_buf(),
        pages_checked: pages.len(),
        issues,
    };
    info!(
        "Checked {} pages: {} errors, {} warnings",
        report.pages_checked,
        report.error_count(),
        report.warning_count()
    );
    Ok(report)
}

fn load_page(rel: String, path: PathBuf, issues: &mut Vec<LintIssue>) -> Result<Option<DocPage>> {
    let text = match read_text(&path) {
        Ok(text) => text,
        Err(e @ Error::Encoding { .. }) => {
            issues.push(LintIssue::new(IssueCode::FrontMatterInvalid, &rel, None, e.to_string()));
            return Ok(None);
        }
        Err(e) => return Err(e),
    };

    let (block, body) = split_front_matter(&text);
    let body_offset = text[..text.len() - body.len()].matches('\n').count();

    let front_matter = match Page::parse(&path, &text) {
        Ok(page) => page.front_matter,
        Err(Error::FrontMatter { source, .. }) => {
            // Block starts on the second line of the file.
            let line = source.location().map(|loc| loc.line() + 1);
            issues.push(LintIssue::new(
                IssueCode::FrontMatterInvalid,
                &rel,
                line,
                format!("front matter does not parse: {source}"),
            ));
            None
        }
        Err(e) => return Err(e),
    };

    if block.is_none() {
        issues.push(LintIssue::new(
            IssueCode::FrontMatterMissing,
            &rel,
            Some(1),
            "page has no front-matter block",
        ));
    }

    Ok(Some(DocPage {
        rel,
        body: body.to_string(),
        path,
        front_matter,
        body_offset,
    }))
}

fn check_titles(pages: &[DocPage], issues: &mut Vec<LintIssue>) {
    let mut sections: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for page in pages {
        let Some(fm) = &page.front_matter else {
            continue;
        };
        match page.title() {
            None => issues.push(LintIssue::new(
                IssueCode::TitleMissing,
                &page.rel,
                None,
                "front matter has no title",
            )),
            Some(title) if fm.is_section() => {
                sections.entry(title).or_default().push(&page.rel);
            }
            Some(_) => {}
        }
    }

    for (title, rels) in sections.into_iter().filter(|(_, r)| r.len() > 1) {
        for rel in &rels {
            let others: Vec<&str> = rels.iter().copied().filter(|r| r != rel).collect();
            issues.push(LintIssue::new(
                IssueCode::TitleAmbiguous,
                rel,
                None,
                format!("section title '{title}' is also used by {}", others.join(", ")),
            ));
        }
    }
}

fn check_parents(pages: &[DocPage], issues: &mut Vec<LintIssue>) {
    let mut by_title: HashMap<&str, Vec<&DocPage>> = HashMap::new();
    for page in pages {
        if let Some(title) = page.title() {
            by_title.entry(title).or_default().push(page);
        }
    }

    for page in pages {
        let Some(fm) = &page.front_matter else {
            continue;
        };
        let Some(parent) = fm.parent.as_deref().map(str::trim) else {
            continue;
        };

        let candidates: Vec<&DocPage> = by_title
            .get(parent)
            .map(|found| {
                found
                    .iter()
                    .copied()
                    .filter(|c| match fm.grand_parent.as_deref() {
                        Some(gp) => {
                            c.front_matter.as_ref().and_then(|f| f.parent.as_deref()) == Some(gp)
                        }
                        None => true,
                    })
                    .collect()
            })
            .unwrap_or_default();

        if candidates.is_empty() {
            let message = match fm.grand_parent.as_deref() {
                Some(gp) => format!("parent '{parent}' under '{gp}' matches no page title"),
                None => format!("parent '{parent}' matches no page title"),
            };
            issues.push(LintIssue::new(IssueCode::ParentUnknown, &page.rel, None, message));
        } else if !candidates
            .iter()
            .any(|c| c.front_matter.as_ref().is_some_and(FrontMatter::is_section))
        {
            issues.push(LintIssue::new(
                IssueCode::ParentNotSection,
                &page.rel,
                None,
                format!(
                    "parent '{parent}' ({}) does not set has_children: true",
                    candidates[0].rel
                ),
            ));
        }
    }
}

fn check_nav_order(pages: &[DocPage], issues: &mut Vec<LintIssue>) {
    type Siblings<'a> = BTreeMap<(Option<&'a str>, Option<&'a str>), BTreeMap<i64, &'a str>>;
    let mut groups: Siblings<'_> = BTreeMap::new();

    for page in pages {
        let Some(fm) = &page.front_matter else {
            continue;
        };
        if fm.is_excluded() {
            continue;
        }
        let Some(order) = fm.nav_order else {
            continue;
        };
        let key = (fm.parent.as_deref(), fm.grand_parent.as_deref());
        let seen = groups.entry(key).or_default();
        match seen.get(&order) {
            Some(first) => issues.push(LintIssue::new(
                IssueCode::NavOrderDuplicate,
                &page.rel,
                None,
                format!("nav_order {order} is also used by sibling {first}"),
            )),
            None => {
                seen.insert(order, &page.rel);
            }
        }
    }
}

fn is_external(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("mailto:")
}

/// Decode the `%20` style escapes that appear in hand-written links.
fn decode_path(path: &str) -> String {
    fn hex(b: u8) -> Option<u8> {
        char::from(b).to_digit(16).and_then(|d| u8::try_from(d).ok())
    }

    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push(hi * 16 + lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(out).unwrap_or_else(|_| path.to_string())
}

fn check_links(docs_root: &Path, pages: &[DocPage], issues: &mut Vec<LintIssue>) {
    let mut anchor_cache: HashMap<PathBuf, Vec<String>> = HashMap::new();

    for page in pages {
        let own_anchors = anchors(&page.body);
        let base = page.path.parent().unwrap_or(docs_root);
        let mut fences = Fences::default();

        for (idx, line) in page.body.lines().enumerate() {
            if fences.is_code(line) {
                continue;
            }
            let line_no = Some(page.body_offset + idx + 1);

            for cap in link_regex().captures_iter(line) {
                let raw = cap.get(1).map_or("", |m| m.as_str()).trim();
                // Drop an optional link title: [x](page.md "Title").
                let target = raw.split_whitespace().next().unwrap_or_default();
                let target = target.trim_start_matches('<').trim_end_matches('>');
                if target.is_empty() || is_external(target) {
                    continue;
                }

                if let Some(anchor) = target.strip_prefix('#') {
                    if !anchor.is_empty() && !own_anchors.iter().any(|a| a == anchor) {
                        issues.push(LintIssue::new(
                            IssueCode::AnchorUnresolved,
                            &page.rel,
                            line_no,
                            format!("no heading for same-page anchor `#{anchor}`"),
                        ));
                    }
                    continue;
                }

                let (path_part, anchor_part) = target
                    .split_once('#')
                    .map_or((target, None), |(a, b)| (a, Some(b)));
                let path_part = path_part.split('?').next().unwrap_or_default();
                if path_part.is_empty() || path_part.ends_with('/') {
                    continue;
                }

                let decoded = decode_path(path_part);
                let resolved = match decoded.strip_prefix('/') {
                    Some(from_root) => docs_root.join(from_root),
                    None => base.join(&decoded),
                };
                if !resolved.exists() {
                    issues.push(LintIssue::new(
                        IssueCode::LinkUnresolved,
                        &page.rel,
                        line_no,
                        format!("unresolved link `{target}`"),
                    ));
                    continue;
                }

                let Some(anchor) = anchor_part.filter(|a| !a.is_empty()) else {
                    continue;
                };
                if resolved.extension().and_then(|e| e.to_str()) != Some("md") {
                    continue;
                }
                let target_anchors = anchor_cache.entry(resolved.clone()).or_insert_with(|| {
                    read_text(&resolved)
                        .map(|text| anchors(split_front_matter(&text).1))
                        .unwrap_or_default()
                });
                if !target_anchors.iter().any(|a| a == anchor) {
                    issues.push(LintIssue::new(
                        IssueCode::AnchorUnresolved,
                        &page.rel,
                        line_no,
                        format!("no heading for anchor `#{anchor}` in `{path_part}`"),
                    ));
                }
            }
        }
    }
}
