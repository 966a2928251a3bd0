//! Pages and their front matter.
//!
//! A page is a Markdown file whose optional leading `---` block carries the
//! navigation metadata consumed by the site generator:
//!
//! | key            | meaning                                           |
//! |----------------|---------------------------------------------------|
//! | `title`        | display name                                      |
//! | `nav_order`    | position among siblings                           |
//! | `parent`       | `title` of the enclosing section page             |
//! | `grand_parent` | `title` of the section above `parent`             |
//! | `has_children` | marks a section index page                        |
//! | `nav_exclude`  | hide from navigation, keep addressable            |
//! | `toc`          | `false` suppresses the generator's child listing |

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const FENCE: &str = "---";
const BOM: char = '\u{feff}';

/// Navigation metadata at the top of a page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Sibling ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_order: Option<i64>,
    /// Title of the parent page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Title of the parent's parent page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grand_parent: Option<String>,
    /// Marks a section index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_children: Option<bool>,
    /// Hides the page from navigation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_exclude: Option<bool>,
    /// Generator-side table of contents for section pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toc: Option<bool>,
    /// Keys this crate does not manage, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Whether the page declares itself a section index.
    #[must_use]
    pub fn is_section(&self) -> bool {
        self.has_children == Some(true)
    }

    /// Whether the page is hidden from navigation.
    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.nav_exclude == Some(true)
    }

    /// Render as a `---` delimited block ending in a newline.
    ///
    /// Key order is fixed so output is stable across runs. `title` is always
    /// double-quoted; other strings are quoted only when YAML requires it.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from(FENCE);
        out.push('\n');
        if let Some(title) = &self.title {
            out.push_str(&format!("title: {}\n", quote(title)));
        }
        if let Some(parent) = &self.parent {
            out.push_str(&format!("parent: {}\n", scalar(parent)));
        }
        if let Some(grand_parent) = &self.grand_parent {
            out.push_str(&format!("grand_parent: {}\n", scalar(grand_parent)));
        }
        if let Some(nav_order) = self.nav_order {
            out.push_str(&format!("nav_order: {nav_order}\n"));
        }
        if let Some(has_children) = self.has_children {
            out.push_str(&format!("has_children: {has_children}\n"));
        }
        if let Some(nav_exclude) = self.nav_exclude {
            out.push_str(&format!("nav_exclude: {nav_exclude}\n"));
        }
        if let Some(toc) = self.toc {
            out.push_str(&format!("toc: {toc}\n"));
        }
        for (key, value) in &self.extra {
            let single: BTreeMap<&str, &serde_yaml::Value> = [(key.as_str(), value)].into();
            if let Ok(text) = serde_yaml::to_string(&single) {
                out.push_str(text.trim_end());
                out.push('\n');
            }
        }
        out.push_str(FENCE);
        out.push('\n');
        out
    }
}

/// A parsed page: optional front matter plus body text.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    /// Front matter, if the page has a block.
    pub front_matter: Option<FrontMatter>,
    /// Everything after the front-matter block.
    pub body: String,
}

impl Page {
    /// Parse page text read from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrontMatter`] when the block is not valid YAML.
    pub fn parse(path: &Path, text: &str) -> Result<Self> {
        let (block, body) = split_front_matter(text);
        let front_matter = block
            .map(|yaml| {
                if yaml.trim().is_empty() {
                    Ok(FrontMatter::default())
                } else {
                    serde_yaml::from_str::<FrontMatter>(yaml)
                }
            })
            .transpose()
            .map_err(|source| Error::FrontMatter {
                path: path.to_path_buf(),
                source,
            })?;

        Ok(Self {
            front_matter,
            body: body.to_string(),
        })
    }

    /// Read and parse the page at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not UTF-8, or has
    /// malformed front matter.
    pub fn read(path: &Path) -> Result<Self> {
        let text = read_text(path)?;
        Self::parse(path, &text)
    }

    /// The page title, if set and non-blank.
    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.front_matter
            .as_ref()
            .and_then(|fm| fm.title.as_deref())
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Read a text file, dropping a leading byte-order mark.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not valid UTF-8.
pub fn read_text(path: &Path) -> Result<String> {
    let raw = std::fs::read(path).map_err(|e| Error::read(path, e))?;
    let text = String::from_utf8(raw).map_err(|_| Error::Encoding {
        path: path.to_path_buf(),
    })?;
    Ok(match text.strip_prefix(BOM) {
        Some(rest) => rest.to_string(),
        None => text,
    })
}

/// Split page text into the raw YAML of its front-matter block and the body.
///
/// The block must open on the first line and close with a `---` (or `...`)
/// line; otherwise the whole text is body.
#[must_use]
pub fn split_front_matter(text: &str) -> (Option<&str>, &str) {
    let text = text.strip_prefix(BOM).unwrap_or(text);

    let Some(first_end) = text.find('\n') else {
        return (None, text);
    };
    if text[..first_end].trim_end() != FENCE {
        return (None, text);
    }

    let yaml_start = first_end + 1;
    let mut offset = yaml_start;
    for line in text[yaml_start..].split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed == FENCE || trimmed == "..." {
            let body = &text[offset + line.len()..];
            return (Some(&text[yaml_start..offset]), body);
        }
        offset += line.len();
    }
    (None, text)
}

/// An ATX heading in a page body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Number of leading `#` characters (1-6).
    pub level: u8,
    /// Heading text without markers.
    pub text: String,
    /// 1-based line number within the scanned text.
    pub line: usize,
}

/// Line-by-line state of fenced code blocks.
///
/// A block opened by a run of backticks only closes on a run of at least as
/// many backticks, and likewise for tildes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fences {
    open: Option<(char, usize)>,
}

impl Fences {
    /// Feed the next line. Returns `true` if the line is a fence or code.
    pub fn is_code(&mut self, line: &str) -> bool {
        let marker = fence_marker(line);
        match (self.open, marker) {
            (None, Some(opening)) => {
                self.open = Some(opening);
                true
            }
            (None, None) => false,
            (Some((ch, len)), Some((found, count)))
                if found == ch && count >= len && line.trim().trim_start_matches(ch).is_empty() =>
            {
                self.open = None;
                true
            }
            (Some(_), _) => true,
        }
    }
}

/// Fence character and run length if `line` starts a code fence.
fn fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    let ch = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let count = trimmed.chars().take_while(|c| *c == ch).count();
    (count >= 3).then_some((ch, count))
}

/// Collect ATX headings outside fenced code blocks.
#[must_use]
pub fn headings(body: &str) -> Vec<Heading> {
    let mut out = Vec::new();
    let mut fences = Fences::default();

    for (idx, line) in body.lines().enumerate() {
        if fences.is_code(line) {
            continue;
        }
        let trimmed = line.trim_start();
        if line.len() - trimmed.len() > 3 {
            continue;
        }

        let hashes = trimmed.chars().take_while(|c| *c == '#').count();
        if hashes == 0 || hashes > 6 {
            continue;
        }
        let rest = &trimmed[hashes..];
        if !rest.is_empty() && !rest.starts_with(&[' ', '\t'][..]) {
            continue;
        }
        let text = rest.trim().trim_end_matches('#').trim_end();
        if text.is_empty() {
            continue;
        }
        out.push(Heading {
            level: u8::try_from(hashes).unwrap_or(6),
            text: text.to_string(),
            line: idx + 1,
        });
    }
    out
}

/// Anchor slug for a heading: lowercase, spaces to `-`, punctuation dropped.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut out = String::new();
    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else if c == ' ' {
            out.push('-');
        }
    }
    out
}

/// All link anchors a page body exposes. Repeated headings get `-1`, `-2`
/// suffixes in document order.
#[must_use]
pub fn anchors(body: &str) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    headings(body)
        .into_iter()
        .map(|h| {
            let slug = slugify(&h.text);
            let count = seen.entry(slug.clone()).or_insert(0);
            let anchor = if *count == 0 {
                slug
            } else {
                format!("{slug}-{count}")
            };
            *count += 1;
            anchor
        })
        .collect()
}

/// Double-quote a YAML string.
fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{escaped}\"")
}

/// Render a YAML string plain when that round-trips, quoted otherwise.
fn scalar(value: &str) -> String {
    const INDICATORS: &[char] = &[
        '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
        '@', '`',
    ];
    const KEYWORDS: &[&str] = &["true", "false", "yes", "no", "on", "off", "null", "~"];

    let needs_quotes = value.is_empty()
        || value.trim() != value
        || value.starts_with(INDICATORS)
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.contains(&['\n', '\t'][..])
        || KEYWORDS.contains(&value.to_lowercase().as_str())
        || value.parse::<f64>().is_ok();

    if needs_quotes {
        quote(value)
    } else {
        value.to_string()
    }
}
