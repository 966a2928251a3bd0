//! Titles and ordering derived from note file names.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

fn chapter_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^chapter-(\d+)[-_ ]?(.*)\.md$").expect("Invalid chapter regex pattern")
    })
}

/// Derive a page title from a note's file name.
///
/// `chapter-3-vpc-basics.md` becomes `(Some(3), "Chapter 3 – Vpc Basics")`;
/// anything else becomes its title-cased stem with no chapter number.
#[must_use]
pub fn parse_chapter_title(file_name: &str) -> (Option<u32>, String) {
    if let Some(caps) = chapter_regex().captures(file_name) {
        if let Ok(number) = caps[1].parse::<u32>() {
            let rest = title_case(&caps[2].replace(&['-', '_'][..], " "));
            let rest = rest.trim();
            let title = if rest.is_empty() {
                format!("Chapter {number}")
            } else {
                format!("Chapter {number} – {rest}")
            };
            return (Some(number), title);
        }
    }

    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    (None, title_case(&stem.replace(&['-', '_'][..], " ")))
}

/// Title-case `text` word by word.
///
/// A cased character is upper-cased when it follows an uncased one and
/// lower-cased otherwise, so digits start a new word: `s3bucket` → `S3Bucket`.
#[must_use]
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev_cased = false;
    for c in text.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if cased && !prev_cased {
            out.extend(c.to_uppercase());
        } else if cased {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

/// One run of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Chunk {
    Text(String),
    /// Digit run with leading zeros stripped.
    Number(String),
}

impl Ord for Chunk {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Chunk {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort key ordering embedded numbers numerically and text case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<Chunk>);

/// Build the natural sort key for `text`.
#[must_use]
pub fn natural_key(text: &str) -> NaturalKey {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut in_digits = false;

    for c in text.chars() {
        let digit = c.is_ascii_digit();
        if digit != in_digits && !current.is_empty() {
            chunks.push(make_chunk(&current, in_digits));
            current.clear();
        }
        in_digits = digit;
        current.push(c);
    }
    if !current.is_empty() {
        chunks.push(make_chunk(&current, in_digits));
    }
    NaturalKey(chunks)
}

fn make_chunk(run: &str, digits: bool) -> Chunk {
    if digits {
        let trimmed = run.trim_start_matches('0');
        Chunk::Number(if trimmed.is_empty() { "0" } else { trimmed }.to_string())
    } else {
        Chunk::Text(run.to_lowercase())
    }
}

/// Compare two strings in natural order.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}
