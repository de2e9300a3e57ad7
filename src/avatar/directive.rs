//! Expression Directive Extractor.
//!
//! Finalized assistant text may carry inline markers of the form
//! `[expression:<name>]`. [`extract`] removes every marker together with the
//! whitespace around it and reports the names it found, in order. Which of
//! several names is acted upon is a [`DirectivePolicy`] decision made by the
//! caller, not by the scanner.
//!
//! Where a marker sat between two pieces of text, a single separator is put
//! back so the words do not run together: a newline if the removed whitespace
//! held one, a space if it held any other whitespace, nothing otherwise.
//!
//! ```
//! use eleonor::avatar::directive::{extract, DirectivePolicy};
//!
//! let found = extract("Great! [expression:Feliz] Keep practicing.");
//! assert_eq!(found.cleaned, "Great! Keep practicing.");
//! assert_eq!(found.select(DirectivePolicy::FirstWins).map(|d| d.name.as_str()), Some("Feliz"));
//! ```

use std::ops::Range;

use serde::{Deserialize, Serialize};

const OPEN: &str = "[expression:";

/// Which directive to act upon when a reply carries more than one.
///
/// Every marker is stripped from the visible text regardless of the policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectivePolicy {
    /// The first marker in the text wins.
    #[default]
    FirstWins,
    /// The last marker in the text wins.
    LastWins,
}

/// One marker found in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionDirective {
    /// Trimmed expression name.
    pub name: String,
    /// Byte range removed from the source text, surrounding whitespace included.
    pub span: Range<usize>,
}

/// Result of scanning a text for markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// The text with every marker removed, trimmed at both ends.
    pub cleaned: String,
    /// Directives in order of appearance.
    pub directives: Vec<ExpressionDirective>,
}

impl Extraction {
    /// The directive chosen by `policy`, if any marker named one.
    pub fn select(&self, policy: DirectivePolicy) -> Option<&ExpressionDirective> {
        match policy {
            DirectivePolicy::FirstWins => self.directives.first(),
            DirectivePolicy::LastWins => self.directives.last(),
        }
    }

    /// Names of all directives, in order of appearance.
    pub fn names(&self) -> Vec<&str> {
        self.directives.iter().map(|d| d.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Gap {
    None,
    Space,
    Newline,
}

impl Gap {
    fn of(ws: &str) -> Self {
        if ws.contains('\n') {
            Self::Newline
        } else if ws.is_empty() {
            Self::None
        } else {
            Self::Space
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Space => " ",
            Self::Newline => "\n",
        }
    }
}

/// Strip every `[expression:<name>]` marker from `text`.
///
/// A marker ends at the first `]`; an opening with no `]` on the same line is
/// left untouched. Markers with an empty name are stripped but yield no
/// directive.
pub fn extract(text: &str) -> Extraction {
    let mut cleaned = String::with_capacity(text.len());
    let mut directives = Vec::new();
    let mut gap = Gap::None;
    let mut cursor = 0;
    let mut search = 0;

    while let Some(rel) = text[search..].find(OPEN) {
        let start = search + rel;
        let name_start = start + OPEN.len();
        let Some(close_rel) = text[name_start..].find([']', '\n']) else {
            break;
        };
        let close = name_start + close_rel;
        if text[close..].starts_with('\n') {
            search = close;
            continue;
        }

        let before = &text[cursor..start];
        let kept = before.trim_end();
        let ws_before = &before[kept.len()..];

        let after = &text[close + 1..];
        let ws_after = &after[..after.len() - after.trim_start().len()];

        push_segment(&mut cleaned, kept, &mut gap);
        gap = gap.max(Gap::of(ws_before)).max(Gap::of(ws_after));

        let span = start - ws_before.len()..close + 1 + ws_after.len();
        let name = text[name_start..close].trim();
        if !name.is_empty() {
            directives.push(ExpressionDirective {
                name: name.to_owned(),
                span: span.clone(),
            });
        }

        cursor = span.end;
        search = span.end;
    }

    push_segment(&mut cleaned, &text[cursor..], &mut gap);

    Extraction {
        cleaned: cleaned.trim().to_owned(),
        directives,
    }
}

/// Apply `policy` to `text`, returning the cleaned text and the chosen name.
pub fn extract_directive(text: &str, policy: DirectivePolicy) -> (String, Option<String>) {
    let found = extract(text);
    let name = found.select(policy).map(|d| d.name.clone());
    (found.cleaned, name)
}

fn push_segment(out: &mut String, segment: &str, gap: &mut Gap) {
    if segment.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.push_str(gap.as_str());
    }
    out.push_str(segment);
    *gap = Gap::None;
}
