//! Subject-title extraction from model replies.
//!
//! Models are asked to end each reply with `{{{Subject Title}}}`. In practice
//! they also emit `**{{{Title}}}**`, stray extra braces, `{{Title}}`, and
//! HTML-wrapped variants. A small state machine scans the reply once and
//! collects every marker in order; the last one wins.

use serde::{Deserialize, Serialize};

/// Title used when neither a marker nor any usable text is present.
pub const DEFAULT_TITLE: &str = "New Chat";

/// Fallback titles longer than this are shortened.
const MAX_FALLBACK_CHARS: usize = 50;

/// More braces than this on either side are not part of the marker.
const MAX_BRACES: usize = 4;

const SENTENCE_ENDS: &[&str] = &[". ", "!", "?", ";", "\n"];

/// Characters besides whitespace that may trail a closing marker.
const TRAILING_NOISE: &[char] = &['}', '.', '!', '?'];

const CLAUSE_BOUNDARIES: &[&str] = &[
    ": ", " - ", ", ", " which ", " who ", " that ", " if ", " when ", " where ", " because ",
    " while ", " but ",
];

/// (opening, closing, style) pairs that may surround a brace marker.
const WRAPPERS: &[(&str, &str, MarkerStyle)] = &[
    ("<p>", "</p>", MarkerStyle::HtmlParagraph),
    ("<strong>", "</strong>", MarkerStyle::HtmlStrong),
    ("**", "**", MarkerStyle::Emphasized),
    ("*", "*", MarkerStyle::Emphasized),
];

/// A reply split into display content and title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub content: String,
    pub title: String,
}

/// The syntactic variant a marker was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// `{{{T}}}`
    TripleBrace,
    /// `**{{{T}}}**` or `*{{{T}}}*`
    Emphasized,
    /// `{{{{T}}}`, `{{{T}}}}`, `{{{{T}}}}`, ...
    StrayBraces,
    /// `{{T}}`
    DoubleBrace,
    /// `<p>{{{T}}}</p>`
    HtmlParagraph,
    /// `<strong>{{{T}}}</strong>`
    HtmlStrong,
}

/// One marker occurrence; `start..end` covers braces and any wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    pub start: usize,
    pub end: usize,
    pub inner: &'a str,
    pub style: MarkerStyle,
}

#[derive(Debug, Clone, Copy)]
enum State {
    Scan,
    Open {
        start: usize,
        braces: usize,
    },
    Inner {
        start: usize,
        braces: usize,
        inner_start: usize,
    },
    Close {
        start: usize,
        braces: usize,
        inner_start: usize,
        inner_end: usize,
        closing: usize,
    },
}

/// Every marker in `text`, in order of appearance.
pub fn find_markers(text: &str) -> Vec<Marker<'_>> {
    let mut markers = Vec::new();
    let mut state = State::Scan;
    for (i, c) in text.char_indices() {
        state = step(text, state, i, c, &mut markers);
    }
    if let State::Close { .. } = state {
        emit(text, state, text.len(), &mut markers);
    }
    markers
}

fn step<'a>(text: &'a str, state: State, i: usize, c: char, markers: &mut Vec<Marker<'a>>) -> State {
    match state {
        State::Scan => match c {
            '{' => State::Open { start: i, braces: 1 },
            _ => State::Scan,
        },
        State::Open { start, braces } => match c {
            '{' if braces == MAX_BRACES => State::Open {
                start: start + 1,
                braces,
            },
            '{' => State::Open {
                start,
                braces: braces + 1,
            },
            '}' if braces >= 2 => State::Close {
                start,
                braces,
                inner_start: i,
                inner_end: i,
                closing: 1,
            },
            '\n' | '}' => State::Scan,
            _ if braces >= 2 => State::Inner {
                start,
                braces,
                inner_start: i,
            },
            _ => State::Scan,
        },
        State::Inner {
            start,
            braces,
            inner_start,
        } => match c {
            '}' => State::Close {
                start,
                braces,
                inner_start,
                inner_end: i,
                closing: 1,
            },
            '{' => State::Open { start: i, braces: 1 },
            '\n' => State::Scan,
            _ => state,
        },
        State::Close {
            start,
            braces,
            inner_start,
            inner_end,
            closing,
        } => match c {
            '}' if closing + 1 == MAX_BRACES => {
                let full = State::Close {
                    start,
                    braces,
                    inner_start,
                    inner_end,
                    closing: closing + 1,
                };
                emit(text, full, i + 1, markers);
                State::Scan
            }
            '}' => State::Close {
                start,
                braces,
                inner_start,
                inner_end,
                closing: closing + 1,
            },
            _ => {
                emit(text, state, i, markers);
                step(text, State::Scan, i, c, markers)
            }
        },
    }
}

/// Record a marker if the braces on both sides qualify.
fn emit<'a>(text: &'a str, state: State, end: usize, markers: &mut Vec<Marker<'a>>) {
    let State::Close {
        start,
        braces,
        inner_start,
        inner_end,
        closing,
    } = state
    else {
        return;
    };
    if braces < 2 || closing < 2 {
        return;
    }

    let mut style = match (braces, closing) {
        (3, 3) => MarkerStyle::TripleBrace,
        (2, 2) => MarkerStyle::DoubleBrace,
        _ => MarkerStyle::StrayBraces,
    };
    let (mut start, mut end) = (start, end);

    // Peel wrappers outward; `<p>**{{{T}}}**</p>` takes two passes.
    'wrap: loop {
        for (open, close, wrapped) in WRAPPERS {
            if text[..start].ends_with(open) && text[end..].starts_with(close) {
                start -= open.len();
                end += close.len();
                style = *wrapped;
                continue 'wrap;
            }
        }
        break;
    }

    markers.push(Marker {
        start,
        end,
        inner: &text[inner_start..inner_end],
        style,
    });
}

/// The last marker, if only whitespace and `TRAILING_NOISE` follow it.
fn trailing_marker(text: &str) -> Option<Marker<'_>> {
    find_markers(text).pop().filter(|m| {
        text[m.end..]
            .chars()
            .all(|c| c.is_whitespace() || TRAILING_NOISE.contains(&c))
    })
}

/// Reply text with the trailing title marker removed, trimmed.
pub fn extract_message_content(text: &str) -> String {
    match trailing_marker(text) {
        // braces beyond MAX_BRACES sit outside the marker span
        Some(marker) => text[..marker.start].trim_end_matches('{').trim().to_string(),
        None => text.trim().to_string(),
    }
}

/// The title carried by the last marker, or a heuristic title from the text.
pub fn extract_subject_title(text: &str) -> String {
    let markers = find_markers(text);
    if let Some(marker) = markers.last() {
        let inner = marker.inner.trim();
        if !inner.is_empty() {
            return inner.to_string();
        }
    }
    fallback_title(&strip_markers(text, &markers))
}

/// Split a reply into content and title in one go.
pub fn extract(text: &str) -> ExtractionResult {
    ExtractionResult {
        content: extract_message_content(text),
        title: extract_subject_title(text),
    }
}

fn strip_markers(text: &str, markers: &[Marker<'_>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for marker in markers {
        if marker.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..marker.start]);
        cursor = marker.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Derive a title from the first sentence of `text`.
pub fn fallback_title(text: &str) -> String {
    let text = text.trim();
    let sentence_end = SENTENCE_ENDS
        .iter()
        .filter_map(|d| text.find(d))
        .min()
        .unwrap_or(text.len());
    let sentence = strip_parentheticals(&text[..sentence_end]);
    let sentence = sentence.trim().trim_end_matches('.').trim_end();

    if sentence.is_empty() {
        return DEFAULT_TITLE.to_string();
    }
    if sentence.chars().count() <= MAX_FALLBACK_CHARS {
        return sentence.to_string();
    }

    let limit = sentence
        .char_indices()
        .nth(MAX_FALLBACK_CHARS)
        .map(|(i, _)| i)
        .unwrap_or(sentence.len());

    let cut = CLAUSE_BOUNDARIES
        .iter()
        .flat_map(|b| sentence.match_indices(b).map(|(i, _)| i))
        .filter(|&i| i > 0 && i <= limit)
        .max()
        .unwrap_or(limit);

    sentence[..cut].trim_end().to_string()
}

/// Remove `( ... )` asides, collapsing the whitespace they leave behind.
fn strip_parentheticals(text: &str) -> String {
    if !text.contains('(') {
        return text.to_string();
    }
    let mut depth = 0usize;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
