//! RTF text extraction module
//!
//! Minimal RTF-to-text conversion, good enough for numbered bibliographies
//! exported by reference managers, plus location of the bibliography
//! block inside a longer document.

use regex_lite::{Captures, Regex};
use std::sync::OnceLock;
use tracing::debug;

// Stand-ins for escaped braces and backslashes while groups are stripped
const OPEN_BRACE: char = '\u{E000}';
const CLOSE_BRACE: char = '\u{E001}';
const BACKSLASH: char = '\u{E002}';

fn unicode_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\u(-?\d+)\??").expect("valid regex"))
}

fn hex_escape() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\'[0-9a-fA-F]{2}").expect("valid regex"))
}

fn paragraph_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\(?:par|line)\b ?").expect("valid regex"))
}

fn control_word() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\\[a-zA-Z]+-?\d* ?").expect("valid regex"))
}

fn bibliography_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?im)^[ \t]*(?:references|bibliography|works cited|literature cited)[ \t]*:?[ \t]*$")
            .expect("valid regex")
    })
}

/// Whether the input is an RTF document rather than plain text
pub fn looks_like_rtf(input: &str) -> bool {
    input.trim_start().starts_with("{\\rtf")
}

/// Convert RTF markup to plain text
pub fn rtf_to_text(rtf: &str) -> String {
    let s = rtf
        .replace("\\\\", &BACKSLASH.to_string())
        .replace("\\{", &OPEN_BRACE.to_string())
        .replace("\\}", &CLOSE_BRACE.to_string());

    let s = unicode_escape().replace_all(&s, |caps: &Captures| {
        let code: i32 = caps[1].parse().unwrap_or(0xFFFD);
        // RTF writes code points above 32767 as negative 16-bit values
        let code = if code < 0 { code + 65536 } else { code };
        u32::try_from(code)
            .ok()
            .and_then(char::from_u32)
            .unwrap_or('\u{FFFD}')
            .to_string()
    });
    let s = hex_escape().replace_all(&s, "");
    let s = paragraph_break().replace_all(&s, "\n");
    let s = control_word().replace_all(&s, "");

    let stripped: String = s
        .chars()
        .filter(|c| *c != '{' && *c != '}')
        .map(|c| match c {
            OPEN_BRACE => '{',
            CLOSE_BRACE => '}',
            BACKSLASH => '\\',
            other => other,
        })
        .collect();

    let cleaned = clean_text(&stripped);
    debug!(
        original_len = rtf.len(),
        cleaned_len = cleaned.len(),
        "RTF converted to text"
    );
    cleaned
}

/// The bibliography block: text after the last reference-section heading,
/// or the whole text when no heading exists
pub fn locate_bibliography(text: &str) -> &str {
    match bibliography_heading().find_iter(text).last() {
        Some(m) => {
            debug!(offset = m.end(), "Bibliography heading found");
            &text[m.end()..]
        }
        None => text,
    }
}

/// Collapse runs of spaces and tabs and strip indentation, keeping lines
fn clean_text(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .replace('\u{FEFF}', "")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_rtf() {
        assert!(looks_like_rtf("  {\\rtf1\\ansi hello}"));
        assert!(!looks_like_rtf("[1] Smith, J."));
    }

    #[test]
    fn test_rtf_to_text_basic() {
        let rtf = r"{\rtf1\ansi{\fonttbl\f0 Times;}\f0\fs24 [1] A. Smith, \u8220?Graphs,\u8221? 2001.\par
[2] B. Jones, \'93Trees\'94, 1999.\par}";
        let text = rtf_to_text(rtf);
        assert!(text.contains("[1] A. Smith, \u{201c}Graphs,\u{201d} 2001."));
        assert!(text.contains("\n[2] B. Jones, Trees, 1999."));
        assert!(!text.contains('\\'));
        assert!(!text.contains('{'));
    }

    #[test]
    fn test_negative_unicode_escape() {
        // -3913 + 65536 = 61623 (U+F0B7)
        let text = rtf_to_text(r"{\rtf1 \u-3913?x}");
        assert_eq!(text, "\u{F0B7}x");
    }

    #[test]
    fn test_escaped_braces_survive() {
        let text = rtf_to_text(r"{\rtf1 set \{a\} in C:\\tmp}");
        assert_eq!(text, "set {a} in C:\\tmp");
    }

    #[test]
    fn test_locate_bibliography() {
        let text = "Intro mentions references.\nReferences\n[1] A.\n[2] B.";
        assert_eq!(locate_bibliography(text), "\n[1] A.\n[2] B.");
        assert_eq!(locate_bibliography("[1] A."), "[1] A.");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  a   b \n\n\t c "), "a b\nc");
    }
}
