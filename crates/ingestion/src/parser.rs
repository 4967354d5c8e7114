//! Reference parsing module
//!
//! Best-effort field extraction from one bibliography entry. Each field is
//! extracted independently; a field that cannot be found is reported as
//! `Absent` or `Unknown` and never stops the others.

use citemap_common::models::{Field, RawEntry, ReferenceRecord};
use chrono::Datelike;
use regex_lite::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Earliest publication year considered plausible
pub const MIN_YEAR: i32 = 1800;

/// Longest title fragment kept, in characters
const MAX_TITLE_CHARS: usize = 300;

fn doi_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(10\.\d{4,9}/[^\s,;]+)").expect("valid regex"))
}

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:https?://|www\.)\S+").expect("valid regex"))
}

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("valid regex"))
}

fn quoted_title() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new("\u{201c}([^\u{201d}]+)\u{201d}|\"([^\"]+)\"").expect("valid regex")
    })
}

/// A year-like token found in the entry
#[derive(Debug, Clone, Copy)]
struct YearToken {
    value: i32,
    start: usize,
    end: usize,
}

/// Parser for bibliography entries
#[derive(Debug, Clone)]
pub struct ReferenceParser {
    max_year: i32,
}

impl Default for ReferenceParser {
    fn default() -> Self {
        Self {
            max_year: chrono::Utc::now().year() + 1,
        }
    }
}

impl ReferenceParser {
    /// Parser that accepts years up to `max_year` inclusive
    pub fn with_max_year(max_year: i32) -> Self {
        Self { max_year }
    }

    /// Extract structured fields from one raw entry
    pub fn parse(&self, entry: &RawEntry) -> ReferenceRecord {
        let text = entry.text.trim();

        if text.is_empty() {
            return ReferenceRecord {
                rtf_order: entry.rtf_order,
                authors: Vec::new(),
                year: Field::Absent,
                title_fragment: Field::Absent,
                doi: Field::Absent,
                raw_text: entry.text.clone(),
            };
        }

        let doi = extract_doi(text);
        let searchable = mask_identifiers(text);
        let (year_tokens, saw_digits) = self.year_tokens(&searchable);
        let quote = find_quoted_title(text);
        let leading = leading_year(&year_tokens, quote.as_ref().map(|q| q.0), text);

        let (authors_segment, title, year) = match leading {
            Some(y) => {
                let title = match quote {
                    Some((_, _, t)) => Some(t),
                    None => title_after(&text[y.end..]),
                };
                (&text[..y.start], title, Some(y.value))
            }
            None => {
                let year = year_tokens.last().map(|y| y.value);
                match quote {
                    Some((start, _, t)) => (&text[..start], Some(t), year),
                    None => {
                        let sentences = split_sentences(text);
                        let authors = sentences
                            .first()
                            .copied()
                            .filter(|s| looks_like_author_list(s))
                            .unwrap_or("");
                        let title = sentences.get(1).and_then(|s| title_after(s));
                        (authors, title, year)
                    }
                }
            }
        };

        let year = match year {
            Some(y) => Field::Present(y),
            None if saw_digits => Field::Unknown,
            None => Field::Absent,
        };
        let title_fragment = title.map(Field::Present).unwrap_or(Field::Unknown);
        let authors = split_authors(authors_segment);

        debug!(
            rtf_order = entry.rtf_order,
            authors = authors.len(),
            year = ?year,
            has_title = title_fragment.is_present(),
            has_doi = doi.is_present(),
            "Reference parsed"
        );

        ReferenceRecord {
            rtf_order: entry.rtf_order,
            authors,
            year,
            title_fragment,
            doi,
            raw_text: entry.text.clone(),
        }
    }

    /// Plausible year tokens in order, and whether any 4-digit token was seen
    fn year_tokens(&self, text: &str) -> (Vec<YearToken>, bool) {
        let mut saw_four_digits = false;
        let mut years = Vec::new();

        for m in digit_run().find_iter(text) {
            if m.as_str().len() != 4 {
                continue;
            }
            saw_four_digits = true;

            let before = text[..m.start()].chars().next_back();
            let mut after_chars = text[m.end()..].chars();
            let after = after_chars.next();
            // page ranges and volume:page pairs
            let in_range = matches!(before, Some('-' | '\u{2013}' | '\u{2014}' | ':'))
                || matches!(after, Some('-' | '\u{2013}' | '\u{2014}' | ':'));
            // 2001a, but not 2001abc
            let glued = before.is_some_and(char::is_alphabetic)
                || (after.is_some_and(|c| c.is_ascii_lowercase())
                    && after_chars.next().is_some_and(char::is_alphanumeric));

            if in_range || glued {
                continue;
            }

            if let Ok(value) = m.as_str().parse::<i32>() {
                if (MIN_YEAR..=self.max_year).contains(&value) {
                    years.push(YearToken {
                        value,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        }

        (years, saw_four_digits)
    }
}

/// Parse one entry with a default parser
pub fn parse_entry(entry: &RawEntry) -> ReferenceRecord {
    ReferenceParser::default().parse(entry)
}

fn extract_doi(text: &str) -> Field<String> {
    match doi_pattern().captures(text) {
        Some(caps) => Field::Present(caps[1].trim_end_matches('.').to_lowercase()),
        None => Field::Absent,
    }
}

/// Blank out DOIs, URLs and "Accessed:" tails so their digits are not
/// read as years. Byte offsets are preserved.
fn mask_identifiers(text: &str) -> String {
    let mut masked = text.to_string();
    for re in [doi_pattern(), url_pattern()] {
        let spans: Vec<(usize, usize)> = re.find_iter(&masked).map(|m| (m.start(), m.end())).collect();
        for (start, end) in spans {
            masked.replace_range(start..end, &" ".repeat(end - start));
        }
    }
    for marker in ["Accessed:", "Retrieved"] {
        if let Some(pos) = masked.find(marker) {
            let len = masked.len() - pos;
            masked.replace_range(pos.., &" ".repeat(len));
        }
    }
    masked
}

/// `(start, end, title)` of the first usable quoted run
fn find_quoted_title(text: &str) -> Option<(usize, usize, String)> {
    quoted_title().captures_iter(text).find_map(|caps| {
        let whole = caps.get(0)?;
        let inner = caps.get(1).or_else(|| caps.get(2))?.as_str();
        let title = clean_title(inner)?;
        Some((whole.start(), whole.end(), title))
    })
}

/// A year right after the author list: `(2001)` or `2001.` in the first
/// half of the entry and before any quoted title
fn leading_year(years: &[YearToken], quote_start: Option<usize>, text: &str) -> Option<YearToken> {
    let first = *years.first()?;
    if first.start == 0 || first.start * 2 > text.len() {
        return None;
    }
    if quote_start.is_some_and(|q| first.start > q) {
        return None;
    }

    let parenthesized = text[..first.start].trim_end().ends_with('(');
    let mut rest = text[first.end..].chars();
    let closes_sentence = match rest.next() {
        Some('.') => true,
        Some(c) if c.is_ascii_lowercase() => rest.next() == Some('.'),
        _ => false,
    };

    (parenthesized || closes_sentence).then_some(first)
}

/// Title from the capitalized run at the start of `tail`
fn title_after(tail: &str) -> Option<String> {
    let trimmed = tail.trim_start_matches(|c: char| {
        c.is_whitespace() || matches!(c, ')' | '(' | '.' | ',' | ':' | ';')
    });
    // year suffix letter, as in 2001a
    let trimmed = match trimmed.char_indices().nth(1) {
        Some((idx, next)) if trimmed.starts_with(|c: char| c.is_ascii_lowercase())
            && !next.is_alphabetic() =>
        {
            trimmed[idx..].trim_start_matches(|c: char| {
                c.is_whitespace() || matches!(c, ')' | '.' | ',' | ':')
            })
        }
        _ => trimmed,
    };

    if !trimmed.starts_with(|c: char| c.is_uppercase() || c.is_ascii_digit()) {
        return None;
    }

    let sentence = split_sentences(trimmed).first().copied().unwrap_or(trimmed);
    clean_title(sentence)
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_end_matches(|c: char| matches!(c, ',' | '.' | ';' | ':') || c.is_whitespace())
        .trim();
    if title.chars().filter(|c| c.is_alphabetic()).count() < 2 {
        return None;
    }
    Some(title.chars().take(MAX_TITLE_CHARS).collect())
}

/// A token like `J.`, `K.-H.`, `JK`: initials rather than a surname
fn is_initials(token: &str) -> bool {
    let core = token.trim_matches(|c: char| matches!(c, ',' | ';' | ':' | '(' | ')'));
    if core.is_empty() {
        return false;
    }
    let letters: String = core.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.is_empty() {
        return false;
    }
    let all_upper = letters.chars().all(char::is_uppercase);
    let parts_short = core
        .split(['.', '-'])
        .filter(|p| !p.is_empty())
        .all(|p| p.chars().count() <= 2);
    (core.contains('.') && parts_short && letters.starts_with(char::is_uppercase))
        || (all_upper && letters.chars().count() <= 3)
}

/// Split at sentence ends, not at the periods of initials or "et al."
fn split_sentences(text: &str) -> Vec<&str> {
    let words: Vec<(usize, &str)> = text
        .split_whitespace()
        .map(|w| (w.as_ptr() as usize - text.as_ptr() as usize, w))
        .collect();

    let mut sentences = Vec::new();
    let mut start = 0;

    for (i, &(offset, word)) in words.iter().enumerate() {
        let ends_sentence = if word.ends_with(".:") {
            true
        } else if word.ends_with(['.', '?', '!']) {
            let bare = word.trim_end_matches(['.', '?', '!']);
            if bare.eq_ignore_ascii_case("al") || bare.is_empty() {
                false
            } else if is_initials(word) {
                initial_ends_author_list(&words, i)
            } else {
                true
            }
        } else {
            false
        };

        if ends_sentence {
            let end = offset + word.len();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// After an initial, the author list goes on when the next word is another
/// initial, a surname followed by punctuation, or a surname before "and".
fn initial_ends_author_list(words: &[(usize, &str)], i: usize) -> bool {
    let Some(&(_, next)) = words.get(i + 1) else {
        return true;
    };
    if is_initials(next) || next.ends_with([',', ';', '.']) {
        return false;
    }
    if let Some(&(_, after)) = words.get(i + 2) {
        if after.eq_ignore_ascii_case("and") || after == "&" {
            return false;
        }
    }
    true
}

/// Initials, a comma-separated list or "et al." mark a run of names
fn looks_like_author_list(segment: &str) -> bool {
    segment.contains(',')
        || segment.contains("et al")
        || segment.split_whitespace().any(is_initials)
}

/// Surnames from an author segment, in order
fn split_authors(segment: &str) -> Vec<String> {
    let normalized = segment
        .replace("et al.", ",")
        .replace("et al", ",")
        .replace(" and ", ",")
        .replace(" & ", ",")
        .replace('&', ",")
        .replace(';', ",");

    normalized
        .split(',')
        .filter_map(|piece| {
            piece
                .split_whitespace()
                .filter(|t| !is_initials(t))
                .map(|t| t.trim_matches(|c: char| !c.is_alphabetic()))
                .filter(|t| t.chars().count() > 1)
                .filter(|t| !matches!(t.to_lowercase().as_str(), "eds" | "ed" | "jr" | "sr" | "in"))
                .last()
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ReferenceRecord {
        ReferenceParser::with_max_year(2026).parse(&RawEntry {
            rtf_order: 1,
            text: text.to_string(),
        })
    }

    #[test]
    fn test_ieee_quoted_title() {
        let r = parse(
            "D. J. Watts and S. H. Strogatz, \u{201c}Collective dynamics of \u{2018}small-world\u{2019} networks,\u{201d} Nature, vol. 393, pp. 440\u{2013}442, 1998, doi: 10.1038/30918.",
        );
        assert_eq!(r.authors, vec!["Watts", "Strogatz"]);
        assert_eq!(r.year, Field::Present(1998));
        assert_eq!(
            r.title_fragment,
            Field::Present("Collective dynamics of \u{2018}small-world\u{2019} networks".to_string())
        );
        assert_eq!(r.doi, Field::Present("10.1038/30918".to_string()));
    }

    #[test]
    fn test_apa_leading_year() {
        let r = parse("Newman, M. E. J., & Girvan, M. (2004). Finding and evaluating community structure in networks. Physical Review E, 69, 026113.");
        assert_eq!(r.authors, vec!["Newman", "Girvan"]);
        assert_eq!(r.year, Field::Present(2004));
        assert_eq!(
            r.title_fragment,
            Field::Present("Finding and evaluating community structure in networks".to_string())
        );
        assert_eq!(r.doi, Field::Absent);
    }

    #[test]
    fn test_acm_year_with_suffix() {
        let r = parse("Smith, J. 2001a. Graph mining at scale. In Proc. KDD.");
        assert_eq!(r.year, Field::Present(2001));
        assert_eq!(r.title_fragment, Field::Present("Graph mining at scale".to_string()));
        assert_eq!(r.authors, vec!["Smith"]);
    }

    #[test]
    fn test_vancouver_style() {
        let r = parse("Smith J, Jones K. Title of the paper. J Netw Sci. 2001;12:101-110.");
        assert_eq!(r.authors, vec!["Smith", "Jones"]);
        assert_eq!(r.title_fragment, Field::Present("Title of the paper".to_string()));
        assert_eq!(r.year, Field::Present(2001));
    }

    #[test]
    fn test_page_ranges_are_not_years() {
        let r = parse("A. Author, \"Some title here,\" Journal, pp. 1890-1901.");
        assert_eq!(r.year, Field::Unknown);
        assert!(r.title_fragment.is_present());
    }

    #[test]
    fn test_accessed_tail_ignored() {
        let r = parse("World Health Organization, \"Global report,\" 2019. Accessed: Mar. 3, 2024. [Online]. Available: https://who.int/report2024");
        assert_eq!(r.year, Field::Present(2019));
    }

    #[test]
    fn test_implausible_year_is_unknown() {
        let r = parse("Scribe, \"Ancient scroll\", 1066.");
        assert_eq!(r.year, Field::Unknown);
    }

    #[test]
    fn test_no_fields_extracted() {
        let r = parse("see notes");
        assert_eq!(r.year, Field::Absent);
        assert_eq!(r.title_fragment, Field::Unknown);
        assert_eq!(r.doi, Field::Absent);
    }

    #[test]
    fn test_plain_sentence_yields_no_authors() {
        let r = parse("Personal communication.");
        assert!(r.authors.is_empty());
        assert_eq!(r.year, Field::Absent);
        assert_eq!(r.title_fragment, Field::Unknown);
        assert!(r.is_bare());

        let r = parse("Smith J. Unpublished notes on graphs.");
        assert_eq!(r.authors, vec!["Smith"]);
    }

    #[test]
    fn test_empty_entry() {
        let r = parse("   ");
        assert!(r.authors.is_empty());
        assert_eq!(r.year, Field::Absent);
        assert_eq!(r.title_fragment, Field::Absent);
        assert!(r.is_bare());
    }

    #[test]
    fn test_is_initials() {
        assert!(is_initials("J."));
        assert!(is_initials("K.-H."));
        assert!(is_initials("JK"));
        assert!(!is_initials("Smith,"));
        assert!(!is_initials("Nature."));
    }
}
