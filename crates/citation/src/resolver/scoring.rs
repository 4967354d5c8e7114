//! Candidate scoring
//!
//! A candidate's score is the weighted mean of the signals both sides can
//! provide: title similarity, author-surname overlap and year closeness.
//! A year gap beyond one multiplies the result by the mismatch penalty, so
//! a same-titled work from another year cannot clear the threshold.
//!
//! Without a parsed title the candidate's title is looked up in the raw
//! entry instead. That match only counts for titles of a few words and
//! only with a matching year and no contradicting author list.

use citemap_common::config::ResolverConfig;
use citemap_common::models::{Candidate, ReferenceRecord};
use citemap_common::text::{normalize_text, tokens};
use std::collections::BTreeSet;

/// Fewest candidate title words that can be matched against raw entry text
pub const MIN_RAW_TITLE_TOKENS: usize = 3;

/// Per-signal similarities for one candidate, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signals {
    pub title: f64,
    pub authors: Option<f64>,
    pub year: Option<f64>,
    pub year_gap: Option<u32>,
    /// Title signal came from the raw entry text, not a parsed title
    pub title_from_raw: bool,
}

impl Signals {
    pub fn compute(record: &ReferenceRecord, candidate: &Candidate) -> Self {
        let (title, title_from_raw) = match record.title_fragment.present() {
            Some(fragment) => (title_similarity(fragment, &candidate.title), false),
            None => (containment(&candidate.title, &record.raw_text), true),
        };

        let authors = (!record.authors.is_empty() && !candidate.authors.is_empty())
            .then(|| author_overlap(&record.authors, &candidate.authors));

        let year_gap = match (record.year.copied(), candidate.year) {
            (Some(a), Some(b)) => Some(a.abs_diff(b)),
            _ => None,
        };
        let year = year_gap.map(|gap| match gap {
            0 => 1.0,
            1 => 0.6,
            _ => 0.0,
        });

        Self {
            title,
            authors,
            year,
            year_gap,
            title_from_raw,
        }
    }

    /// Combined score in [0, 1]
    pub fn score(&self, config: &ResolverConfig) -> f64 {
        if self.title_from_raw && !self.corroborated() {
            return 0.0;
        }

        let mut weighted = config.title_weight * self.title;
        let mut total = config.title_weight;

        if let Some(authors) = self.authors {
            weighted += config.author_weight * authors;
            total += config.author_weight;
        }
        if let Some(year) = self.year {
            weighted += config.year_weight * year;
            total += config.year_weight;
        }

        let mut score = if total > 0.0 { weighted / total } else { 0.0 };
        if self.year_gap.is_some_and(|gap| gap > 1) {
            score *= config.year_mismatch_penalty;
        }
        score.clamp(0.0, 1.0)
    }

    /// A raw-text title match needs a close year and no author mismatch
    fn corroborated(&self) -> bool {
        self.year.is_some_and(|year| year > 0.0) && self.authors.map_or(true, |a| a > 0.0)
    }
}

/// Score one candidate against a record
pub fn score_candidate(record: &ReferenceRecord, candidate: &Candidate, config: &ResolverConfig) -> f64 {
    Signals::compute(record, candidate).score(config)
}

/// Best of edit-distance and token-overlap similarity on normalized titles
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let (na, nb) = (normalize_text(a), normalize_text(b));
    if na.is_empty() || nb.is_empty() {
        return 0.0;
    }
    levenshtein_similarity(&na, &nb).max(dice(&tokens(&na), &tokens(&nb)))
}

/// `1 - distance / longer length`, over chars
pub fn levenshtein_similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 1.0;
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    1.0 - prev[b.len()] as f64 / longest as f64
}

/// Sørensen-Dice coefficient of two token sets
pub fn dice(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count();
    2.0 * shared as f64 / (a.len() + b.len()) as f64
}

/// Share of `needle`'s tokens present in `haystack`; zero for needles
/// shorter than `MIN_RAW_TITLE_TOKENS` words
fn containment(needle: &str, haystack: &str) -> f64 {
    let wanted = tokens(needle);
    if wanted.len() < MIN_RAW_TITLE_TOKENS {
        return 0.0;
    }
    let available = tokens(haystack);
    wanted.intersection(&available).count() as f64 / wanted.len() as f64
}

/// Share of parsed surnames matching the last name token of some
/// candidate author
pub fn author_overlap(surnames: &[String], candidate_authors: &[String]) -> f64 {
    let candidate_last: BTreeSet<String> = candidate_authors
        .iter()
        .filter_map(|name| normalize_text(name).rsplit(' ').next().map(str::to_string))
        .filter(|last| !last.is_empty())
        .collect();

    let wanted: Vec<String> = surnames
        .iter()
        .map(|s| normalize_text(s))
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return 0.0;
    }

    let matched = wanted
        .iter()
        .filter(|s| {
            // multi-word surnames ("van der berg") match on their last word
            let last = s.rsplit(' ').next().unwrap_or(s.as_str());
            candidate_last.contains(last)
        })
        .count();
    matched as f64 / wanted.len() as f64
}
