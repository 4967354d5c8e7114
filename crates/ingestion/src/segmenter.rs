//! Reference segmentation module
//!
//! Splits a bibliography block into numbered raw entries and keeps the
//! selected ones under their original numbering.

use crate::errors::IngestionError;
use crate::selection::Selection;
use citemap_common::models::{RawEntry, RtfOrder};
use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

fn bracket_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(\d{1,5})\]").expect("valid regex"))
}

fn dotted_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*(\d{1,5})[.)][ \t]+").expect("valid regex"))
}

/// Every entry of the bibliography, keyed by its own number
#[derive(Debug, Clone)]
pub struct Bibliography {
    entries: BTreeMap<RtfOrder, String>,
}

/// A marker opening one entry: its number and byte span
struct Marker {
    number: RtfOrder,
    start: usize,
    end: usize,
}

impl Bibliography {
    /// Segment a bibliography block.
    ///
    /// Entries open with `[n]`: the first such marker may sit anywhere,
    /// later ones must start a line. Blocks with no bracket markers fall
    /// back to `n.` / `n)` at line start.
    pub fn parse(block: &str) -> Result<Self, IngestionError> {
        let mut markers = bracket_markers(block);
        if markers.is_empty() {
            markers = dotted_markers(block);
        }
        if markers.is_empty() {
            return Err(IngestionError::NoBibliography);
        }

        let mut entries = BTreeMap::new();
        for (i, marker) in markers.iter().enumerate() {
            let stop = markers.get(i + 1).map(|next| next.start).unwrap_or(block.len());
            let text = block[marker.end..stop]
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");

            if entries.insert(marker.number, text).is_some() {
                return Err(IngestionError::Segmentation(format!(
                    "entry number {} appears more than once",
                    marker.number
                )));
            }
        }

        debug!(entry_count = entries.len(), "Bibliography segmented");
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry numbers present, ascending
    pub fn numbers(&self) -> impl Iterator<Item = RtfOrder> + '_ {
        self.entries.keys().copied()
    }

    /// Raw entries for the selected indices, ascending, never renumbered
    pub fn select(&self, selection: &Selection) -> Result<Vec<RawEntry>, IngestionError> {
        let indices: Vec<RtfOrder> = match selection {
            Selection::All => self.numbers().collect(),
            Selection::Indices(set) => set.iter().copied().collect(),
        };

        if indices.is_empty() {
            return Err(IngestionError::EmptySelection);
        }

        indices
            .into_iter()
            .map(|index| {
                self.entries
                    .get(&index)
                    .map(|text| RawEntry {
                        rtf_order: index,
                        text: text.clone(),
                    })
                    .ok_or(IngestionError::SelectionOutOfRange {
                        index,
                        available: self.entries.len(),
                    })
            })
            .collect()
    }
}

fn bracket_markers(block: &str) -> Vec<Marker> {
    let mut markers = Vec::new();
    for caps in bracket_marker().captures_iter(block) {
        let Some(whole) = caps.get(0) else { continue };
        let line_start = block[..whole.start()]
            .rfind('\n')
            .map(|p| p + 1)
            .unwrap_or(0);
        let at_line_start = block[line_start..whole.start()].trim().is_empty();

        if !markers.is_empty() && !at_line_start {
            // an in-text citation inside an entry
            continue;
        }
        if let Ok(number) = caps[1].parse() {
            markers.push(Marker {
                number,
                start: whole.start(),
                end: whole.end(),
            });
        }
    }
    markers
}

/// `n.` markers must count up from 1 without running ahead of the entries
/// seen so far; anything else is a wrapped line starting with a number.
fn dotted_markers(block: &str) -> Vec<Marker> {
    let mut markers: Vec<Marker> = Vec::new();
    for caps in dotted_marker().captures_iter(block) {
        let Some(whole) = caps.get(0) else { continue };
        let Ok(number) = caps[1].parse::<RtfOrder>() else { continue };

        let after_last = markers.last().map_or(true, |last| number > last.number);
        if !after_last || number as usize > markers.len() + 1 {
            continue;
        }
        markers.push(Marker {
            number,
            start: whole.start(),
            end: whole.end(),
        });
    }
    markers
}

/// Segment a block and keep the selected entries
pub fn segment(block: &str, selection: &Selection) -> Result<Vec<RawEntry>, IngestionError> {
    Bibliography::parse(block)?.select(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    const BLOCK: &str = "[1] A. Smith, \"First paper,\" 2001.\n\
        [2] B. Jones, \"Second paper,\" 2003.\n   continued on next line.\n\
        [3] C. Brown, \"Third paper,\" 2005, see also [1].\n\
        [4] D. White, \"Fourth paper,\" 2007.\n\
        [5] E. Black, \"Fifth paper,\" 2009.";

    fn indices(values: &[u32]) -> Selection {
        Selection::Indices(values.iter().copied().collect::<BTreeSet<_>>())
    }

    #[test]
    fn test_segments_all_entries() {
        let bib = Bibliography::parse(BLOCK).unwrap();
        assert_eq!(bib.len(), 5);

        let all = bib.select(&Selection::All).unwrap();
        assert_eq!(all[1].text, "B. Jones, \"Second paper,\" 2003. continued on next line.");
        assert_eq!(all[2].text, "C. Brown, \"Third paper,\" 2005, see also [1].");
    }

    #[test]
    fn test_subset_keeps_original_numbering() {
        let entries = segment(BLOCK, &indices(&[2, 3, 4])).unwrap();
        let orders: Vec<u32> = entries.iter().map(|e| e.rtf_order).collect();
        assert_eq!(orders, vec![2, 3, 4]);
        assert!(entries[0].text.starts_with("B. Jones"));
    }

    #[test]
    fn test_out_of_range_selection_is_fatal() {
        let err = segment(BLOCK, &indices(&[4, 9])).unwrap_err();
        assert!(matches!(
            err,
            IngestionError::SelectionOutOfRange { index: 9, available: 5 }
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            Bibliography::parse("no numbered entries here"),
            Err(IngestionError::NoBibliography)
        ));

        let duplicated = "[1] One.\n[1] Again.";
        assert!(matches!(
            Bibliography::parse(duplicated),
            Err(IngestionError::Segmentation(_))
        ));
    }

    #[test]
    fn test_first_marker_after_preamble() {
        let bib = Bibliography::parse("Times;[1] A.\n[2] B.").unwrap();
        assert_eq!(bib.numbers().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_dotted_fallback() {
        let bib = Bibliography::parse("1. Smith J. Alpha. 2001.\n2. Jones K. Beta. 2002.").unwrap();
        let entries = bib.select(&indices(&[2])).unwrap();
        assert_eq!(entries[0].text, "Jones K. Beta. 2002.");
    }

    #[test]
    fn test_dotted_fallback_ignores_wrapped_numbers() {
        let block = "1. Smith J. Alpha. Proc. Conf.\n\
            2001. Extra notes.\n\
            2. Jones K. Beta.\n\
            7) Not an entry.\n\
            3. Brown C. Gamma. 2003.";
        let bib = Bibliography::parse(block).unwrap();
        assert_eq!(bib.numbers().collect::<Vec<_>>(), vec![1, 2, 3]);

        let entries = bib.select(&Selection::All).unwrap();
        assert_eq!(entries[0].text, "Smith J. Alpha. Proc. Conf. 2001. Extra notes.");
        assert_eq!(entries[1].text, "Jones K. Beta. 7) Not an entry.");
    }

    #[test]
    fn test_empty_selection() {
        assert!(matches!(
            segment(BLOCK, &indices(&[])),
            Err(IngestionError::EmptySelection)
        ));
    }
}
