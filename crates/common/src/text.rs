//! Text normalization shared by parsing, querying and scoring

use std::collections::BTreeSet;

/// Lower-case, fold common Latin diacritics, turn punctuation into spaces
/// and collapse whitespace.
///
/// Line-break hyphenation left behind by OCR ("net- work") is rejoined.
pub fn normalize_text(input: &str) -> String {
    let dehyphenated = input.replace("- ", "");
    let mut out = String::with_capacity(dehyphenated.len());
    let mut pending_space = false;

    for ch in dehyphenated.chars().flat_map(char::to_lowercase) {
        let ch = fold_diacritic(ch);
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(ch);
        } else if ch == '\'' || ch == '\u{2019}' {
            // apostrophes join ("o'brien" -> "obrien")
        } else {
            pending_space = true;
        }
    }

    out
}

/// Distinct normalized word tokens
pub fn tokens(input: &str) -> BTreeSet<String> {
    normalize_text(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => 'a',
        'ç' | 'č' | 'ć' => 'c',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'š' | 'ś' | 'ş' => 's',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ž' | 'ź' | 'ż' => 'z',
        'ł' => 'l',
        _ => ch,
    }
}
