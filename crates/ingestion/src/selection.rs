//! Selection expressions
//!
//! `all`, `7`, `1-13`, `1,3,5-9,12`. Ranges may be written backwards.
//! Whether the indices exist is checked against the bibliography later.

use crate::errors::IngestionError;
use citemap_common::models::RtfOrder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

/// Upper bound on the indices one range may expand to
const MAX_RANGE_SPAN: u32 = 100_000;

/// Which bibliography entries become graph nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selection {
    All,
    Indices(BTreeSet<RtfOrder>),
}

impl Selection {
    pub fn parse(expression: &str) -> Result<Self, IngestionError> {
        let trimmed = expression.trim().to_lowercase();
        if trimmed == "all" {
            return Ok(Selection::All);
        }

        let invalid = |message: String| IngestionError::InvalidSelection {
            expression: expression.to_string(),
            message,
        };

        let mut chosen = BTreeSet::new();
        for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.split_once('-') {
                Some((a, b)) => {
                    let a = parse_index(a.trim()).map_err(invalid)?;
                    let b = parse_index(b.trim()).map_err(invalid)?;
                    let (lo, hi) = (a.min(b), a.max(b));
                    if hi - lo > MAX_RANGE_SPAN {
                        return Err(invalid(format!("range {}-{} is too large", lo, hi)));
                    }
                    chosen.extend(lo..=hi);
                }
                None => {
                    chosen.insert(parse_index(part).map_err(invalid)?);
                }
            }
        }

        if chosen.is_empty() {
            return Err(IngestionError::EmptySelection);
        }
        Ok(Selection::Indices(chosen))
    }
}

impl FromStr for Selection {
    type Err = IngestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selection::parse(s)
    }
}

fn parse_index(token: &str) -> Result<RtfOrder, String> {
    match token.parse::<RtfOrder>() {
        Ok(0) => Err("indices are 1-based".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{}' is not an index", token)),
    }
}
