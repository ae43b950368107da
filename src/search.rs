use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};

/// One listed company from the backend directory. The set is loaded once and
/// treated as read-only for the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Security", alias = "displayName")]
    pub name: String,
}

impl Company {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.symbol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Terms shorter than this never match anything.
    pub min_term_len: usize,
    /// Hard cap on the match list.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_term_len: 1,
            max_results: 8,
        }
    }
}

/// Recomputes the match list from scratch for the given term.
///
/// Matching is fuzzy (typo tolerant), scored against both the display name
/// and the symbol; a candidate's score is the better of the two. Results are
/// ordered by descending score, ties broken by directory order, and capped
/// at `config.max_results`.
pub fn compute_matches(term: &str, directory: &[Company], config: &SearchConfig) -> Vec<Company> {
    let term = term.trim();
    if term.chars().count() < config.min_term_len {
        return Vec::new();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored: Vec<(i64, usize)> = directory
        .iter()
        .enumerate()
        .filter_map(|(idx, company)| {
            let by_name = matcher.fuzzy_match(&company.name, term);
            let by_symbol = matcher.fuzzy_match(&company.symbol, term);
            by_name.max(by_symbol).map(|score| (score, idx))
        })
        .collect();

    // sort_by is stable, so equal scores keep directory order.
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.truncate(config.max_results);

    scored
        .into_iter()
        .map(|(_, idx)| directory[idx].clone())
        .collect()
}
