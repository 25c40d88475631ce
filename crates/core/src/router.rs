use serde::{Deserialize, Serialize};
use std::fmt;

const REASONING_KEYWORDS: [&str; 6] = ["compare", "analyze", "explain", "why", "how", "difference"];
const RESEARCH_KEYWORDS: [&str; 5] = ["comprehensive", "detailed", "report", "research", "summary"];

/// How much work a query asks for; picks the remote generation tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Reasoning,
    Research,
    #[default]
    Search,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Research => "research",
            Self::Search => "search",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive substring match; reasoning keywords win over research ones.
pub fn classify_query(query: &str) -> QueryKind {
    let lowered = query.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|word| lowered.contains(word));

    if mentions(&REASONING_KEYWORDS[..]) {
        QueryKind::Reasoning
    } else if mentions(&RESEARCH_KEYWORDS[..]) {
        QueryKind::Research
    } else {
        QueryKind::Search
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_keywords_take_priority() {
        assert_eq!(
            classify_query("Give a detailed explanation of why quicksort is fast"),
            QueryKind::Reasoning
        );
        assert_eq!(classify_query("COMPARE tcp and udp"), QueryKind::Reasoning);
    }

    #[test]
    fn research_keywords_without_reasoning() {
        assert_eq!(
            classify_query("Write a report on operating systems"),
            QueryKind::Research
        );
        assert_eq!(classify_query("chapter Summary please"), QueryKind::Research);
    }

    #[test]
    fn plain_lookups_default_to_search() {
        assert_eq!(classify_query("define a mutex"), QueryKind::Search);
        assert_eq!(classify_query(""), QueryKind::Search);
    }

    #[test]
    fn matching_is_by_substring() {
        // "show" contains "how".
        assert_eq!(classify_query("show the syllabus"), QueryKind::Reasoning);
    }
}
