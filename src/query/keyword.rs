use std::fmt;

use serde::Serialize;

const VEGETARIAN_KEYWORD: &str = "vegetarian";

/// Recognized styles in match order. The first keyword found anywhere in the
/// query wins, regardless of where it appears in the text.
const STYLES: [(&str, Style); 4] = [
    ("italian", Style::Italian),
    ("asian", Style::Asian),
    ("steakhouse", Style::Steakhouse),
    ("mediterranean", Style::Mediterranean),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Vegetarian {
    Yes,
    No,
}

impl Vegetarian {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Vegetarian::Yes => "yes",
            Vegetarian::No => "no",
        }
    }
}

impl fmt::Display for Vegetarian {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum Style {
    Italian,
    Asian,
    Steakhouse,
    Mediterranean,
}

impl Style {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Style::Italian => "Italian",
            Style::Asian => "Asian",
            Style::Steakhouse => "Steakhouse",
            Style::Mediterranean => "Mediterranean",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query mentioning "vegetarian" asks for vegetarian places only; any other
/// query asks for non-vegetarian places only.
pub(crate) fn parse_vegetarian(query: &str) -> Vegetarian {
    if query.to_lowercase().contains(VEGETARIAN_KEYWORD) {
        Vegetarian::Yes
    } else {
        Vegetarian::No
    }
}

pub(crate) fn parse_style(query: &str) -> Option<Style> {
    let query = query.to_lowercase();
    STYLES
        .iter()
        .find(|(keyword, _)| query.contains(*keyword))
        .map(|(_, style)| *style)
}
