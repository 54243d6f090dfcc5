//! Keyword classification for the lexer
//!
//! Uses compile-time perfect hashing (phf) for O(1) keyword lookup. Keys are
//! lower-case; callers fold the candidate text before looking it up.

use phf::phf_map;

use crate::query::ast::TimeUnit;
use crate::query::token::Keyword;

/// Static map of keywords, unit words in singular and plural form
static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    // Clauses
    "select" => Keyword::Select,
    "from" => Keyword::From,
    "where" => Keyword::Where,
    "facet" => Keyword::Facet,
    "limit" => Keyword::Limit,
    "since" => Keyword::Since,
    "until" => Keyword::Until,
    "compare" => Keyword::Compare,
    "with" => Keyword::With,
    "timeseries" => Keyword::Timeseries,

    // Expressions
    "and" => Keyword::And,
    "or" => Keyword::Or,
    "not" => Keyword::Not,
    "in" => Keyword::In,
    "like" => Keyword::Like,
    "as" => Keyword::As,

    // Time anchors
    "ago" => Keyword::Ago,
    "auto" => Keyword::Auto,
    "today" => Keyword::Today,
    "yesterday" => Keyword::Yesterday,
    "now" => Keyword::Now,

    // Time units
    "second" => Keyword::Second,
    "seconds" => Keyword::Second,
    "minute" => Keyword::Minute,
    "minutes" => Keyword::Minute,
    "hour" => Keyword::Hour,
    "hours" => Keyword::Hour,
    "day" => Keyword::Day,
    "days" => Keyword::Day,
    "week" => Keyword::Week,
    "weeks" => Keyword::Week,
    "month" => Keyword::Month,
    "months" => Keyword::Month,
};

/// Longest key in [`KEYWORDS`]; anything longer is an identifier.
const MAX_KEYWORD_LEN: usize = 10;

/// Look up a word, ignoring ASCII case
pub fn lookup_keyword(text: &str) -> Option<Keyword> {
    if text.len() > MAX_KEYWORD_LEN {
        return None;
    }

    let mut buf = [0u8; MAX_KEYWORD_LEN];
    let folded = &mut buf[..text.len()];
    folded.copy_from_slice(text.as_bytes());
    folded.make_ascii_lowercase();

    std::str::from_utf8(folded)
        .ok()
        .and_then(|key| KEYWORDS.get(key).copied())
}

/// The time unit a unit keyword stands for
pub fn time_unit(keyword: Keyword) -> Option<TimeUnit> {
    match keyword {
        Keyword::Second => Some(TimeUnit::Second),
        Keyword::Minute => Some(TimeUnit::Minute),
        Keyword::Hour => Some(TimeUnit::Hour),
        Keyword::Day => Some(TimeUnit::Day),
        Keyword::Week => Some(TimeUnit::Week),
        Keyword::Month => Some(TimeUnit::Month),
        _ => None,
    }
}
