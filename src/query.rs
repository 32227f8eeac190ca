//! Turns raw launcher input into a structured [`Query`]
use serde::Serialize;
use std::collections::HashSet;

/// Separator between query terms.
pub const TERM_SEPARATOR: char = ' ';

/// Answers whether a token is a registered, enabled, non-global action keyword.
pub trait KeywordRouter {
    fn is_action_keyword(&self, token: &str) -> bool;
}

impl KeywordRouter for HashSet<String> {
    fn is_action_keyword(&self, token: &str) -> bool {
        self.contains(token)
    }
}

impl<T: KeywordRouter + ?Sized> KeywordRouter for &T {
    fn is_action_keyword(&self, token: &str) -> bool {
        (**self).is_action_keyword(token)
    }
}

/// One keystroke's worth of input. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    raw_query: String,
    terms: Vec<String>,
    action_keyword: Option<String>,
    search: String,
}

impl Query {
    /// Normalized input: terms joined by single separators.
    pub fn raw_query(&self) -> &str {
        &self.raw_query
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn action_keyword(&self) -> Option<&str> {
        self.action_keyword.as_deref()
    }

    /// Text handed to plugins; excludes a consumed action keyword.
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Terms following the action keyword, or all terms when none was consumed.
    pub fn parameters(&self) -> &[String] {
        if self.action_keyword.is_some() {
            &self.terms[1..]
        } else {
            &self.terms
        }
    }
}

/// Parses `text` into a query, consulting `router` for action keywords.
///
/// Returns `None` for empty or all-whitespace input.
pub fn parse<R: KeywordRouter + ?Sized>(text: &str, router: &R) -> Option<Query> {
    if text.trim().is_empty() {
        return None;
    }

    let terms: Vec<String> = text
        .split(TERM_SEPARATOR)
        .filter(|term| !term.is_empty())
        .map(str::to_string)
        .collect();
    if terms.is_empty() {
        return None;
    }

    let raw_query = terms.join(&TERM_SEPARATOR.to_string());
    let first = &terms[0];

    let (action_keyword, search) = if router.is_action_keyword(first) {
        let search = if terms.len() > 1 {
            raw_query[first.len() + TERM_SEPARATOR.len_utf8()..].to_string()
        } else {
            String::new()
        };
        (Some(first.clone()), search)
    } else {
        (None, raw_query.clone())
    };

    Some(Query {
        raw_query,
        terms,
        action_keyword,
        search,
    })
}

/// Collapses repeated separators and trims leading/trailing ones.
pub fn normalize(text: &str) -> String {
    text.split(TERM_SEPARATOR)
        .filter(|term| !term.is_empty())
        .collect::<Vec<_>>()
        .join(&TERM_SEPARATOR.to_string())
}
