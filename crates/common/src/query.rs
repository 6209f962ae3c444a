// Search queries: author filter + free-text filter, persistence key, request URL.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("query has neither an author nor a search string")]
    Empty,
}

/// One configured search: optionally scoped to an author, optionally
/// filtered by free text. Both parts default to the empty string.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct Query {
    pub search_string: String,
    /// Serialized as `username` to stay compatible with existing settings files.
    #[serde(rename = "username")]
    pub author: String,
}

impl Query {
    pub fn new(author: impl Into<String>, search_string: impl Into<String>) -> Self {
        Self { search_string: search_string.into(), author: author.into() }
    }

    pub fn by_author(author: impl Into<String>) -> Self {
        Self::new(author, "")
    }

    pub fn matching(search_string: impl Into<String>) -> Self {
        Self::new("", search_string)
    }

    /// Stable persistence key: `"{author}-{search_string}"`.
    pub fn key(&self) -> String {
        format!("{}-{}", self.author, self.search_string)
    }

    /// Unencoded filter: `(from:author)` followed directly by the search text.
    pub fn filter_expression(&self) -> String {
        let mut expression = String::new();
        if !self.author.is_empty() {
            expression.push_str("(from:");
            expression.push_str(&self.author);
            expression.push(')');
        }
        expression.push_str(&self.search_string);
        expression
    }

    /// Full request URL: `base` followed by the percent-encoded filter.
    pub fn search_url(&self, base: &str) -> Result<String, QueryError> {
        let expression = self.filter_expression();
        if expression.is_empty() {
            return Err(QueryError::Empty);
        }
        Ok(format!("{base}{}", urlencoding::encode(&expression)))
    }

    /// Short label for summaries: the author when set, else the search text.
    pub fn label(&self) -> &str {
        if self.author.is_empty() {
            &self.search_string
        } else {
            &self.author
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = if self.author.is_empty() { "(Any User)" } else { &self.author };
        let search =
            if self.search_string.is_empty() { "(No Search String)" } else { &self.search_string };
        write!(f, "User: {user} Search String: {search}")
    }
}
