//! Glob filter over `name:tag` image stream tag references.

use regex::Regex;
use std::fmt;
use std::str::FromStr;
use thoth_s2i_common::{Error, Result};

/// Filter applied when none is configured.
pub const DEFAULT_IMAGE_STREAM_TAG_FILTER: &str = "*python*";

/// A glob (`*` matches any run, `?` a single character) that must match the
/// whole reference.
#[derive(Debug, Clone)]
pub struct ImageStreamTagFilter {
    pattern: String,
    regex: Regex,
}

impl ImageStreamTagFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expression = String::from("^");
        for c in pattern.chars() {
            match c {
                '*' => expression.push_str(".*"),
                '?' => expression.push('.'),
                other => expression.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expression.push('$');

        let regex = Regex::new(&expression).map_err(|e| {
            Error::Config(format!("invalid image stream tag filter {:?}: {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, reference: &str) -> bool {
        self.regex.is_match(reference)
    }
}

impl Default for ImageStreamTagFilter {
    fn default() -> Self {
        // The default glob escapes to a valid expression.
        Self::new(DEFAULT_IMAGE_STREAM_TAG_FILTER).unwrap()
    }
}

impl FromStr for ImageStreamTagFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for ImageStreamTagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}
