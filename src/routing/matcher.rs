//! Path pattern matching.
//!
//! # Responsibilities
//! - Compile patterns like `/v1/entries/:id` into segments
//! - Match a request path segment by segment, capturing named parameters
//!
//! # Design Decisions
//! - Exact segment matching, case-sensitive
//! - `:name` matches any single non-empty segment
//! - No wildcards or regex; matching is O(segments)

use crate::http::request::PathParams;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A compiled route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split(pattern)
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Param(name.to_string()),
                None => Segment::Literal(s.to_string()),
            })
            .collect();
        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path`, returning the captured parameters on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::default();
        let mut parts = split(path);

        for segment in &self.segments {
            let part = parts.next()?;
            match segment {
                Segment::Literal(expected) if expected == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params.insert(name.as_str(), part),
            }
        }

        match parts.next() {
            Some(_) => None,
            None => Some(params),
        }
    }
}

fn split(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
