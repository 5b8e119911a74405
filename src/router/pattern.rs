//! Path patterns with named single-segment captures.
//!
//! A pattern is split on `/` with empty segments dropped, so leading, trailing
//! and doubled slashes never matter. A segment starting with `:` captures the
//! concrete segment at the same position under the name that follows the
//! colon; every other segment must match literally.

use crate::context::PathParams;

const CAPTURE_MARKER: char = ':';

// A single path segment, either a literal string or a named capture (`:name`).
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A route pattern compiled once at registration time.
///
/// # Examples
///
/// ```
/// use waypoint::router::PathPattern;
///
/// let pattern = PathPattern::parse("/dummies/:id");
/// let params = pattern.matches("/dummies/42").unwrap();
/// assert_eq!(params.get("id"), Some("42"));
/// assert!(pattern.matches("/dummies/42/extra").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Self {
        let segments = split_segments(pattern)
            .map(|s| match s.strip_prefix(CAPTURE_MARKER) {
                Some(name) => Segment::Capture(name.to_owned()),
                None => Segment::Literal(s.to_owned()),
            })
            .collect();

        Self {
            raw: pattern.to_owned(),
            segments,
        }
    }

    /// The pattern string as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Match `path` against this pattern, returning the captured parameters.
    ///
    /// Captures accept any segment text; there is no wildcard, so the segment
    /// counts must be equal.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let mut params = PathParams::new();
        let mut concrete = split_segments(path);

        for segment in &self.segments {
            let part = concrete.next()?;
            match segment {
                Segment::Capture(name) => params.insert(name.as_str(), part),
                Segment::Literal(text) if text == part => {}
                Segment::Literal(_) => return None,
            }
        }

        if concrete.next().is_some() {
            return None;
        }

        Some(params)
    }
}

/// Matches a pattern string against a concrete path without keeping the
/// compiled pattern around.
///
/// ```
/// use waypoint::router::match_path;
///
/// assert_eq!(match_path("/", "//").map(|p| p.len()), Some(0));
/// assert!(match_path("/dummies", "/dummy").is_none());
/// ```
pub fn match_path(pattern: &str, path: &str) -> Option<PathParams> {
    PathPattern::parse(pattern).matches(path)
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}
