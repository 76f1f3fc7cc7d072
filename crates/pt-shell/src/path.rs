//! Route path patterns
//!
//! `/grpo/:id/edit` style patterns: static segments, `:param` captures and a
//! trailing `*` catch-all. Trailing slashes, query strings and fragments on
//! the requested path are ignored.

use std::fmt;

use indexmap::IndexMap;

use crate::error::PathError;

/// Captured `:param` values (and `*` for the catch-all remainder)
pub type PathParams = IndexMap<String, String>;

pub const CATCH_ALL: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
    CatchAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

/// Split a requested path into its non-empty segments.
pub fn segments(path: &str) -> Vec<&str> {
    let end = path.find(['?', '#']).unwrap_or(path.len());
    path[..end].split('/').filter(|s| !s.is_empty()).collect()
}

/// Drop query, fragment and trailing slash; the root stays `/`.
pub fn normalize(path: &str) -> String {
    let parts = segments(path);
    if parts.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", parts.join("/"))
    }
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PathError> {
        if pattern == CATCH_ALL {
            return Ok(Self {
                segments: vec![Segment::CatchAll],
            });
        }
        if !pattern.starts_with('/') {
            return Err(PathError::NotAbsolute);
        }

        let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
        let mut segments = Vec::with_capacity(raw.len());
        for (i, seg) in raw.iter().enumerate() {
            if *seg == CATCH_ALL {
                if i + 1 != raw.len() {
                    return Err(PathError::MisplacedCatchAll);
                }
                segments.push(Segment::CatchAll);
            } else if let Some(name) = seg.strip_prefix(':') {
                if name.is_empty() {
                    return Err(PathError::EmptyParam);
                }
                let duplicate = segments
                    .iter()
                    .any(|s| matches!(s, Segment::Param(n) if n == name));
                if duplicate {
                    return Err(PathError::DuplicateParam(name.to_string()));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Static(seg.to_string()));
            }
        }

        Ok(Self { segments })
    }

    /// Match a requested path, returning captured params on success.
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts = segments(path);
        let mut params = PathParams::new();

        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::CatchAll => {
                    params.insert(CATCH_ALL.to_string(), parts[i.min(parts.len())..].join("/"));
                    return Some(params);
                }
                Segment::Static(s) => {
                    if parts.get(i) != Some(&s.as_str()) {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    let value = parts.get(i)?;
                    params.insert(name.clone(), (*value).to_string());
                }
            }
        }

        (parts.len() == self.segments.len()).then_some(params)
    }

    pub fn is_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll))
    }

    /// The pattern with parameter names erased. Two patterns with the same
    /// shape match exactly the same paths.
    pub fn shape(&self) -> String {
        if self.segments == [Segment::CatchAll] {
            return CATCH_ALL.to_string();
        }
        if self.segments.is_empty() {
            return "/".to_string();
        }
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Static(s) => format!("/{s}"),
                Segment::Param(_) => "/:".to_string(),
                Segment::CatchAll => format!("/{CATCH_ALL}"),
            })
            .collect()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments == [Segment::CatchAll] {
            return f.write_str(CATCH_ALL);
        }
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for seg in &self.segments {
            match seg {
                Segment::Static(s) => write!(f, "/{s}")?,
                Segment::Param(n) => write!(f, "/:{n}")?,
                Segment::CatchAll => write!(f, "/{CATCH_ALL}")?,
            }
        }
        Ok(())
    }
}
