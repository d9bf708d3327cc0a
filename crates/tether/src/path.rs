use std::fmt;

use crate::error::{BindError, Result};

/// Token that addresses the whole model value.
pub const SELF_TOKEN: &str = "this";

/// A parsed, dot-delimited property path such as `user.name` or `todos.0`.
///
/// The self token `this` parses to the root path, which has no segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a path. Empty input, empty segments (`a..b`, `.a`) and
    /// whitespace inside a segment are rejected with [`BindError::InvalidPath`].
    pub fn parse(raw: &str) -> Result<Path> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(BindError::InvalidPath(raw.to_string()));
        }
        let mut segments = Vec::new();
        for (i, segment) in trimmed.split('.').enumerate() {
            if segment.is_empty() || segment.contains(char::is_whitespace) {
                return Err(BindError::InvalidPath(raw.to_string()));
            }
            // A leading `this.` is the same as no prefix at all
            if i == 0 && segment == SELF_TOKEN {
                continue;
            }
            segments.push(segment.to_string());
        }
        Ok(Path { segments })
    }

    pub(crate) fn from_segments(segments: Vec<String>) -> Path {
        Path { segments }
    }

    pub fn root() -> Path {
        Path {
            segments: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Path {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Path { segments }
    }

    /// A new path with all of `other`'s segments appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Path { segments }
    }

    /// The path itself followed by each of its ancestors, ending at the root.
    ///
    /// `user.name` yields `user.name`, `user`, `this`.
    pub fn with_ancestors(&self) -> Vec<Path> {
        (0..=self.segments.len())
            .rev()
            .map(|n| Path {
                segments: self.segments[..n].to_vec(),
            })
            .collect()
    }

    /// Subscription key: the dotted form, or `this` for the root.
    pub fn key(&self) -> String {
        if self.segments.is_empty() {
            SELF_TOKEN.to_string()
        } else {
            self.segments.join(".")
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
