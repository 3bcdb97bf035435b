use attache_types::ETag;

use crate::error::{ProtocolError, ProtocolResult};

/// Parsed value of an `If-Match` or `If-None-Match` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TagMatch {
    /// `*`: matches any current representation.
    Any,
    /// A non-empty list of entity tags.
    Tags(Vec<ETag>),
}

impl TagMatch {
    /// Parse a header value: `*` or a comma-separated list of tags.
    pub fn parse(header: &'static str, value: &str) -> ProtocolResult<Self> {
        let value = value.trim();
        if value == "*" {
            return Ok(Self::Any);
        }

        let invalid = |reason: String| ProtocolError::InvalidHeader { header, reason };
        let mut tags = Vec::new();
        let mut rest = value;
        loop {
            rest = rest.trim_start_matches(|c: char| c == ',' || c.is_ascii_whitespace());
            if rest.is_empty() {
                break;
            }
            let (weak, body) = match rest.strip_prefix("W/") {
                Some(after) => (true, after),
                None => (false, rest),
            };
            let body = body
                .strip_prefix('"')
                .ok_or_else(|| invalid(format!("expected a quoted tag at {rest:?}")))?;
            let end = body
                .find('"')
                .ok_or_else(|| invalid(format!("unterminated tag in {value:?}")))?;
            let opaque = &body[..end];
            let tag = if weak {
                ETag::weak(opaque)
            } else {
                ETag::strong(opaque)
            }
            .map_err(|e| invalid(e.to_string()))?;
            tags.push(tag);

            rest = &body[end + 1..];
            let next = rest.trim_start_matches(|c: char| c.is_ascii_whitespace());
            if !(next.is_empty() || next.starts_with(',')) {
                return Err(invalid(format!("unexpected text after tag: {next:?}")));
            }
            rest = next;
        }

        if tags.is_empty() {
            return Err(invalid("empty tag list".into()));
        }
        Ok(Self::Tags(tags))
    }

    /// `If-Match` semantics: strong comparison, `*` requires a current tag.
    pub fn matches_strong(&self, current: Option<&ETag>) -> bool {
        match (self, current) {
            (_, None) => false,
            (Self::Any, Some(_)) => true,
            (Self::Tags(tags), Some(current)) => tags.iter().any(|t| t.strong_eq(current)),
        }
    }

    /// `If-None-Match` semantics: weak comparison, `*` requires a current tag.
    pub fn matches_weak(&self, current: Option<&ETag>) -> bool {
        match (self, current) {
            (_, None) => false,
            (Self::Any, Some(_)) => true,
            (Self::Tags(tags), Some(current)) => tags.iter().any(|t| t.weak_eq(current)),
        }
    }
}
