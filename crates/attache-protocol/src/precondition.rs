use std::fmt;

use attache_types::ETag;
use tracing::debug;

use crate::error::ProtocolResult;
use crate::method::ContentMethod;
use crate::tag_match::TagMatch;

pub const IF_MATCH: &str = "If-Match";
pub const IF_NONE_MATCH: &str = "If-None-Match";

/// Which conditional header rejected a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailedCondition {
    /// `If-Match` did not match the current tag.
    IfMatch,
    /// `If-None-Match` matched the current tag on an unsafe method.
    IfNoneMatch,
}

impl fmt::Display for FailedCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IfMatch => write!(f, "{IF_MATCH} does not match the current entity tag"),
            Self::IfNoneMatch => write!(f, "{IF_NONE_MATCH} matches the current entity tag"),
        }
    }
}

/// Outcome of evaluating a [`Precondition`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Evaluation {
    /// Carry out the request.
    Proceed,
    /// Respond `304 Not Modified` (safe methods only).
    NotModified,
    /// Respond `412 Precondition Failed`.
    PreconditionFailed(FailedCondition),
}

/// Conditional headers supplied with a request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Precondition {
    pub if_match: Option<TagMatch>,
    pub if_none_match: Option<TagMatch>,
}

impl Precondition {
    /// No conditions: every evaluation proceeds.
    pub fn none() -> Self {
        Self::default()
    }

    /// Parse raw header values.
    pub fn parse(if_match: Option<&str>, if_none_match: Option<&str>) -> ProtocolResult<Self> {
        Ok(Self {
            if_match: if_match.map(|v| TagMatch::parse(IF_MATCH, v)).transpose()?,
            if_none_match: if_none_match
                .map(|v| TagMatch::parse(IF_NONE_MATCH, v))
                .transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.if_match.is_none() && self.if_none_match.is_none()
    }

    /// Evaluate against the current tag (`None` when the entity has no
    /// content).
    ///
    /// `If-Match` is checked first for every method and rejects on mismatch.
    /// `If-None-Match` is then checked: a match yields `NotModified` for safe
    /// methods and `PreconditionFailed` for unsafe ones. Both checks always
    /// run, so an unsafe request whose `If-Match` and `If-None-Match` both
    /// match is rejected.
    pub fn evaluate(&self, method: ContentMethod, current: Option<&ETag>) -> Evaluation {
        if let Some(if_match) = &self.if_match {
            if !if_match.matches_strong(current) {
                debug!(%method, ?current, "If-Match precondition failed");
                return Evaluation::PreconditionFailed(FailedCondition::IfMatch);
            }
        }
        if let Some(if_none_match) = &self.if_none_match {
            if if_none_match.matches_weak(current) {
                if method.is_safe() {
                    return Evaluation::NotModified;
                }
                debug!(%method, ?current, "If-None-Match precondition failed");
                return Evaluation::PreconditionFailed(FailedCondition::IfNoneMatch);
            }
        }
        Evaluation::Proceed
    }
}
