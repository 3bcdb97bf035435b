use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Maximum accepted length of a content identifier.
pub const MAX_CONTENT_ID_LEN: usize = 128;

/// Opaque identifier of a blob inside a storage backend.
///
/// Backends allocate ids through [`ContentId::generate`] (a UUID v7, so ids
/// sort by creation time), but any identifier made of ASCII letters, digits,
/// `-` and `_` is accepted. The restricted alphabet keeps ids safe to embed
/// in file paths and URLs.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    /// Allocate a new time-ordered content id (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// Parse and validate an existing identifier.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() {
            return Err(TypeError::InvalidContentId("empty".into()));
        }
        if s.len() > MAX_CONTENT_ID_LEN {
            return Err(TypeError::InvalidContentId(format!(
                "{} bytes exceeds the {MAX_CONTENT_ID_LEN} byte limit",
                s.len()
            )));
        }
        if let Some(c) = s
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(TypeError::InvalidContentId(format!(
                "illegal character {c:?} in {s:?}"
            )));
        }
        Ok(Self(s.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short representation (first 8 characters).
    pub fn short_id(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

impl fmt::Debug for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentId({})", self.short_id())
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ContentId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = ContentId::generate();
        let b = ContentId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_parse() {
        let id = ContentId::generate();
        let parsed = ContentId::parse(id.as_str()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn generated_ids_are_time_ordered() {
        let first = ContentId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = ContentId::generate();
        assert!(first < second);
    }

    #[test]
    fn rejects_empty() {
        assert!(matches!(
            ContentId::parse(""),
            Err(TypeError::InvalidContentId(_))
        ));
    }

    #[test]
    fn rejects_path_separators() {
        assert!(ContentId::parse("../etc/passwd").is_err());
        assert!(ContentId::parse("a/b").is_err());
        assert!(ContentId::parse("a.b").is_err());
    }

    #[test]
    fn rejects_oversized() {
        let long = "a".repeat(MAX_CONTENT_ID_LEN + 1);
        assert!(ContentId::parse(&long).is_err());
        assert!(ContentId::parse(&long[1..]).is_ok());
    }

    #[test]
    fn short_id_handles_short_values() {
        let id = ContentId::parse("abc").unwrap();
        assert_eq!(id.short_id(), "abc");
        let id = ContentId::parse("0123456789").unwrap();
        assert_eq!(id.short_id(), "01234567");
    }

    #[test]
    fn serde_roundtrip() {
        let id = ContentId::parse("blob_42").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"blob_42\"");
        let parsed: ContentId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_rejects_invalid() {
        let result: Result<ContentId, _> = serde_json::from_str("\"no/slashes\"");
        assert!(result.is_err());
    }
}
