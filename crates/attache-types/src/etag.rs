use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::entity::ContentState;
use crate::error::TypeError;

/// Domain separator mixed into every derived tag.
const ETAG_DOMAIN: &[u8] = b"attache.etag.v1";

/// Number of hash bytes kept in a derived tag (32 hex characters).
const ETAG_HASH_BYTES: usize = 16;

/// An HTTP entity tag.
///
/// Tags produced by [`ETag::derive`] are strong validators: a BLAKE3 hash of
/// the entity type, the entity key and the full content state. Derivation is
/// a pure function of its inputs, so recomputing the tag for unchanged state
/// always yields the same token, while any content mutation (which bumps the
/// state's version) yields a different one.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ETag {
    opaque: String,
    weak: bool,
}

impl ETag {
    /// Derive the tag for `state` of the entity `entity_key` of type
    /// `entity_type`.
    pub fn derive(entity_type: &str, entity_key: &str, state: &ContentState) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(ETAG_DOMAIN);
        update_field(&mut hasher, entity_type.as_bytes());
        update_field(&mut hasher, entity_key.as_bytes());
        match &state.content_id {
            Some(id) => {
                hasher.update(&[1]);
                update_field(&mut hasher, id.as_str().as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        hasher.update(&state.length.to_le_bytes());
        hasher.update(&state.version.to_le_bytes());
        let hash = hasher.finalize();
        Self {
            opaque: hex::encode(&hash.as_bytes()[..ETAG_HASH_BYTES]),
            weak: false,
        }
    }

    /// Build a strong tag from its opaque value (without quotes).
    pub fn strong(opaque: impl Into<String>) -> Result<Self, TypeError> {
        let opaque = opaque.into();
        validate_opaque(&opaque)?;
        Ok(Self {
            opaque,
            weak: false,
        })
    }

    /// Build a weak tag from its opaque value (without quotes).
    pub fn weak(opaque: impl Into<String>) -> Result<Self, TypeError> {
        let opaque = opaque.into();
        validate_opaque(&opaque)?;
        Ok(Self { opaque, weak: true })
    }

    /// Parse the header form: `"abc"` or `W/"abc"`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let s = s.trim();
        let (weak, quoted) = match s.strip_prefix("W/") {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let opaque = quoted
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .ok_or_else(|| TypeError::InvalidEntityTag(format!("{s:?} is not quoted")))?;
        if weak {
            Self::weak(opaque)
        } else {
            Self::strong(opaque)
        }
    }

    /// The opaque value without quotes or weakness prefix.
    pub fn opaque(&self) -> &str {
        &self.opaque
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Strong comparison: both tags strong and opaque values equal.
    pub fn strong_eq(&self, other: &ETag) -> bool {
        !self.weak && !other.weak && self.opaque == other.opaque
    }

    /// Weak comparison: opaque values equal, weakness ignored.
    pub fn weak_eq(&self, other: &ETag) -> bool {
        self.opaque == other.opaque
    }
}

fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

// etagc = %x21 / %x23-7E (obs-text is not accepted)
fn validate_opaque(opaque: &str) -> Result<(), TypeError> {
    match opaque
        .bytes()
        .find(|b| !(*b == 0x21 || (0x23..=0x7e).contains(b)))
    {
        Some(b) => Err(TypeError::InvalidEntityTag(format!(
            "illegal byte 0x{b:02x} in {opaque:?}"
        ))),
        None => Ok(()),
    }
}

impl fmt::Display for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.weak {
            write!(f, "W/\"{}\"", self.opaque)
        } else {
            write!(f, "\"{}\"", self.opaque)
        }
    }
}

impl fmt::Debug for ETag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ETag({self})")
    }
}

impl FromStr for ETag {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
