use std::fmt;
use std::time::Duration;

use attache_types::{ContentId, TypeError};

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend does not know the requested content id.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// The entity has no content attached.
    #[error("{entity} has no content")]
    NoContent { entity: &'static str },

    /// The entity lookup collaborator found nothing for the id.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// A backend read/write/delete failed.
    #[error("backend I/O error on {entity} content {content_id}: {source}")]
    Backend {
        entity: &'static str,
        content_id: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the underlying storage backend, before context is
    /// attached by the content template.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The caller-supplied content stream failed mid-copy.
    #[error("content stream interrupted: {0}")]
    Interrupted(#[source] std::io::Error),

    /// The write did not finish inside the commit window and was discarded.
    #[error("commit window of {limit:?} exceeded after {written} bytes")]
    CommitTimeout { limit: Duration, written: u64 },

    /// The store was assembled without a usable backend or metadata.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Type(#[from] TypeError),
}

impl StoreError {
    /// Attach entity and content-id context to a raw backend I/O error.
    ///
    /// Errors that already carry their meaning pass through unchanged.
    pub fn with_context(self, entity: &'static str, content_id: impl fmt::Display) -> Self {
        match self {
            Self::Io(source) => Self::Backend {
                entity,
                content_id: content_id.to_string(),
                source,
            },
            other => other,
        }
    }

    /// Returns `true` for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::ContentNotFound(_) | Self::NoContent { .. } | Self::EntityNotFound(_)
        )
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn io_gets_backend_context() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::Other, "disk full"));
        let err = err.with_context("Document", "abc");
        match &err {
            StoreError::Backend {
                entity, content_id, ..
            } => {
                assert_eq!(*entity, "Document");
                assert_eq!(content_id, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn protocol_errors_pass_through_context() {
        let id = ContentId::generate();
        let err = StoreError::ContentNotFound(id.clone()).with_context("Document", &id);
        assert!(matches!(err, StoreError::ContentNotFound(_)));
        assert!(err.is_not_found());
    }

    #[test]
    fn backend_errors_are_not_not_found() {
        let err = StoreError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(!err.is_not_found());
    }
}
