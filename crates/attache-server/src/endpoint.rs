use std::fmt;
use std::io::Read;
use std::str::FromStr;

use attache_protocol::{ContentMethod, Evaluation, FailedCondition, Precondition};
use attache_store::{ContentAttributes, Store};
use attache_types::ETag;
use tracing::debug;

use crate::error::{ServerError, ServerResult};

/// Response headers describing an entity's content.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHead {
    pub etag: ETag,
    pub mime_type: Option<String>,
    pub length: u64,
    pub original_file_name: Option<String>,
}

/// Result of a GET or HEAD.
pub enum ReadOutcome {
    /// `If-None-Match` matched; carries the current tag.
    NotModified { etag: Option<ETag> },
    /// The content; `body` is `None` for HEAD.
    Content {
        head: ContentHead,
        body: Option<Box<dyn Read + Send>>,
    },
}

impl fmt::Debug for ReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotModified { etag } => f.debug_struct("NotModified").field("etag", etag).finish(),
            Self::Content { head, body } => f
                .debug_struct("Content")
                .field("head", head)
                .field("has_body", &body.is_some())
                .finish(),
        }
    }
}

/// Result of a PUT or POST.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WriteOutcome {
    pub etag: ETag,
    /// `true` when the entity had no content before the write.
    pub created: bool,
}

/// Type-erased conditional content operations for one store.
///
/// Implementations block; the HTTP layer calls them from
/// `spawn_blocking`. Every operation resolves the entity, evaluates the
/// precondition against its current tag, and only then touches content.
pub trait ContentEndpoint: Send + Sync {
    /// Name the store is published under.
    fn name(&self) -> &str;

    fn read(
        &self,
        id: &str,
        method: ContentMethod,
        precondition: &Precondition,
    ) -> ServerResult<ReadOutcome>;

    fn write(
        &self,
        id: &str,
        method: ContentMethod,
        precondition: &Precondition,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> ServerResult<WriteOutcome>;

    fn delete(&self, id: &str, precondition: &Precondition) -> ServerResult<()>;
}

/// [`ContentEndpoint`] over a typed [`Store`] with an entity repository.
pub struct StoreEndpoint<E, Id> {
    store: Store<E, Id>,
}

impl<E, Id> StoreEndpoint<E, Id> {
    pub fn new(store: Store<E, Id>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store<E, Id> {
        &self.store
    }
}

impl<E, Id> StoreEndpoint<E, Id>
where
    Id: FromStr + fmt::Display,
{
    fn parse_id(&self, raw: &str) -> ServerResult<Id> {
        raw.parse()
            .map_err(|_| ServerError::BadRequest(format!("invalid id for store `{}`: {raw:?}", self.store.name())))
    }

    fn current_etag(&self, id: &Id, entity: &E) -> Option<ETag> {
        self.store
            .state(entity)
            .has_content()
            .then(|| self.store.etag(id, entity))
    }

    /// Evaluate for an unsafe method, where only `Proceed` lets the request through.
    fn guard(
        &self,
        method: ContentMethod,
        precondition: &Precondition,
        current: Option<&ETag>,
    ) -> ServerResult<()> {
        match precondition.evaluate(method, current) {
            Evaluation::Proceed => Ok(()),
            Evaluation::PreconditionFailed(failed) => Err(ServerError::PreconditionFailed(failed)),
            Evaluation::NotModified => Err(ServerError::PreconditionFailed(FailedCondition::IfNoneMatch)),
        }
    }
}

impl<E, Id> ContentEndpoint for StoreEndpoint<E, Id>
where
    E: Send + Sync + 'static,
    Id: FromStr + fmt::Display + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        self.store.name()
    }

    fn read(
        &self,
        raw_id: &str,
        method: ContentMethod,
        precondition: &Precondition,
    ) -> ServerResult<ReadOutcome> {
        let id = self.parse_id(raw_id)?;
        let entity = self.store.find(&id)?;
        let current = self.current_etag(&id, &entity);

        match precondition.evaluate(method, current.as_ref()) {
            Evaluation::Proceed => {}
            Evaluation::NotModified => return Ok(ReadOutcome::NotModified { etag: current }),
            Evaluation::PreconditionFailed(failed) => {
                return Err(ServerError::PreconditionFailed(failed))
            }
        }

        let Some(etag) = current else {
            return Err(ServerError::NotFound(format!(
                "{}/{id} has no content",
                self.store.name()
            )));
        };
        let state = self.store.state(&entity);
        // GET reports the size of the blob it streams, not the recorded length.
        let (length, body) = match method {
            ContentMethod::Head => (state.length, None),
            _ => {
                let opened = self.store.open_content(&entity)?.ok_or_else(|| {
                    ServerError::NotFound(format!("{}/{id} has no content", self.store.name()))
                })?;
                (opened.length, Some(opened.reader))
            }
        };
        Ok(ReadOutcome::Content {
            head: ContentHead {
                etag,
                mime_type: state.mime_type,
                length,
                original_file_name: state.original_file_name,
            },
            body,
        })
    }

    fn write(
        &self,
        raw_id: &str,
        method: ContentMethod,
        precondition: &Precondition,
        content: &mut dyn Read,
        attributes: ContentAttributes,
    ) -> ServerResult<WriteOutcome> {
        let id = self.parse_id(raw_id)?;
        let entity = self.store.find(&id)?;
        let current = self.current_etag(&id, &entity);
        self.guard(method, precondition, current.as_ref())?;

        let entity = self.store.set_content_and_save(entity, content, attributes)?;
        let etag = self.store.etag(&id, &entity);
        debug!(store = self.store.name(), %id, %method, %etag, "content written");
        Ok(WriteOutcome {
            etag,
            created: current.is_none(),
        })
    }

    fn delete(&self, raw_id: &str, precondition: &Precondition) -> ServerResult<()> {
        let id = self.parse_id(raw_id)?;
        let mut entity = self.store.find(&id)?;
        let current = self.current_etag(&id, &entity);
        self.guard(ContentMethod::Delete, precondition, current.as_ref())?;

        self.store.unset_content(&mut entity)?;
        self.store.save(entity)?;
        debug!(store = self.store.name(), %id, "content deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::io::Cursor;

    fn put(endpoint: &dyn ContentEndpoint, id: &str, pre: &Precondition, data: &[u8]) -> ServerResult<WriteOutcome> {
        endpoint.write(
            id,
            ContentMethod::Put,
            pre,
            &mut Cursor::new(data.to_vec()),
            ContentAttributes::new().with_mime_type("text/plain"),
        )
    }

    fn body(outcome: ReadOutcome) -> Vec<u8> {
        match outcome {
            ReadOutcome::Content { body: Some(mut body), .. } => {
                let mut out = Vec::new();
                body.read_to_end(&mut out).unwrap();
                out
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn write_then_read() {
        let (_repo, endpoint) = document_endpoint();
        let written = put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();
        assert!(written.created);

        let outcome = endpoint
            .read("1", ContentMethod::Get, &Precondition::none())
            .unwrap();
        assert_eq!(body(outcome), GREETING);

        let head = endpoint
            .read("1", ContentMethod::Head, &Precondition::none())
            .unwrap();
        match head {
            ReadOutcome::Content { head, body } => {
                assert!(body.is_none());
                assert_eq!(head.etag, written.etag);
                assert_eq!(head.length, GREETING.len() as u64);
                assert_eq!(head.mime_type.as_deref(), Some("text/plain"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn overwrite_is_not_created() {
        let (_repo, endpoint) = document_endpoint();
        let first = put(&endpoint, "1", &Precondition::none(), b"one").unwrap();
        let second = put(&endpoint, "1", &Precondition::none(), b"two").unwrap();
        assert!(!second.created);
        assert_ne!(first.etag, second.etag);
    }

    #[test]
    fn read_without_content_is_not_found() {
        let (_repo, endpoint) = document_endpoint();
        let err = endpoint
            .read("1", ContentMethod::Get, &Precondition::none())
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[test]
    fn unknown_entity_and_bad_id() {
        let (_repo, endpoint) = document_endpoint();
        let err = put(&endpoint, "404", &Precondition::none(), b"x").unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
        let err = put(&endpoint, "not-a-number", &Precondition::none(), b"x").unwrap_err();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn failed_precondition_leaves_entity_untouched() {
        let (repo, endpoint) = document_endpoint();
        put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();
        let before = find(&repo, 1);

        let stale = Precondition::parse(Some("\"999\""), None).unwrap();
        let err = put(&endpoint, "1", &stale, b"changed").unwrap_err();
        assert!(matches!(
            err,
            ServerError::PreconditionFailed(FailedCondition::IfMatch)
        ));
        let err = endpoint.delete("1", &stale).unwrap_err();
        assert!(matches!(err, ServerError::PreconditionFailed(_)));

        assert_eq!(find(&repo, 1), before);
    }

    #[test]
    fn not_modified_carries_tag() {
        let (_repo, endpoint) = document_endpoint();
        let written = put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();
        let pre = Precondition::parse(None, Some(&written.etag.to_string())).unwrap();
        match endpoint.read("1", ContentMethod::Get, &pre).unwrap() {
            ReadOutcome::NotModified { etag } => assert_eq!(etag, Some(written.etag)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn delete_clears_content() {
        let (repo, endpoint) = document_endpoint();
        let written = put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();
        let pre = Precondition::parse(Some(&written.etag.to_string()), None).unwrap();
        endpoint.delete("1", &pre).unwrap();

        let doc = find(&repo, 1);
        assert!(doc.content_id.is_none());
        assert_eq!(doc.content_length, 0);
        assert!(doc.mime_type.is_none());
    }

    #[test]
    fn unconditional_delete_clears_content() {
        let (repo, endpoint) = document_endpoint();
        put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();
        endpoint.delete("1", &Precondition::none()).unwrap();

        assert!(find(&repo, 1).content_id.is_none());
        let err = endpoint
            .read("1", ContentMethod::Get, &Precondition::none())
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound(_)));
    }

    #[test]
    fn unsaved_overwrite_is_invisible_to_readers() {
        let (repo, endpoint) = document_endpoint();
        let written = put(&endpoint, "1", &Precondition::none(), GREETING).unwrap();

        let mut pending = find(&repo, 1);
        endpoint
            .store()
            .set_content(
                &mut pending,
                &mut Cursor::new(b"not saved yet".to_vec()),
                ContentAttributes::new(),
            )
            .unwrap();

        match endpoint.read("1", ContentMethod::Get, &Precondition::none()).unwrap() {
            ReadOutcome::Content { head, body: Some(mut body) } => {
                assert_eq!(head.etag, written.etag);
                assert_eq!(head.length, GREETING.len() as u64);
                let mut out = Vec::new();
                body.read_to_end(&mut out).unwrap();
                assert_eq!(out, GREETING);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn create_only_upload() {
        let (_repo, endpoint) = document_endpoint();
        let create_only = Precondition::parse(None, Some("*")).unwrap();
        put(&endpoint, "1", &create_only, b"first").unwrap();
        let err = put(&endpoint, "1", &create_only, b"second").unwrap_err();
        assert!(matches!(
            err,
            ServerError::PreconditionFailed(FailedCondition::IfNoneMatch)
        ));
    }
}
