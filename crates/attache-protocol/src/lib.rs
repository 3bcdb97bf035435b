//! Conditional request protocol for Attaché.
//!
//! Defines how `If-Match` / `If-None-Match` headers are parsed and evaluated
//! against an entity's current tag, and the HTTP paths the content endpoint
//! is served under. Nothing here performs I/O: evaluation is a pure function
//! of the method, the headers and the current tag.

pub mod endpoint;
pub mod error;
pub mod method;
pub mod precondition;
pub mod tag_match;

pub use endpoint::{endpoints, HealthResponse, InfoResponse};
pub use error::{ProtocolError, ProtocolResult};
pub use method::ContentMethod;
pub use precondition::{Evaluation, FailedCondition, Precondition};
pub use tag_match::TagMatch;
