use std::fmt;

use attache_protocol::{ContentMethod, HealthResponse, InfoResponse, Precondition};
use attache_store::ContentAttributes;
use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use futures::Stream;
use tokio::time::Instant;

use crate::body::{self, ChannelReader};
use crate::endpoint::{ReadOutcome, WriteOutcome};
use crate::error::{ServerError, ServerResult};
use crate::state::AppState;

/// Multipart field carrying the uploaded file.
pub const FILE_FIELD: &str = "file";

const OCTET_STREAM: &str = "application/octet-stream";

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler.
pub async fn info_handler(State(state): State<AppState>) -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "attache-server".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        stores: state.store_names(),
    })
}

/// GET / HEAD `/{store}/{id}`.
pub async fn read_handler(
    State(state): State<AppState>,
    method: Method,
    Path((store, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let endpoint = state.endpoint(&store)?;
    let method = if method == Method::HEAD {
        ContentMethod::Head
    } else {
        ContentMethod::Get
    };
    let precondition = precondition(&headers)?;

    let outcome = blocking(move || endpoint.read(&id, method, &precondition)).await?;
    match outcome {
        ReadOutcome::NotModified { etag } => {
            let mut response = StatusCode::NOT_MODIFIED.into_response();
            if let Some(etag) = etag {
                response
                    .headers_mut()
                    .insert(header::ETAG, header_value(etag.to_string())?);
            }
            Ok(response)
        }
        ReadOutcome::Content { head, body } => {
            let body = match body {
                Some(reader) => body::reader_body(reader, state.chunk_size()),
                None => Body::empty(),
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::ETAG, head.etag.to_string())
                .header(
                    header::CONTENT_TYPE,
                    head.mime_type.as_deref().unwrap_or(OCTET_STREAM),
                )
                .header(header::CONTENT_LENGTH, head.length)
                .body(body)
                .map_err(|e| ServerError::Internal(format!("building response: {e}")))
        }
    }
}

/// PUT `/{store}/{id}`: the raw request body becomes the content.
pub async fn put_handler(
    State(state): State<AppState>,
    Path((store, id)): Path<(String, String)>,
    headers: HeaderMap,
    request_body: Body,
) -> ServerResult<Response> {
    let endpoint = state.endpoint(&store)?;
    let precondition = precondition(&headers)?;
    let attributes = ContentAttributes {
        mime_type: header_str(&headers, header::CONTENT_TYPE)?.map(str::to_owned),
        original_file_name: None,
    };

    let outcome = upload(&state, request_body.into_data_stream(), move |content| {
        endpoint.write(&id, ContentMethod::Put, &precondition, content, attributes)
    })
    .await?;
    written(ContentMethod::Put, outcome)
}

/// POST `/{store}/{id}`: multipart upload of the `file` field.
pub async fn post_handler(
    State(state): State<AppState>,
    Path((store, id)): Path<(String, String)>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ServerResult<Response> {
    let endpoint = state.endpoint(&store)?;
    let precondition = precondition(&headers)?;

    let field = loop {
        match multipart
            .next_field()
            .await
            .map_err(|e| ServerError::BadRequest(format!("malformed multipart body: {e}")))?
        {
            Some(field) if field.name() == Some(FILE_FIELD) => break field,
            Some(_) => continue,
            None => {
                return Err(ServerError::BadRequest(format!(
                    "multipart field `{FILE_FIELD}` is required"
                )))
            }
        }
    };
    let attributes = ContentAttributes {
        mime_type: field.content_type().map(str::to_owned),
        original_file_name: field.file_name().map(str::to_owned),
    };

    let outcome = upload(&state, field, move |content| {
        endpoint.write(&id, ContentMethod::Post, &precondition, content, attributes)
    })
    .await?;
    written(ContentMethod::Post, outcome)
}

/// DELETE `/{store}/{id}`.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((store, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> ServerResult<StatusCode> {
    let endpoint = state.endpoint(&store)?;
    let precondition = precondition(&headers)?;
    blocking(move || endpoint.delete(&id, &precondition)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Parse the conditional headers. Repeated header lines are combined.
fn precondition(headers: &HeaderMap) -> ServerResult<Precondition> {
    let if_match = joined(headers, header::IF_MATCH)?;
    let if_none_match = joined(headers, header::IF_NONE_MATCH)?;
    Ok(Precondition::parse(
        if_match.as_deref(),
        if_none_match.as_deref(),
    )?)
}

fn joined(headers: &HeaderMap, name: HeaderName) -> ServerResult<Option<String>> {
    let mut values = Vec::new();
    for value in headers.get_all(&name) {
        let value = value
            .to_str()
            .map_err(|_| ServerError::BadRequest(format!("{name} header is not valid text")))?;
        values.push(value);
    }
    Ok((!values.is_empty()).then(|| values.join(", ")))
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> ServerResult<Option<&str>> {
    headers
        .get(&name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ServerError::BadRequest(format!("{name} header is not valid text")))
        })
        .transpose()
}

fn header_value(value: String) -> ServerResult<header::HeaderValue> {
    header::HeaderValue::try_from(value)
        .map_err(|e| ServerError::Internal(format!("invalid header value: {e}")))
}

fn written(method: ContentMethod, outcome: WriteOutcome) -> ServerResult<Response> {
    let status = if method == ContentMethod::Post && outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    let mut response = status.into_response();
    response
        .headers_mut()
        .insert(header::ETAG, header_value(outcome.etag.to_string())?);
    Ok(response)
}

/// Run a blocking endpoint call off the async runtime.
async fn blocking<T, F>(f: F) -> ServerResult<T>
where
    F: FnOnce() -> ServerResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ServerError::Internal(format!("blocking task failed: {e}")))?
}

/// Feed `stream` to a blocking `write` through a [`ChannelReader`], bounded
/// by the upload window.
async fn upload<S, E, F>(state: &AppState, stream: S, write: F) -> ServerResult<WriteOutcome>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: fmt::Display,
    F: FnOnce(&mut ChannelReader) -> ServerResult<WriteOutcome> + Send + 'static,
{
    let deadline = Instant::now() + state.upload_window();
    let (tx, mut reader) = body::channel();
    let task = tokio::task::spawn_blocking(move || write(&mut reader));
    let ((), joined) = tokio::join!(body::pump_stream(stream, tx, deadline), task);
    joined.map_err(|e| ServerError::Internal(format!("upload task failed: {e}")))?
}
