//! Axum middleware serving guest pages from [`GuestPageCache`].
//!
//! ```ignore
//! let app = Router::new()
//!     .route("/", get(home))
//!     .layer(axum::middleware::from_fn_with_state(
//!         cache.pages().clone(),
//!         guest_page_layer::<RedisBackend>,
//!     ));
//! ```

use super::{CachedPage, GuestPageCache, PageOutcome, CACHE_HEADER};
use crate::backend::CacheBackend;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{
        header::{AUTHORIZATION, CONTENT_LENGTH, COOKIE, SET_COOKIE},
        HeaderName, HeaderValue, Method, Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::StreamExt;

/// Serve cached pages to guests and store fresh `200 OK` renders.
///
/// Requests from signed-in users, non-GET requests, and disabled caches pass
/// straight through without an `X-Cache` header. Backend failures are logged
/// and the handler runs uncached.
pub async fn guest_page_layer<B>(
    State(pages): State<GuestPageCache<B>>,
    request: Request<Body>,
    next: Next,
) -> Response
where
    B: CacheBackend + 'static,
{
    if !pages.is_enabled()
        || request.method() != Method::GET
        || !is_guest(&request, pages.session_cookie())
    {
        return next.run(request).await;
    }

    let uri = request_uri(&request);

    let key = match pages.lookup(&uri).await {
        Ok((_, Some(page))) => return with_outcome(build_response(page), PageOutcome::Hit),
        Ok((key, None)) => key,
        Err(e) => {
            warn!("Guest page lookup failed for {}: {}", uri, e);
            return next.run(request).await;
        }
    };

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || exceeds_limit(&response, pages.max_page_bytes()) {
        return with_outcome(response, PageOutcome::Miss);
    }

    let (parts, body) = response.into_parts();
    let bytes = match buffer_within(body, pages.max_page_bytes()).await {
        Ok(Buffered::Complete(bytes)) => bytes,
        Ok(Buffered::TooLarge(body)) => {
            debug!("Not caching guest page {}: body over the size limit", uri);
            return with_outcome(Response::from_parts(parts, body), PageOutcome::Miss);
        }
        Err(e) => {
            error!("Failed to buffer response body for {}: {}", uri, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let page = CachedPage {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter(|(name, _)| **name != SET_COOKIE)
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.to_vec(),
    };
    if let Err(e) = pages.put_at(&key, &page).await {
        warn!("Failed to store guest page {}: {}", uri, e);
    }

    with_outcome(
        Response::from_parts(parts, Body::from(bytes)),
        PageOutcome::Miss,
    )
}

enum Buffered {
    Complete(Bytes),
    /// Limit exceeded; the body is handed back unchanged, read chunks first.
    TooLarge(Body),
}

/// Read `body` into memory, stopping once it grows past `limit` bytes.
async fn buffer_within(body: Body, limit: usize) -> Result<Buffered, axum::Error> {
    let mut stream = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        total += chunk.len();
        chunks.push(chunk);
        if total > limit {
            let read = futures::stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
            return Ok(Buffered::TooLarge(Body::from_stream(read.chain(stream))));
        }
    }

    if chunks.len() == 1 {
        return Ok(Buffered::Complete(chunks.remove(0)));
    }
    let mut joined = Vec::with_capacity(total);
    for chunk in &chunks {
        joined.extend_from_slice(chunk);
    }
    Ok(Buffered::Complete(Bytes::from(joined)))
}

/// No credentials and no session cookie.
fn is_guest(request: &Request<Body>, session_cookie: &str) -> bool {
    let headers = request.headers();
    if headers.contains_key(AUTHORIZATION) {
        return false;
    }

    !headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .any(|(name, _)| name == session_cookie)
}

fn request_uri(request: &Request<Body>) -> String {
    request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

fn exceeds_limit(response: &Response, max_bytes: usize) -> bool {
    response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len > max_bytes)
}

fn build_response(page: CachedPage) -> Response {
    let mut builder = Response::builder().status(page.status);

    for (name, value) in page.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(page.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

fn with_outcome(mut response: Response, outcome: PageOutcome) -> Response {
    response.headers_mut().insert(
        HeaderName::from_static(CACHE_HEADER),
        HeaderValue::from_static(outcome.as_str()),
    );
    response
}
