//! Global error envelope.

use axum::{
    Json,
    extract::Request,
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ErrorBody;

/// Stamps the request path onto every [`ErrorBody`] response.
///
/// Errors are rendered wherever they occur (middleware, extractors,
/// handlers); this is the single place that completes the body.
pub async fn error_envelope(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_owned();
    let response = next.run(request).await;

    let Some(body) = response.extensions().get::<ErrorBody>().cloned() else {
        return response;
    };
    let body = ErrorBody {
        path: Some(path),
        ..body
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.extensions.insert(body.clone());
    Response::from_parts(parts, Json(body).into_response().into_body())
}
