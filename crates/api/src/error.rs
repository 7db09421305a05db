//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fulfillment::{ErrorKind, FulfillmentError};

/// API-level error type that maps to HTTP responses.
///
/// Every error is rendered as `{"error": "<message>"}`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: bad path parameter, body or header.
    BadRequest(String),
    /// No caller identity on a request that needs one.
    Unauthorized(String),
    NotFound(String),
    /// Error raised by a fulfillment service.
    Fulfillment(FulfillmentError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Fulfillment(err) => status_for(err.kind()),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        metrics::counter!("http_errors_total", "status" => status.as_u16().to_string()).increment(1);
        let message = match self {
            ApiError::BadRequest(msg) | ApiError::Unauthorized(msg) | ApiError::NotFound(msg) => msg,
            ApiError::Fulfillment(err) => {
                if status.is_server_error() {
                    tracing::error!(error = %err, status = status.as_u16(), "request failed");
                }
                err.to_string()
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

impl From<FulfillmentError> for ApiError {
    fn from(err: FulfillmentError) -> Self {
        ApiError::Fulfillment(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::VariantId;

    #[test]
    fn maps_taxonomy_to_status_codes() {
        let cases = [
            (FulfillmentError::NotFound("Order"), StatusCode::NOT_FOUND),
            (FulfillmentError::EmptyCart, StatusCode::BAD_REQUEST),
            (
                FulfillmentError::OutOfStock {
                    variant_id: VariantId::new(10),
                },
                StatusCode::CONFLICT,
            ),
            (FulfillmentError::forbidden("no"), StatusCode::FORBIDDEN),
            (
                FulfillmentError::UpstreamUnavailable {
                    service: "catalog",
                    message: "refused".into(),
                    timed_out: false,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (
                FulfillmentError::UpstreamUnavailable {
                    service: "catalog",
                    message: "slow".into(),
                    timed_out: true,
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                FulfillmentError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }
}
