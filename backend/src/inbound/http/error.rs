//! HTTP adapter mapping for domain errors.
//!
//! Purpose: keep the domain error type HTTP-agnostic while allowing Actix
//! handlers to turn domain failures into consistent JSON responses and status
//! codes.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use tracing::error;

use crate::domain::{Error, ErrorCode};

/// Convenient result alias for HTTP handlers.
pub type ApiResult<T> = Result<T, Error>;

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorCode::UnknownDataset => StatusCode::NOT_FOUND,
        ErrorCode::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn redact_if_internal(error: &Error) -> Error {
    if matches!(error.code(), ErrorCode::InternalError) {
        Error::internal("Internal server error")
    } else {
        error.clone()
    }
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        status_for(self.code())
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(redact_if_internal(self))
    }
}

impl From<actix_web::Error> for Error {
    fn from(err: actix_web::Error) -> Self {
        // Do not leak implementation details to clients.
        error!(error = %err, "actix error promoted to domain error");
        Error::internal("Internal server error")
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::invalid(Error::invalid_request("bad"), StatusCode::BAD_REQUEST)]
    #[case::unknown(Error::unknown_dataset("nope"), StatusCode::NOT_FOUND)]
    #[case::provider(
        Error::new(ErrorCode::ProviderUnavailable, "down"),
        StatusCode::SERVICE_UNAVAILABLE
    )]
    #[case::internal(Error::internal("boom"), StatusCode::INTERNAL_SERVER_ERROR)]
    fn maps_codes_to_statuses(#[case] error: Error, #[case] status: StatusCode) {
        assert_eq!(error.status_code(), status);
    }

    #[test]
    fn internal_details_never_reach_the_wire() {
        let redacted = redact_if_internal(&Error::internal("database password wrong"));
        assert_eq!(redacted.message(), "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_messages() {
        let kept = redact_if_internal(&Error::invalid_request("offset must not be negative"));
        assert_eq!(kept.message(), "offset must not be negative");
    }
}
