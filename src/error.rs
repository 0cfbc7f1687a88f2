use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::env;
use std::fmt::Debug;

/// Codes 1..=99 are internal failures, 100 and above are caller errors.
#[derive(Debug)]
pub struct Error {
    pub code: i32,
    pub message: String,
}

impl From<env::VarError> for Error {
    fn from(err: env::VarError) -> Self {
        env_var_error(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // a writer that could not take the ride row lock within lock_timeout
        // surfaces as a retryable conflict, not an internal failure
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.code().as_deref() == Some("55P03") {
                return conflict_error();
            }
        }

        database_error(err)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        reqwest_error(err)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_message) = match self.code {
            1..=99 => (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error"),
            100 => (StatusCode::UNPROCESSABLE_ENTITY, self.message.as_str()),
            102 => (StatusCode::FORBIDDEN, self.message.as_str()),
            104 => (StatusCode::NOT_FOUND, self.message.as_str()),
            105 => (StatusCode::CONFLICT, self.message.as_str()),
            106 => (StatusCode::SERVICE_UNAVAILABLE, self.message.as_str()),
            _ => (StatusCode::BAD_REQUEST, self.message.as_str()),
        };

        let body = Json(json!({
            "code": self.code,
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

pub fn invalid_state_error() -> Error {
    Error {
        code: 100,
        message: "invalid state".into(),
    }
}

pub fn validation_error(message: impl Into<String>) -> Error {
    Error {
        code: 101,
        message: message.into(),
    }
}

pub fn unauthorized_error() -> Error {
    Error {
        code: 102,
        message: "unauthorized".into(),
    }
}

pub fn not_found_error() -> Error {
    Error {
        code: 104,
        message: "not found".into(),
    }
}

pub fn capacity_exceeded_error() -> Error {
    Error {
        code: 105,
        message: "not enough seats available".into(),
    }
}

pub fn conflict_error() -> Error {
    Error {
        code: 106,
        message: "concurrent mutation in progress, retry".into(),
    }
}

pub fn env_var_error(_: env::VarError) -> Error {
    Error {
        code: 1,
        message: "environment variable error".into(),
    }
}

pub fn database_error<T: Debug>(_: T) -> Error {
    Error {
        code: 2,
        message: "database error".into(),
    }
}

pub fn reqwest_error(_: reqwest::Error) -> Error {
    Error {
        code: 3,
        message: "reqwest error".into(),
    }
}

pub fn upstream_error() -> Error {
    Error {
        code: 4,
        message: "upstream error".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: Error) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn each_kind_maps_to_a_distinct_status() {
        assert_eq!(
            status_of(invalid_state_error()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(status_of(validation_error("bad")), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(unauthorized_error()), StatusCode::FORBIDDEN);
        assert_eq!(status_of(not_found_error()), StatusCode::NOT_FOUND);
        assert_eq!(status_of(capacity_exceeded_error()), StatusCode::CONFLICT);
        assert_eq!(
            status_of(conflict_error()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_codes_never_leak_details() {
        assert_eq!(
            status_of(database_error("boom")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status_of(upstream_error()), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
