use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snafu::{Location, Snafu};

use crate::auth::AuthError;
use crate::database::DatabaseQueryError;
use crate::model::InvalidSetting;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("{message}"))]
    Validation {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{source}"))]
    Setting {
        source: InvalidSetting,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{resource} not found"))]
    NotFound {
        resource: &'static str,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{message}"))]
    Conflict {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{message}"))]
    Unauthorized {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{source}"))]
    Token {
        source: AuthError,
        #[snafu(implicit)]
        location: Location,
    },

    #[snafu(display("{message}"))]
    Forbidden {
        message: String,
        #[snafu(implicit)]
        location: Location,
    },

    /// Store failures. The cause is logged, clients only see a generic message.
    #[snafu(display("storage failure: {source}"))]
    Storage {
        source: DatabaseQueryError,
        #[snafu(implicit)]
        location: Location,
    },
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    msg: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::Setting { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Token { source, .. } => match source {
                AuthError::Encode { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::UNAUTHORIZED,
            },
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "validation",
            StatusCode::NOT_FOUND => "not_found",
            StatusCode::CONFLICT => "conflict",
            StatusCode::UNAUTHORIZED => "unauthorized",
            StatusCode::FORBIDDEN => "forbidden",
            _ => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let msg = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "server error".to_string()
        } else {
            tracing::debug!(error = %self, "request rejected");
            self.to_string()
        };

        let body = ErrorBody {
            error: self.kind(),
            msg,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use snafu::IntoError as _;

    use super::*;

    #[test]
    fn storage_errors_hide_their_cause() {
        let error = StorageSnafu.into_error(crate::database::query::NoResultsSnafu.build());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn statuses() {
        assert_eq!(
            ValidationSnafu { message: "title is required" }.build().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(NotFoundSnafu { resource: "video" }.build().status(), StatusCode::NOT_FOUND);
        assert_eq!(NotFoundSnafu { resource: "video" }.build().to_string(), "video not found");
        assert_eq!(
            ConflictSnafu { message: "tag already exists" }.build().status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            TokenSnafu
                .into_error(crate::auth::MalformedHeaderSnafu.build())
                .status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
