use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("not signed in")]
    NotAuthenticated,

    /// Message reported by the authentication service, safe to show as-is.
    #[error("{0}")]
    Auth(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("remote service returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<jiff::Error> for AppError {
    fn from(err: jiff::Error) -> Self {
        Self::Other(anyhow::Error::new(err))
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Remote { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Db(_) | AppError::Json(_) | AppError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Text that may reach an end user. Internal failures collapse to a
    /// generic line; the detail only goes to the log.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Validation(_) | AppError::Auth(_) | AppError::NotFound(_) => self.to_string(),
            AppError::NotAuthenticated => "Please sign in to continue".to_string(),
            _ => "Something went wrong".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
