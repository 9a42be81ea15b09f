use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::error::AnalysisError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl AnalysisError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Input(_) => StatusCode::BAD_REQUEST,
            Self::Staging(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::RemoteCall(_) => StatusCode::BAD_GATEWAY,
            Self::Normalization(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Client-facing text; remote and local failure details stay in the log
    fn public_message(&self) -> String {
        match self {
            Self::Input(_) => "Missing required fields".to_string(),
            Self::Normalization(e) => e.to_string(),
            Self::Staging(_) | Self::RemoteCall(_) => {
                "An error occurred during analysis.".to_string()
            }
        }
    }
}

impl IntoResponse for AnalysisError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.code(),
            message: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
