use axum::extract::rejection::BytesRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::models::{ValidationErrorDetail, ValidationErrorResponse};

#[derive(Debug)]
pub enum ApiError {
    /// Body did not match the request schema; the model was not called.
    Validation(ValidationErrorDetail),
    /// The body could not be read at all (too large, aborted upload).
    Body(BytesRejection),
    /// Anything that failed inside tokenization, the forward pass or sampling.
    Inference(anyhow::Error),
}

impl ApiError {
    /// `loc` is relative to the body; the `"body"` root is added here.
    pub fn validation(loc: Vec<String>, msg: impl Into<String>, kind: &str) -> Self {
        let mut full_loc = Vec::with_capacity(loc.len() + 1);
        full_loc.push("body".to_string());
        full_loc.extend(loc);

        ApiError::Validation(ValidationErrorDetail {
            loc: full_loc,
            msg: msg.into(),
            kind: kind.to_string(),
        })
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Inference(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(detail) => {
                tracing::debug!(loc = ?detail.loc, "rejected request body: {}", detail.msg);
                let body = ValidationErrorResponse { detail: vec![detail] };
                (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
            }
            ApiError::Body(rejection) => {
                let status = rejection.status();
                let body = ValidationErrorResponse {
                    detail: vec![ValidationErrorDetail {
                        loc: vec!["body".to_string()],
                        msg: rejection.body_text(),
                        kind: "body".to_string(),
                    }],
                };
                (status, Json(body)).into_response()
            }
            ApiError::Inference(err) => {
                tracing::error!("generation failed: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
