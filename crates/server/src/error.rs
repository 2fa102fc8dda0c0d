use axum::{
    Json,
    extract::{multipart::MultipartError, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{DbErr, models::StoreError, validation::ValidationErrors};
use deployment::DeploymentError;
use serde_json::json;
use services::services::image::ImageError;
use thiserror::Error;

pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";
pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";
pub const NOT_FOUND: &str = "Not found.";
pub const INVALID_PAGE: &str = "Invalid page.";
const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Authentication credentials were not provided.")]
    NotAuthenticated,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
    #[error("Not found.")]
    NotFound,
    #[error("Invalid page.")]
    InvalidPage,
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(db_err) => ApiError::Database(db_err),
            StoreError::Validation(errors) => ApiError::Validation(errors),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

fn field_errors(errors: &ValidationErrors) -> Response {
    (StatusCode::BAD_REQUEST, Json(errors)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::Database(DbErr::RecordNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Database(_) | ApiError::Deployment(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Image(img_err) => match img_err {
                ImageError::TooLarge(_, _) => StatusCode::PAYLOAD_TOO_LARGE,
                ImageError::TooWide { .. } | ImageError::InvalidFormat => StatusCode::BAD_REQUEST,
                ImageError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Multipart(err) => err.status(),
            ApiError::NotAuthenticated | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound | ApiError::InvalidPage => StatusCode::NOT_FOUND,
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error = %self,
                "API request failed"
            );
        }

        match &self {
            ApiError::Validation(errors) => field_errors(errors),
            ApiError::BadRequest(message) => field_errors(&ValidationErrors::single(
                "non_field_errors",
                message.clone(),
            )),
            ApiError::Image(ImageError::TooLarge(size, max)) => detail(
                status_code,
                format!(
                    "Image is too large ({:.1} MB). Maximum file size is {:.1} MB.",
                    *size as f64 / 1_048_576.0,
                    *max as f64 / 1_048_576.0
                ),
            ),
            ApiError::Image(ImageError::TooWide { max, .. }) => field_errors(
                &ValidationErrors::single(
                    "image",
                    format!("Image width and height must not exceed {max}px."),
                ),
            ),
            ApiError::Image(ImageError::InvalidFormat) => {
                field_errors(&ValidationErrors::single("image", INVALID_IMAGE))
            }
            ApiError::Multipart(err) => detail(status_code, err.body_text()),
            ApiError::Database(DbErr::RecordNotFound(_))
            | ApiError::NotFound
            | ApiError::NotAuthenticated
            | ApiError::Forbidden
            | ApiError::InvalidPage => detail(status_code, self.to_string()),
            _ => detail(status_code, "A server error occurred."),
        }
    }
}
