use axum::extract::FromRequest;

use crate::error::ApiError;

/// `axum::Json` whose rejections render as `non_field_errors`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);
