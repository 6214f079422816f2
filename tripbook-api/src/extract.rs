//! Extractors whose rejections use the `{"error": ...}` body of `AppError`.

use axum::extract::FromRequestParts;

use crate::error::AppError;

/// `axum::extract::Path` that rejects with a JSON 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// `axum::extract::Query` that rejects with a JSON 400.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);
