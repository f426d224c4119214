/// Request extractors
///
/// [`ApiJson`] is `axum::Json` with rejections routed through [`ApiError`],
/// so malformed bodies and unknown fields get the same JSON error format as
/// every other failure.

use axum::extract::FromRequest;

use crate::error::ApiError;

/// JSON body extractor
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

