use axum::{extract::Path, http::StatusCode, response::Response};

use crate::{
    error::Result,
    handlers::respond::json,
    validation::sharing::{normalize_share_code, validate_share_code},
};

/// Keystroke validation for the share code field.
#[axum::debug_handler]
pub async fn share_code(Path(code): Path<String>) -> Result<Response> {
    json(StatusCode::OK, &validate_share_code(&normalize_share_code(&code)))
}
