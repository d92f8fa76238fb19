use axum::extract::{Path, Request};
use axum::middleware::Next;
use axum::response::IntoResponse;

use crate::error::AppError;
use crate::utils::validation::parse_file_id;

/// Rejects malformed `{file_id}` path segments before any handler runs and
/// hands the parsed id on as a request extension.
pub async fn require_file_id(
    Path(raw): Path<String>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AppError> {
    let file_id = parse_file_id(&raw)?;
    req.extensions_mut().insert(file_id);
    Ok(next.run(req).await)
}
