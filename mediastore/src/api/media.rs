use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};

use crate::api::middleware::require_file_id;
use crate::service::media::{
    describe_handler, stream_audio_handler, stream_image_handler, upload_audio_handler,
    upload_image_handler, upload_media_handler,
};
use crate::utils::state::AppState;

pub fn create_media_router() -> Router<Arc<AppState>> {
    let by_id = Router::new()
        .route("/stream/audio/{file_id}", get(stream_audio_handler))
        .route("/stream/image/{file_id}", get(stream_image_handler))
        .route("/{file_id}", get(describe_handler))
        .route_layer(middleware::from_fn(require_file_id));

    Router::new()
        // Uploads
        .route("/upload", post(upload_media_handler))
        .route("/audio", post(upload_audio_handler))
        .route("/image", post(upload_image_handler))
        .merge(by_id)
}
