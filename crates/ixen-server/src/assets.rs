//! Embedded dashboard UI

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "frontend/"]
struct Asset;

fn asset_response(path: &str, data: Vec<u8>) -> Response {
    let mime = mime_guess::from_path(path).first_or_octet_stream().to_string();
    (
        [
            (header::CONTENT_TYPE, mime),
            (header::CACHE_CONTROL, "no-cache".to_string()),
        ],
        data,
    )
        .into_response()
}

/// Fallback handler serving embedded files, with `index.html` for page routes
pub async fn static_handler(req: Request<Body>) -> Response {
    let path = req.uri().path().trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    if let Some(content) = Asset::get(path) {
        return asset_response(path, content.data.to_vec());
    }

    if !path.contains('.') && !path.starts_with("api/") {
        if let Some(content) = Asset::get("index.html") {
            return asset_response("index.html", content.data.to_vec());
        }
    }

    (StatusCode::NOT_FOUND, "Not found").into_response()
}
