use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::IntoResponse,
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "web/dist"]
pub struct Assets;

/// Resolves a request path to an embedded file. Extensionless paths are page
/// routes (`/`, `/login`) and get the single page.
pub fn asset_path(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    if path.is_empty() || !path.contains('.') {
        "index.html"
    } else {
        path
    }
}

pub async fn serve_embedded(req: Request<Body>) -> impl IntoResponse {
    let path = asset_path(req.uri().path());

    match Assets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            (
                [(header::CONTENT_TYPE, mime.to_string())],
                content.data.into_owned(),
            )
                .into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_path() {
        assert_eq!(asset_path("/"), "index.html");
        assert_eq!(asset_path("/login"), "index.html");
        assert_eq!(asset_path("/app.js"), "app.js");
    }

    #[test]
    fn test_page_and_script_are_embedded() {
        assert!(Assets::get("index.html").is_some());
        assert!(Assets::get("app.js").is_some());
        assert!(Assets::get("style.css").is_some());
    }
}
