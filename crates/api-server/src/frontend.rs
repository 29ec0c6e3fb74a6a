//! Single-page demo served at `/`

use axum::response::Html;

const INDEX_HTML: &str = include_str!("../static/index.html");

/// Upload form that calls `/api/v1/extract` from the browser
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_targets_extract_endpoint() {
        assert!(INDEX_HTML.contains("/api/v1/extract"));
        assert!(INDEX_HTML.contains("X-API-Key"));
    }
}
