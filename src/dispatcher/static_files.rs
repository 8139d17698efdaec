use std::path::{Component, Path, PathBuf};

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Method, Request};
use axum::response::Response;
use percent_encoding::percent_decode_str;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// A directory served under a URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticAssets {
    pub dir: PathBuf,
    pub prefix: String,
}

impl StaticAssets {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix.starts_with('/') { prefix } else { format!("/{}", prefix) };
        Self { dir: dir.into(), prefix }
    }

    /// The path below the prefix, or `None` if `path` is outside it.
    fn relative<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.prefix.trim_end_matches('/'))?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest.trim_start_matches('/'))
        } else {
            None
        }
    }

    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let relative = self.relative(path)?;
        let decoded = percent_decode_str(relative).decode_utf8().ok()?;
        let relative = Path::new(decoded.as_ref());
        if decoded.is_empty() || relative.components().any(|c| !matches!(c, Component::Normal(_))) {
            return None;
        }
        Some(self.dir.join(relative))
    }
}

/// Serves the request from the longest matching prefix, if the file exists.
///
/// `assets` must be sorted longest prefix first.
pub(crate) async fn serve(assets: &[StaticAssets], parts: &Parts) -> Option<Response> {
    if !matches!(parts.method, Method::GET | Method::HEAD) {
        return None;
    }
    let path = parts.uri.path();
    let config = assets.iter().find(|config| config.relative(path).is_some())?;
    let file = config.file_for(path)?;
    if !tokio::fs::metadata(&file).await.is_ok_and(|meta| meta.is_file()) {
        return None;
    }

    let mut file_request = Request::new(Body::empty());
    *file_request.method_mut() = parts.method.clone();
    *file_request.uri_mut() = parts.uri.clone();
    *file_request.headers_mut() = parts.headers.clone();

    match ServeFile::new(&file).oneshot(file_request).await {
        Ok(response) => Some(response.map(Body::new)),
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_paths_below_the_prefix() {
        let assets = StaticAssets::new("/srv/public", "/static");
        assert_eq!(
            assets.file_for("/static/css/app.css"),
            Some(PathBuf::from("/srv/public/css/app.css"))
        );
        assert_eq!(assets.file_for("/staticfile"), None);
        assert_eq!(assets.file_for("/static"), None);
        assert_eq!(assets.file_for("/static/../secret"), None);
        assert_eq!(assets.file_for("/static/%2e%2e/secret"), None);
    }

    #[test]
    fn prefix_gets_a_leading_slash() {
        assert_eq!(StaticAssets::new("public", "assets").prefix, "/assets");
    }
}
