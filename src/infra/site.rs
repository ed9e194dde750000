//! Static serving of a pre-built site from disk.

use std::path::{Component, Path, PathBuf};

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use mime_guess::Mime;
use tokio::fs;
use tracing::debug;

use crate::application::error::ErrorReport;

pub const INDEX_DOCUMENT: &str = "index.html";

/// A built site rooted at a directory.
///
/// With `spa_fallback` set, any path that does not name an existing file is
/// answered with the root document so client-side routes stay reachable.
#[derive(Debug, Clone)]
pub struct StaticSite {
    root: PathBuf,
    spa_fallback: bool,
}

impl StaticSite {
    pub fn new(root: impl Into<PathBuf>, spa_fallback: bool) -> Self {
        Self {
            root: root.into(),
            spa_fallback,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File that answers `request_path`, if any.
    pub async fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        if let Some(relative) = sanitize(request_path) {
            let candidate = self.root.join(&relative);
            if is_file(&candidate).await {
                return Some(candidate);
            }
            let nested_index = candidate.join(INDEX_DOCUMENT);
            if is_file(&nested_index).await {
                return Some(nested_index);
            }
        }

        if self.spa_fallback {
            let index = self.root.join(INDEX_DOCUMENT);
            if is_file(&index).await {
                return Some(index);
            }
        }
        None
    }

    pub async fn serve(&self, uri: &Uri) -> Response {
        let Some(path) = self.resolve(uri.path()).await else {
            return not_found("infra::site::serve", "no file for request path");
        };

        match fs::read(&path).await {
            Ok(contents) => {
                let mime = mime_guess::from_path(&path).first_or_octet_stream();
                file_response(Bytes::from(contents), &mime)
            }
            Err(err) => {
                debug!(
                    target = "infra::site",
                    path = %path.display(),
                    error = %err,
                    "resolved file became unreadable"
                );
                not_found("infra::site::serve", err.to_string())
            }
        }
    }
}

/// Relative path inside the site root; `None` when the path tries to escape it.
fn sanitize(request_path: &str) -> Option<PathBuf> {
    let trimmed = request_path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Some(PathBuf::from(INDEX_DOCUMENT));
    }
    let relative = Path::new(trimmed);
    let safe = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
    safe.then(|| relative.to_path_buf())
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

fn file_response(bytes: Bytes, mime: &Mime) -> Response {
    let len = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    response
}

/// Plain-text 404.
pub fn not_found(source: &'static str, detail: impl Into<String>) -> Response {
    let mut response = (StatusCode::NOT_FOUND, "Not Found").into_response();
    ErrorReport::from_message(source, StatusCode::NOT_FOUND, detail).attach(&mut response);
    response
}
