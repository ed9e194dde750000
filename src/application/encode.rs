//! Packs a rendered PDF, or a render failure, into each caller's transport.

use std::{collections::BTreeMap, path::Path, path::PathBuf};

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::application::{
    error::{ErrorReport, error_chain},
    render::{FailureKind, RenderError, RenderResult},
};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A PDF with its download name.
#[derive(Debug, Clone)]
pub struct PdfAttachment {
    filename: String,
    bytes: Bytes,
}

impl PdfAttachment {
    pub fn new(filename: impl Into<String>, result: RenderResult) -> Self {
        Self {
            filename: filename.into(),
            bytes: result.into_bytes(),
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }

    /// Function-host envelope: the body travels base64-encoded.
    pub fn into_function_response(self) -> FunctionResponse {
        let mut headers = BTreeMap::new();
        headers.insert(
            header::CONTENT_TYPE.as_str().to_string(),
            PDF_CONTENT_TYPE.to_string(),
        );
        headers.insert(
            header::CONTENT_DISPOSITION.as_str().to_string(),
            self.content_disposition(),
        );
        headers.insert(
            header::CONTENT_LENGTH.as_str().to_string(),
            self.bytes.len().to_string(),
        );
        FunctionResponse {
            status_code: StatusCode::OK.as_u16(),
            headers,
            body: BASE64.encode(&self.bytes),
            is_base64_encoded: true,
        }
    }

    /// Batch variant: `<dir>/<filename>`, parent directories created on demand.
    pub async fn write_to(&self, directory: &Path) -> Result<PathBuf, RenderError> {
        let path = directory.join(&self.filename);
        let write_error = |source| RenderError::Write {
            path: path.clone(),
            source,
        };
        fs::create_dir_all(directory).await.map_err(write_error)?;
        fs::write(&path, &self.bytes).await.map_err(write_error)?;
        Ok(path)
    }
}

/// Server variant: raw bytes as the body.
impl IntoResponse for PdfAttachment {
    fn into_response(self) -> Response {
        let disposition = self.content_disposition();
        let length = self.bytes.len();
        let mut response = (StatusCode::OK, self.bytes).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PDF_CONTENT_TYPE),
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        response
    }
}

/// Response shape expected by the function host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl FunctionResponse {
    pub fn failure(error: &RenderError) -> Self {
        let envelope = FailureEnvelope::from_error(error);
        let status = envelope.status();
        let body = serde_json::to_string(&envelope).unwrap_or_else(|_| {
            format!(r#"{{"error":"{}"}}"#, envelope.error)
        });
        let mut headers = BTreeMap::new();
        headers.insert(
            header::CONTENT_TYPE.as_str().to_string(),
            "application/json".to_string(),
        );
        Self {
            status_code: status.as_u16(),
            headers,
            body,
            is_base64_encoded: false,
        }
    }
}

/// Safe error payload: kind, message and, when the error has causes, the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl FailureEnvelope {
    pub fn from_error(error: &RenderError) -> Self {
        let chain = error_chain(error);
        let stack = (chain.len() > 1).then(|| chain.join("\n  caused by: "));
        Self {
            error: error.kind().as_str().to_string(),
            message: error.to_string(),
            stack,
        }
    }

    pub fn status(&self) -> StatusCode {
        if self.error == FailureKind::NotFound.as_str() {
            StatusCode::NOT_FOUND
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Server failure: JSON envelope plus an [`ErrorReport`] for the response logger.
pub fn failure_response(source: &'static str, error: &RenderError) -> Response {
    let envelope = FailureEnvelope::from_error(error);
    let status = envelope.status();
    let mut response = (status, Json(envelope)).into_response();
    ErrorReport::from_error(source, status, error).attach(&mut response);
    response
}
