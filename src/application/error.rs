use std::{error::Error as StdError, path::PathBuf};

use axum::{http::StatusCode, response::Response};
use thiserror::Error;

use crate::{
    application::render::RenderError, config::LoadError, domain::error::DomainError,
    infra::batch::BatchError, infra::error::InfraError,
};

/// Diagnostic attached to failing responses so the logging middleware can
/// report the full error chain without exposing it to the client.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            source,
            status,
            messages: error_chain(error),
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Display strings of an error followed by each of its sources.
pub fn error_chain(error: &dyn StdError) -> Vec<String> {
    let mut messages = vec![error.to_string()];
    let mut current = error.source();
    while let Some(inner) = current {
        messages.push(inner.to_string());
        current = inner.source();
    }
    messages
}

/// Deployment problems that no retry can fix.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error(
        "no origin configured: set PDF_BASE_URL (or origin.override), or deploy where DEPLOY_PRIME_URL/URL are provided"
    )]
    MissingOrigin,
    #[error("origin `{origin}` is not a valid absolute URL: {reason}")]
    InvalidOrigin { origin: String, reason: String },
    #[error("no browser installation found; searched: {}", display_paths(.searched))]
    BrowserNotFound { searched: Vec<PathBuf> },
    #[error("browser directory `{}` contains no usable executable", .directory.display())]
    ExecutableNotFound { directory: PathBuf },
    #[error("configured browser executable `{}` is missing or not executable", .path.display())]
    ExplicitExecutableMissing { path: PathBuf },
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] LoadError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
