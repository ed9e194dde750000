use std::{fmt, path::PathBuf, time::Duration};

use bytes::Bytes;
use thiserror::Error;

use crate::{application::error::ConfigurationError, domain::error::DomainError};

/// Failure-message fragment Chromium reports when a page or tab is torn down mid-command.
pub const TARGET_CLOSED_SIGNATURE: &str = "target closed";

/// Steps of one render, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStage {
    Launching,
    PageOpening,
    MediaEmulating,
    Navigating,
    FontSettling,
    Exporting,
}

impl RenderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStage::Launching => "launching",
            RenderStage::PageOpening => "page_opening",
            RenderStage::MediaEmulating => "media_emulating",
            RenderStage::Navigating => "navigating",
            RenderStage::FontSettling => "font_settling",
            RenderStage::Exporting => "exporting",
        }
    }
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-empty PDF. Construction fails for zero-length output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderResult {
    bytes: Bytes,
}

impl RenderResult {
    pub fn new(bytes: impl Into<Bytes>, url: &str) -> Result<Self, RenderError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(RenderError::EmptyOutput {
                url: url.to_string(),
            });
        }
        Ok(Self { bytes })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// All-or-nothing outcome of a render.
pub type RenderOutcome = Result<RenderResult, RenderError>;

/// Error surfaced by a browser engine adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct EngineError {
    message: String,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_target_closed(&self) -> bool {
        self.message
            .to_ascii_lowercase()
            .contains(TARGET_CLOSED_SIGNATURE)
    }
}

/// Stable classification exposed to callers in error envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    NotFound,
    Navigation,
    Timeout,
    BrowserCrash,
    Browser,
    EmptyOutput,
    Io,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::NotFound => "not_found",
            FailureKind::Navigation => "navigation",
            FailureKind::Timeout => "timeout",
            FailureKind::BrowserCrash => "browser_crash",
            FailureKind::Browser => "browser",
            FailureKind::EmptyOutput => "empty_output",
            FailureKind::Io => "io",
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Document(#[from] DomainError),
    #[error("{stage} step failed: {error}")]
    Stage {
        stage: RenderStage,
        error: EngineError,
    },
    #[error("{stage} step timed out after {}ms", .after.as_millis())]
    Timeout { stage: RenderStage, after: Duration },
    #[error("browser produced an empty PDF for {url}")]
    EmptyOutput { url: String },
    #[error("failed to write PDF to {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl RenderError {
    pub fn stage(stage: RenderStage, error: EngineError) -> Self {
        Self::Stage { stage, error }
    }

    /// Closure for `map_err` at a given step.
    pub fn at(stage: RenderStage) -> impl FnOnce(EngineError) -> Self {
        move |error| Self::Stage { stage, error }
    }

    /// Step the render was in when it failed, when known.
    pub fn failed_stage(&self) -> Option<RenderStage> {
        match self {
            RenderError::Stage { stage, .. } | RenderError::Timeout { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The single transient condition worth a retry: the tab died under us.
    pub fn is_target_closed(&self) -> bool {
        match self {
            RenderError::Stage { stage, error } => {
                *stage != RenderStage::Launching && error.is_target_closed()
            }
            _ => false,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            RenderError::Configuration(_) => FailureKind::Configuration,
            RenderError::Document(DomainError::UnknownDocument { .. }) => FailureKind::NotFound,
            RenderError::Document(DomainError::InvalidDocument { .. }) => {
                FailureKind::Configuration
            }
            err @ RenderError::Stage { .. } if err.is_target_closed() => FailureKind::BrowserCrash,
            RenderError::Stage {
                stage: RenderStage::Navigating,
                ..
            } => FailureKind::Navigation,
            RenderError::Stage { .. } => FailureKind::Browser,
            RenderError::Timeout { .. } => FailureKind::Timeout,
            RenderError::EmptyOutput { .. } => FailureKind::EmptyOutput,
            RenderError::Write { .. } => FailureKind::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_output_is_a_failure() {
        let err = RenderResult::new(Vec::new(), "http://x/doc").expect_err("empty");
        assert_eq!(err.kind(), FailureKind::EmptyOutput);
        let ok = RenderResult::new(b"%PDF-1.7".to_vec(), "http://x/doc").expect("pdf");
        assert_eq!(ok.byte_length(), 8);
    }

    #[test]
    fn target_closed_is_matched_by_message() {
        let crash = RenderError::stage(
            RenderStage::Exporting,
            EngineError::new("Protocol error (Page.printToPDF): Target closed."),
        );
        assert!(crash.is_target_closed());
        assert_eq!(crash.kind(), FailureKind::BrowserCrash);

        let other = RenderError::stage(RenderStage::Exporting, EngineError::new("boom"));
        assert!(!other.is_target_closed());
        assert_eq!(other.kind(), FailureKind::Browser);

        let launch = RenderError::stage(RenderStage::Launching, EngineError::new("Target closed"));
        assert!(!launch.is_target_closed());
    }

    #[test]
    fn navigation_failures_and_timeouts_are_classified() {
        let nav = RenderError::stage(RenderStage::Navigating, EngineError::new("net::ERR_FAILED"));
        assert_eq!(nav.kind(), FailureKind::Navigation);
        let timeout = RenderError::Timeout {
            stage: RenderStage::Navigating,
            after: Duration::from_secs(120),
        };
        assert_eq!(timeout.kind(), FailureKind::Timeout);
        assert_eq!(timeout.to_string(), "navigating step timed out after 120000ms");
    }
}
