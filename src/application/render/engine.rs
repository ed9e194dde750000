//! Browser engine seam.
//!
//! The pipeline only talks to these traits; `infra::browser::chromium` is the
//! production implementation, tests drive scripted fakes.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use super::types::EngineError;

pub const A4_WIDTH_IN: f64 = 8.27;
pub const A4_HEIGHT_IN: f64 = 11.69;

/// Executable resolved for one invocation. Never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryLocation {
    pub path: PathBuf,
}

impl BinaryLocation {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub executable: BinaryLocation,
    /// Disable the Chromium sandbox where the host offers none (containers, functions).
    pub disable_sandbox: bool,
    /// Upper bound for any single DevTools request, navigation included.
    pub request_timeout: Duration,
}

/// Readiness heuristic: at most `max_inflight` requests for a trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdle {
    pub max_inflight: usize,
    pub window: Duration,
}

/// Timing knobs. Engine-specific workarounds, so configurable rather than fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTuning {
    pub navigation_timeout: Duration,
    pub network_idle: NetworkIdle,
    pub font_settle: Duration,
}

impl Default for RenderTuning {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(120),
            network_idle: NetworkIdle {
                max_inflight: 2,
                window: Duration::from_millis(500),
            },
            font_settle: Duration::from_millis(300),
        }
    }
}

/// PDF export parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfLayout {
    pub paper_width_in: f64,
    pub paper_height_in: f64,
    pub print_background: bool,
    pub prefer_css_page_size: bool,
    pub margin_in: f64,
}

impl PdfLayout {
    /// A4, backgrounds on, CSS `@page` size honoured, no engine margins.
    pub const A4_FULL_BLEED: PdfLayout = PdfLayout {
        paper_width_in: A4_WIDTH_IN,
        paper_height_in: A4_HEIGHT_IN,
        print_background: true,
        prefer_css_page_size: true,
        margin_in: 0.0,
    };
}

impl Default for PdfLayout {
    fn default() -> Self {
        Self::A4_FULL_BLEED
    }
}

#[async_trait]
pub trait BrowserEngine: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<Self::Session, EngineError>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    type Page: BrowserPage;

    async fn new_page(&self) -> Result<Self::Page, EngineError>;

    /// Shut the process down. Called exactly once per session.
    async fn close(&mut self) -> Result<(), EngineError>;
}

/// One tab inside a session.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    async fn emulate_print_media(&self) -> Result<(), EngineError>;

    /// Navigate and return once both the load event fired and the network went idle.
    async fn navigate(&self, url: &str, idle: NetworkIdle) -> Result<(), EngineError>;

    /// Await the document's font loading signal, when it has one.
    async fn fonts_ready(&self) -> Result<(), EngineError>;

    async fn print_to_pdf(&self, layout: &PdfLayout) -> Result<Vec<u8>, EngineError>;

    async fn close(&self) -> Result<(), EngineError>;
}
