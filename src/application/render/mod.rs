//! Page-to-PDF rendering core.
//!
//! [`RenderPipeline`] drives one browser process through the render steps,
//! [`CrashRetryPolicy`] wraps the page-level part of it, and [`PdfService`]
//! binds both to origin, target and binary resolution behind the
//! [`DocumentRenderer`] trait the hosting adapters use.

mod engine;
mod pipeline;
mod retry;
mod service;
mod types;

pub use engine::{
    A4_HEIGHT_IN, A4_WIDTH_IN, BinaryLocation, BrowserEngine, BrowserPage, BrowserSession,
    LaunchOptions, NetworkIdle, PdfLayout, RenderTuning,
};
pub use pipeline::{BrowserLease, RenderPipeline};
pub use retry::CrashRetryPolicy;
pub use service::{DocumentRenderer, PdfService};
pub use types::{
    EngineError, FailureKind, RenderError, RenderOutcome, RenderResult, RenderStage,
    TARGET_CLOSED_SIGNATURE,
};
