//! Launch → open page → emulate print → navigate → settle fonts → export.

use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::application::target::RenderTarget;

use super::{
    engine::{
        BinaryLocation, BrowserEngine, BrowserPage, BrowserSession, LaunchOptions, PdfLayout,
        RenderTuning,
    },
    retry::CrashRetryPolicy,
    types::{RenderError, RenderResult, RenderStage},
};

/// A launched browser process, released exactly once.
///
/// Callers finish with [`BrowserLease::release`]; dropping an unreleased lease
/// leaves teardown to the session's own `Drop`.
pub struct BrowserLease<S: BrowserSession> {
    session: S,
    released: bool,
}

impl<S: BrowserSession> BrowserLease<S> {
    pub async fn acquire<E>(engine: &E, options: &LaunchOptions) -> Result<Self, RenderError>
    where
        E: BrowserEngine<Session = S>,
    {
        let session = engine
            .launch(options)
            .await
            .map_err(RenderError::at(RenderStage::Launching))?;
        Ok(Self {
            session,
            released: false,
        })
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub async fn release(mut self) {
        self.released = true;
        if let Err(err) = self.session.close().await {
            warn!(
                target = "application::render::pipeline",
                op = "lease::release",
                error = %err,
                "browser did not shut down cleanly"
            );
        }
    }
}

impl<S: BrowserSession> Drop for BrowserLease<S> {
    fn drop(&mut self) {
        if !self.released {
            warn!(
                target = "application::render::pipeline",
                op = "lease::drop",
                "browser lease dropped without release"
            );
        }
    }
}

pub struct RenderPipeline<E: BrowserEngine> {
    engine: E,
    disable_sandbox: bool,
    tuning: RenderTuning,
    layout: PdfLayout,
    retry: CrashRetryPolicy,
}

impl<E: BrowserEngine> RenderPipeline<E> {
    pub fn new(engine: E, tuning: RenderTuning) -> Self {
        Self {
            engine,
            disable_sandbox: true,
            tuning,
            layout: PdfLayout::default(),
            retry: CrashRetryPolicy::default(),
        }
    }

    pub fn with_sandbox(mut self, enabled: bool) -> Self {
        self.disable_sandbox = !enabled;
        self
    }

    pub fn with_layout(mut self, layout: PdfLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_retry(mut self, retry: CrashRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn tuning(&self) -> &RenderTuning {
        &self.tuning
    }

    /// Render `target` in a fresh browser process that is torn down on every path.
    pub async fn render(
        &self,
        target: &RenderTarget,
        executable: BinaryLocation,
    ) -> Result<RenderResult, RenderError> {
        let options = LaunchOptions {
            executable,
            disable_sandbox: self.disable_sandbox,
            request_timeout: self.tuning.navigation_timeout,
        };

        let started_at = Instant::now();
        let lease = BrowserLease::acquire(&self.engine, &options).await?;
        debug!(
            target = "application::render::pipeline",
            op = "pipeline::launch",
            executable = %options.executable.path.display(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "browser launched"
        );

        let session = lease.session();
        let outcome = self
            .retry
            .run(|attempt| self.render_on_fresh_page(session, target, attempt))
            .await;
        lease.release().await;

        outcome
    }

    async fn render_on_fresh_page(
        &self,
        session: &E::Session,
        target: &RenderTarget,
        attempt: u32,
    ) -> Result<RenderResult, RenderError> {
        let page = session
            .new_page()
            .await
            .map_err(RenderError::at(RenderStage::PageOpening))?;

        let outcome = self.drive_page(&page, target, attempt).await;

        if let Err(err) = page.close().await {
            debug!(
                target = "application::render::pipeline",
                op = "pipeline::close_page",
                attempt,
                error = %err,
                "page close failed"
            );
        }

        outcome
    }

    async fn drive_page(
        &self,
        page: &<E::Session as BrowserSession>::Page,
        target: &RenderTarget,
        attempt: u32,
    ) -> Result<RenderResult, RenderError> {
        let url = target.url();

        // Print media must be active before the first byte of the document loads.
        page.emulate_print_media()
            .await
            .map_err(RenderError::at(RenderStage::MediaEmulating))?;

        let nav_started = Instant::now();
        let bound = self.tuning.navigation_timeout;
        timeout(bound, page.navigate(url, self.tuning.network_idle))
            .await
            .map_err(|_| timed_out(RenderStage::Navigating, bound))?
            .map_err(RenderError::at(RenderStage::Navigating))?;
        debug!(
            target = "application::render::pipeline",
            op = "pipeline::navigate",
            url,
            attempt,
            elapsed_ms = nav_started.elapsed().as_millis() as u64,
            "page loaded and network idle"
        );

        timeout(bound, page.fonts_ready())
            .await
            .map_err(|_| timed_out(RenderStage::FontSettling, bound))?
            .map_err(RenderError::at(RenderStage::FontSettling))?;
        sleep(self.tuning.font_settle).await;

        let bytes = page
            .print_to_pdf(&self.layout)
            .await
            .map_err(RenderError::at(RenderStage::Exporting))?;
        let result = RenderResult::new(bytes, url)?;

        info!(
            target = "application::render::pipeline",
            op = "pipeline::export",
            url,
            attempt,
            pdf_bytes = result.byte_length(),
            "PDF exported"
        );
        Ok(result)
    }
}

fn timed_out(stage: RenderStage, after: Duration) -> RenderError {
    RenderError::Timeout { stage, after }
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::fakes::{FakeEngine, PageScript};
    use super::*;
    use crate::{
        application::{render::types::FailureKind, target::resolve_target},
        domain::document::{DocumentSpec, Language, RenderRequest},
    };

    fn target() -> RenderTarget {
        resolve_target(
            "http://127.0.0.1:4173",
            &RenderRequest::new(DocumentSpec::antares_business_model(), Language::En),
        )
        .expect("target")
    }

    fn fast_tuning() -> RenderTuning {
        RenderTuning {
            navigation_timeout: Duration::from_millis(200),
            font_settle: Duration::ZERO,
            ..RenderTuning::default()
        }
    }

    fn crash(step: &'static str) -> PageScript {
        PageScript::FailAt(step, "Protocol error (Page.printToPDF): Target closed.".into())
    }

    #[tokio::test]
    async fn steps_run_in_order_and_browser_is_released() {
        let engine = FakeEngine::scripted([PageScript::Pdf(b"%PDF-1.7 body".to_vec())]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let result = pipeline
            .render(&target(), BinaryLocation::new("/opt/chromium/chromium"))
            .await
            .expect("render");
        assert_eq!(result.bytes().as_ref(), b"%PDF-1.7 body");

        let journal = engine.journal();
        assert_eq!(
            journal.steps,
            vec![
                "emulate".to_string(),
                "navigate".to_string(),
                "url:http://127.0.0.1:4173/business-model/antares?print=1&lang=en".to_string(),
                "fonts".to_string(),
                "export".to_string(),
                "close_page".to_string(),
            ]
        );
        assert_eq!((journal.launches, journal.closes), (1, 1));
        assert_eq!(journal.last_layout, Some(PdfLayout::A4_FULL_BLEED));
        let options = journal.last_options.as_ref().expect("launch options");
        assert!(options.disable_sandbox);
        assert_eq!(options.request_timeout, Duration::from_millis(200));
    }

    #[tokio::test]
    async fn crash_during_export_retries_on_fresh_page_in_same_process() {
        let engine = FakeEngine::scripted([
            crash("export"),
            PageScript::Pdf(b"%PDF-1.7 second".to_vec()),
        ]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let result = pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect("retry succeeds");
        assert_eq!(result.bytes().as_ref(), b"%PDF-1.7 second");

        let journal = engine.journal();
        assert_eq!(journal.launches, 1);
        assert_eq!(journal.pages, 2);
        assert_eq!(journal.closes, 1);
    }

    #[tokio::test]
    async fn second_crash_surfaces_without_third_attempt() {
        let engine =
            FakeEngine::scripted([crash("export"), crash("export"), PageScript::Pdf(vec![1])]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let err = pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect_err("second crash propagates");
        assert_eq!(err.kind(), FailureKind::BrowserCrash);

        let journal = engine.journal();
        assert_eq!((journal.launches, journal.pages, journal.closes), (1, 2, 1));
    }

    #[tokio::test]
    async fn empty_pdf_is_reported_as_failure() {
        let engine = FakeEngine::scripted([PageScript::Pdf(Vec::new())]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let err = pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect_err("empty output");
        assert_eq!(err.kind(), FailureKind::EmptyOutput);
        assert_eq!(engine.journal().pages, 1);
        assert_eq!(engine.journal().closes, 1);
    }

    #[tokio::test]
    async fn navigation_timeout_is_a_failure_not_a_hang() {
        let engine = FakeEngine::scripted([PageScript::HangNavigation]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let err = pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            RenderError::Timeout {
                stage: RenderStage::Navigating,
                ..
            }
        ));
        assert_eq!(engine.journal().closes, 1);
    }

    #[tokio::test]
    async fn launch_failure_is_not_retried() {
        let engine = FakeEngine::failing_launch("Target closed");
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning());

        let err = pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect_err("launch fails");
        assert!(matches!(
            err,
            RenderError::Stage {
                stage: RenderStage::Launching,
                ..
            }
        ));
        let journal = engine.journal();
        assert_eq!((journal.launches, journal.pages, journal.closes), (1, 0, 0));
    }

    #[tokio::test]
    async fn sandbox_can_be_kept_on() {
        let engine = FakeEngine::scripted([]);
        let pipeline = RenderPipeline::new(engine.clone(), fast_tuning()).with_sandbox(true);
        pipeline
            .render(&target(), BinaryLocation::new("chromium"))
            .await
            .expect("render");
        let journal = engine.journal();
        assert!(!journal.last_options.as_ref().expect("options").disable_sandbox);
    }
}
