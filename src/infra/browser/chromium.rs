//! Chromium adapter over the DevTools protocol (`chromiumoxide`).

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use chromiumoxide::{
    Browser, BrowserConfig, Page,
    cdp::{
        browser_protocol::{
            emulation::SetEmulatedMediaParams,
            network::{
                EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
            },
            page::PrintToPdfParams,
        },
        js_protocol::runtime::EvaluateParams,
    },
};
use futures::StreamExt;
use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use crate::application::render::{
    BrowserEngine, BrowserPage, BrowserSession, EngineError, LaunchOptions, NetworkIdle,
    PdfLayout,
};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(50);
const FONTS_READY_SCRIPT: &str =
    "(document.fonts && document.fonts.ready) ? document.fonts.ready.then(() => true) : true";

/// Launches a headless Chromium per render.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumEngine;

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    type Session = ChromiumSession;

    async fn launch(&self, options: &LaunchOptions) -> Result<ChromiumSession, EngineError> {
        let mut builder = BrowserConfig::builder()
            .chrome_executable(&options.executable.path)
            .request_timeout(options.request_timeout)
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-extensions")
            .arg("--hide-scrollbars")
            .arg("--mute-audio");
        if options.disable_sandbox {
            builder = builder.no_sandbox();
        }
        let config = builder.build().map_err(EngineError::new)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|err| EngineError::new(format!("failed to launch browser: {err}")))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(
                        target = "infra::browser::chromium",
                        error = %err,
                        "browser handler error"
                    );
                }
            }
        });

        Ok(ChromiumSession {
            browser,
            handler_task,
        })
    }
}

pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Page = ChromiumPage;

    async fn new_page(&self) -> Result<ChromiumPage, EngineError> {
        let page = self.browser.new_page("about:blank").await.map_err(cdp)?;
        Ok(ChromiumPage { page })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        let closed = self.browser.close().await.map(|_| ()).map_err(cdp);
        if let Err(err) = self.browser.wait().await {
            warn!(
                target = "infra::browser::chromium",
                error = %err,
                "failed to reap browser process"
            );
        }
        self.handler_task.abort();
        closed
    }
}

pub struct ChromiumPage {
    page: Page,
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn emulate_print_media(&self) -> Result<(), EngineError> {
        let params = SetEmulatedMediaParams::builder().media("print").build();
        self.page.execute(params).await.map_err(cdp)?;
        Ok(())
    }

    async fn navigate(&self, url: &str, idle: NetworkIdle) -> Result<(), EngineError> {
        self.page.execute(EnableParams::default()).await.map_err(cdp)?;
        let tracker = NetworkTracker::attach(&self.page, idle).await?;

        // `goto` resolves on the load event; the idle window only starts there.
        self.page.goto(url).await.map_err(cdp)?;
        tracker.page_loaded();
        tracker.wait_for_idle().await;
        Ok(())
    }

    async fn fonts_ready(&self) -> Result<(), EngineError> {
        let params = EvaluateParams::builder()
            .expression(FONTS_READY_SCRIPT)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(EngineError::new)?;
        self.page.evaluate_expression(params).await.map_err(cdp)?;
        Ok(())
    }

    async fn print_to_pdf(&self, layout: &PdfLayout) -> Result<Vec<u8>, EngineError> {
        let params = PrintToPdfParams::builder()
            .paper_width(layout.paper_width_in)
            .paper_height(layout.paper_height_in)
            .print_background(layout.print_background)
            .prefer_css_page_size(layout.prefer_css_page_size)
            .margin_top(layout.margin_in)
            .margin_bottom(layout.margin_in)
            .margin_left(layout.margin_in)
            .margin_right(layout.margin_in)
            .build();
        self.page.pdf(params).await.map_err(cdp)
    }

    async fn close(&self) -> Result<(), EngineError> {
        self.page.clone().close().await.map_err(cdp)
    }
}

fn cdp(err: chromiumoxide::error::CdpError) -> EngineError {
    EngineError::new(err.to_string())
}

/// Counts in-flight requests from network events and reports when the page
/// has stayed at or below the threshold for the idle window after load.
struct NetworkTracker {
    state: Arc<Mutex<IdleState>>,
    window: Duration,
    task: JoinHandle<()>,
}

/// Idleness bookkeeping. The clock only runs once the load event has fired,
/// and every completion at or below the threshold restarts it.
#[derive(Debug)]
struct IdleState {
    inflight: HashSet<String>,
    max_inflight: usize,
    loaded: bool,
    idle_since: Option<Instant>,
}

impl IdleState {
    fn new(max_inflight: usize) -> Self {
        Self {
            inflight: HashSet::new(),
            max_inflight,
            loaded: false,
            idle_since: None,
        }
    }

    fn within_threshold(&self) -> bool {
        self.inflight.len() <= self.max_inflight
    }

    fn request_started(&mut self, id: String) {
        self.inflight.insert(id);
        if !self.within_threshold() {
            self.idle_since = None;
        }
    }

    fn request_ended(&mut self, id: &str, now: Instant) {
        self.inflight.remove(id);
        if self.loaded && self.within_threshold() {
            self.idle_since = Some(now);
        }
    }

    fn mark_loaded(&mut self, now: Instant) {
        self.loaded = true;
        self.idle_since = self.within_threshold().then_some(now);
    }

    fn is_idle(&self, now: Instant, window: Duration) -> bool {
        self.loaded
            && self
                .idle_since
                .is_some_and(|since| now.saturating_duration_since(since) >= window)
    }
}

enum NetworkEvent {
    Started(String),
    Ended(String),
}

impl NetworkTracker {
    async fn attach(page: &Page, idle: NetworkIdle) -> Result<Self, EngineError> {
        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(cdp)?;
        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(cdp)?;
        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(cdp)?;

        let state = Arc::new(Mutex::new(IdleState::new(idle.max_inflight)));

        let shared = Arc::clone(&state);
        let task = tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    Some(event) = started.next() => {
                        NetworkEvent::Started(event.request_id.inner().clone())
                    }
                    Some(event) = finished.next() => {
                        NetworkEvent::Ended(event.request_id.inner().clone())
                    }
                    Some(event) = failed.next() => {
                        NetworkEvent::Ended(event.request_id.inner().clone())
                    }
                    else => break,
                };
                let Ok(mut state) = shared.lock() else {
                    break;
                };
                match event {
                    NetworkEvent::Started(id) => state.request_started(id),
                    NetworkEvent::Ended(id) => state.request_ended(&id, Instant::now()),
                }
            }
        });

        Ok(Self {
            state,
            window: idle.window,
            task,
        })
    }

    /// Start the idle clock; called once the load event has fired.
    fn page_loaded(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.mark_loaded(Instant::now());
        }
    }

    async fn wait_for_idle(&self) {
        wait_until_idle(&self.state, self.window).await;
    }
}

async fn wait_until_idle(state: &Mutex<IdleState>, window: Duration) {
    loop {
        let idle = match state.lock() {
            Ok(state) => state.is_idle(Instant::now(), window),
            Err(_) => return,
        };
        if idle {
            return;
        }
        sleep(IDLE_POLL_INTERVAL).await;
    }
}

impl Drop for NetworkTracker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    const WINDOW: Duration = Duration::from_millis(500);

    #[test]
    fn quiet_time_before_load_does_not_count() {
        let t0 = Instant::now();
        let mut idle = IdleState::new(2);
        idle.request_started("doc".into());
        idle.request_started("css".into());
        assert!(!idle.is_idle(t0 + ms(600), WINDOW), "not loaded yet");

        idle.mark_loaded(t0 + ms(600));
        idle.request_started("api-1".into());
        idle.request_started("api-2".into());
        assert!(!idle.is_idle(t0 + ms(600), WINDOW));
        assert!(!idle.is_idle(t0 + ms(1_200), WINDOW), "post-load fetches in flight");

        idle.request_ended("api-1", t0 + ms(1_300));
        idle.request_ended("api-2", t0 + ms(1_350));
        assert!(!idle.is_idle(t0 + ms(1_800), WINDOW));
        assert!(idle.is_idle(t0 + ms(1_850), WINDOW));
    }

    #[test]
    fn load_alone_is_not_idle() {
        let t0 = Instant::now();
        let mut idle = IdleState::new(2);
        idle.mark_loaded(t0);
        assert!(!idle.is_idle(t0, WINDOW));
        assert!(!idle.is_idle(t0 + ms(499), WINDOW));
        assert!(idle.is_idle(t0 + ms(500), WINDOW));
    }

    #[test]
    fn completion_within_threshold_restarts_the_clock() {
        let t0 = Instant::now();
        let mut idle = IdleState::new(1);
        idle.mark_loaded(t0);
        idle.request_started("a".into());
        idle.request_ended("a", t0 + ms(400));
        assert!(!idle.is_idle(t0 + ms(600), WINDOW));
        assert!(idle.is_idle(t0 + ms(900), WINDOW));
    }

    #[test]
    fn exceeding_threshold_stops_the_clock_until_traffic_drains() {
        let t0 = Instant::now();
        let mut idle = IdleState::new(1);
        idle.mark_loaded(t0);
        idle.request_started("a".into());
        idle.request_started("b".into());
        assert!(!idle.is_idle(t0 + ms(5_000), WINDOW));

        idle.request_ended("b", t0 + ms(5_000));
        assert!(idle.is_idle(t0 + ms(5_500), WINDOW), "one request is within the threshold");
    }

    #[test]
    fn loading_above_threshold_waits_for_drain() {
        let t0 = Instant::now();
        let mut idle = IdleState::new(0);
        idle.request_started("late".into());
        idle.mark_loaded(t0);
        assert!(!idle.is_idle(t0 + ms(10_000), WINDOW));
        idle.request_ended("late", t0 + ms(10_000));
        assert!(idle.is_idle(t0 + ms(10_500), WINDOW));
    }

    #[tokio::test]
    async fn waiting_returns_only_after_post_load_traffic_settles() {
        let window = ms(100);
        let state = Arc::new(Mutex::new(IdleState::new(0)));
        let driver = Arc::clone(&state);
        let started_at = Instant::now();

        tokio::spawn(async move {
            sleep(ms(50)).await;
            {
                let mut state = driver.lock().expect("lock");
                state.mark_loaded(Instant::now());
                state.request_started("xhr".into());
            }
            sleep(ms(150)).await;
            driver
                .lock()
                .expect("lock")
                .request_ended("xhr", Instant::now());
        });

        wait_until_idle(&state, window).await;
        assert!(started_at.elapsed() >= ms(300));
    }
}
