//! The shared core behind every hosting adapter.

use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{error, info};

use crate::{
    application::{
        origin::{OriginSources, resolve_origin},
        target::resolve_target,
    },
    domain::document::{DocumentCatalog, RenderRequest},
    infra::browser::binary::BinaryResolver,
};

use super::{
    engine::BrowserEngine,
    pipeline::RenderPipeline,
    types::{RenderError, RenderResult},
};

/// What the server, function-host and batch adapters depend on.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    fn catalog(&self) -> &DocumentCatalog;

    /// Product prefix used in download filenames.
    fn product(&self) -> &str;

    async fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError>;
}

pub struct PdfService<E: BrowserEngine> {
    pipeline: RenderPipeline<E>,
    origins: OriginSources,
    binaries: BinaryResolver,
    catalog: DocumentCatalog,
    product: String,
}

impl<E: BrowserEngine> PdfService<E> {
    pub fn new(
        pipeline: RenderPipeline<E>,
        origins: OriginSources,
        binaries: BinaryResolver,
        catalog: DocumentCatalog,
        product: impl Into<String>,
    ) -> Self {
        Self {
            pipeline,
            origins,
            binaries,
            catalog,
            product: product.into(),
        }
    }

    async fn render_inner(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let origin = resolve_origin(&self.origins)?;
        let target = resolve_target(&origin, request)?;
        // Resolved per call and before launch: a missing browser must not cost
        // a navigation timeout.
        let executable = self.binaries.resolve()?;
        self.pipeline.render(&target, executable).await
    }
}

#[async_trait]
impl<E: BrowserEngine> DocumentRenderer for PdfService<E> {
    fn catalog(&self) -> &DocumentCatalog {
        &self.catalog
    }

    fn product(&self) -> &str {
        &self.product
    }

    async fn render(&self, request: &RenderRequest) -> Result<RenderResult, RenderError> {
        let started_at = Instant::now();
        let outcome = self.render_inner(request).await;
        let elapsed = started_at.elapsed();

        counter!("pressroom_render_total").increment(1);
        histogram!("pressroom_render_ms").record(elapsed.as_secs_f64() * 1000.0);

        match &outcome {
            Ok(result) => info!(
                target = "application::render::service",
                op = "service::render",
                document = request.document_key(),
                lang = %request.language,
                pdf_bytes = result.byte_length(),
                elapsed_ms = elapsed.as_millis() as u64,
                "document rendered"
            ),
            Err(err) => {
                counter!("pressroom_render_failure_total", "kind" => err.kind().as_str())
                    .increment(1);
                error!(
                    target = "application::render::service",
                    op = "service::render",
                    document = request.document_key(),
                    lang = %request.language,
                    kind = err.kind().as_str(),
                    stage = err.failed_stage().map(|stage| stage.as_str()),
                    error = %err,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "document render failed"
                );
            }
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, time::Duration};

    use super::*;
    use crate::{
        application::render::{
            engine::RenderTuning,
            pipeline::fakes::{FakeEngine, PageScript},
            types::FailureKind,
        },
        domain::document::{DocumentSpec, Language},
        infra::browser::binary::{HostContext, HostEnvironment, tests::MemoryProbe},
    };

    fn host() -> HostEnvironment {
        HostEnvironment {
            context: HostContext::FunctionHost,
            explicit_executable: None,
            package_root: Some(PathBuf::from("/var/task")),
            working_dir: PathBuf::from("/var/task"),
        }
    }

    fn service(
        engine: FakeEngine,
        origins: OriginSources,
        probe: MemoryProbe,
    ) -> PdfService<FakeEngine> {
        let tuning = RenderTuning {
            navigation_timeout: Duration::from_millis(200),
            font_settle: Duration::ZERO,
            ..RenderTuning::default()
        };
        PdfService::new(
            RenderPipeline::new(engine, tuning),
            origins,
            BinaryResolver::new(host(), Box::new(probe)),
            DocumentCatalog::default(),
            "insurfox",
        )
    }

    fn origins() -> OriginSources {
        OriginSources {
            explicit: Some("https://reports.example.com/".into()),
            ..OriginSources::default()
        }
    }

    fn installed() -> MemoryProbe {
        MemoryProbe::with(&["/var/task/chromium"], &["/var/task/chromium/chromium"])
    }

    fn request(language: Language) -> RenderRequest {
        RenderRequest::new(DocumentSpec::antares_business_model(), language)
    }

    #[tokio::test]
    async fn renders_against_resolved_origin_with_discovered_binary() {
        let engine = FakeEngine::scripted([PageScript::Pdf(b"%PDF-1.7 ok".to_vec())]);
        let service = service(engine.clone(), origins(), installed());

        let result = service.render(&request(Language::En)).await.expect("render");
        assert_eq!(result.byte_length(), 11);

        let journal = engine.journal();
        assert!(journal.steps.contains(
            &"url:https://reports.example.com/business-model/antares?print=1&lang=en".to_string()
        ));
        let options = journal.last_options.as_ref().expect("launched");
        assert_eq!(
            options.executable.path,
            PathBuf::from("/var/task/chromium/chromium")
        );
    }

    #[tokio::test]
    async fn missing_browser_fails_before_launch_or_navigation() {
        let engine = FakeEngine::scripted([]);
        let service = service(engine.clone(), origins(), MemoryProbe::default());

        let err = service
            .render(&request(Language::De))
            .await
            .expect_err("no browser");
        assert_eq!(err.kind(), FailureKind::Configuration);

        let journal = engine.journal();
        assert_eq!(journal.launches, 0);
        assert!(journal.steps.is_empty());
    }

    #[tokio::test]
    async fn missing_origin_fails_fast() {
        let engine = FakeEngine::scripted([]);
        let service = service(engine.clone(), OriginSources::default(), installed());

        let err = service
            .render(&request(Language::De))
            .await
            .expect_err("no origin");
        assert_eq!(err.kind(), FailureKind::Configuration);
        assert!(err.to_string().contains("origin"));
        assert_eq!(engine.journal().launches, 0);
    }

    #[tokio::test]
    async fn exposes_catalog_and_product_to_adapters() {
        let service = service(FakeEngine::default(), origins(), installed());
        assert_eq!(service.product(), "insurfox");
        assert!(service.catalog().by_route("business-model/antares").is_ok());
    }
}
