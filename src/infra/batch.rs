//! Build-time generator: every document, every language, written to disk.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::{
    application::{
        encode::PdfAttachment,
        render::{DocumentRenderer, RenderError},
    },
    domain::document::{DocumentSpec, Language, RenderRequest},
};

use super::{ephemeral::EphemeralStaticServer, error::InfraError};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to start the static server")]
    Server(#[source] InfraError),
    #[error("failed to produce {filename}")]
    Render {
        filename: String,
        #[source]
        source: RenderError,
    },
}

/// What to generate and where to put it.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub documents: Vec<DocumentSpec>,
    pub languages: Vec<Language>,
    pub output_dir: PathBuf,
}

impl BatchPlan {
    /// Every supported language for each document.
    pub fn all_languages(documents: Vec<DocumentSpec>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents,
            languages: Language::ALL.to_vec(),
            output_dir: output_dir.into(),
        }
    }

    fn requests(&self) -> impl Iterator<Item = RenderRequest> + '_ {
        self.documents.iter().flat_map(|document| {
            self.languages
                .iter()
                .map(|language| RenderRequest::new(document.clone(), *language))
        })
    }
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
}

/// Render the plan sequentially and stop the static server on every exit
/// path. The first failure aborts the run.
pub async fn generate<R>(
    renderer: &R,
    server: EphemeralStaticServer,
    plan: &BatchPlan,
) -> Result<BatchReport, BatchError>
where
    R: DocumentRenderer + ?Sized,
{
    let outcome = render_plan(renderer, plan).await;
    server.stop().await;
    outcome
}

async fn render_plan<R>(renderer: &R, plan: &BatchPlan) -> Result<BatchReport, BatchError>
where
    R: DocumentRenderer + ?Sized,
{
    let mut report = BatchReport::default();
    for request in plan.requests() {
        let filename = request.pdf_filename(renderer.product());
        let written = async {
            let result = renderer.render(&request).await?;
            PdfAttachment::new(filename.clone(), result)
                .write_to(&plan.output_dir)
                .await
        }
        .await
        .map_err(|source| BatchError::Render {
            filename: filename.clone(),
            source,
        })?;

        info!(
            target = "infra::batch",
            op = "batch::write",
            document = request.document_key(),
            lang = %request.language,
            path = %written.display(),
            "PDF written"
        );
        report.written.push(written);
    }
    Ok(report)
}
