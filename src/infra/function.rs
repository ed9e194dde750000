//! Function-host adapter: one event in, one response envelope out.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    application::{
        encode::{FunctionResponse, PdfAttachment},
        render::{DocumentRenderer, RenderError},
        target::LANG_PARAM,
    },
    domain::document::{Language, RenderRequest},
};

use super::error::InfraError;

/// The part of the host's HTTP event this adapter reads.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEvent {
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, Option<String>>>,
}

impl FunctionEvent {
    /// An empty payload is an event without parameters.
    pub fn parse(raw: &str) -> Result<Self, InfraError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(|err| InfraError::event(err.to_string()))
    }

    pub fn with_lang(lang: &str) -> Self {
        Self {
            query_string_parameters: Some(HashMap::from([(
                LANG_PARAM.to_string(),
                Some(lang.to_string()),
            )])),
        }
    }

    pub fn lang(&self) -> Option<&str> {
        self.query_string_parameters
            .as_ref()?
            .get(LANG_PARAM)?
            .as_deref()
    }
}

/// Render `document_key` in the event's language. Never fails: errors become
/// the JSON failure envelope.
pub async fn handle<R>(
    renderer: &R,
    document_key: &str,
    event: &FunctionEvent,
) -> FunctionResponse
where
    R: DocumentRenderer + ?Sized,
{
    let language = Language::normalize(event.lang());
    let document = match renderer.catalog().by_key(document_key) {
        Ok(document) => document.clone(),
        Err(err) => return FunctionResponse::failure(&RenderError::from(err)),
    };
    let request = RenderRequest::new(document, language);

    match renderer.render(&request).await {
        Ok(result) => {
            PdfAttachment::new(request.pdf_filename(renderer.product()), result)
                .into_function_response()
        }
        Err(err) => FunctionResponse::failure(&err),
    }
}
