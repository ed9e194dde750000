//! Printable documents, their languages, and the deterministic file naming contract.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const DEFAULT_PRODUCT: &str = "insurfox";
pub const ANTARES_BUSINESS_MODEL_KEY: &str = "business-model-antares";

/// Languages a document can be printed in.
///
/// Anything that is not a recognised code falls back to [`Language::De`];
/// this is policy, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    De,
    En,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::De, Language::En];

    /// Normalise an optional, untrusted language code.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|value| value.trim().to_ascii_lowercase()).as_deref() {
            Some("en") => Language::En,
            Some("de") => Language::De,
            _ => Language::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::De => "de",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document that can be printed: its key, the application route that
/// renders it, and the slug used in exported file names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSpec {
    pub key: String,
    pub route: String,
    pub file_slug: String,
}

impl DocumentSpec {
    pub fn new(
        key: impl Into<String>,
        route: impl Into<String>,
        file_slug: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(DomainError::invalid_document("", "key must not be empty"));
        }

        let route = normalize_route(&route.into());
        if route.is_empty() {
            return Err(DomainError::invalid_document(key, "route must not be empty"));
        }

        let file_slug = file_slug.into().trim().to_string();
        if file_slug.is_empty()
            || !file_slug
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(DomainError::invalid_document(
                key,
                "file slug must be non-empty and contain only [A-Za-z0-9_-]",
            ));
        }

        Ok(Self {
            key,
            route,
            file_slug,
        })
    }

    /// The Antares business model, the document every entrypoint ships with.
    pub fn antares_business_model() -> Self {
        Self {
            key: ANTARES_BUSINESS_MODEL_KEY.to_string(),
            route: "business-model/antares".to_string(),
            file_slug: "antares-business-model".to_string(),
        }
    }

    /// Route path without leading or trailing slashes.
    pub fn route(&self) -> &str {
        &self.route
    }

    /// `<product>-<file_slug>-<language>.pdf`
    pub fn pdf_filename(&self, product: &str, language: Language) -> String {
        format!("{product}-{}-{}.pdf", self.file_slug, language.as_str())
    }
}

/// The set of documents the renderer is willing to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentCatalog {
    documents: Vec<DocumentSpec>,
}

impl Default for DocumentCatalog {
    fn default() -> Self {
        Self {
            documents: vec![DocumentSpec::antares_business_model()],
        }
    }
}

impl DocumentCatalog {
    /// Build a catalog, rejecting duplicate keys or routes.
    pub fn new(documents: Vec<DocumentSpec>) -> Result<Self, DomainError> {
        for (index, document) in documents.iter().enumerate() {
            let clash = documents[..index]
                .iter()
                .any(|prior| prior.key == document.key || prior.route == document.route);
            if clash {
                return Err(DomainError::invalid_document(
                    document.key.clone(),
                    "duplicate key or route in catalog",
                ));
            }
        }
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[DocumentSpec] {
        &self.documents
    }

    /// Look a document up by key.
    pub fn by_key(&self, key: &str) -> Result<&DocumentSpec, DomainError> {
        let key = key.trim();
        self.documents
            .iter()
            .find(|document| document.key == key)
            .ok_or_else(|| DomainError::unknown_document(key))
    }

    /// Look a document up by its application route, falling back to its key.
    pub fn by_route(&self, route: &str) -> Result<&DocumentSpec, DomainError> {
        let route = normalize_route(route);
        self.documents
            .iter()
            .find(|document| document.route == route || document.key == route)
            .ok_or_else(|| DomainError::unknown_document(route))
    }
}

/// What to render: a document in one language. Lives for a single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub document: DocumentSpec,
    pub language: Language,
}

impl RenderRequest {
    pub fn new(document: DocumentSpec, language: Language) -> Self {
        Self { document, language }
    }

    pub fn document_key(&self) -> &str {
        &self.document.key
    }

    pub fn pdf_filename(&self, product: &str) -> String {
        self.document.pdf_filename(product, self.language)
    }
}

fn normalize_route(route: &str) -> String {
    route.trim().trim_matches('/').to_string()
}
