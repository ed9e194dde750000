//! Builds the URL of the print view for a render request.

use url::Url;

use crate::{application::error::ConfigurationError, domain::document::RenderRequest};

/// Query flag telling the application to drop interactive chrome and lay out for print.
pub const PRINT_FLAG: (&str, &str) = ("print", "1");
pub const LANG_PARAM: &str = "lang";

/// The fully-qualified page a render navigates to. Recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    url: Url,
}

impl RenderTarget {
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

/// `<origin>/<route>?print=1&lang=<language>`; any `print`/`lang` the route
/// already carried is replaced so each appears exactly once.
pub fn resolve_target(
    origin: &str,
    request: &RenderRequest,
) -> Result<RenderTarget, ConfigurationError> {
    let base = origin.trim_end_matches('/');
    let candidate = format!("{base}/{}", request.document.route());
    let mut url = Url::parse(&candidate).map_err(|err| ConfigurationError::InvalidOrigin {
        origin: origin.to_string(),
        reason: err.to_string(),
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigurationError::InvalidOrigin {
            origin: origin.to_string(),
            reason: "origin must be an http(s) URL".to_string(),
        });
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != PRINT_FLAG.0 && key != LANG_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        query.extend_pairs(retained);
        query.append_pair(PRINT_FLAG.0, PRINT_FLAG.1);
        query.append_pair(LANG_PARAM, request.language.as_str());
    }

    Ok(RenderTarget { url })
}
