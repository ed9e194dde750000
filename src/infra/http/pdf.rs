//! `GET /api/pdf/<document-route>?lang=<lang>`.

use axum::{
    extract::{Path, RawQuery, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{
    application::{
        encode::{PdfAttachment, failure_response},
        render::RenderError,
        target::LANG_PARAM,
    },
    domain::document::{Language, RenderRequest},
};

use super::state::HttpState;

const SOURCE: &str = "infra::http::pdf";

pub(super) async fn render_pdf(
    State(state): State<HttpState>,
    Path(route): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let document = match state.renderer.catalog().by_route(&route) {
        Ok(document) => document.clone(),
        Err(err) => return failure_response(SOURCE, &RenderError::from(err)),
    };
    let lang = requested_lang(query.as_deref());
    let request = RenderRequest::new(document, Language::normalize(lang.as_deref()));

    match state.renderer.render(&request).await {
        Ok(result) => {
            let filename = request.pdf_filename(state.renderer.product());
            let mut response = PdfAttachment::new(filename, result).into_response();
            allow_any_origin(response.headers_mut());
            response
        }
        Err(err) => failure_response(SOURCE, &err),
    }
}

/// First `lang` in the query string. Repeated or undecodable values never
/// reject the request; normalisation decides the language.
fn requested_lang(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(key, _)| key == LANG_PARAM)
        .map(|(_, value)| value.into_owned())
}

pub(super) async fn preflight() -> Response {
    let mut response = StatusCode::NO_CONTENT.into_response();
    allow_any_origin(response.headers_mut());
    response
}

fn allow_any_origin(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition"),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_lang_wins_and_other_pairs_are_ignored() {
        assert_eq!(requested_lang(Some("lang=en&lang=fr")).as_deref(), Some("en"));
        assert_eq!(requested_lang(Some("print=1&lang=%20de")).as_deref(), Some(" de"));
        assert_eq!(requested_lang(Some("language=en")), None);
        assert_eq!(requested_lang(None), None);
    }
}
