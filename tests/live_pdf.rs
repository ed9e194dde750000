//! Live end-to-end coverage against a running pressroom instance.
//!
//! - Reads the base URL from `PRESSROOM_LIVE_URL` (for example `http://127.0.0.1:3000`).
//! - The instance must have a browser and a reachable print origin.
//! - Marked `#[ignore]` so it only runs manually.

use reqwest::{Client, StatusCode, header};
use std::time::Duration;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

const LIVE_URL_VAR: &str = "PRESSROOM_LIVE_URL";

fn base_url() -> TestResult<String> {
    let raw = std::env::var(LIVE_URL_VAR)
        .map_err(|_| format!("set {LIVE_URL_VAR} to the server under test"))?;
    Ok(raw.trim_end_matches('/').to_string())
}

#[tokio::test]
#[ignore]
async fn live_pdf_end_to_end() -> TestResult<()> {
    let base = base_url()?;
    let client = Client::builder()
        .timeout(Duration::from_secs(180))
        .build()?;

    for (lang, expected) in [("en", "en"), ("de", "de"), ("fr", "de")] {
        let response = client
            .get(format!("{base}/api/pdf/business-model/antares?lang={lang}"))
            .send()
            .await?;
        assert_eq!(response.status(), StatusCode::OK, "lang={lang}");

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .ok_or("missing content-type")?
            .to_str()?
            .to_string();
        assert_eq!(content_type, "application/pdf");

        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .ok_or("missing content-disposition")?
            .to_str()?
            .to_string();
        assert!(
            disposition.contains(&format!("insurfox-antares-business-model-{expected}.pdf")),
            "unexpected disposition {disposition}"
        );

        let bytes = response.bytes().await?;
        assert!(bytes.starts_with(b"%PDF"), "lang={lang} is not a PDF");
        assert!(bytes.len() > 1000, "lang={lang} PDF is suspiciously small");
    }

    let missing = client
        .get(format!("{base}/api/pdf/not-a-document"))
        .send()
        .await?;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    Ok(())
}
