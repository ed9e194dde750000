//! Platform-provided environment, read once at startup.

use std::{env, path::PathBuf};

use super::LoadError;

/// Explicit origin override.
pub const PDF_BASE_URL: &str = "PDF_BASE_URL";
/// Deploy-preview URL set by the hosting platform.
pub const DEPLOY_PRIME_URL: &str = "DEPLOY_PRIME_URL";
/// Primary site URL set by the hosting platform.
pub const SITE_URL: &str = "URL";
pub const PORT: &str = "PORT";
/// Package root on AWS-style function hosts.
pub const LAMBDA_TASK_ROOT: &str = "LAMBDA_TASK_ROOT";
pub const CHROME_PATH: &str = "CHROME_PATH";

/// Snapshot of the variables the resolvers care about. Resolvers take this by
/// reference and never read the process environment themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    pub pdf_base_url: Option<String>,
    pub deploy_prime_url: Option<String>,
    pub url: Option<String>,
    pub port: Option<u16>,
    pub lambda_task_root: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
}

impl EnvSnapshot {
    pub fn capture() -> Result<Self, LoadError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoadError> {
        let read = |key: &str| {
            lookup(key).and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };

        let port = match read(PORT) {
            Some(raw) => Some(
                raw.parse::<u16>()
                    .ok()
                    .filter(|port| *port != 0)
                    .ok_or_else(|| {
                        LoadError::invalid("env.PORT", format!("`{raw}` is not a usable port"))
                    })?,
            ),
            None => None,
        };

        Ok(Self {
            pdf_base_url: read(PDF_BASE_URL),
            deploy_prime_url: read(DEPLOY_PRIME_URL),
            url: read(SITE_URL),
            port,
            lambda_task_root: read(LAMBDA_TASK_ROOT).map(PathBuf::from),
            chrome_path: read(CHROME_PATH).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> Result<EnvSnapshot, LoadError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        EnvSnapshot::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn blank_values_are_unset() {
        let env = snapshot(&[(PDF_BASE_URL, "  "), (SITE_URL, "https://site.example")])
            .expect("snapshot");
        assert_eq!(env.pdf_base_url, None);
        assert_eq!(env.url.as_deref(), Some("https://site.example"));
    }

    #[test]
    fn port_must_parse() {
        assert_eq!(snapshot(&[(PORT, "4173")]).expect("port").port, Some(4173));
        assert!(snapshot(&[(PORT, "http")]).is_err());
        assert!(snapshot(&[(PORT, "0")]).is_err());
    }

    #[test]
    fn paths_are_captured() {
        let env = snapshot(&[
            (LAMBDA_TASK_ROOT, "/var/task"),
            (CHROME_PATH, "/usr/bin/chromium"),
        ])
        .expect("snapshot");
        assert_eq!(env.lambda_task_root, Some(PathBuf::from("/var/task")));
        assert_eq!(env.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }
}
