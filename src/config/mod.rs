//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;
mod env;

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::{
    application::render::{NetworkIdle, RenderTuning},
    domain::document::{
        ANTARES_BUSINESS_MODEL_KEY, DEFAULT_PRODUCT, DocumentCatalog, DocumentSpec,
    },
};

pub use cli::{
    CliArgs, Command, CommonOverrides, GenerateArgs, GenerateOverrides, InvokeArgs, ServeArgs,
    ServeOverrides,
};
pub use env::EnvSnapshot;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const ENV_PREFIX: &str = "PRESSROOM";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_LOCAL_ORIGIN: &str = "http://localhost:5173";
const DEFAULT_NAVIGATION_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BATCH_NAVIGATION_TIMEOUT_SECS: u64 = 60;
const DEFAULT_NETWORK_IDLE_MAX_INFLIGHT: usize = 2;
const DEFAULT_NETWORK_IDLE_WINDOW_MS: u64 = 500;
const DEFAULT_FONT_SETTLE_MS: u64 = 300;
const DEFAULT_SITE_DIR: &str = "dist";
const DEFAULT_OUTPUT_DIR: &str = "dist/pdf";
pub(crate) const DEFAULT_BATCH_PORT: u16 = 4173;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub origin: OriginSettings,
    pub browser: BrowserSettings,
    pub documents: DocumentSettings,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// Built site served next to the PDF endpoint.
    pub site_dir: Option<PathBuf>,
    /// Unknown paths fall back to the site's index document.
    pub production: bool,
    pub graceful_shutdown: Duration,
}

impl ServerSettings {
    /// Whether this server hosts the very build it prints.
    pub fn serves_build(&self) -> bool {
        self.production && self.site_dir.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    pub target: LogTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Compact,
}

/// `invoke` keeps stdout for the response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginSettings {
    pub override_url: Option<String>,
    pub local_default: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub executable: Option<PathBuf>,
    pub package_root: Option<PathBuf>,
    pub sandbox: bool,
    pub tuning: RenderTuning,
    pub batch_navigation_timeout: Duration,
}

impl BrowserSettings {
    pub fn batch_tuning(&self) -> RenderTuning {
        RenderTuning {
            navigation_timeout: self.batch_navigation_timeout,
            ..self.tuning
        }
    }
}

#[derive(Debug, Clone)]
pub struct DocumentSettings {
    pub product: String,
    pub catalog: DocumentCatalog,
    /// Document the function-host entrypoint prints.
    pub function_document: String,
}

#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub site_dir: PathBuf,
    pub output_dir: PathBuf,
    pub port: u16,
    pub documents: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Generate(args)) => raw.apply_generate_overrides(&args.overrides),
        Some(Command::Invoke(args)) => {
            raw.apply_common_overrides(&args.overrides);
            raw.logging.to_stderr = true;
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    origin: RawOriginSettings,
    browser: RawBrowserSettings,
    documents: RawDocumentSettings,
    batch: RawBatchSettings,
}

impl RawSettings {
    fn apply_common_overrides(&mut self, overrides: &CommonOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(origin) = overrides.origin.as_ref() {
            self.origin.override_url = Some(origin.clone());
        }
        if let Some(path) = overrides.browser_executable.as_ref() {
            self.browser.executable = Some(path.clone());
        }
        if let Some(sandbox) = overrides.browser_sandbox {
            self.browser.sandbox = Some(sandbox);
        }
    }

    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_common_overrides(&overrides.common);
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(dir) = overrides.site_dir.as_ref() {
            self.server.site_dir = Some(dir.clone());
        }
        if let Some(production) = overrides.production {
            self.server.production = Some(production);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
    }

    fn apply_generate_overrides(&mut self, overrides: &GenerateOverrides) {
        self.apply_common_overrides(&overrides.common);
        if let Some(dir) = overrides.site_dir.as_ref() {
            self.batch.site_dir = Some(dir.clone());
        }
        if let Some(dir) = overrides.output_dir.as_ref() {
            self.batch.output_dir = Some(dir.clone());
        }
        if let Some(port) = overrides.port {
            self.batch.port = Some(port);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            origin,
            browser,
            documents,
            batch,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let origin = build_origin_settings(origin)?;
        let browser = build_browser_settings(browser)?;
        let documents = build_document_settings(documents)?;
        let batch = build_batch_settings(batch, &documents)?;

        Ok(Self {
            server,
            logging,
            origin,
            browser,
            documents,
            batch,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    let site_dir = non_empty_path(server.site_dir);
    let production = server.production.unwrap_or(site_dir.is_some());

    Ok(ServerSettings {
        addr,
        site_dir,
        production,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let target = if logging.to_stderr {
        LogTarget::Stderr
    } else {
        LogTarget::Stdout
    };

    Ok(LoggingSettings {
        level,
        format,
        target,
    })
}

fn build_origin_settings(origin: RawOriginSettings) -> Result<OriginSettings, LoadError> {
    let override_url = non_empty(origin.override_url);
    let local_default = match origin.local_default {
        Some(value) => non_empty(Some(value)),
        None => Some(DEFAULT_LOCAL_ORIGIN.to_string()),
    };

    for (key, value) in [
        ("origin.override", &override_url),
        ("origin.local_default", &local_default),
    ] {
        if let Some(value) = value {
            url::Url::parse(value)
                .map_err(|err| LoadError::invalid(key, format!("`{value}`: {err}")))?;
        }
    }

    Ok(OriginSettings {
        override_url,
        local_default,
    })
}

fn build_browser_settings(browser: RawBrowserSettings) -> Result<BrowserSettings, LoadError> {
    let navigation_timeout = positive_secs(
        browser.navigation_timeout_seconds,
        DEFAULT_NAVIGATION_TIMEOUT_SECS,
        "browser.navigation_timeout_seconds",
    )?;
    let batch_navigation_timeout = positive_secs(
        browser.batch_navigation_timeout_seconds,
        DEFAULT_BATCH_NAVIGATION_TIMEOUT_SECS,
        "browser.batch_navigation_timeout_seconds",
    )?;

    let window_ms = browser
        .network_idle_window_ms
        .unwrap_or(DEFAULT_NETWORK_IDLE_WINDOW_MS);
    if window_ms == 0 {
        return Err(LoadError::invalid(
            "browser.network_idle_window_ms",
            "must be greater than zero",
        ));
    }

    let tuning = RenderTuning {
        navigation_timeout,
        network_idle: NetworkIdle {
            max_inflight: browser
                .network_idle_max_inflight
                .unwrap_or(DEFAULT_NETWORK_IDLE_MAX_INFLIGHT),
            window: Duration::from_millis(window_ms),
        },
        font_settle: Duration::from_millis(
            browser.font_settle_ms.unwrap_or(DEFAULT_FONT_SETTLE_MS),
        ),
    };

    Ok(BrowserSettings {
        executable: non_empty_path(browser.executable),
        package_root: non_empty_path(browser.package_root),
        sandbox: browser.sandbox.unwrap_or(false),
        tuning,
        batch_navigation_timeout,
    })
}

fn build_document_settings(
    documents: RawDocumentSettings,
) -> Result<DocumentSettings, LoadError> {
    let product = non_empty(documents.product).unwrap_or_else(|| DEFAULT_PRODUCT.to_string());
    if product.contains(['/', '\\', '"']) {
        return Err(LoadError::invalid(
            "documents.product",
            "must be usable inside a filename",
        ));
    }

    let mut entries = documents
        .catalog
        .into_iter()
        .map(|entry| DocumentSpec::new(entry.key, entry.route, entry.file_slug))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| LoadError::invalid("documents.catalog", err.to_string()))?;
    // A configured entry with the built-in key replaces the built-in.
    let builtin = DocumentSpec::antares_business_model();
    if !entries.iter().any(|entry| entry.key == builtin.key) {
        entries.insert(0, builtin);
    }
    let catalog = DocumentCatalog::new(entries)
        .map_err(|err| LoadError::invalid("documents.catalog", err.to_string()))?;

    let function_document = non_empty(documents.function_document)
        .unwrap_or_else(|| ANTARES_BUSINESS_MODEL_KEY.to_string());
    catalog
        .by_key(&function_document)
        .map_err(|err| LoadError::invalid("documents.function_document", err.to_string()))?;

    Ok(DocumentSettings {
        product,
        catalog,
        function_document,
    })
}

fn build_batch_settings(
    batch: RawBatchSettings,
    documents: &DocumentSettings,
) -> Result<BatchSettings, LoadError> {
    let port = batch.port.unwrap_or(DEFAULT_BATCH_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "batch.port",
            "port must be greater than zero",
        ));
    }

    let keys = if batch.documents.is_empty() {
        vec![documents.function_document.clone()]
    } else {
        batch.documents
    };
    for key in &keys {
        documents
            .catalog
            .by_key(key)
            .map_err(|err| LoadError::invalid("batch.documents", err.to_string()))?;
    }

    Ok(BatchSettings {
        site_dir: non_empty_path(batch.site_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SITE_DIR)),
        output_dir: non_empty_path(batch.output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
        port,
        documents: keys,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    site_dir: Option<PathBuf>,
    production: Option<bool>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    #[serde(skip)]
    to_stderr: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOriginSettings {
    #[serde(rename = "override")]
    override_url: Option<String>,
    local_default: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBrowserSettings {
    executable: Option<PathBuf>,
    package_root: Option<PathBuf>,
    sandbox: Option<bool>,
    navigation_timeout_seconds: Option<u64>,
    batch_navigation_timeout_seconds: Option<u64>,
    network_idle_max_inflight: Option<usize>,
    network_idle_window_ms: Option<u64>,
    font_settle_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDocumentSettings {
    product: Option<String>,
    catalog: Vec<RawDocumentEntry>,
    function_document: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawDocumentEntry {
    key: String,
    route: String,
    file_slug: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBatchSettings {
    site_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    port: Option<u16>,
    documents: Vec<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn positive_secs(
    value: Option<u64>,
    default: u64,
    key: &'static str,
) -> Result<Duration, LoadError> {
    match value.unwrap_or(default) {
        0 => Err(LoadError::invalid(key, "must be greater than zero")),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_empty_path(value: Option<PathBuf>) -> Option<PathBuf> {
    value.filter(|path| !path.as_os_str().is_empty())
}
