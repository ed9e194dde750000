use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the pressroom binary.
#[derive(Debug, Parser)]
#[command(
    name = "pressroom",
    version,
    about = "Print application pages to PDF with headless Chromium"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "PRESSROOM_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Serve `/api/pdf/*` and, optionally, the built site.
    Serve(Box<ServeArgs>),
    /// Render every configured document in every language to disk.
    Generate(GenerateArgs),
    /// Handle one function-host event read from stdin.
    Invoke(InvokeArgs),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Serve(_) => "serve",
            Command::Generate(_) => "generate",
            Command::Invoke(_) => "invoke",
        }
    }
}

/// Overrides shared by every subcommand.
#[derive(Debug, Args, Default, Clone)]
pub struct CommonOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Origin to print from, ahead of every environment-derived origin.
    #[arg(long = "origin", value_name = "URL")]
    pub origin: Option<String>,

    /// Browser executable, bypassing install discovery.
    #[arg(
        long = "browser-executable",
        value_name = "PATH",
        value_hint = ValueHint::ExecutablePath
    )]
    pub browser_executable: Option<PathBuf>,

    /// Keep the Chromium sandbox enabled.
    #[arg(
        long = "browser-sandbox",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub browser_sandbox: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Directory holding the built site to serve next to the PDF endpoint.
    #[arg(long = "site-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub site_dir: Option<PathBuf>,

    /// Production mode: unknown paths fall back to the site's index document.
    #[arg(
        long = "production",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub production: Option<bool>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GenerateArgs {
    #[command(flatten)]
    pub overrides: GenerateOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct GenerateOverrides {
    #[command(flatten)]
    pub common: CommonOverrides,

    /// Directory holding the built site.
    #[arg(long = "site-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub site_dir: Option<PathBuf>,

    /// Directory the PDFs are written to.
    #[arg(long = "output-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub output_dir: Option<PathBuf>,

    /// Port of the temporary static server.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct InvokeArgs {
    #[command(flatten)]
    pub overrides: CommonOverrides,
}
