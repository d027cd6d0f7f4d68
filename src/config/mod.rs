//! Configuration layer: typed settings with layered precedence (file → env
//! → CLI).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueHint};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::cache::CacheConfig;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "pressroom";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SITE_NAME: &str = "main";
const DEFAULT_SITE_TITLE: &str = "Pressroom";
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Command-line arguments for the Pressroom binary.
#[derive(Debug, Parser)]
#[command(name = "pressroom", version, about = "Pressroom content management server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PRESSROOM_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Pressroom HTTP service.
    Serve(ServeArgs),
    /// Export every stored resource document to a directory tree.
    #[command(name = "export")]
    ExportSite(ExportArgs),
    /// Import resource documents from a directory tree.
    #[command(name = "import")]
    ImportSite(ImportArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the repository data directory.
    #[arg(long = "data-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ExportArgs {
    /// Target directory for the exported documents.
    #[arg(value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub dir: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ImportArgs {
    /// Directory tree to import resource documents from.
    #[arg(value_name = "DIR", value_hint = ValueHint::DirPath)]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub repository: RepositorySettings,
    pub cache: CacheConfig,
    pub images: ImageSettings,
    pub static_files: StaticSettings,
    pub security: SecuritySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    pub fn addr(&self) -> Result<SocketAddr, LoadError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| LoadError::InvalidAddress {
                host: self.host.clone(),
                port: self.port,
            })
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// Site identifier used in resource uris and cache tags.
    pub name: String,
    /// Human-readable title used by the feeds.
    pub title: String,
    /// Public base url used for feed links.
    pub base_url: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_SITE_NAME.to_string(),
            title: DEFAULT_SITE_TITLE.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RepositorySettings {
    /// Where resource documents and content blobs live; unset means a
    /// purely in-memory repository.
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ImageSettings {
    /// Image style names accepted by the image handler.
    pub styles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StaticSettings {
    /// Directory served by the static handler; unset disables it.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecuritySettings {
    pub accounts: Vec<AccountSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountSettings {
    pub login: String,
    #[serde(default)]
    pub realm: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    pub token: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
    #[error("invalid listen address {host}:{port}")]
    InvalidAddress { host: String, port: u16 },
}

/// Parse CLI arguments and load the layered settings.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(cli.config_file.as_deref())?;
    Ok((cli, settings))
}

/// Load settings: defaults file, then a local `pressroom.toml`, then the
/// explicit file, then `PRESSROOM_*` environment variables.
pub fn load(config_file: Option<&std::path::Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));
    if let Some(file) = config_file {
        builder = builder.add_source(File::from(file.to_path_buf()));
    }
    let config = builder
        .add_source(Environment::with_prefix("PRESSROOM").separator("__"))
        .build()?;
    Ok(config.try_deserialize()?)
}

/// Fold `serve` CLI overrides into loaded settings.
pub fn apply_serve_overrides(settings: &mut Settings, args: &ServeArgs) {
    if let Some(host) = &args.server_host {
        settings.server.host = host.clone();
    }
    if let Some(port) = args.server_port {
        settings.server.port = port;
    }
    if let Some(data_dir) = &args.data_dir {
        settings.repository.data_dir = Some(data_dir.clone());
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let settings = Settings::default();
        assert_eq!(settings.server.host, DEFAULT_HOST);
        assert_eq!(settings.server.port, DEFAULT_PORT);
        assert_eq!(settings.site.name, "main");
        assert!(settings.repository.data_dir.is_none());
        assert!(settings.cache.enabled);
        assert!(settings.security.accounts.is_empty());
    }

    #[test]
    fn server_addr_parses() {
        let settings = ServerSettings::default();
        assert!(settings.addr().is_ok());

        let broken = ServerSettings {
            host: "not a host".into(),
            port: 1,
        };
        assert!(broken.addr().is_err());
    }

    #[test]
    fn serve_overrides_replace_settings() {
        let mut settings = Settings::default();
        let args = ServeArgs {
            server_host: Some("0.0.0.0".into()),
            server_port: Some(8080),
            data_dir: Some(PathBuf::from("/var/lib/pressroom")),
        };
        apply_serve_overrides(&mut settings, &args);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(
            settings.repository.data_dir.as_deref(),
            Some(std::path::Path::new("/var/lib/pressroom"))
        );
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert!(matches!("DEBUG".parse::<LogLevel>(), Ok(LogLevel::Debug)));
        assert!("verbose".parse::<LogLevel>().is_err());
    }
}
