//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::chrome::ChromeCodes;
use crate::application::thumbnails::ThumbnailConfig;
use crate::domain::locale::{Language, LocalePolicy};
use crate::domain::thumbnail::{DEFAULT_QUALITY, Quality};
use crate::domain::visitor::PricePolicy;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "galatea";
const ENV_PREFIX: &str = "GALATEA";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
const DEFAULT_BACKEND_DATABASE: &str = "galatea";
const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_FOLDER: &str = "media/cache";
const DEFAULT_CACHE_URL: &str = "/media/cache";
const DEFAULT_BASE_IMAGE: &str = "/static/images/no-image.png";
const DEFAULT_DATA_PATH: &str = "/var/lib/trytond";
const DEFAULT_MAX_DIMENSION: u32 = 4096;
const DEFAULT_LANGUAGE: &str = "en_US";
const DEFAULT_SITE_TITLE: &str = "Galatea";

/// Command-line arguments for the Galatea binary.
#[derive(Debug, Parser)]
#[command(name = "galatea", version, about = "Galatea web front-end")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "GALATEA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP front-end.
    Serve(Box<ServeArgs>),
    /// Write sitemap.xml to a file, or stdout.
    Sitemap(SitemapArgs),
    /// Render (or look up) one cached thumbnail and print its URL.
    Thumbnail(ThumbnailArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct BackendOverride {
    /// Override the backend JSON-RPC base URL.
    #[arg(long = "backend-url", value_name = "URL")]
    pub backend_url: Option<String>,

    /// Override the backend database name.
    #[arg(long = "backend-database", value_name = "NAME")]
    pub backend_database: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MediaOverride {
    /// Override the folder rendered thumbnails are written to.
    #[arg(long = "media-cache-folder", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub media_cache_folder: Option<PathBuf>,

    /// Override the backend data path holding source images.
    #[arg(long = "media-data-path", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub media_data_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub backend: BackendOverride,

    #[command(flatten)]
    pub media: MediaOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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
}

#[derive(Debug, Args, Clone)]
pub struct SitemapArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    /// Destination file; stdout when omitted.
    #[arg(value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ThumbnailArgs {
    #[command(flatten)]
    pub backend: BackendOverride,

    #[command(flatten)]
    pub media: MediaOverride,

    /// Content identifier of the source image.
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// File name the artifact name is derived from, e.g. `photo.jpg`.
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Bounding box as WIDTHxHEIGHT.
    #[arg(long, value_name = "WxH")]
    pub size: String,

    /// Crop mode; only `fit` is supported.
    #[arg(long, value_name = "MODE")]
    pub crop: Option<String>,

    /// Pad to a square of this colour (`#rrggbb`, `r,g,b`, ...).
    #[arg(long, value_name = "COLOUR")]
    pub background: Option<String>,

    /// Encoder quality, 1 to 100.
    #[arg(long, value_name = "QUALITY")]
    pub quality: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub backend: BackendSettings,
    pub media: MediaSettings,
    pub locale: LocalePolicy,
    pub catalog: PricePolicy,
    pub site: SiteSettings,
    pub cms: ChromeCodes,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub url: Url,
    pub database: String,
    pub credentials: Option<BackendCredentials>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct BackendCredentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub cache_folder: PathBuf,
    pub cache_url: String,
    pub base_image: String,
    pub data_path: PathBuf,
    pub default_quality: Quality,
    pub max_dimension: u32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub base_url: String,
    pub title: String,
}

impl Settings {
    /// Thumbnail generator settings; sources live under `data_path/database`.
    pub fn thumbnail_config(&self) -> ThumbnailConfig {
        ThumbnailConfig {
            source_root: self.media.data_path.join(&self.backend.database),
            cache_dir: self.media.cache_folder.clone(),
            cache_url: self.media.cache_url.clone(),
            placeholder_url: self.media.base_image.clone(),
            default_quality: self.media.default_quality,
            max_dimension: self.media.max_dimension,
        }
    }
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

pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("locale.accepted")
            .with_list_parse_key("cms.home_blocks"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Sitemap(args)) => raw.apply_backend_override(&args.backend),
        Some(Command::Thumbnail(args)) => {
            raw.apply_backend_override(&args.backend);
            raw.apply_media_override(&args.media);
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    backend: RawBackendSettings,
    media: RawMediaSettings,
    locale: RawLocaleSettings,
    catalog: RawCatalogSettings,
    site: RawSiteSettings,
    cms: RawCmsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_backend_override(&overrides.backend);
        self.apply_media_override(&overrides.media);
    }

    fn apply_backend_override(&mut self, overrides: &BackendOverride) {
        if let Some(url) = overrides.backend_url.as_ref() {
            self.backend.url = Some(url.clone());
        }
        if let Some(database) = overrides.backend_database.as_ref() {
            self.backend.database = Some(database.clone());
        }
    }

    fn apply_media_override(&mut self, overrides: &MediaOverride) {
        if let Some(folder) = overrides.media_cache_folder.as_ref() {
            self.media.cache_folder = Some(folder.clone());
        }
        if let Some(path) = overrides.media_data_path.as_ref() {
            self.media.data_path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            backend,
            media,
            locale,
            catalog,
            site,
            cms,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let backend = build_backend_settings(backend)?;
        let media = build_media_settings(media)?;
        let locale = build_locale_policy(locale)?;
        let site = build_site_settings(site, &server)?;

        Ok(Self {
            server,
            logging,
            backend,
            media,
            locale,
            catalog: PricePolicy {
                guest_price: catalog.guest_price,
                login_price: catalog.login_price,
                manager_price: catalog.manager_price,
            },
            site,
            cms: ChromeCodes {
                main_menu: cms.main_menu,
                footer_menu: cms.footer_menu,
                catalog_menu: cms.catalog_menu,
                home_carousel: cms.home_carousel,
                home_blocks: cms
                    .home_blocks
                    .into_iter()
                    .map(|code| code.trim().to_string())
                    .filter(|code| !code.is_empty())
                    .collect(),
            },
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

    Ok(ServerSettings {
        addr,
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

    Ok(LoggingSettings { level, format })
}

fn build_backend_settings(backend: RawBackendSettings) -> Result<BackendSettings, LoadError> {
    let raw_url = backend
        .url
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
    let url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("backend.url", format!("invalid url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "backend.url",
            "scheme must be http or https",
        ));
    }

    let database = non_empty(backend.database)
        .unwrap_or_else(|| DEFAULT_BACKEND_DATABASE.to_string());
    if database.contains(['/', '\\']) || database.starts_with('.') {
        return Err(LoadError::invalid(
            "backend.database",
            "must be a plain database name",
        ));
    }

    let credentials = match (non_empty(backend.user), backend.password) {
        (Some(user), Some(password)) => Some(BackendCredentials { user, password }),
        (Some(_), None) => {
            return Err(LoadError::invalid(
                "backend.password",
                "required when backend.user is set",
            ));
        }
        (None, _) => None,
    };

    let timeout_secs = backend
        .timeout_seconds
        .unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "backend.timeout_seconds",
            "must be greater than zero",
        ));
    }

    Ok(BackendSettings {
        url,
        database,
        credentials,
        timeout: Duration::from_secs(timeout_secs),
    })
}

fn build_media_settings(media: RawMediaSettings) -> Result<MediaSettings, LoadError> {
    let cache_folder = media
        .cache_folder
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FOLDER));
    if cache_folder.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "media.cache_folder",
            "path must not be empty",
        ));
    }

    let data_path = media
        .data_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH));
    if data_path.as_os_str().is_empty() {
        return Err(LoadError::invalid("media.data_path", "path must not be empty"));
    }

    let cache_url = non_empty(media.cache_url).unwrap_or_else(|| DEFAULT_CACHE_URL.to_string());
    let base_image = non_empty(media.base_image).unwrap_or_else(|| DEFAULT_BASE_IMAGE.to_string());

    let default_quality = Quality::new(media.default_quality.unwrap_or(DEFAULT_QUALITY.into()))
        .map_err(|err| LoadError::invalid("media.default_quality", err.to_string()))?;

    let max_dimension = media.max_dimension.unwrap_or(DEFAULT_MAX_DIMENSION);
    if max_dimension == 0 {
        return Err(LoadError::invalid(
            "media.max_dimension",
            "must be greater than zero",
        ));
    }

    Ok(MediaSettings {
        cache_folder,
        cache_url,
        base_image,
        data_path,
        default_quality,
        max_dimension,
    })
}

fn build_locale_policy(locale: RawLocaleSettings) -> Result<LocalePolicy, LoadError> {
    let default_tag = non_empty(locale.default).unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
    let default = Language::from_tag(&default_tag).ok_or_else(|| {
        LoadError::invalid("locale.default", format!("`{default_tag}` is not a locale tag"))
    })?;

    let mut accepted = Vec::with_capacity(locale.accepted.len());
    for tag in locale.accepted.iter().filter(|tag| !tag.trim().is_empty()) {
        let language = Language::from_tag(tag).ok_or_else(|| {
            LoadError::invalid("locale.accepted", format!("`{tag}` is not a locale tag"))
        })?;
        accepted.push(language);
    }

    Ok(LocalePolicy::new(default, accepted))
}

fn build_site_settings(
    site: RawSiteSettings,
    server: &ServerSettings,
) -> Result<SiteSettings, LoadError> {
    let base_url = non_empty(site.base_url).unwrap_or_else(|| format!("http://{}", server.addr));
    Url::parse(&base_url)
        .map_err(|err| LoadError::invalid("site.base_url", format!("invalid url: {err}")))?;

    Ok(SiteSettings {
        base_url,
        title: non_empty(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawBackendSettings {
    url: Option<String>,
    database: Option<String>,
    user: Option<String>,
    password: Option<String>,
    timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawMediaSettings {
    cache_folder: Option<PathBuf>,
    cache_url: Option<String>,
    base_image: Option<String>,
    data_path: Option<PathBuf>,
    default_quality: Option<u16>,
    max_dimension: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLocaleSettings {
    default: Option<String>,
    accepted: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCatalogSettings {
    guest_price: bool,
    login_price: bool,
    manager_price: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    base_url: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCmsSettings {
    main_menu: String,
    footer_menu: String,
    catalog_menu: String,
    home_carousel: String,
    home_blocks: Vec<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
