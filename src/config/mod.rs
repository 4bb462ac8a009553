//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU32, path::PathBuf, str::FromStr};

use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::{
    comments::CommentsEmbed,
    feed::{
        DEFAULT_HOME_PAGE_SIZE, DEFAULT_STATIC_PATHS_LIMIT, DEFAULT_STATIC_PATHS_PAGE_SIZE,
        FeedLimits,
    },
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "spacetraveling";
const ENV_PREFIX: &str = "SPACETRAVELING";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SITE_TITLE: &str = "Space Traveling";
const DEFAULT_TIMEZONE: &str = "America/Sao_Paulo";
const DEFAULT_COMMENTS_ISSUE_TERM: &str = "pathname";
const DEFAULT_COMMENTS_THEME: &str = "github-dark";
/// Largest `pageSize` the CMS search API accepts.
const MAX_PAGE_SIZE: u64 = 100;

/// Command-line arguments for the Space Traveling binary.
#[derive(Debug, Parser)]
#[command(
    name = "spacetraveling",
    version,
    about = "Space Traveling blog server"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "SPACETRAVELING_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Prerender the site and serve it over HTTP.
    Serve(Box<ServeArgs>),
    /// Walk the whole post listing and print one JSON summary per line.
    Posts(PostsArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverrides {
    /// Override the CMS API endpoint, e.g. `https://<repo>.cdn.prismic.io/api/v2`.
    #[arg(long = "content-endpoint", value_name = "URL", value_hint = ValueHint::Url)]
    pub endpoint: Option<String>,

    /// Override the CMS access token.
    #[arg(long = "content-access-token", value_name = "TOKEN")]
    pub access_token: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the logging level (e.g. info, debug).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(long = "log-json", value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log_json: Option<bool>,

    /// Override how many posts the home page shows before "load more".
    #[arg(long = "home-page-size", value_name = "COUNT")]
    pub home_page_size: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct PostsArgs {
    #[command(flatten)]
    pub content: ContentOverrides,

    /// Posts requested per page while walking the listing.
    #[arg(long = "page-size", default_value_t = 20, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub page_size: u32,

    /// Stop after this many posts.
    #[arg(long, value_name = "COUNT")]
    pub limit: Option<usize>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub site: SiteSettings,
    pub comments: Option<CommentsSettings>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
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
pub struct ContentSettings {
    /// `None` until configured; commands that reach the CMS refuse to start without it.
    pub endpoint: Option<Url>,
    pub access_token: Option<String>,
    pub home_page_size: NonZeroU32,
    pub static_paths_page_size: NonZeroU32,
    pub static_paths_limit: usize,
}

impl ContentSettings {
    pub fn feed_limits(&self) -> FeedLimits {
        FeedLimits {
            home_page_size: self.home_page_size.get(),
            static_paths_page_size: self.static_paths_page_size.get(),
            static_paths_limit: self.static_paths_limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub timezone: Tz,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentsSettings {
    pub repo: String,
    pub issue_term: String,
    pub label: Option<String>,
    pub theme: String,
}

impl From<CommentsSettings> for CommentsEmbed {
    fn from(settings: CommentsSettings) -> Self {
        CommentsEmbed {
            repo: settings.repo,
            issue_term: settings.issue_term,
            label: settings.label,
            theme: settings.theme,
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
        Some(Command::Posts(args)) => raw.apply_content_overrides(&args.content),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    site: RawSiteSettings,
    comments: RawCommentsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_content_overrides(&overrides.content);
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(size) = overrides.home_page_size {
            self.content.home_page_size = Some(size);
        }
    }

    fn apply_content_overrides(&mut self, overrides: &ContentOverrides) {
        if let Some(endpoint) = overrides.endpoint.as_ref() {
            self.content.endpoint = Some(endpoint.clone());
        }
        if let Some(token) = overrides.access_token.as_ref() {
            self.content.access_token = Some(token.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            site,
            comments,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let content = build_content_settings(content)?;
        let site = build_site_settings(site)?;
        let comments = build_comments_settings(comments);

        Ok(Self {
            server,
            logging,
            content,
            site,
            comments,
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

    Ok(ServerSettings { addr })
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

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let endpoint = match non_blank(content.endpoint) {
        Some(raw) => {
            let url = Url::parse(&raw).map_err(|err| {
                LoadError::invalid("content.endpoint", format!("invalid URL `{raw}`: {err}"))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(LoadError::invalid(
                    "content.endpoint",
                    "endpoint must use http or https",
                ));
            }
            Some(url)
        }
        None => None,
    };

    let home_page_size = page_size(
        content
            .home_page_size
            .unwrap_or(u64::from(DEFAULT_HOME_PAGE_SIZE)),
        "content.home_page_size",
    )?;
    let static_paths_page_size = page_size(
        content
            .static_paths_page_size
            .unwrap_or(u64::from(DEFAULT_STATIC_PATHS_PAGE_SIZE)),
        "content.static_paths_page_size",
    )?;

    Ok(ContentSettings {
        endpoint,
        access_token: non_blank(content.access_token),
        home_page_size,
        static_paths_page_size,
        static_paths_limit: content
            .static_paths_limit
            .unwrap_or(DEFAULT_STATIC_PATHS_LIMIT),
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let title = non_blank(site.title).unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());
    let timezone_name =
        non_blank(site.timezone).unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = timezone_name.parse::<Tz>().map_err(|err| {
        LoadError::invalid(
            "site.timezone",
            format!("unknown timezone `{timezone_name}`: {err}"),
        )
    })?;

    Ok(SiteSettings { title, timezone })
}

/// Comments stay disabled until a repository is configured.
fn build_comments_settings(comments: RawCommentsSettings) -> Option<CommentsSettings> {
    let repo = non_blank(comments.repo)?;
    Some(CommentsSettings {
        repo,
        issue_term: non_blank(comments.issue_term)
            .unwrap_or_else(|| DEFAULT_COMMENTS_ISSUE_TERM.to_string()),
        label: non_blank(comments.label),
        theme: non_blank(comments.theme).unwrap_or_else(|| DEFAULT_COMMENTS_THEME.to_string()),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    endpoint: Option<String>,
    access_token: Option<String>,
    home_page_size: Option<u64>,
    static_paths_page_size: Option<u64>,
    static_paths_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    timezone: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCommentsSettings {
    repo: Option<String>,
    issue_term: Option<String>,
    label: Option<String>,
    theme: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn page_size(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    if value > MAX_PAGE_SIZE {
        return Err(LoadError::invalid(
            key,
            format!("must not exceed {MAX_PAGE_SIZE}"),
        ));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert!(settings.content.endpoint.is_none());
        assert_eq!(settings.content.home_page_size.get(), 2);
        assert_eq!(settings.content.static_paths_page_size.get(), 10);
        assert_eq!(settings.site.title, "Space Traveling");
        assert_eq!(settings.site.timezone, chrono_tz::America::Sao_Paulo);
        assert!(settings.comments.is_none());
        assert!(matches!(settings.logging.format, LogFormat::Compact));
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.port = Some(4000);
        raw.logging.level = Some("info".to_string());
        raw.content.endpoint = Some("https://file.cdn.prismic.io/api/v2".to_string());

        let overrides = ServeOverrides {
            server_port: Some(4321),
            log_level: Some("debug".to_string()),
            content: ContentOverrides {
                endpoint: Some("https://cli.cdn.prismic.io/api/v2".to_string()),
                access_token: None,
            },
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
        assert_eq!(
            settings.content.endpoint.map(String::from).as_deref(),
            Some("https://cli.cdn.prismic.io/api/v2")
        );
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn rejects_non_http_endpoint() {
        let mut raw = RawSettings::default();
        raw.content.endpoint = Some("ftp://cms.example/api".to_string());

        let err = Settings::from_raw(raw).expect_err("invalid endpoint");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "content.endpoint",
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_page_sizes() {
        for value in [0, 101] {
            let mut raw = RawSettings::default();
            raw.content.home_page_size = Some(value);
            let err = Settings::from_raw(raw).expect_err("invalid page size");
            assert!(matches!(
                err,
                LoadError::Invalid {
                    key: "content.home_page_size",
                    ..
                }
            ));
        }
    }

    #[test]
    fn rejects_unknown_timezone() {
        let mut raw = RawSettings::default();
        raw.site.timezone = Some("Mars/Olympus_Mons".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn comments_require_a_repository() {
        let mut raw = RawSettings::default();
        raw.comments.theme = Some("github-light".to_string());
        assert!(Settings::from_raw(raw.clone()).expect("valid").comments.is_none());

        raw.comments.repo = Some("owner/repo".to_string());
        let comments = Settings::from_raw(raw)
            .expect("valid")
            .comments
            .expect("enabled");
        assert_eq!(comments.issue_term, "pathname");
        assert_eq!(comments.theme, "github-light");
        assert!(comments.label.is_none());
    }

    #[test]
    fn blank_access_token_is_ignored() {
        let mut raw = RawSettings::default();
        raw.content.access_token = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.content.access_token.is_none());
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["spacetraveling"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_serve_overrides() {
        let args = CliArgs::parse_from([
            "spacetraveling",
            "serve",
            "--server-host",
            "0.0.0.0",
            "--content-endpoint",
            "https://override.cdn.prismic.io/api/v2",
            "--home-page-size",
            "5",
        ]);

        match args.command.expect("serve command") {
            Command::Serve(serve) => {
                assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
                assert_eq!(
                    serve.overrides.content.endpoint.as_deref(),
                    Some("https://override.cdn.prismic.io/api/v2")
                );
                assert_eq!(serve.overrides.home_page_size, Some(5));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn parse_posts_arguments() {
        let args = CliArgs::parse_from([
            "spacetraveling",
            "posts",
            "--page-size",
            "50",
            "--limit",
            "7",
            "--content-access-token",
            "secret",
        ]);

        match args.command.expect("posts command") {
            Command::Posts(posts) => {
                assert_eq!(posts.page_size, 50);
                assert_eq!(posts.limit, Some(7));
                assert_eq!(posts.content.access_token.as_deref(), Some("secret"));
            }
            _ => panic!("wrong command parsed"),
        }
    }

    #[test]
    fn posts_page_size_is_bounded() {
        let result = CliArgs::try_parse_from(["spacetraveling", "posts", "--page-size", "0"]);
        assert!(result.is_err());
    }
}
