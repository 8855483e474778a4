use crate::services::{media_host::ImageKitConfig, staging};
use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_UPLOAD_URL: &str = "https://upload.imagekit.io/api/v1/files/upload";
const DEFAULT_API_URL: &str = "https://api.imagekit.io/v1";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub staging_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub owner_email: String,
    pub imagekit: ImageKitConfig,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Photo and video feed API")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_FEED_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_FEED_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides PHOTO_FEED_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory uploads are staged in before forwarding (overrides PHOTO_FEED_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Largest accepted upload body in bytes (overrides PHOTO_FEED_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Email of the account new posts are attributed to (overrides PHOTO_FEED_OWNER_EMAIL)
    #[arg(long)]
    pub owner_email: Option<String>,

    /// ImageKit private API key (overrides IMAGEKIT_PRIVATE_KEY)
    #[arg(long)]
    pub imagekit_private_key: Option<String>,

    /// ImageKit upload endpoint (overrides IMAGEKIT_UPLOAD_URL)
    #[arg(long)]
    pub imagekit_upload_url: Option<String>,

    /// ImageKit management API base URL (overrides IMAGEKIT_API_URL)
    #[arg(long)]
    pub imagekit_api_url: Option<String>,

    /// Timeout for media host requests in seconds (overrides IMAGEKIT_TIMEOUT_SECS)
    #[arg(long)]
    pub host_timeout_secs: Option<u64>,

    /// Create the schema and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::resolve(args)?, migrate))
    }

    /// Merge parsed CLI args over environment values and defaults.
    pub fn resolve(args: Args) -> Result<Self> {
        let env_host = env::var("PHOTO_FEED_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("PHOTO_FEED_PORT")?.unwrap_or(8000);
        let env_db = env::var("PHOTO_FEED_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/photo_feed.db".into());
        let env_staging = env::var("PHOTO_FEED_STAGING_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| staging::default_dir());
        let env_max_upload =
            parse_env("PHOTO_FEED_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let env_owner =
            env::var("PHOTO_FEED_OWNER_EMAIL").unwrap_or_else(|_| "owner@localhost".into());
        let env_upload_url =
            env::var("IMAGEKIT_UPLOAD_URL").unwrap_or_else(|_| DEFAULT_UPLOAD_URL.into());
        let env_api_url = env::var("IMAGEKIT_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let env_timeout = parse_env("IMAGEKIT_TIMEOUT_SECS")?.unwrap_or(300);

        let private_key = args
            .imagekit_private_key
            .or_else(|| env::var("IMAGEKIT_PRIVATE_KEY").ok())
            .unwrap_or_default();

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            staging_dir: args.staging_dir.unwrap_or(env_staging),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            owner_email: args.owner_email.unwrap_or(env_owner),
            imagekit: ImageKitConfig {
                private_key,
                upload_url: args.imagekit_upload_url.unwrap_or(env_upload_url),
                api_url: args.imagekit_api_url.unwrap_or(env_api_url),
                timeout: Duration::from_secs(args.host_timeout_secs.unwrap_or(env_timeout)),
            },
        })
    }

    /// Media host settings, failing if no private key was configured.
    ///
    /// Only the server needs this; `--migrate` runs without credentials.
    pub fn media_host(&self) -> Result<&ImageKitConfig> {
        if self.imagekit.private_key.trim().is_empty() {
            bail!("IMAGEKIT_PRIVATE_KEY (or --imagekit-private-key) must be set");
        }
        Ok(&self.imagekit)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Keeps the private key out of startup logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("staging_dir", &self.staging_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("owner_email", &self.owner_email)
            .field("imagekit_upload_url", &self.imagekit.upload_url)
            .field("imagekit_api_url", &self.imagekit.api_url)
            .field("host_timeout", &self.imagekit.timeout)
            .finish_non_exhaustive()
    }
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
