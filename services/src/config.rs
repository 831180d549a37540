use serde::Deserialize;
use std::env::vars;
use std::fmt::Display;
use tracing::info;

/// Default page size for paginated endpoints.
pub const DEFAULT_PAGE_SIZE: u32 = 6;

/// Default upper bound for a decoded recipe image.
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Default session token lifetime (one week).
pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "prod")]
    Prod,
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Test => write!(f, "test"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

// The final, validated configuration struct.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    database_url: String,
    server_addr: String,
    port: u16,
    jwt_secret: String,
    token_ttl_hours: i64,
    media_root: String,
    media_url: String,
    page_size: u32,
    max_image_bytes: usize,
    google_cloud_project: Option<String>,
}

// Intermediate struct for deserializing environment variables
// where most fields may be absent.
#[derive(Deserialize)]
struct RawConfig {
    env: Env,
    database_url: String,
    server_addr: Option<String>,
    port: Option<u16>,
    jwt_secret: Option<String>,
    token_ttl_hours: Option<i64>,
    media_root: Option<String>,
    media_url: Option<String>,
    page_size: Option<u32>,
    max_image_bytes: Option<usize>,
    google_cloud_project: Option<String>,
}

impl Config {
    /// Create a test configuration with default values.
    ///
    /// Available to unit and integration tests; not meant for production code.
    pub fn new_for_test() -> Self {
        Self {
            env: Env::Test,
            database_url: "postgres://localhost:5432/foodgram_test".to_owned(),
            server_addr: "127.0.0.1".to_owned(),
            port: 8080,
            jwt_secret: "test-jwt-secret-key-for-local-development".to_owned(),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            media_root: "media".to_owned(),
            media_url: "/media/".to_owned(),
            page_size: DEFAULT_PAGE_SIZE,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            google_cloud_project: None,
        }
    }

    /// Same as [`Config::new_for_test`] with a custom image size limit.
    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.max_image_bytes = max_image_bytes;
        self
    }

    pub fn environment(&self) -> Env {
        self.env
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_local(&self) -> bool {
        matches!(self.env, Env::Local | Env::Test)
    }

    /// Secret used to sign and verify session tokens.
    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours)
    }

    pub fn media_root(&self) -> &str {
        &self.media_root
    }

    pub fn media_url(&self) -> &str {
        &self.media_url
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn max_image_bytes(&self) -> usize {
        self.max_image_bytes
    }

    pub fn google_cloud_project(&self) -> Option<&str> {
        self.google_cloud_project.as_deref()
    }

    /// Initializes configuration by reading from environment variables
    /// and applying environment-aware defaults.
    pub fn init() -> anyhow::Result<Self> {
        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            token_ttl_hours,
            media_root,
            media_url,
            page_size,
            max_image_bytes,
            google_cloud_project,
        } = raw_config;

        let server_addr = server_addr.unwrap_or_else(|| {
            let default_addr = match env {
                Env::Local | Env::Test => "127.0.0.1",
                Env::Prod => "0.0.0.0",
            };
            info!("SERVER_ADDR not set, defaulting to {default_addr} for {env} environment");
            default_addr.to_owned()
        });

        let port = match port {
            Some(port) => port,
            None if matches!(env, Env::Local | Env::Test) => 8080,
            None => anyhow::bail!("PORT must be set for {env} environment"),
        };

        let jwt_secret = match jwt_secret {
            Some(secret) if !secret.is_empty() => secret,
            _ if matches!(env, Env::Local | Env::Test) => {
                info!("JWT_SECRET not set, using default for {env} environment");
                "default-jwt-secret-for-local-development-only".to_owned()
            }
            _ => anyhow::bail!("JWT_SECRET must be set for {env} environment"),
        };

        let token_ttl_hours = token_ttl_hours.unwrap_or(DEFAULT_TOKEN_TTL_HOURS);
        if token_ttl_hours <= 0 {
            anyhow::bail!("TOKEN_TTL_HOURS must be positive, got {token_ttl_hours}");
        }

        let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            anyhow::bail!("PAGE_SIZE must be at least 1");
        }

        let mut media_url = media_url.unwrap_or_else(|| "/media/".to_owned());
        if !media_url.ends_with('/') {
            media_url.push('/');
        }

        if matches!(env, Env::Prod) && google_cloud_project.is_none() {
            anyhow::bail!("GOOGLE_CLOUD_PROJECT must be set for {env} environment");
        }

        Ok(Config {
            env,
            database_url,
            server_addr,
            port,
            jwt_secret,
            token_ttl_hours,
            media_root: media_root.unwrap_or_else(|| "media".to_owned()),
            media_url,
            page_size,
            max_image_bytes: max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
            google_cloud_project,
        })
    }
}
