use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres URL. `None` runs the service on the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    /// Prefix of the `Location` header returned on create and update.
    pub public_base_url: String,
    pub cache: CacheConfig,
    pub resilience: ResilienceConfig,
}

/// Bounds of the cache region. Both unset means entries live until overwritten.
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    pub max_capacity: Option<u64>,
    pub time_to_live: Option<Duration>,
}

/// Circuit breaker and time limiter settings, shared by every guarded operation.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Consecutive failures that open a breaker.
    pub failure_threshold: u32,
    /// Failure ratio over `window` that opens a breaker.
    pub failure_rate: f64,
    /// Calls required inside `window` before `failure_rate` is evaluated.
    pub minimum_calls: u32,
    pub window: Duration,
    /// First cool-down; later ones double up to `max_open_duration`.
    pub open_duration: Duration,
    pub max_open_duration: Duration,
    pub time_limit: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_rate: 0.5,
            minimum_calls: 10,
            window: Duration::from_secs(30),
            open_duration: Duration::from_secs(10),
            max_open_duration: Duration::from_secs(60),
            time_limit: Duration::from_millis(1000),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ResilienceConfig::default();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .ok()
                .filter(|url| !url.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "9081".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("PUBLIC_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| "http://register:9081".to_string()),
            cache: CacheConfig {
                max_capacity: optional_var("CACHE_MAX_CAPACITY")?,
                time_to_live: optional_var("CACHE_TTL_SECS")?.map(Duration::from_secs),
            },
            resilience: ResilienceConfig {
                failure_threshold: optional_var("CB_FAILURE_THRESHOLD")?
                    .unwrap_or(defaults.failure_threshold),
                failure_rate: optional_var("CB_FAILURE_RATE")?
                    .map(|rate: f64| {
                        if !(rate > 0.0 && rate <= 1.0) {
                            anyhow::bail!("CB_FAILURE_RATE must be in (0, 1]");
                        }
                        Ok(rate)
                    })
                    .transpose()?
                    .unwrap_or(defaults.failure_rate),
                minimum_calls: optional_var("CB_MINIMUM_CALLS")?
                    .unwrap_or(defaults.minimum_calls),
                window: optional_var("CB_WINDOW_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.window),
                open_duration: optional_var("CB_OPEN_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.open_duration),
                max_open_duration: optional_var("CB_MAX_OPEN_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.max_open_duration),
                time_limit: optional_var("TIME_LIMIT_MS")?
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.time_limit),
            },
        };

        if config.resilience.failure_threshold == 0 {
            anyhow::bail!("CB_FAILURE_THRESHOLD must be at least 1");
        }
        if config.resilience.open_duration.is_zero() {
            anyhow::bail!("CB_OPEN_MS must be at least 1");
        }
        if config.resilience.window.is_zero() {
            anyhow::bail!("CB_WINDOW_SECS must be at least 1");
        }
        if config.resilience.max_open_duration < config.resilience.open_duration {
            anyhow::bail!("CB_MAX_OPEN_MS cannot be lower than CB_OPEN_MS");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", url_prefix(url)),
            None => tracing::warn!("DATABASE_URL not set, records are kept in memory only"),
        }
        tracing::debug!("Public base URL: {}", config.public_base_url);
        tracing::debug!("Cache: {:?}", config.cache);
        tracing::debug!("Resilience: {:?}", config.resilience);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// First characters of a connection URL, enough to identify it in logs.
fn url_prefix(url: &str) -> String {
    url.chars().take(20).collect()
}

fn optional_var<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", name, raw)),
        _ => Ok(None),
    }
}
