use std::time::Duration;
use url::Url;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Single automation webhook shared by all three flows.
    pub webhook_url: Url,
    pub webhook_timeout: Duration,
    /// Whether consultations pause between progress stages.
    pub stage_pacing: bool,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            port: lookup("PORT")
                .unwrap_or_else(|| DEFAULT_PORT.to_string())
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_url: lookup("WEBHOOK_URL")
                .ok_or_else(|| anyhow::anyhow!("WEBHOOK_URL environment variable required"))
                .and_then(|raw| parse_webhook_url(&raw))?,
            webhook_timeout: lookup("WEBHOOK_TIMEOUT_SECS")
                .map(|raw| {
                    raw.trim()
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .ok_or_else(|| {
                            anyhow::anyhow!("WEBHOOK_TIMEOUT_SECS must be a positive number")
                        })
                })
                .transpose()?
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            stage_pacing: lookup("STAGE_PACING")
                .map(|raw| parse_bool(&raw))
                .transpose()
                .map_err(|_| anyhow::anyhow!("STAGE_PACING must be true or false"))?
                .unwrap_or(true),
            max_upload_bytes: lookup("MAX_UPLOAD_BYTES")
                .map(|raw| {
                    raw.trim()
                        .parse::<usize>()
                        .ok()
                        .filter(|bytes| *bytes > 0)
                        .ok_or_else(|| anyhow::anyhow!("MAX_UPLOAD_BYTES must be a positive number"))
                })
                .transpose()?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };

        // Log successful configuration load (the webhook path acts as a secret)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!(
            "Webhook host: {}",
            config.webhook_url.host_str().unwrap_or("unknown")
        );
        tracing::debug!("Webhook timeout: {:?}", config.webhook_timeout);
        tracing::debug!("Stage pacing: {}", config.stage_pacing);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

fn parse_webhook_url(raw: &str) -> anyhow::Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        anyhow::bail!("WEBHOOK_URL cannot be empty");
    }
    let url = Url::parse(raw).map_err(|e| anyhow::anyhow!("WEBHOOK_URL is not a valid URL: {}", e))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        anyhow::bail!("WEBHOOK_URL must start with http:// or https://");
    }
    Ok(url)
}

fn parse_bool(raw: &str) -> Result<bool, ()> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(()),
    }
}
