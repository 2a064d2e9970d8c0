use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    /// Minutes a pending order (and its QR) stays payable.
    pub order_ttl_minutes: i64,
    /// Period of the background expiry sweep.
    pub sweep_interval_secs: u64,
    /// Period of the display-subscriber reconciliation poll.
    pub display_poll_ms: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let order_ttl_minutes = env::var("ORDER_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(15);
        let sweep_interval_secs = env::var("SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60);
        let display_poll_ms = env::var("DISPLAY_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(1000);
        Ok(Self {
            database_url,
            host,
            port,
            order_ttl_minutes,
            sweep_interval_secs,
            display_poll_ms,
        })
    }
}
