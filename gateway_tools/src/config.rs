use std::time::Duration;

use log::*;
use shopkeep_common::Secret;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PayGateConfig {
    pub base_url: String,
    pub server_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for PayGateConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sandbox.paygate.example".to_string(),
            server_key: Secret::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl PayGateConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SK_PAYGATE_URL").unwrap_or_else(|_| {
            warn!("🪛️ SK_PAYGATE_URL not set, using the sandbox gateway");
            PayGateConfig::default().base_url
        });
        let server_key = Secret::new(std::env::var("SK_PAYGATE_SERVER_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SK_PAYGATE_SERVER_KEY not set. Calls to the payment gateway will be rejected.");
            String::default()
        }));
        let timeout = timeout_from_env("SK_PAYGATE_TIMEOUT");
        Self { base_url: trim_url(base_url), server_key, timeout }
    }
}

#[derive(Debug, Clone)]
pub struct ShipperConfig {
    pub base_url: String,
    pub api_key: Secret<String>,
    pub timeout: Duration,
}

impl Default for ShipperConfig {
    fn default() -> Self {
        let base_url = "https://api.shipper.example".to_string();
        Self { base_url, api_key: Secret::default(), timeout: DEFAULT_TIMEOUT }
    }
}

impl ShipperConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SK_SHIPPER_URL").unwrap_or_else(|_| {
            warn!("🪛️ SK_SHIPPER_URL not set, using (probably useless) default");
            ShipperConfig::default().base_url
        });
        let api_key = Secret::new(std::env::var("SK_SHIPPER_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SK_SHIPPER_API_KEY not set. Shipments cannot be booked.");
            String::default()
        }));
        let timeout = timeout_from_env("SK_SHIPPER_TIMEOUT");
        Self { base_url: trim_url(base_url), api_key, timeout }
    }
}

/// Reads a timeout in seconds. Missing, unparseable or zero values give [`DEFAULT_TIMEOUT`].
fn timeout_from_env(var: &str) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| {
            s.trim()
                .parse::<u64>()
                .map_err(|e| warn!("🪛️ Invalid value for {var}: {s}. {e}. Using the default timeout."))
                .ok()
        })
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}

fn trim_url(url: String) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn urls_lose_their_trailing_slash() {
        assert_eq!(trim_url(" https://api.example.com/ ".into()), "https://api.example.com");
        assert_eq!(trim_url("https://api.example.com/v2".into()), "https://api.example.com/v2");
    }

    #[test]
    fn missing_timeouts_use_the_default() {
        assert_eq!(timeout_from_env("SK_TEST_TIMEOUT_THAT_IS_NEVER_SET"), DEFAULT_TIMEOUT);
    }
}
