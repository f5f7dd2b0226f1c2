use std::{env, time::Duration};

use gateway_tools::{PayGateConfig, ShipperConfig};
use log::*;
use shopkeep_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_SK_HOST: &str = "127.0.0.1";
const DEFAULT_SK_PORT: u16 = 8360;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_CONNECTIONS: u32 = 25;
/// The header the shipping provider puts its webhook signature in.
pub const SHIPPER_SIGNATURE_HEADER: &str = "X-Shipper-Signature";
/// The header the payment gateway puts its notification signature in.
pub const GATEWAY_SIGNATURE_HEADER: &str = "X-Callback-Signature";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    /// The secret the payment gateway signs its push notifications with. Notifications are always rejected while
    /// this is empty.
    pub gateway_signing_key: Secret<String>,
    /// The secret the shipping provider signs its webhook calls with.
    pub shipper_webhook_secret: Secret<String>,
    /// If false, shipping webhooks are accepted without a signature. **DANGER**
    pub shipper_hmac_checks: bool,
    /// How often the expiration sweep runs.
    pub sweep_interval: Duration,
    /// Size of each event channel.
    pub event_buffer_size: usize,
    pub paygate: PayGateConfig,
    /// `None` when no shipping provider is configured. Shipments are then booked by hand.
    pub shipper: Option<ShipperConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SK_HOST.to_string(),
            port: DEFAULT_SK_PORT,
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            gateway_signing_key: Secret::default(),
            shipper_webhook_secret: Secret::default(),
            shipper_hmac_checks: true,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            event_buffer_size: 25,
            paygate: PayGateConfig::default(),
            shipper: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SK_HOST").ok().unwrap_or_else(|| DEFAULT_SK_HOST.into());
        let port = env::var("SK_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!("🪛️ {s} is not a valid port for SK_PORT. {e} Using the default, {DEFAULT_SK_PORT}.");
                    DEFAULT_SK_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SK_PORT);
        let database_url = env::var("SK_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SK_DATABASE_URL is not set. Please set it to the URL for the Shopkeep database.");
            String::default()
        });
        let max_connections = env::var("SK_DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| {
                s.parse::<u32>()
                    .map_err(|e| warn!("🪛️ Invalid configuration value for SK_DB_MAX_CONNECTIONS. {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);
        let gateway_signing_key = env::var("SK_GATEWAY_SIGNING_KEY").ok().unwrap_or_else(|| {
            error!(
                "🪛️ SK_GATEWAY_SIGNING_KEY is not set. Every payment notification will be rejected until it is. \
                 Payments will still be picked up by status inquiries."
            );
            String::default()
        });
        let shipper_webhook_secret = env::var("SK_SHIPPER_WEBHOOK_SECRET").ok().unwrap_or_default();
        let shipper_hmac_checks = parse_boolean_flag(env::var("SK_SHIPPER_HMAC_CHECKS").ok(), true);
        if !shipper_hmac_checks {
            warn!("🚨️ Shipping webhook signatures are NOT being checked. Do not run like this in production.");
        }
        let sweep_interval = configure_sweep_interval();
        let event_buffer_size = env::var("SK_EVENT_BUFFER_SIZE")
            .ok()
            .and_then(|s| s.parse::<usize>().map_err(|e| warn!("🪛️ Invalid SK_EVENT_BUFFER_SIZE. {e}")).ok())
            .unwrap_or(25);
        let paygate = PayGateConfig::new_from_env_or_default();
        let shipper = parse_boolean_flag(env::var("SK_USE_SHIPPER").ok(), false)
            .then(ShipperConfig::new_from_env_or_default);
        if shipper.is_none() {
            info!("🪛️ No shipping provider configured. Shipments will be booked manually.");
        }
        Self {
            host,
            port,
            database_url,
            max_connections,
            gateway_signing_key: Secret::new(gateway_signing_key),
            shipper_webhook_secret: Secret::new(shipper_webhook_secret),
            shipper_hmac_checks,
            sweep_interval,
            event_buffer_size,
            paygate,
            shipper,
        }
    }
}

fn configure_sweep_interval() -> Duration {
    env::var("SK_SWEEP_INTERVAL_SECS")
        .map_err(|_| {
            info!(
                "🪛️ SK_SWEEP_INTERVAL_SECS is not set. Using the default value of {} s.",
                DEFAULT_SWEEP_INTERVAL.as_secs()
            )
        })
        .and_then(|s| {
            s.parse::<u64>()
                .map_err(|e| warn!("🪛️ Invalid configuration value for SK_SWEEP_INTERVAL_SECS. {e}"))
                .and_then(|secs| match secs {
                    0 => Err(warn!("🪛️ SK_SWEEP_INTERVAL_SECS cannot be zero")),
                    s => Ok(Duration::from_secs(s)),
                })
        })
        .ok()
        .unwrap_or(DEFAULT_SWEEP_INTERVAL)
}
