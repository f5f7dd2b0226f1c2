//! Runtime business settings.
//!
//! Settings live in the `settings` table so that admins can change them without a restart. Reads go through a
//! short-lived cache; one `SettingsApi` is constructed at start-up and shared (behind an `Arc`) by the other APIs.
use std::{
    collections::HashMap,
    fmt::Debug,
    str::FromStr,
    time::{Duration, Instant},
};

use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::Setting,
    traits::{EngineError, PreOrderPolicy, SettingsStore},
};

pub const DEPOSIT_PERCENT: &str = "preorder_deposit_percent";
pub const BALANCE_DUE_DAYS: &str = "preorder_balance_due_days";
pub const INVOICE_TTL_HOURS: &str = "invoice_ttl_hours";
pub const INVOICE_REMINDER_HOURS: &str = "invoice_reminder_hours";
pub const BALANCE_REMINDER_DAYS: &str = "balance_reminder_days";

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_INVOICE_TTL_HOURS: i64 = 24;
pub const DEFAULT_INVOICE_REMINDER_HOURS: i64 = 20;
pub const DEFAULT_BALANCE_REMINDER_DAYS: [i64; 2] = [3, 1];

struct Snapshot {
    loaded_at: Instant,
    values: HashMap<String, String>,
}

pub struct SettingsApi<B> {
    db: B,
    ttl: Duration,
    cache: RwLock<Option<Snapshot>>,
}

impl<B> Debug for SettingsApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettingsApi")
    }
}

impl<B> SettingsApi<B>
where B: SettingsStore
{
    pub fn new(db: B) -> Self {
        Self { db, ttl: DEFAULT_CACHE_TTL, cache: RwLock::new(None) }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// The raw value of a setting, served from the cache while it is fresh.
    pub async fn value(&self, key: &str) -> Result<Option<String>, EngineError> {
        {
            let cache = self.cache.read().await;
            if let Some(snapshot) = cache.as_ref().filter(|s| s.loaded_at.elapsed() < self.ttl) {
                return Ok(snapshot.values.get(key).cloned());
            }
        }
        let mut cache = self.cache.write().await;
        // another task may have refreshed the cache while we waited for the lock
        if let Some(snapshot) = cache.as_ref().filter(|s| s.loaded_at.elapsed() < self.ttl) {
            return Ok(snapshot.values.get(key).cloned());
        }
        let settings = self.db.fetch_all_settings().await?;
        let values = settings.into_iter().map(|s| (s.key, s.value)).collect::<HashMap<_, _>>();
        trace!("🪛️ Settings cache refreshed with {} values", values.len());
        let result = values.get(key).cloned();
        *cache = Some(Snapshot { loaded_at: Instant::now(), values });
        Ok(result)
    }

    /// Reads and parses a setting. Missing or unparseable values fall back to `default`, with a warning for the latter.
    pub async fn parsed<T: FromStr>(&self, key: &str, default: T) -> Result<T, EngineError> {
        match self.value(key).await? {
            None => Ok(default),
            Some(v) => match v.trim().parse::<T>() {
                Ok(t) => Ok(t),
                Err(_) => {
                    warn!("🪛️ Setting {key} has an invalid value '{v}'. Using the default instead.");
                    Ok(default)
                },
            },
        }
    }

    pub async fn preorder_policy(&self) -> Result<PreOrderPolicy, EngineError> {
        let defaults = PreOrderPolicy::default();
        let mut deposit_percent = self.parsed(DEPOSIT_PERCENT, defaults.deposit_percent).await?;
        if deposit_percent == 0 || deposit_percent > 100 {
            warn!("🪛️ Deposit percentage {deposit_percent} is out of range. Using {}.", defaults.deposit_percent);
            deposit_percent = defaults.deposit_percent;
        }
        let mut balance_due_days = self.parsed(BALANCE_DUE_DAYS, defaults.balance_due_days).await?;
        if balance_due_days <= 0 {
            warn!("🪛️ Balance due days must be positive. Using {}.", defaults.balance_due_days);
            balance_due_days = defaults.balance_due_days;
        }
        Ok(PreOrderPolicy { deposit_percent, balance_due_days })
    }

    /// How long an unpaid full, deposit or top-up invoice stays payable.
    pub async fn invoice_ttl(&self) -> Result<chrono::Duration, EngineError> {
        let hours = self.positive_hours(INVOICE_TTL_HOURS, DEFAULT_INVOICE_TTL_HOURS).await?;
        Ok(chrono::Duration::hours(hours))
    }

    /// The age at which an unpaid invoice gets its "about to expire" reminder.
    pub async fn invoice_reminder_after(&self) -> Result<chrono::Duration, EngineError> {
        let hours = self.positive_hours(INVOICE_REMINDER_HOURS, DEFAULT_INVOICE_REMINDER_HOURS).await?;
        Ok(chrono::Duration::hours(hours))
    }

    /// Days-before-due thresholds for balance reminders, largest first. Stage `n` is the `n`th entry.
    pub async fn balance_reminder_days(&self) -> Result<Vec<i64>, EngineError> {
        let days = match self.value(BALANCE_REMINDER_DAYS).await? {
            None => None,
            Some(v) => {
                let parsed = parse_reminder_days(&v);
                if parsed.is_none() {
                    warn!("🪛️ Setting {BALANCE_REMINDER_DAYS} has an invalid value '{v}'. Using the default.");
                }
                parsed
            },
        };
        Ok(days.unwrap_or_else(|| DEFAULT_BALANCE_REMINDER_DAYS.to_vec()))
    }

    pub async fn all_settings(&self) -> Result<Vec<Setting>, EngineError> {
        self.db.fetch_all_settings().await
    }

    /// Writes a setting and drops the cache, so the next read sees the new value.
    pub async fn update(&self, key: &str, value: &str) -> Result<Setting, EngineError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(EngineError::Validation("Setting keys cannot be empty".into()));
        }
        let setting = self.db.upsert_setting(key, value.trim()).await?;
        self.invalidate().await;
        Ok(setting)
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    async fn positive_hours(&self, key: &str, default: i64) -> Result<i64, EngineError> {
        let hours = self.parsed(key, default).await?;
        if hours <= 0 {
            warn!("🪛️ Setting {key} must be positive. Using {default}.");
            return Ok(default);
        }
        Ok(hours)
    }
}

/// Parses a comma-separated list of positive day counts, e.g. `"3,1"`. The result is sorted largest first, without
/// repeats.
pub fn parse_reminder_days(value: &str) -> Option<Vec<i64>> {
    let mut days = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().ok().filter(|d| *d > 0))
        .collect::<Option<Vec<i64>>>()?;
    if days.is_empty() {
        return None;
    }
    days.sort_unstable_by(|a, b| b.cmp(a));
    days.dedup();
    Some(days)
}
