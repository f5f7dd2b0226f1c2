use crate::{db_types::Setting, traits::EngineError};

/// Key/value storage for runtime business settings.
#[allow(async_fn_in_trait)]
pub trait SettingsStore {
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, EngineError>;

    async fn fetch_all_settings(&self) -> Result<Vec<Setting>, EngineError>;

    async fn upsert_setting(&self, key: &str, value: &str) -> Result<Setting, EngineError>;
}
