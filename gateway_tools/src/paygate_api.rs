use log::*;
use reqwest::Method;

use crate::{
    config::PayGateConfig,
    data_objects::{NewCharge, RawTransaction, TransactionStatus},
    rest::RestClient,
    PayGateError,
};

/// Client for the payment gateway's charge API.
#[derive(Clone)]
pub struct PayGateApi {
    client: RestClient,
}

impl PayGateApi {
    pub fn new(config: PayGateConfig) -> Result<Self, PayGateError> {
        let client = RestClient::new(&config.base_url, &config.server_key, config.timeout)
            .map_err(PayGateError::Initialization)?;
        Ok(Self { client })
    }

    /// Registers a charge. The gateway answers with the pending transaction and, for hosted payment pages, the URL
    /// to send the customer to.
    pub async fn create_charge(&self, charge: NewCharge) -> Result<TransactionStatus, PayGateError> {
        debug!("Creating charge {} for {}", charge.merchant_ref, charge.gross_amount);
        let raw = self.client.query::<RawTransaction, NewCharge>(Method::POST, "/v2/charge", Some(charge)).await?;
        let status = TransactionStatus::try_from(raw)?;
        info!("Charge {} created. Gateway reference {}", status.merchant_ref, status.transaction_id);
        Ok(status)
    }

    /// Asks the gateway for the current state of the charge with our reference `merchant_ref`.
    pub async fn charge_status(&self, merchant_ref: &str) -> Result<TransactionStatus, PayGateError> {
        let path = format!("/v2/{merchant_ref}/status");
        debug!("Fetching status of charge {merchant_ref}");
        let raw = self.client.query::<RawTransaction, ()>(Method::GET, &path, None).await?;
        let status = TransactionStatus::try_from(raw)?;
        debug!("Charge {merchant_ref} is {}", status.state);
        Ok(status)
    }
}
