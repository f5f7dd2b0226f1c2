mod config;
mod data_objects;
mod error;
mod paygate_api;
mod rest;
mod shipper_api;

pub mod helpers;

pub use config::{PayGateConfig, ShipperConfig, DEFAULT_TIMEOUT};
pub use data_objects::{
    ChargeState,
    CustomerDetails,
    NewCharge,
    NewShipment,
    ShipmentBooking,
    ShipmentLine,
    ShipmentWebhook,
    TransactionStatus,
};
pub use error::{PayGateError, ShipperError};
pub use paygate_api::PayGateApi;
pub use shipper_api::ShipperApi;
