//! Bridges from the `gateway_tools` clients to the engine's collaborator traits.
mod paygate;
mod shipper;

pub use paygate::PayGateGateway;
pub use shipper::{ShipperProvider, ShippingBackend};
