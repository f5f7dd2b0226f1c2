//! # Shopkeep server
//! The HTTP face of the Shopkeep order and payment engine. It is responsible for:
//! * Taking orders from the storefront and the point of sale, and handing out invoices to pay.
//! * Receiving payment notifications from the payment gateway, and picking up payments the gateway never told us about.
//! * Receiving shipment updates from the shipping provider.
//! * Giving shop staff the levers to move orders along: arrival, shipping, cancellation and refunds.
//! * Running the expiration sweep in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! Customer facing routes live under `/api`:
//! * `POST /api/checkout`, `POST /api/pos`: Place an order.
//! * `GET /api/orders/{number}`, `POST /api/orders/{number}/check_status`: Order status. Unpaid invoices are checked
//!   against the gateway on the way.
//! * `GET /api/invoices/{number}`, `POST /api/invoices/{number}/pay`, `POST /api/invoices/{number}/pay_with_wallet`
//! * `POST /api/wallet/topup`, `GET /api/wallet/{user_id}`
//!
//! Back office routes live under `/api/admin`. See [routes](routes/index.html) for the full list.
//!
//! Integration callbacks:
//! * `POST /gateway/notify`, `GET /gateway/return`: The payment gateway.
//! * `POST /shipping/webhook`: The shipping provider. Calls must carry a valid HMAC signature.
//! * `GET /health`: A health check route that returns a 200 OK response.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;
pub mod sweep_worker;

#[cfg(test)]
mod endpoint_tests;
