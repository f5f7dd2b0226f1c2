use gateway_tools::{
    helpers::gateway_amount,
    ChargeState,
    CustomerDetails,
    NewCharge,
    PayGateApi,
    PayGateError,
    TransactionStatus,
};
use log::*;
use shopkeep_engine::{
    db_types::PaymentMethod,
    traits::{ChargeRequest, ChargeResponse, GatewayNotification, GatewayPaymentStatus},
    GatewayError,
    PaymentGateway,
};

/// The payment gateway, as the engine sees it.
#[derive(Clone)]
pub struct PayGateGateway {
    api: PayGateApi,
}

impl PayGateGateway {
    pub fn new(api: PayGateApi) -> Self {
        Self { api }
    }
}

impl PaymentGateway for PayGateGateway {
    async fn submit(&self, request: ChargeRequest) -> Result<ChargeResponse, GatewayError> {
        let charge = new_charge(request);
        let status = self.api.create_charge(charge).await.map_err(gateway_error)?;
        Ok(ChargeResponse {
            gateway_ref: status.transaction_id,
            redirect_url: status.redirect_url,
            status: payment_status(status.state),
        })
    }

    async fn inquire(&self, merchant_ref: &str) -> Result<GatewayNotification, GatewayError> {
        let status = self.api.charge_status(merchant_ref).await.map_err(gateway_error)?;
        Ok(notification(status))
    }

    fn parse_notification(&self, body: &[u8]) -> Result<GatewayNotification, GatewayError> {
        TransactionStatus::from_notification(body).map(notification).map_err(gateway_error)
    }
}

fn new_charge(request: ChargeRequest) -> NewCharge {
    let customer_details = request.customer_name.map(|first_name| CustomerDetails {
        first_name,
        email: request.customer_email,
        phone: request.customer_phone,
    });
    NewCharge {
        merchant_ref: request.merchant_ref,
        gross_amount: gateway_amount(request.amount),
        payment_type: request.method.to_string(),
        item_description: format!("Invoice {}", request.invoice_number),
        customer_details,
        expiry_time: request.expires_at,
    }
}

fn payment_status(state: ChargeState) -> GatewayPaymentStatus {
    match state {
        ChargeState::Pending => GatewayPaymentStatus::Pending,
        ChargeState::Settled => GatewayPaymentStatus::Paid,
        ChargeState::Failed => GatewayPaymentStatus::Failed,
        ChargeState::Expired => GatewayPaymentStatus::Expired,
    }
}

fn notification(status: TransactionStatus) -> GatewayNotification {
    GatewayNotification {
        merchant_ref: status.merchant_ref,
        gateway_ref: Some(status.transaction_id),
        status: payment_status(status.state),
        amount: status.gross_amount,
        method: status.payment_type.map(PaymentMethod::from),
    }
}

fn gateway_error(e: PayGateError) -> GatewayError {
    debug!("🔄️ Payment gateway error: {e}");
    match e {
        PayGateError::Timeout => GatewayError::Timeout("payment gateway".into()),
        PayGateError::Unreachable(s) => GatewayError::Unreachable(format!("payment gateway. {s}")),
        PayGateError::QueryError { status, message } => GatewayError::UnexpectedStatus { status, message },
        PayGateError::Initialization(s) => GatewayError::NotConfigured(format!("payment gateway. {s}")),
        PayGateError::JsonError(s) => GatewayError::MalformedResponse(s),
        PayGateError::MissingField(field) => GatewayError::MalformedResponse(format!("missing field '{field}'")),
        PayGateError::InvalidAmount(s) => GatewayError::MalformedResponse(format!("invalid amount {s}")),
        PayGateError::UnknownStatus(s) => GatewayError::MalformedResponse(format!("unknown status {s}")),
    }
}

#[cfg(test)]
mod test {
    use chrono::{TimeZone, Utc};
    use shopkeep_engine::db_types::Money;

    use super::*;

    #[test]
    fn charges_carry_the_attempt_reference() {
        let request = ChargeRequest {
            merchant_ref: "INV-20240612-7F3A2C-1".into(),
            invoice_number: "INV-20240612-7F3A2C".into(),
            amount: Money::from(470_000),
            method: PaymentMethod::from("bca_va"),
            customer_name: Some("Sari".into()),
            customer_email: Some("sari@example.com".into()),
            customer_phone: None,
            expires_at: Some(Utc.with_ymd_and_hms(2024, 6, 13, 9, 0, 0).unwrap()),
        };
        let charge = new_charge(request);
        assert_eq!(charge.merchant_ref, "INV-20240612-7F3A2C-1");
        assert_eq!(charge.gross_amount, "470000.00");
        assert_eq!(charge.payment_type, "bca_va");
        assert_eq!(charge.customer_details.unwrap().email.as_deref(), Some("sari@example.com"));
    }

    #[test]
    fn notifications_map_onto_engine_statuses() {
        let body = br#"{"order_id":"M-1","transaction_id":"tx-9","transaction_status":"capture",
            "gross_amount":"25000.00","payment_type":"qris"}"#;
        let gateway = TransactionStatus::from_notification(body).map(notification).unwrap();
        assert_eq!(gateway.merchant_ref, "M-1");
        assert_eq!(gateway.gateway_ref.as_deref(), Some("tx-9"));
        assert_eq!(gateway.status, GatewayPaymentStatus::Paid);
        assert_eq!(gateway.amount, Some(Money::from(25_000)));
        assert_eq!(gateway.method, Some(PaymentMethod::from("qris")));
        assert_eq!(payment_status(ChargeState::Expired), GatewayPaymentStatus::Expired);
        assert_eq!(payment_status(ChargeState::Failed), GatewayPaymentStatus::Failed);
    }

    #[test]
    fn client_errors_become_gateway_errors() {
        assert!(matches!(gateway_error(PayGateError::Timeout), GatewayError::Timeout(_)));
        let err = gateway_error(PayGateError::QueryError { status: 401, message: "Unauthorized".into() });
        assert!(matches!(err, GatewayError::UnexpectedStatus { status: 401, .. }));
        assert!(matches!(gateway_error(PayGateError::MissingField("order_id")), GatewayError::MalformedResponse(_)));
    }
}
