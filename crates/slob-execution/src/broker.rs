//! Broker-adapter contract — Patch L9 request/response shapes extended with
//! bracket linking (`transmit`, `parent_order_id`, `oca_group`) so a live
//! broker sees one atomic entry+SL+TP group instead of three independent
//! orders.

use crate::types::Side;

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerSubmitRequest {
    pub order_id: String,
    pub symbol: String,
    pub side: Side,
    pub quantity: u32,
    pub order_type: String,
    pub limit_price: Option<f64>,
    pub time_in_force: String,
    /// `false` holds the order at the broker without routing it to the
    /// exchange until a later order in the same group transmits `true` —
    /// how an atomic bracket's parent+children are wired together.
    pub transmit: bool,
    pub parent_order_id: Option<String>,
    /// One-cancels-all group id shared by every leg of one bracket.
    pub oca_group: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerSubmitResponse {
    pub broker_order_id: String,
    pub accepted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerCancelResponse {
    pub broker_order_id: String,
    pub accepted: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerErrorEvent {
    pub code: i32,
    pub message: String,
    pub request_id: String,
}

/// Log-level classification by numeric code range (§6): below 1000 is
/// informational, 1000-1999 is a warning, 2000 and above is an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorSeverity {
    Informational,
    Warning,
    Error,
}

pub fn severity(code: i32) -> ErrorSeverity {
    if code < 1000 {
        ErrorSeverity::Informational
    } else if code < 2000 {
        ErrorSeverity::Warning
    } else {
        ErrorSeverity::Error
    }
}

/// 321: insufficient buying power. The only code that disables trading at
/// the executor level rather than triggering a reconnect or a plain log.
pub fn disables_trading(code: i32) -> bool {
    code == 321
}

/// 502 (session disconnected), 1100 (connectivity lost), 2103 (order id
/// exceeded) all require the broker gateway to reconnect before further
/// orders can go through. 1102 (connectivity restored) is explicitly
/// informational-only and is not included here.
pub fn requires_reconnect(code: i32) -> bool {
    matches!(code, 502 | 1100 | 2103)
}

/// Adapter contract a concrete broker connection implements. `slob-execution`
/// only ever talks to `B: BrokerAdapter` — it never knows which broker is
/// behind it. `slob-broker-paper`/`slob-broker-live` provide the concrete
/// implementations.
pub trait BrokerAdapter {
    fn is_connected(&self) -> bool;
    fn submit_order(&mut self, req: &BrokerSubmitRequest) -> Result<BrokerSubmitResponse, BrokerErrorEvent>;
    fn cancel_order(&mut self, broker_order_id: &str) -> Result<BrokerCancelResponse, BrokerErrorEvent>;
    fn account_balance_micros(&self) -> i64;
}

/// Thin routing layer over a `BrokerAdapter`: owns nothing broker-specific,
/// only converts and forwards. Retry/backoff and pre-submission gating live
/// one layer up in `OrderExecutor`.
pub struct OrderRouter<B: BrokerAdapter> {
    broker: B,
}

impl<B: BrokerAdapter> OrderRouter<B> {
    pub fn new(broker: B) -> Self {
        Self { broker }
    }

    pub fn is_connected(&self) -> bool {
        self.broker.is_connected()
    }

    pub fn account_balance_micros(&self) -> i64 {
        self.broker.account_balance_micros()
    }

    pub fn submit(&mut self, req: &BrokerSubmitRequest) -> Result<BrokerSubmitResponse, BrokerErrorEvent> {
        self.broker.submit_order(req)
    }

    pub fn cancel(&mut self, broker_order_id: &str) -> Result<BrokerCancelResponse, BrokerErrorEvent> {
        self.broker.cancel_order(broker_order_id)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MockBroker;
    use super::*;

    fn req(transmit: bool, parent: Option<&str>) -> BrokerSubmitRequest {
        BrokerSubmitRequest {
            order_id: "SLOB_abc_1_ENTRY".to_string(),
            symbol: "ESU6".to_string(),
            side: Side::Buy,
            quantity: 1,
            order_type: "LMT".to_string(),
            limit_price: Some(5000.0),
            time_in_force: "DAY".to_string(),
            transmit,
            parent_order_id: parent.map(str::to_string),
            oca_group: Some("SLOB_abc_1".to_string()),
        }
    }

    #[test]
    fn router_forwards_submit_and_cancel_to_the_adapter() {
        let broker = MockBroker::connected_with_balance(50_000_000_000);
        let mut router = OrderRouter::new(broker);
        assert!(router.is_connected());

        let resp = router.submit(&req(false, None)).unwrap();
        assert!(resp.accepted);

        let cancel = router.cancel(&resp.broker_order_id).unwrap();
        assert!(cancel.accepted);
    }

    #[test]
    fn only_insufficient_buying_power_disables_trading() {
        assert!(disables_trading(321));
        assert!(!disables_trading(502));
        assert!(!disables_trading(1100));
    }

    #[test]
    fn the_reconnect_set_matches_the_wire_contract() {
        assert!(requires_reconnect(502));
        assert!(requires_reconnect(1100));
        assert!(requires_reconnect(2103));
        assert!(!requires_reconnect(1102));
        assert!(!requires_reconnect(321));
    }

    #[test]
    fn severity_follows_the_numeric_range_table() {
        assert_eq!(severity(500), ErrorSeverity::Informational);
        assert_eq!(severity(1102), ErrorSeverity::Warning);
        assert_eq!(severity(2103), ErrorSeverity::Error);
    }
}
