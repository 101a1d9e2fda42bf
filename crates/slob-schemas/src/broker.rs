use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wire-level broker types, decimal fields kept as `String` exactly as the
/// broker's own JSON represents them. Adapters in `slob-broker-live` parse
/// these into `i64` micros via [`crate::prices::f64_to_micros`] at the
/// boundary; nothing upstream of the adapter ever sees a broker `f64`
/// directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerOrder {
    pub broker_order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub r#type: String,
    pub status: String,
    pub qty: String,
    pub limit_price: Option<String>,
    pub stop_price: Option<String>,
    /// Set whenever this order belongs to an OCA bracket (entry/SL/TP), the
    /// group identifier carries the `setup_id` prefix used for duplicate
    /// detection.
    pub oca_group: Option<String>,
    pub order_ref: Option<String>,
    pub created_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerFill {
    pub broker_fill_id: String,
    pub broker_order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub qty: String,
    pub price: String,
    pub fee: String,
    pub ts_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub qty: String,
    pub avg_price: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerAccount {
    pub equity: String,
    pub cash: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub captured_at_utc: DateTime<Utc>,
    pub account: BrokerAccount,
    pub orders: Vec<BrokerOrder>,
    pub fills: Vec<BrokerFill>,
    pub positions: Vec<BrokerPosition>,
}
