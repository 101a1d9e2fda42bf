use slob_schemas::Direction;

/// Deterministic broker message ID suitable for inbox de-dupe.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BrokerMessageId(pub String);

impl BrokerMessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Accepted,
    Filled,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderSnapshot {
    pub broker_order_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub qty: u32,
    pub filled_qty: u32,
    pub status: OrderStatus,
}

impl OrderSnapshot {
    pub fn new(broker_order_id: String, symbol: String, direction: Direction, qty: u32) -> Self {
        Self {
            broker_order_id,
            symbol,
            direction,
            qty,
            filled_qty: 0,
            status: OrderStatus::Accepted,
        }
    }
}
