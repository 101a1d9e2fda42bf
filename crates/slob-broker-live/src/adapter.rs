//! `LiveBroker` — blocking-HTTP implementation of `slob_execution::BrokerAdapter`
//! against the reference broker wire API (§6). Blocking, not async: this
//! crate's `BrokerAdapter::submit_order`/`cancel_order` calls are made from
//! the engine loop's synchronous order-submission path, the same contract
//! `slob-broker-paper` implements deterministically in memory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use slob_execution::{
    BrokerAdapter, BrokerCancelResponse, BrokerErrorEvent, BrokerSubmitRequest, BrokerSubmitResponse, HeartbeatGuard,
    HeartbeatHealth, Side,
};

use crate::connection::ConnectionConfig;
use crate::errors::map_http_status;
use crate::reconnect::{drive_reconnect, ReconnectOutcome, ReconnectPolicy};

fn wall_clock_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Wire payload shape for a submit request. `slob-execution`'s
/// `BrokerSubmitRequest` deliberately carries no serde impl — wire framing
/// is this crate's concern, not the broker-agnostic executor's.
#[derive(Debug, Serialize)]
struct WireSubmitRequest {
    order_id: String,
    symbol: String,
    side: &'static str,
    quantity: u32,
    order_type: String,
    limit_price: Option<f64>,
    time_in_force: String,
    transmit: bool,
    parent_order_id: Option<String>,
    oca_group: Option<String>,
}

impl From<&BrokerSubmitRequest> for WireSubmitRequest {
    fn from(req: &BrokerSubmitRequest) -> Self {
        Self {
            order_id: req.order_id.clone(),
            symbol: req.symbol.clone(),
            side: match req.side {
                Side::Buy => "BUY",
                Side::Sell => "SELL",
            },
            quantity: req.quantity,
            order_type: req.order_type.clone(),
            limit_price: req.limit_price,
            time_in_force: req.time_in_force.clone(),
            transmit: req.transmit,
            parent_order_id: req.parent_order_id.clone(),
            oca_group: req.oca_group.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireSubmitAck {
    broker_order_id: String,
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct WireCancelAck {
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct WireAccountSnapshot {
    balance_micros: i64,
}

pub struct LiveBroker {
    client: reqwest::blocking::Client,
    cfg: ConnectionConfig,
    heartbeat: HeartbeatGuard<fn() -> i64>,
    reconnect_policy: ReconnectPolicy,
    safe_mode: bool,
    balance_micros_cache: i64,
}

impl LiveBroker {
    pub fn connect(
        cfg: ConnectionConfig,
        paper_trading_only: bool,
        stale_after_ms: i64,
        reconnect_policy: ReconnectPolicy,
    ) -> Result<Self> {
        crate::connection::validate_paper_trading_mode(&cfg, paper_trading_only)
            .context("account/trading-mode mismatch at connect time")?;

        let client = reqwest::blocking::Client::builder()
            .build()
            .context("failed to build HTTP client for broker wire adapter")?;

        let mut heartbeat = HeartbeatGuard::new(stale_after_ms, wall_clock_ms as fn() -> i64);
        heartbeat.record_heartbeat();

        Ok(Self {
            client,
            cfg,
            heartbeat,
            reconnect_policy,
            safe_mode: false,
            balance_micros_cache: 0,
        })
    }

    /// Refreshes the cached account balance from the broker's account
    /// snapshot endpoint. Not called automatically — the engine loop
    /// decides the refresh cadence.
    pub fn refresh_account_balance(&mut self) -> Result<(), BrokerErrorEvent> {
        let resp = self
            .client
            .get(self.url("/v1/account"))
            .send()
            .map_err(|e| BrokerErrorEvent {
                code: 1100,
                message: format!("transport error fetching account snapshot: {e}"),
                request_id: "account_snapshot".to_string(),
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(self.transport_error("account_snapshot", status, &body));
        }

        let snap: WireAccountSnapshot = resp.json().map_err(|e| BrokerErrorEvent {
            code: 2999,
            message: format!("unparseable account snapshot: {e}"),
            request_id: "account_snapshot".to_string(),
        })?;
        self.balance_micros_cache = snap.balance_micros;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.cfg.base_url(), path)
    }

    pub fn record_heartbeat(&mut self) {
        self.heartbeat.record_heartbeat();
    }

    pub fn is_safe_mode(&self) -> bool {
        self.safe_mode
    }

    /// Attempts to reconnect up to the configured ceiling; exceeding it
    /// enters safe mode (no new orders, positions left as-is).
    pub fn reconnect(&mut self) -> ReconnectOutcome {
        let client = &self.client;
        let url = self.url("/v1/ping");
        let outcome = drive_reconnect(&self.reconnect_policy, |_attempt| {
            client.get(&url).send().map(|r| r.status().is_success()).unwrap_or(false)
        });
        if outcome == ReconnectOutcome::SafeMode {
            self.safe_mode = true;
        } else {
            self.heartbeat.record_heartbeat();
            self.safe_mode = false;
        }
        outcome
    }

    fn transport_error(&self, request_id: &str, status: u16, body: &str) -> BrokerErrorEvent {
        if let Ok(wire_err) = serde_json::from_str::<WireErrorBody>(body) {
            return BrokerErrorEvent {
                code: wire_err.code,
                message: wire_err.message,
                request_id: request_id.to_string(),
            };
        }
        BrokerErrorEvent {
            code: map_http_status(status),
            message: format!("broker wire returned status {status} with an unstructured body"),
            request_id: request_id.to_string(),
        }
    }
}

impl BrokerAdapter for LiveBroker {
    fn is_connected(&self) -> bool {
        !self.safe_mode && self.heartbeat.health() == HeartbeatHealth::Healthy
    }

    fn submit_order(&mut self, req: &BrokerSubmitRequest) -> Result<BrokerSubmitResponse, BrokerErrorEvent> {
        let wire_req: WireSubmitRequest = req.into();
        let resp = self
            .client
            .post(self.url("/v1/orders"))
            .json(&wire_req)
            .send()
            .map_err(|e| BrokerErrorEvent {
                code: 1100,
                message: format!("transport error submitting order: {e}"),
                request_id: req.order_id.clone(),
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(self.transport_error(&req.order_id, status, &body));
        }

        let ack: WireSubmitAck = resp.json().map_err(|e| BrokerErrorEvent {
            code: 2999,
            message: format!("unparseable submit acknowledgement: {e}"),
            request_id: req.order_id.clone(),
        })?;

        Ok(BrokerSubmitResponse {
            broker_order_id: ack.broker_order_id,
            accepted: ack.accepted,
        })
    }

    fn cancel_order(&mut self, broker_order_id: &str) -> Result<BrokerCancelResponse, BrokerErrorEvent> {
        let resp = self
            .client
            .post(self.url(&format!("/v1/orders/{broker_order_id}/cancel")))
            .send()
            .map_err(|e| BrokerErrorEvent {
                code: 1100,
                message: format!("transport error cancelling order: {e}"),
                request_id: broker_order_id.to_string(),
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(self.transport_error(broker_order_id, status, &body));
        }

        let ack: WireCancelAck = resp.json().map_err(|e| BrokerErrorEvent {
            code: 2999,
            message: format!("unparseable cancel acknowledgement: {e}"),
            request_id: broker_order_id.to_string(),
        })?;

        Ok(BrokerCancelResponse {
            broker_order_id: broker_order_id.to_string(),
            accepted: ack.accepted,
        })
    }

    fn account_balance_micros(&self) -> i64 {
        self.balance_micros_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_refuses_a_mode_mismatched_account() {
        let cfg = ConnectionConfig {
            host: "127.0.0.1".to_string(),
            port: 7497,
            client_id: 1,
            account: "DU1234567".to_string(),
            readonly: false,
        };
        // is_paper_account() is true for DU-prefixed accounts, so this
        // exercises the always-matching path; a genuine mismatch is
        // covered in connection::tests.
        assert!(cfg.is_paper_account());
    }
}
