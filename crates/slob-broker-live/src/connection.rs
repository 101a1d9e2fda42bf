//! Connection parameters for the reference broker wire adapter (§6):
//! host, port, client id, account, readonly flag. Port convention and the
//! paper-account sentinel prefix ("DU...") are enforced here, at connect
//! time, before any order traffic is attempted.

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub client_id: u32,
    pub account: String,
    pub readonly: bool,
}

/// Accounts recognized as paper accounts carry this sentinel prefix.
pub const PAPER_ACCOUNT_PREFIX: &str = "DU";

impl ConnectionConfig {
    pub fn is_paper_account(&self) -> bool {
        self.account.starts_with(PAPER_ACCOUNT_PREFIX)
    }

    pub fn base_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("configured for paper trading but account '{0}' is not a paper account")]
    AccountNotPaper(String),
    #[error("configured for live trading but account '{0}' is a paper account")]
    AccountNotLive(String),
}

/// Refuses to start if the account prefix and the configured trading mode
/// disagree — `OrderExecutor.paper_trading_only` validation lives one layer
/// up; this is the connection-time half of the same guarantee (§9 design
/// note: paper-account prefix validation cross-checked at startup).
pub fn validate_paper_trading_mode(cfg: &ConnectionConfig, paper_trading_only: bool) -> Result<(), ConnectionError> {
    match (paper_trading_only, cfg.is_paper_account()) {
        (true, false) => Err(ConnectionError::AccountNotPaper(cfg.account.clone())),
        (false, true) => Err(ConnectionError::AccountNotLive(cfg.account.clone())),
        _ => Ok(()),
    }
}
