//! Secret resolution.
//!
//! # Contract
//! - Config YAML stores only env var **names** (e.g. `"BROKER_ACCOUNT"`).
//! - At startup, callers invoke [`resolve_secrets_for_mode`] once. The
//!   returned [`ResolvedSecrets`] is passed into constructors; never scatter
//!   `std::env::var` calls elsewhere.
//! - `Debug` impls on all secret-containing structs **redact** values.
//! - Error messages reference the env var **name**, never the value.
//!
//! # Resolution order
//! For a secret named `name` with env var `ENV_VAR`, the first hit wins:
//! 1. Docker secrets mount: `/run/secrets/<name>`
//! 2. Local secrets directory: `./secrets/<name>.txt`
//! 3. `<ENV_VAR>_FILE` — an env var pointing at a file to read
//! 4. `<ENV_VAR>` directly
//! 5. a configured default
//!
//! # Mode-aware enforcement
//! - `LIVE`: broker account and dashboard secret key are **required**.
//! - `PAPER`: broker account is **required**; dashboard secret key optional.
//! - `BACKTEST`: nothing required — all optional.
//!
//! Notification tokens, Redis password, and SMTP password are always
//! optional in every mode.

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};

const DOCKER_SECRETS_DIR: &str = "/run/secrets";
const LOCAL_SECRETS_DIR: &str = "./secrets";

/// Resolve one named secret, trying each source in order. `name` is the
/// logical secret name (used for the file-based lookups); `env_var` is the
/// environment variable name (used for the `_FILE`/direct lookups).
pub fn get_secret(name: &str, env_var: &str, default: Option<&str>) -> Option<String> {
    if let Some(v) = read_secret_file(Path::new(DOCKER_SECRETS_DIR).join(name)) {
        return Some(v);
    }
    if let Some(v) = read_secret_file(Path::new(LOCAL_SECRETS_DIR).join(format!("{name}.txt"))) {
        return Some(v);
    }
    if let Ok(file_path) = std::env::var(format!("{env_var}_FILE")) {
        if let Some(v) = read_secret_file(PathBuf::from(file_path)) {
            return Some(v);
        }
    }
    if let Some(v) = resolve_env(env_var) {
        return Some(v);
    }
    default.map(|d| d.to_string())
}

fn read_secret_file(path: impl AsRef<Path>) -> Option<String> {
    let contents = std::fs::read_to_string(path).ok()?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Notification/secondary secrets, all optional in every mode.
#[derive(Clone)]
pub struct ResolvedNotifications {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub smtp_password: Option<String>,
    pub redis_password: Option<String>,
}

impl std::fmt::Debug for ResolvedNotifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedNotifications")
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "telegram_chat_id",
                &self.telegram_chat_id.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "smtp_password",
                &self.smtp_password.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "redis_password",
                &self.redis_password.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

/// All runtime-resolved secrets for one engine instantiation. Built once at
/// startup via [`resolve_secrets_for_mode`]. **Values are redacted in
/// `Debug` output.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Broker account identifier (e.g. an IB paper account, `DU`-prefixed).
    pub broker_account: Option<String>,
    pub dashboard_secret_key: Option<String>,
    pub notifications: ResolvedNotifications,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "broker_account",
                &self.broker_account.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "dashboard_secret_key",
                &self.dashboard_secret_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field("notifications", &self.notifications)
            .finish()
    }
}

struct SecretNames {
    broker_account_env: String,
    dashboard_secret_key_env: String,
    telegram_bot_token_env: String,
    telegram_chat_id_env: String,
    smtp_password_env: String,
    redis_password_env: String,
}

fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_secret_names(config_json: &Value) -> SecretNames {
    SecretNames {
        broker_account_env: read_str_at(config_json, "/broker/account_env")
            .unwrap_or_else(|| "SLOB_BROKER_ACCOUNT".to_string()),
        dashboard_secret_key_env: read_str_at(config_json, "/dashboard/secret_key_env")
            .unwrap_or_else(|| "SLOB_DASHBOARD_SECRET_KEY".to_string()),
        telegram_bot_token_env: read_str_at(config_json, "/notifications/telegram_bot_token_env")
            .unwrap_or_else(|| "SLOB_TELEGRAM_BOT_TOKEN".to_string()),
        telegram_chat_id_env: read_str_at(config_json, "/notifications/telegram_chat_id_env")
            .unwrap_or_else(|| "SLOB_TELEGRAM_CHAT_ID".to_string()),
        smtp_password_env: read_str_at(config_json, "/notifications/smtp_password_env")
            .unwrap_or_else(|| "SLOB_SMTP_PASSWORD".to_string()),
        redis_password_env: read_str_at(config_json, "/notifications/redis_password_env")
            .unwrap_or_else(|| "SLOB_REDIS_PASSWORD".to_string()),
    }
}

/// Resolve all secrets for the given `mode` string (case-insensitive:
/// `"LIVE"`, `"PAPER"`, `"BACKTEST"`).
///
/// # Errors
/// Returns `Err` naming the first missing required secret's env var. The
/// actual value is never mentioned.
pub fn resolve_secrets_for_mode(config_json: &Value, mode: &str) -> Result<ResolvedSecrets> {
    let names = parse_secret_names(config_json);
    let mode_upper = mode.trim().to_ascii_uppercase();

    let broker_account = get_secret("broker_account", &names.broker_account_env, None);
    let dashboard_secret_key =
        get_secret("dashboard_secret_key", &names.dashboard_secret_key_env, None);

    match mode_upper.as_str() {
        "LIVE" => {
            if broker_account.is_none() {
                bail!(
                    "SECRETS_MISSING mode=LIVE: required secret '{}' is not set",
                    names.broker_account_env,
                );
            }
            if dashboard_secret_key.is_none() {
                bail!(
                    "SECRETS_MISSING mode=LIVE: required secret '{}' is not set",
                    names.dashboard_secret_key_env,
                );
            }
        }
        "PAPER" => {
            if broker_account.is_none() {
                bail!(
                    "SECRETS_MISSING mode=PAPER: required secret '{}' is not set",
                    names.broker_account_env,
                );
            }
        }
        "BACKTEST" => {
            // No required secrets in BACKTEST.
        }
        other => {
            bail!(
                "SECRETS_UNKNOWN_MODE: unrecognised mode '{}'; \
                 expected one of: LIVE | PAPER | BACKTEST",
                other,
            );
        }
    }

    let notifications = ResolvedNotifications {
        telegram_bot_token: get_secret(
            "telegram_bot_token",
            &names.telegram_bot_token_env,
            None,
        ),
        telegram_chat_id: get_secret("telegram_chat_id", &names.telegram_chat_id_env, None),
        smtp_password: get_secret("smtp_password", &names.smtp_password_env, None),
        redis_password: get_secret("redis_password", &names.redis_password_env, Some("")),
    };

    Ok(ResolvedSecrets {
        broker_account,
        dashboard_secret_key,
        notifications,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backtest_mode_requires_nothing() {
        let cfg = serde_json::json!({});
        let secrets = resolve_secrets_for_mode(&cfg, "backtest").unwrap();
        assert!(secrets.broker_account.is_none());
    }

    #[test]
    fn redis_password_defaults_to_empty_string() {
        let cfg = serde_json::json!({});
        std::env::remove_var("SLOB_REDIS_PASSWORD");
        let secrets = resolve_secrets_for_mode(&cfg, "backtest").unwrap();
        assert_eq!(secrets.notifications.redis_password.as_deref(), Some(""));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let cfg = serde_json::json!({});
        assert!(resolve_secrets_for_mode(&cfg, "nonsense").is_err());
    }
}
