use anyhow::{bail, Context, Result};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// Substrings that indicate a literal secret value leaked into config YAML
/// instead of an env-var name pointing at one. Config must only ever carry
/// *names*; values flow in at runtime via [`secrets::resolve_secrets_for_mode`].
const SECRET_VALUE_MARKERS: &[&str] = &["sk-", "AKIA", "-----BEGIN"];

pub mod consumption;
pub mod secrets;

pub use consumption::{
    consumed_pointers, report_unused_keys, ConfigMode, RunMode, UnusedKeyPolicy, UnusedKeysReport,
};
pub use secrets::{get_secret, resolve_secrets_for_mode, ResolvedNotifications, ResolvedSecrets};

/// Load + merge YAML files in order, then canonicalize to JSON and hash.
/// Later files override earlier files via deep-merge.
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut sources = Vec::with_capacity(paths.len());
    for p in paths {
        sources.push(fs::read_to_string(p).with_context(|| format!("read config: {p}"))?);
    }
    let refs: Vec<&str> = sources.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&refs)
}

/// Same merge/canonicalize/hash pipeline as [`load_layered_yaml`], but over
/// already-loaded YAML strings. Used by tests and by callers that have
/// already sourced config text from somewhere other than the filesystem.
pub fn load_layered_yaml_from_strings(sources: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Default::default());

    for (i, s) in sources.iter().enumerate() {
        let yaml_val: serde_yaml::Value =
            serde_yaml::from_str(s).with_context(|| format!("parse yaml: source[{i}]"))?;
        let json_val = serde_json::to_value(yaml_val).context("yaml->json conversion failed")?;
        deep_merge(&mut merged, json_val);
    }

    scan_for_literal_secrets(&merged)?;

    // Canonicalize (stable key order) by sorting all object keys recursively
    // before serializing, so the same logical config always hashes the same.
    let canonical = canonicalize_json(&merged);

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let hash = hex::encode(hasher.finalize());

    Ok(LoadedConfig {
        config_json: serde_json::from_str(&canonical).context("canonical json parse failed")?,
        canonical_json: canonical,
        config_hash: hash,
    })
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_json: Value,
    pub canonical_json: String,
    pub config_hash: String,
}

/// Deep-merge: objects merge recursively; arrays replaced; scalars overwritten.
fn deep_merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => {
            for (k, v) in src_map {
                match dst_map.get_mut(&k) {
                    Some(existing) => deep_merge(existing, v),
                    None => {
                        dst_map.insert(k, v);
                    }
                }
            }
        }
        (dst_slot, src_val) => {
            *dst_slot = src_val;
        }
    }
}

/// Canonicalize JSON by sorting all object keys recursively and emitting compact JSON.
fn canonicalize_json(v: &Value) -> String {
    let sorted = sort_keys(v);
    serde_json::to_string(&sorted).expect("json serialization must not fail")
}

/// Rejects a merged config that embeds a literal secret-like value anywhere
/// in its tree (objects, arrays, or scalars), after the full deep-merge so
/// an overlay file can't smuggle one in past a clean base config.
fn scan_for_literal_secrets(v: &Value) -> Result<()> {
    match v {
        Value::String(s) => {
            if let Some(marker) = SECRET_VALUE_MARKERS.iter().find(|m| s.contains(**m)) {
                bail!(
                    "CONFIG_SECRET_DETECTED: value matches secret-like pattern '{marker}' — \
                     config must store an env var NAME, not a literal secret value"
                );
            }
            Ok(())
        }
        Value::Object(map) => {
            for v in map.values() {
                scan_for_literal_secrets(v)?;
            }
            Ok(())
        }
        Value::Array(arr) => {
            for v in arr {
                scan_for_literal_secrets(v)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn sort_keys(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().cloned().collect();
            keys.sort();
            let mut new = serde_json::Map::new();
            for k in keys {
                new.insert(k.clone(), sort_keys(&map[&k]));
            }
            Value::Object(new)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_keys).collect()),
        _ => v.clone(),
    }
}
