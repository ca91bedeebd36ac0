//! Layered YAML configuration.
//!
//! Documents are overlaid in order, later over earlier, with a `null` leaf
//! unsetting a key. The result is checked for literal secrets, canonicalized
//! and hashed. The typed view lives in [`settings`].

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;

pub mod settings;

pub use settings::{DaemonConfig, NodeApiConfig, PollingConfig, PricesConfig, SyncConfig};

/// Env var holding a comma-separated list of config paths.
pub const CONFIG_PATHS_ENV: &str = "WSYNC_CONFIG";

/// If any leaf string value starts with one of these, loading aborts with
/// CONFIG_SECRET_DETECTED. Config stores env var names, never values.
const SECRET_PREFIXES: &[&str] = &[
    "sk-",        // Stripe / OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "gho_",       // GitHub OAuth
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
    "xoxp-",      // Slack user token
    "nsec1",      // nostr private key
];

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

impl LoadedConfig {
    /// Typed, validated view of the merged document.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        SyncConfig::from_json(&self.config_json)
    }
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let layers = paths
        .iter()
        .map(|p| {
            fs::read_to_string(p)
                .map(|raw| (p.to_string(), raw))
                .with_context(|| format!("failed to read yaml path: {p}"))
        })
        .collect::<Result<Vec<_>>>()?;
    load_layers(&layers)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let layers: Vec<(String, String)> = yaml_docs
        .iter()
        .enumerate()
        .map(|(i, raw)| (format!("<layer {i}>"), raw.to_string()))
        .collect();
    load_layers(&layers)
}

/// `(label, raw yaml)` pairs, lowest precedence first.
fn load_layers(layers: &[(String, String)]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(Map::new());
    for (label, raw) in layers {
        let doc: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in {label}"))?;
        let doc = serde_json::to_value(doc)
            .with_context(|| format!("yaml->json conversion failed for {label}"))?;
        match doc {
            // an empty document is an empty layer
            Value::Null => {}
            Value::Object(_) => overlay(&mut merged, doc),
            _ => bail!("CONFIG_INVALID {label}: top level must be a mapping"),
        }
    }

    if let Some(leaf) = find_secret_literal(&merged, &mut String::new()) {
        bail!("CONFIG_SECRET_DETECTED leaf={leaf} value=REDACTED");
    }

    // serde_json::Map is a BTreeMap without `preserve_order`, so keys serialize sorted.
    let canonical_json =
        serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Config paths from `WSYNC_CONFIG`, or empty when unset.
pub fn paths_from_env() -> Vec<String> {
    std::env::var(CONFIG_PATHS_ENV)
        .map(|v| split_paths(&v))
        .unwrap_or_default()
}

fn split_paths(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Apply `layer` on top of `base`. Mappings merge key by key; any other value
/// replaces what was there. A `null` leaf in the layer unsets the key, so a
/// local overlay can switch an optional setting back to its default.
fn overlay(base: &mut Value, layer: Value) {
    match (base, layer) {
        (Value::Object(base_map), Value::Object(layer_map)) => {
            for (key, value) in layer_map {
                if value.is_null() {
                    base_map.remove(&key);
                    continue;
                }
                match base_map.get_mut(&key) {
                    Some(slot) => overlay(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// JSON Pointer of the first string leaf that looks like a credential.
/// `path` is the pointer of `v` and is restored before returning.
fn find_secret_literal(v: &Value, path: &mut String) -> Option<String> {
    let descend = |path: &mut String, token: &str, child: &Value| {
        let len = path.len();
        path.push('/');
        path.push_str(&token.replace('~', "~0").replace('/', "~1"));
        let hit = find_secret_literal(child, path);
        path.truncate(len);
        hit
    };

    match v {
        Value::String(s) if looks_like_secret(s) => Some(path.clone()),
        Value::Object(map) => map.iter().find_map(|(k, child)| descend(path, k, child)),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .find_map(|(i, child)| descend(path, &i.to_string(), child)),
        _ => None,
    }
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim();
    t.len() >= 8 && SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_paths_ignores_blanks() {
        assert_eq!(
            split_paths(" base.yaml, ,local.yaml,"),
            vec!["base.yaml".to_string(), "local.yaml".to_string()]
        );
    }

    #[test]
    fn overlay_overrides_leaves_and_keeps_siblings() {
        let mut base = json!({"polling": {"balances_interval_ms": 1, "quotes_interval_ms": 2}});
        overlay(&mut base, json!({"polling": {"quotes_interval_ms": 5}}));
        assert_eq!(
            base,
            json!({"polling": {"balances_interval_ms": 1, "quotes_interval_ms": 5}})
        );
    }

    #[test]
    fn null_leaf_unsets_the_key() {
        let mut base = json!({"prices": {"provider_url": "http://p", "currency": "eur"}});
        overlay(&mut base, json!({"prices": {"provider_url": null}}));
        assert_eq!(base, json!({"prices": {"currency": "eur"}}));
    }

    #[test]
    fn secret_pointer_escapes_tokens() {
        let v = json!({"a/b": {"c~d": ["ok", "ghp_0123456789"]}});
        let mut path = String::new();
        let hit = find_secret_literal(&v, &mut path).unwrap();
        assert_eq!(hit, "/a~1b/c~0d/1");
        assert!(path.is_empty(), "walk must restore the prefix");
        assert_eq!(v.pointer(&hit).and_then(Value::as_str), Some("ghp_0123456789"));
    }

    #[test]
    fn non_mapping_layer_is_rejected() {
        let err = load_layered_yaml_from_strings(&["- just\n- a list\n"]).unwrap_err();
        assert!(err.to_string().contains("<layer 0>"), "{err}");
    }
}
