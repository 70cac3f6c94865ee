// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use serde_json::Value;

use super::Settings;

/// Bring a settings document written by another crate version up to date.
///
/// Values the operator set are laid over the current defaults. Keys the
/// current schema does not know are dropped and the version is stamped.
pub(super) fn migrate_on_load(value: Value) -> Value {
    let current = env!("CARGO_PKG_VERSION");
    let stored = value.get("version").and_then(Value::as_str);
    if stored == Some(current) {
        return value;
    }

    let defaults = match serde_json::to_value(Settings::default()) {
        Ok(defaults) => defaults,
        Err(_) => return value,
    };

    tracing::info!(
        target: "mineagent.config",
        from = stored.unwrap_or("unknown"),
        to = current,
        "migrating settings"
    );

    let mut migrated = overlay_known(defaults, value);
    if let Value::Object(map) = &mut migrated {
        map.insert("version".to_string(), Value::String(current.to_string()));
    }
    migrated
}

/// Overlay `stored` onto `defaults`, keeping only keys `defaults` has.
/// Optional fields (skipped when unset) are let through at the leaf level.
fn overlay_known(defaults: Value, stored: Value) -> Value {
    match (defaults, stored) {
        (Value::Object(mut default_map), Value::Object(stored_map)) => {
            for (key, stored_val) in stored_map {
                match default_map.remove(&key) {
                    Some(default_val) => {
                        default_map.insert(key, overlay_known(default_val, stored_val));
                    }
                    None if is_optional_key(&key) => {
                        default_map.insert(key, stored_val);
                    }
                    None => {}
                }
            }
            Value::Object(default_map)
        }
        (Value::Object(default_map), _) => Value::Object(default_map),
        (_default, stored) => stored,
    }
}

fn is_optional_key(key: &str) -> bool {
    matches!(key, "api_key" | "account_id")
}

/// Deep-merge two JSON values.
/// `base` is existing file content, `overlay` is serialized current struct.
/// Overlay values take priority.
pub(super) fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = if let Some(base_val) = base_map.remove(&key) {
                    deep_merge(base_val, overlay_val)
                } else {
                    overlay_val
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_base, overlay) => overlay,
    }
}
