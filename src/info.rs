//! Capability Advertisement Module
//!
//! Process-wide registry of capability records surfaced on the proxy's
//! `/info` endpoint. Registration happens once at middleware construction
//! and the registry is effectively constant afterwards.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, OnceLock};

fn registry() -> &'static Mutex<BTreeMap<String, Value>> {
    static REGISTRY: OnceLock<Mutex<BTreeMap<String, Value>>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(BTreeMap::new()))
}

/// Register one informational record under a section name, replacing any
/// previous record for that section.
pub fn register_swift_info(section: &str, value: Value) {
    registry()
        .lock()
        .expect("info registry poisoned")
        .insert(section.to_string(), value);
}

/// Snapshot of every registered capability record.
pub fn swift_info() -> Value {
    let map = registry().lock().expect("info registry poisoned");
    Value::Object(map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}
