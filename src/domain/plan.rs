//! Plans, verification outcomes, and canonical plan hashing.
//!
//! The plan hash is a SHA-256 digest over a canonical JSON encoding:
//! object keys recursively sorted, arrays kept in order, no whitespace,
//! strings escaped per JSON with `\uXXXX` for control characters, numbers
//! rendered by serde_json's stable formatter. Two structurally-equal plans
//! hash identically regardless of key insertion order, and the encoding is
//! specified here exactly so other implementations can reproduce it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A proposed action with parameters, subject to verification before any
/// side effect occurs.
///
/// `params` stays a raw JSON value rather than a typed map so that
/// structurally invalid shapes (scalar or list params) remain representable:
/// the verifier denies them outright instead of partially interpreting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// The action to perform (non-empty string for valid plans)
    pub action: String,

    /// Action parameters (a JSON object for valid plans)
    #[serde(default = "default_params")]
    pub params: Value,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

impl Plan {
    /// Create a plan from an action and parameters
    pub fn new(action: impl Into<String>, params: Value) -> Self {
        Self {
            action: action.into(),
            params,
        }
    }

    /// Canonical JSON encoding of this plan
    pub fn canonical_json(&self) -> String {
        let value = serde_json::json!({
            "action": self.action,
            "params": self.params,
        });
        canonical_json(&value)
    }

    /// Stable SHA-256 digest of the canonicalized plan, lowercase hex
    pub fn hash(&self) -> String {
        hash_value(&serde_json::json!({
            "action": self.action,
            "params": self.params,
        }))
    }
}

/// SHA-256 over the canonical encoding of an arbitrary JSON value
pub(crate) fn hash_value(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// Encode a JSON value canonically: sorted object keys, no whitespace.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_escaped(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort keys explicitly; do not rely on map iteration order
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_escaped(key, out);
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
    }
}

fn write_escaped(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Caller-supplied context for a verification call.
///
/// Carries no decision-relevant state today: checks must not read anything
/// from it that varies between calls, so outcomes stay bit-identical for a
/// fixed plan. The timestamp is implicit (the audit event records its own).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationContext {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

impl VerificationContext {
    pub fn new(user_id: Option<String>, session_id: Option<String>) -> Self {
        Self {
            user_id,
            session_id,
        }
    }
}

/// Result of verifying one plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Whether the plan may execute
    pub allow: bool,

    /// On denial: the first failing check's reason. On allow: every check
    /// that passed, in evaluation order (for audit transparency).
    pub reasons: Vec<String>,

    /// Canonical plan digest, for audit correlation
    pub plan_hash: String,
}

impl VerificationOutcome {
    /// Construct a denial with a single reason
    pub fn deny(reason: impl Into<String>, plan_hash: String) -> Self {
        Self {
            allow: false,
            reasons: vec![reason.into()],
            plan_hash,
        }
    }

    /// Construct an allow outcome with the passed-check trail
    pub fn allow(reasons: Vec<String>, plan_hash: String) -> Self {
        Self {
            allow: true,
            reasons,
            plan_hash,
        }
    }
}
