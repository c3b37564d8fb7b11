//! Request fingerprinting: the cache key.
//!
//! A fingerprint is the SHA-256 of `subject \n request_type \n canonical_params`,
//! where the canonical form of the parameters is a JSON rendering with:
//!
//! - object keys sorted at every level
//! - keys whose value is `null` dropped
//! - string leaves trimmed and lower-cased
//! - numbers normalized (`3`, `3.0` and `3.00` render identically)
//!
//! Arrays keep their order. Volatile request fields (sampling options, scope,
//! prompt context) never reach this module.

use gencache_core::generation::Fingerprint;
use gencache_core::request::{DomainParams, GenerationRequest, RequestType};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Largest integer an `f64` represents exactly.
const MAX_EXACT_F64_INT: f64 = 9_007_199_254_740_992.0;

/// Derives fingerprints. Stateless.
pub struct FingerprintBuilder;

impl FingerprintBuilder {
    /// Fingerprint of a request's cache identity.
    pub fn for_request(request: &GenerationRequest) -> Fingerprint {
        Self::build(&request.subject_id, request.request_type(), &request.params)
    }

    /// Fingerprint of typed domain parameters.
    pub fn build(subject_id: &str, request_type: RequestType, params: &DomainParams) -> Fingerprint {
        Self::of_value(subject_id, request_type, &params.to_value())
    }

    /// Fingerprint of loosely-typed parameters.
    pub fn of_value(subject_id: &str, request_type: RequestType, params: &Value) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(subject_id.trim().as_bytes());
        hasher.update(b"\n");
        hasher.update(request_type.as_str().as_bytes());
        hasher.update(b"\n");
        hasher.update(canonical_json(params).as_bytes());

        Fingerprint::from_hex(hex::encode(hasher.finalize()))
    }
}

/// Render a value in canonical form.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&canonical_number(n)),
        Value::String(s) => {
            // Display of a JSON string value is its quoted, escaped form.
            let normalized = Value::String(s.trim().to_lowercase());
            out.push_str(&normalized.to_string());
        }
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
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
    }
}

fn canonical_number(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_EXACT_F64_INT => (f as i64).to_string(),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
