//! Canonical form for JSON-compatible values.
//!
//! Every map is rebuilt with its keys in UTF-16 code-unit order and, under
//! the default [`NullMembers::Drop`] policy, without null-valued members.
//! Arrays keep their order and length (null elements included) and scalars
//! pass through untouched. The result is a fresh tree; the input is only
//! borrowed.

use crate::error::{HashError, UnsupportedValue};
use crate::utils;
use crate::{HashConfig, NullMembers};
use serde_json::{Map, Value};
use tracing::debug;

/// Canonicalize `value` under the default [`HashConfig`].
pub fn canonicalize(value: &Value) -> Result<Value, HashError> {
    canonicalize_with(value, &HashConfig::default())
}

/// Canonicalize `value`, failing with [`UnsupportedValue::DepthExceeded`]
/// when more than `config.max_depth` arrays/objects are nested.
pub fn canonicalize_with(value: &Value, config: &HashConfig) -> Result<Value, HashError> {
    canonical_at(value, config, 0).inspect_err(|e| debug!(error = %e, "rejected value"))
}

fn canonical_at(value: &Value, config: &HashConfig, depth: usize) -> Result<Value, HashError> {
    match value {
        Value::Array(items) => {
            let depth = enter(depth, config)?;
            items
                .iter()
                .map(|v| canonical_at(v, config, depth))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Value::Object(om) => {
            let depth = enter(depth, config)?;
            let mut out = Map::with_capacity(om.len());
            let mut dropped = 0usize;
            for (k, v) in utils::sorted_members(om) {
                if v.is_null() && config.nulls == NullMembers::Drop {
                    dropped += 1;
                    continue;
                }
                out.insert(k.clone(), canonical_at(v, config, depth)?);
            }
            if dropped > 0 {
                debug!(dropped, depth, "dropped null members");
            }
            Ok(Value::Object(out))
        }
        Value::Number(n) => match n.as_f64() {
            Some(f) if !f.is_finite() => Err(UnsupportedValue::NonFiniteNumber(f).into()),
            _ => Ok(value.clone()),
        },
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(value.clone()),
    }
}

#[inline]
fn enter(depth: usize, config: &HashConfig) -> Result<usize, HashError> {
    let depth = depth + 1;
    if depth > config.max_depth {
        return Err(UnsupportedValue::DepthExceeded {
            limit: config.max_depth,
        }
        .into());
    }
    Ok(depth)
}
