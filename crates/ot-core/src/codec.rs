//! Wire-format (de)serialization of [`Operation`]s.
//!
//! Operations travel over the network as a JSON array mixing three element
//! shapes, matching the convention used by ot.js-family clients:
//!
//! - a positive integer `n` — `Retain(n)`
//! - a negative integer `-n` — `Delete(n)`
//! - a string `s` — `Insert(s)`
//!
//! `[5, "hi", -3]` is retain 5, insert "hi", delete 3. This is deliberately
//! not the derived `#[derive(Serialize)]` shape of [`Op`]/[`Operation`] (which
//! is used for everything else, e.g. snapshots) — the wire format exists to
//! stay compact and interoperable with non-Rust clients.

use serde_json::Value;

use crate::builder::OperationBuilder;
use crate::error::{OtError, Result};
use crate::op::{Op, Operation};

/// Encode `op` into its wire-format JSON array.
#[must_use]
pub fn to_json(op: &Operation) -> Value {
    let elements: Vec<Value> = op
        .ops()
        .iter()
        .map(|step| match step {
            Op::Retain(n) => Value::from(*n as i64),
            Op::Delete(n) => Value::from(-(*n as i64)),
            Op::Insert(s) => Value::from(s.as_str()),
        })
        .collect();
    Value::Array(elements)
}

/// Decode a wire-format JSON array into an [`Operation`], re-canonicalizing
/// it through [`OperationBuilder`] so a hand-authored or buggy peer can never
/// hand us a non-canonical `Operation`.
///
/// # Errors
/// [`OtError::InvalidCodecElement`] if `value` isn't an array, or contains
/// anything other than an integer or a string; zero-valued integers are
/// rejected too since they can never appear in canonical output.
pub fn from_json(value: &Value) -> Result<Operation> {
    let elements = value
        .as_array()
        .ok_or_else(|| OtError::InvalidCodecElement(format!("expected array, got {value}")))?;

    let mut builder = OperationBuilder::new();
    for el in elements {
        if let Some(s) = el.as_str() {
            builder.insert(s);
        } else if let Some(n) = el.as_i64() {
            match n.cmp(&0) {
                std::cmp::Ordering::Greater => {
                    builder.retain(n as usize);
                }
                std::cmp::Ordering::Less => {
                    builder.delete((-n) as usize);
                }
                std::cmp::Ordering::Equal => {
                    return Err(OtError::InvalidCodecElement(
                        "zero-valued retain/delete element".into(),
                    ));
                }
            }
        } else {
            return Err(OtError::InvalidCodecElement(format!(
                "expected integer or string element, got {el}"
            )));
        }
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OperationBuilder;

    #[test]
    fn round_trips_through_json() {
        let op = OperationBuilder::new()
            .retain(5)
            .insert("hi")
            .delete(3)
            .build();
        let json = to_json(&op);
        assert_eq!(json, serde_json::json!([5, "hi", -3]));
        let back = from_json(&json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn rejects_zero_element() {
        let json = serde_json::json!([0, "x"]);
        assert!(matches!(
            from_json(&json),
            Err(OtError::InvalidCodecElement(_))
        ));
    }

    #[test]
    fn rejects_non_array() {
        let json = serde_json::json!({"not": "an array"});
        assert!(matches!(
            from_json(&json),
            Err(OtError::InvalidCodecElement(_))
        ));
    }
}
